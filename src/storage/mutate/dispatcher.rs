//! 请求分发器
//!
//! 把一个跨分区的更新请求扇出为逐行执行器，限宽并发收集结果：
//! 每个分区只记录首个失败；LeaderChanged 附带当前 leader 地址
//! 供客户端重定向；任何一行产出 YIELD 列则响应携带结果集。

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::core::dataset::DataSet;
use crate::core::error::ErrorCode;
use crate::schema::SchemaCatalog;
use crate::storage::index_state::{IndexCountMap, IndexStateOracle};
use crate::storage::lock_manager::MemoryLockTable;
use crate::storage::mutate::plan::ExecutorContext;
use crate::storage::mutate::update_executor::execute_row;
use crate::storage::mutate::{
    PartitionResult, TransactionManager, UpdateRequest, UpdateResponse,
};
use crate::storage::replicated::ReplicatedStore;

pub struct UpdateDispatcher {
    store: Arc<dyn ReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
    txn: Option<Arc<dyn TransactionManager>>,
    concurrency: usize,
    append_timeout: Option<Duration>,
}

impl UpdateDispatcher {
    pub fn new(
        store: Arc<dyn ReplicatedStore>,
        catalog: Arc<SchemaCatalog>,
        locks: Arc<MemoryLockTable>,
        index_states: Arc<IndexStateOracle>,
        index_counts: Arc<IndexCountMap>,
        txn: Option<Arc<dyn TransactionManager>>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            locks,
            index_states,
            index_counts,
            txn,
            concurrency: config.update_concurrency.max(1),
            append_timeout: match config.append_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub async fn process(&self, req: UpdateRequest) -> UpdateResponse {
        let ctx = ExecutorContext {
            space_id: req.space_id,
            target: req.target,
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            locks: Arc::clone(&self.locks),
            index_states: Arc::clone(&self.index_states),
            index_counts: Arc::clone(&self.index_counts),
            txn: self.txn.clone(),
            append_timeout: self.append_timeout,
        };

        let outcomes: Vec<_> = stream::iter(req.rows.into_iter().map(|row| {
            let ctx = ctx.clone();
            async move { execute_row(&ctx, row).await }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut failed_parts = Vec::new();
        let mut seen_parts = HashSet::new();
        let mut props: Option<DataSet> = None;

        for outcome in outcomes {
            // 每个分区只保留首个失败
            if !outcome.code.ok() && seen_parts.insert(outcome.part_id) {
                let leader = match outcome.leader {
                    Some(addr) => Some(addr),
                    None if outcome.code == ErrorCode::LeaderChanged => self
                        .store
                        .part_leader(req.space_id, outcome.part_id)
                        .ok(),
                    None => None,
                };
                failed_parts.push(PartitionResult {
                    code: outcome.code,
                    part_id: outcome.part_id,
                    leader,
                });
            }
            if let Some((names, row)) = outcome.columns {
                props
                    .get_or_insert_with(|| DataSet::new(names))
                    .append_row(row);
            }
        }

        UpdateResponse {
            failed_parts,
            props,
        }
    }
}
