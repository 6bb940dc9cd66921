//! 执行计划
//!
//! 更新管线在计划构建期就已确定，因此计划节点是带配置的
//! 标签化变体，由单个分派函数执行，不需要运行时多态。
//! 不可变的协作方句柄集中在 [`ExecutorContext`]；一次调用的
//! 可变状态在 [`ExecState`]，执行结束即丢弃。

use std::sync::Arc;
use std::time::Duration;

use crate::core::codec::KeyUtils;
use crate::core::error::{ErrorCode, StorageError, StorageResult};
use crate::core::types::{PartitionId, SpaceId};
use crate::core::value::Value;
use crate::expression::{Expression, PropContext};
use crate::schema::{Schema, SchemaCatalog, SchemaSnapshot};
use crate::storage::batch::BatchHolder;
use crate::storage::index_state::{IndexCountMap, IndexStateOracle};
use crate::storage::lock_manager::{LockKey, MemoryLockTable};
use crate::storage::mutate::{RowKey, SchemaTarget, TransactionManager};
use crate::storage::replicated::ReplicatedStore;

/// 执行器上下文：协作方句柄的不可变集合
#[derive(Clone)]
pub struct ExecutorContext {
    pub space_id: SpaceId,
    pub target: SchemaTarget,
    pub store: Arc<dyn ReplicatedStore>,
    pub catalog: Arc<SchemaCatalog>,
    pub locks: Arc<MemoryLockTable>,
    pub index_states: Arc<IndexStateOracle>,
    pub index_counts: Arc<IndexCountMap>,
    pub txn: Option<Arc<dyn TransactionManager>>,
    /// 复制追加的调用方截止时间
    pub append_timeout: Option<Duration>,
}

/// 过滤阶段的结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Normal,
    IllegalData,
    FilterOut,
}

/// 更新节点的产物：有批可提交，或明确说明为何无批。
/// "被过滤"与"出错"由此在提交路径上不可混淆。
#[derive(Debug)]
pub enum Outcome {
    Batch(BatchHolder),
    NoBatch(ErrorCode),
}

/// 计划节点
pub enum PlanNode {
    /// 读取并解码当前行，含 TTL 判定
    Fetch,
    /// 物化属性上下文并求值过滤条件
    Filter { condition: Option<Expression> },
    /// 读-改-写主体：插入路径/收集、按序应用更新、编码、索引增量
    Update {
        updated_props: Vec<(String, Expression)>,
        insertable: bool,
    },
    /// 产出 YIELD 列
    Yield { return_props: Vec<Expression> },
}

/// 一次执行器调用的可变状态
pub struct ExecState {
    pub part_id: PartitionId,
    pub target: SchemaTarget,
    pub row_key: RowKey,
    pub vid_len: usize,
    pub snapshot: Arc<SchemaSnapshot>,
    /// 最新版模式
    pub schema: Arc<Schema>,
    /// 旧行的写入版本模式
    pub auth_schema: Option<Arc<Schema>>,
    pub sym: String,
    /// 主行键
    pub key: Vec<u8>,
    /// 旧行字节；插入路径与 TTL 过期时为空
    pub old_raw: Vec<u8>,
    pub insert: bool,
    pub status: ResultStatus,
    pub props: PropContext,
    pub outcome: Option<Outcome>,
    /// 提交后的结果码，Yield 节点据此决定是否产出
    pub commit_code: ErrorCode,
    pub columns: Option<(Vec<String>, Vec<Value>)>,
}

impl ExecState {
    /// 解析模式、构建主键并初始化状态
    pub fn new(
        ctx: &ExecutorContext,
        snapshot: Arc<SchemaSnapshot>,
        part_id: PartitionId,
        row_key: RowKey,
    ) -> StorageResult<Self> {
        let vid_len = snapshot.vid_len(ctx.space_id)?;
        let (schema, sym) = match ctx.target {
            SchemaTarget::Tag(tag_id) => snapshot.latest_tag_schema(ctx.space_id, tag_id)?,
            SchemaTarget::Edge(edge_type) => {
                snapshot.latest_edge_schema(ctx.space_id, edge_type)?
            }
        };

        let key = match (&ctx.target, &row_key) {
            (SchemaTarget::Tag(tag_id), RowKey::Vertex { vid }) => {
                if vid.is_empty() || vid.len() > vid_len {
                    return Err(StorageError::IllegalData(format!(
                        "顶点 ID 长度 {} 超出空间定长 {}",
                        vid.len(),
                        vid_len
                    )));
                }
                KeyUtils::vertex_key(vid_len, part_id, vid, *tag_id)
            }
            (SchemaTarget::Edge(_), RowKey::Edge {
                src,
                edge_type,
                rank,
                dst,
            }) => {
                if src.is_empty() || src.len() > vid_len || dst.is_empty() || dst.len() > vid_len
                {
                    return Err(StorageError::IllegalData(format!(
                        "边端点 ID 长度超出空间定长 {}",
                        vid_len
                    )));
                }
                KeyUtils::edge_key(vid_len, part_id, src, *edge_type, *rank, dst)
            }
            _ => {
                return Err(StorageError::IllegalData(
                    "行键类型与请求目标不匹配".to_string(),
                ))
            }
        };

        Ok(Self {
            part_id,
            target: ctx.target,
            row_key,
            vid_len,
            snapshot,
            schema,
            auth_schema: None,
            sym: sym.clone(),
            key,
            old_raw: Vec::new(),
            insert: false,
            status: ResultStatus::Normal,
            props: PropContext::new(sym),
            outcome: None,
            commit_code: ErrorCode::Succeeded,
            columns: None,
        })
    }

    /// 本行的内存锁标识
    pub fn lock_key(&self, space: SpaceId) -> LockKey {
        match (&self.target, &self.row_key) {
            (SchemaTarget::Tag(tag_id), RowKey::Vertex { vid }) => LockKey::Vertex {
                space,
                part: self.part_id,
                tag_id: *tag_id,
                vid: vid.clone(),
            },
            (
                _,
                RowKey::Edge {
                    src,
                    edge_type,
                    rank,
                    dst,
                },
            ) => LockKey::Edge {
                space,
                part: self.part_id,
                src: src.clone(),
                edge_type: *edge_type,
                rank: *rank,
                dst: dst.clone(),
            },
            (SchemaTarget::Edge(_), RowKey::Vertex { vid }) => LockKey::Vertex {
                space,
                part: self.part_id,
                tag_id: 0,
                vid: vid.clone(),
            },
        }
    }
}
