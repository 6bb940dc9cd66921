//! 删除处理器
//!
//! 顶点删除按 (part, vid) 前缀扫描该顶点的全部标签行；
//! 边删除按显式边键定位。索引项与主行在同一个批里消亡。

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::core::codec::{parse_row_version, KeyUtils, RowReader};
use crate::core::error::{StorageError, StorageResult};
use crate::core::types::{EdgeType, PartitionId, SpaceId};
use crate::schema::{SchemaCatalog, SchemaSnapshot};
use crate::storage::batch::BatchHolder;
use crate::storage::index_state::{IndexCountMap, IndexStateOracle};
use crate::storage::lock_manager::{LockKey, MemoryLockTable};
use crate::storage::mutate::insert_processor::{append_index_ops, RowIdentRef};
use crate::storage::mutate::PartitionResult;
use crate::storage::replicated::ReplicatedStore;

/// 待删除边的键
#[derive(Debug, Clone)]
pub struct EdgeKeyItem {
    pub part_id: PartitionId,
    pub src: Vec<u8>,
    pub edge_type: EdgeType,
    pub rank: i64,
    pub dst: Vec<u8>,
}

/// 顶点删除处理器
pub struct DeleteVerticesProcessor {
    space_id: SpaceId,
    store: Arc<dyn ReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
}

impl DeleteVerticesProcessor {
    pub fn new(
        space_id: SpaceId,
        store: Arc<dyn ReplicatedStore>,
        catalog: Arc<SchemaCatalog>,
        locks: Arc<MemoryLockTable>,
        index_states: Arc<IndexStateOracle>,
        index_counts: Arc<IndexCountMap>,
    ) -> Self {
        Self {
            space_id,
            store,
            catalog,
            locks,
            index_states,
            index_counts,
        }
    }

    /// 批量删除顶点（连同其全部标签行），返回失败分区
    pub async fn process(&self, vertices: Vec<(PartitionId, Vec<u8>)>) -> Vec<PartitionResult> {
        let snapshot = self.catalog.snapshot();
        let mut failed = Vec::new();

        let mut by_part: BTreeMap<PartitionId, Vec<Vec<u8>>> = BTreeMap::new();
        for (part_id, vid) in vertices {
            by_part.entry(part_id).or_default().push(vid);
        }

        for (part_id, vids) in by_part {
            if let Err(e) = self.process_part(&snapshot, part_id, &vids).await {
                let leader = match &e {
                    StorageError::LeaderChanged(addr) => Some(addr.clone()),
                    _ => None,
                };
                warn!("分区 {} 顶点删除失败: {}", part_id, e);
                failed.push(PartitionResult {
                    code: e.to_code(),
                    part_id,
                    leader,
                });
            }
        }
        failed
    }

    async fn process_part(
        &self,
        snapshot: &SchemaSnapshot,
        part_id: PartitionId,
        vids: &[Vec<u8>],
    ) -> StorageResult<()> {
        let vid_len = snapshot.vid_len(self.space_id)?;
        let _count = self.index_counts.enter(self.space_id, part_id);

        let mut guards = Vec::new();
        let mut batch = BatchHolder::new();

        for vid in vids {
            let prefix = KeyUtils::vertex_tags_prefix(vid_len, part_id, vid);
            let rows = self.store.prefix(self.space_id, part_id, &prefix)?;
            // 顶点不存在时该行是空操作
            for (key, value) in rows {
                let (_, _, tag_id) = KeyUtils::parse_vertex_key(&key, vid_len)?;
                guards.push(self.locks.try_lock(LockKey::Vertex {
                    space: self.space_id,
                    part: part_id,
                    tag_id,
                    vid: vid.clone(),
                })?);

                let (ver, _) = parse_row_version(&value)?;
                let auth = snapshot.tag_schema_by_version(self.space_id, tag_id, ver)?;
                let reader = RowReader::new(&value, &auth)?;
                let indexes = snapshot.tag_indexes(self.space_id, tag_id);
                append_index_ops(
                    &mut batch,
                    &self.index_states,
                    self.space_id,
                    part_id,
                    vid_len,
                    &RowIdentRef::Vertex { vid },
                    indexes,
                    Some(&reader),
                    None,
                    None,
                )?;
                batch.remove(key);
            }
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store
            .async_append_batch(self.space_id, part_id, batch)
            .await
    }
}

/// 边删除处理器
pub struct DeleteEdgesProcessor {
    space_id: SpaceId,
    store: Arc<dyn ReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
}

impl DeleteEdgesProcessor {
    pub fn new(
        space_id: SpaceId,
        store: Arc<dyn ReplicatedStore>,
        catalog: Arc<SchemaCatalog>,
        locks: Arc<MemoryLockTable>,
        index_states: Arc<IndexStateOracle>,
        index_counts: Arc<IndexCountMap>,
    ) -> Self {
        Self {
            space_id,
            store,
            catalog,
            locks,
            index_states,
            index_counts,
        }
    }

    pub async fn process(&self, edges: Vec<EdgeKeyItem>) -> Vec<PartitionResult> {
        let snapshot = self.catalog.snapshot();
        let mut failed = Vec::new();

        let mut by_part: BTreeMap<PartitionId, Vec<EdgeKeyItem>> = BTreeMap::new();
        for e in edges {
            by_part.entry(e.part_id).or_default().push(e);
        }

        for (part_id, items) in by_part {
            if let Err(e) = self.process_part(&snapshot, part_id, &items).await {
                let leader = match &e {
                    StorageError::LeaderChanged(addr) => Some(addr.clone()),
                    _ => None,
                };
                warn!("分区 {} 边删除失败: {}", part_id, e);
                failed.push(PartitionResult {
                    code: e.to_code(),
                    part_id,
                    leader,
                });
            }
        }
        failed
    }

    async fn process_part(
        &self,
        snapshot: &SchemaSnapshot,
        part_id: PartitionId,
        items: &[EdgeKeyItem],
    ) -> StorageResult<()> {
        let vid_len = snapshot.vid_len(self.space_id)?;
        let _count = self.index_counts.enter(self.space_id, part_id);

        let mut guards = Vec::with_capacity(items.len());
        let mut batch = BatchHolder::new();

        for item in items {
            guards.push(self.locks.try_lock(LockKey::Edge {
                space: self.space_id,
                part: part_id,
                src: item.src.clone(),
                edge_type: item.edge_type,
                rank: item.rank,
                dst: item.dst.clone(),
            })?);

            let key = KeyUtils::edge_key(
                vid_len,
                part_id,
                &item.src,
                item.edge_type,
                item.rank,
                &item.dst,
            );
            let value = match self.store.get(self.space_id, part_id, &key)? {
                Some(v) => v,
                // 不存在的边是空操作
                None => continue,
            };

            let (ver, _) = parse_row_version(&value)?;
            let auth = snapshot.edge_schema_by_version(self.space_id, item.edge_type, ver)?;
            let reader = RowReader::new(&value, &auth)?;
            let indexes = snapshot.edge_indexes(self.space_id, item.edge_type);
            append_index_ops(
                &mut batch,
                &self.index_states,
                self.space_id,
                part_id,
                vid_len,
                &RowIdentRef::Edge {
                    src: &item.src,
                    rank: item.rank,
                    dst: &item.dst,
                },
                indexes,
                Some(&reader),
                None,
                None,
            )?;
            batch.remove(key);
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store
            .async_append_batch(self.space_id, part_id, batch)
            .await
    }
}
