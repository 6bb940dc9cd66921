//! 插入处理器
//!
//! 顶点/边批量插入：以最新模式编码、同批写入主行与索引项。
//! 覆盖写会先移除旧行遗留的索引项，索引状态规则与更新路径一致。

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::core::codec::{
    parse_row_version, IndexKeyUtils, KeyUtils, OperationKeyUtils, RowReader, RowWriter,
};
use crate::core::error::{StorageError, StorageResult};
use crate::core::types::{EdgeType, PartitionId, SpaceId, TagId};
use crate::core::value::Value;
use crate::schema::{IndexItem, Schema, SchemaCatalog, SchemaSnapshot};
use crate::storage::batch::BatchHolder;
use crate::storage::index_state::{IndexCountMap, IndexState, IndexStateOracle};
use crate::storage::lock_manager::{LockKey, MemoryLockTable};
use crate::storage::mutate::PartitionResult;
use crate::storage::replicated::ReplicatedStore;

/// 待插入顶点
#[derive(Debug, Clone)]
pub struct NewVertex {
    pub part_id: PartitionId,
    pub vid: Vec<u8>,
    pub tag_id: TagId,
    pub prop_names: Vec<String>,
    pub values: Vec<Value>,
}

/// 待插入边（单侧；出边与入边由上游分别列出）
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub part_id: PartitionId,
    pub src: Vec<u8>,
    pub edge_type: EdgeType,
    pub rank: i64,
    pub dst: Vec<u8>,
    pub prop_names: Vec<String>,
    pub values: Vec<Value>,
}

/// 按索引状态把旧/新索引项写进批
#[allow(clippy::too_many_arguments)]
pub(crate) fn append_index_ops(
    batch: &mut BatchHolder,
    oracle: &IndexStateOracle,
    space: SpaceId,
    part_id: PartitionId,
    vid_len: usize,
    ident: &RowIdentRef<'_>,
    indexes: &[Arc<IndexItem>],
    old_reader: Option<&RowReader<'_>>,
    new_reader: Option<&RowReader<'_>>,
    ttl_anchor: Option<i64>,
) -> StorageResult<()> {
    for index in indexes {
        let state = oracle.state(space, part_id, index.index_id);
        if state == IndexState::Locked {
            return Err(StorageError::IndexLocked);
        }
        if let Some(reader) = old_reader {
            if let Some(values) = IndexKeyUtils::collect_index_values(reader, index)? {
                let old_key = ident.index_key(vid_len, part_id, index.index_id, &values);
                match state {
                    IndexState::Normal => batch.remove(old_key),
                    IndexState::Rebuilding => {
                        batch.put(OperationKeyUtils::delete_operation_key(part_id), old_key)
                    }
                    IndexState::Locked => unreachable!(),
                }
            }
        }
        if let Some(reader) = new_reader {
            if let Some(values) = IndexKeyUtils::collect_index_values(reader, index)? {
                let new_key = ident.index_key(vid_len, part_id, index.index_id, &values);
                let val = IndexKeyUtils::index_val(ttl_anchor);
                match state {
                    IndexState::Normal => batch.put(new_key, val),
                    IndexState::Rebuilding => batch.put(
                        OperationKeyUtils::modify_operation_key(part_id, &new_key),
                        val,
                    ),
                    IndexState::Locked => unreachable!(),
                }
            }
        }
    }
    Ok(())
}

/// 行标识的借用形式
pub(crate) enum RowIdentRef<'a> {
    Vertex {
        vid: &'a [u8],
    },
    Edge {
        src: &'a [u8],
        rank: i64,
        dst: &'a [u8],
    },
}

impl RowIdentRef<'_> {
    fn index_key(
        &self,
        vid_len: usize,
        part_id: PartitionId,
        index_id: crate::core::types::IndexId,
        values: &[u8],
    ) -> Vec<u8> {
        match self {
            RowIdentRef::Vertex { vid } => {
                IndexKeyUtils::vertex_index_key(vid_len, part_id, index_id, vid, values)
            }
            RowIdentRef::Edge { src, rank, dst } => {
                IndexKeyUtils::edge_index_key(vid_len, part_id, index_id, src, *rank, dst, values)
            }
        }
    }
}

/// 编码一行并返回字节
pub(crate) fn encode_row(
    schema: &Schema,
    prop_names: &[String],
    values: &[Value],
) -> StorageResult<Vec<u8>> {
    if prop_names.len() != values.len() {
        return Err(StorageError::InvalidFieldValue(
            "属性名与值数量不一致".to_string(),
        ));
    }
    let mut writer = RowWriter::new(schema);
    for (name, value) in prop_names.iter().zip(values) {
        writer.set_value(name, value)?;
    }
    Ok(writer.finish()?)
}

/// TTL 锚点：从编码后的行里读 TTL 列
pub(crate) fn ttl_anchor_of(schema: &Schema, reader: &RowReader<'_>) -> Option<i64> {
    schema
        .ttl
        .as_ref()
        .and_then(|ttl| reader.get_value(&ttl.col).ok())
        .and_then(|v| v.as_int())
}

/// 顶点插入处理器
pub struct AddVerticesProcessor {
    space_id: SpaceId,
    store: Arc<dyn ReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
}

impl AddVerticesProcessor {
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

    /// 批量插入；按分区组批提交，返回失败分区
    pub async fn process(&self, vertices: Vec<NewVertex>) -> Vec<PartitionResult> {
        let snapshot = self.catalog.snapshot();
        let mut failed = Vec::new();

        let mut by_part: BTreeMap<PartitionId, Vec<NewVertex>> = BTreeMap::new();
        for v in vertices {
            by_part.entry(v.part_id).or_default().push(v);
        }

        for (part_id, items) in by_part {
            if let Err(e) = self.process_part(&snapshot, part_id, &items).await {
                let leader = match &e {
                    StorageError::LeaderChanged(addr) => Some(addr.clone()),
                    _ => None,
                };
                warn!("分区 {} 顶点插入失败: {}", part_id, e);
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
        items: &[NewVertex],
    ) -> StorageResult<()> {
        let vid_len = snapshot.vid_len(self.space_id)?;
        let _count = self.index_counts.enter(self.space_id, part_id);

        // 先取齐全部行锁，冲突立即放弃该分区
        let mut guards = Vec::with_capacity(items.len());
        for item in items {
            guards.push(self.locks.try_lock(LockKey::Vertex {
                space: self.space_id,
                part: part_id,
                tag_id: item.tag_id,
                vid: item.vid.clone(),
            })?);
        }

        let mut batch = BatchHolder::new();
        for item in items {
            let (schema, _name) = snapshot.latest_tag_schema(self.space_id, item.tag_id)?;
            let new_val = encode_row(&schema, &item.prop_names, &item.values)?;
            let key = KeyUtils::vertex_key(vid_len, part_id, &item.vid, item.tag_id);
            let indexes = snapshot.tag_indexes(self.space_id, item.tag_id);
            let ident = RowIdentRef::Vertex { vid: &item.vid };

            // 覆盖写：清掉旧行遗留的索引项
            let old_raw = self.store.get(self.space_id, part_id, &key)?;
            let old_auth = match &old_raw {
                Some(bytes) => {
                    let (ver, _) = parse_row_version(bytes)?;
                    Some(snapshot.tag_schema_by_version(self.space_id, item.tag_id, ver)?)
                }
                None => None,
            };
            let new_reader = RowReader::new(&new_val, &schema)?;
            let ttl_anchor = ttl_anchor_of(&schema, &new_reader);
            match (&old_raw, &old_auth) {
                (Some(bytes), Some(auth)) => {
                    let old_reader = RowReader::new(bytes, auth)?;
                    append_index_ops(
                        &mut batch,
                        &self.index_states,
                        self.space_id,
                        part_id,
                        vid_len,
                        &ident,
                        indexes,
                        Some(&old_reader),
                        Some(&new_reader),
                        ttl_anchor,
                    )?;
                }
                _ => {
                    append_index_ops(
                        &mut batch,
                        &self.index_states,
                        self.space_id,
                        part_id,
                        vid_len,
                        &ident,
                        indexes,
                        None,
                        Some(&new_reader),
                        ttl_anchor,
                    )?;
                }
            }
            batch.put(key, new_val);
        }

        self.store
            .async_append_batch(self.space_id, part_id, batch)
            .await
    }
}

/// 边插入处理器
pub struct AddEdgesProcessor {
    space_id: SpaceId,
    store: Arc<dyn ReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
}

impl AddEdgesProcessor {
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

    pub async fn process(&self, edges: Vec<NewEdge>) -> Vec<PartitionResult> {
        let snapshot = self.catalog.snapshot();
        let mut failed = Vec::new();

        let mut by_part: BTreeMap<PartitionId, Vec<NewEdge>> = BTreeMap::new();
        for e in edges {
            by_part.entry(e.part_id).or_default().push(e);
        }

        for (part_id, items) in by_part {
            if let Err(e) = self.process_part(&snapshot, part_id, &items).await {
                let leader = match &e {
                    StorageError::LeaderChanged(addr) => Some(addr.clone()),
                    _ => None,
                };
                warn!("分区 {} 边插入失败: {}", part_id, e);
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
        items: &[NewEdge],
    ) -> StorageResult<()> {
        let vid_len = snapshot.vid_len(self.space_id)?;
        let _count = self.index_counts.enter(self.space_id, part_id);

        let mut guards = Vec::with_capacity(items.len());
        for item in items {
            guards.push(self.locks.try_lock(LockKey::Edge {
                space: self.space_id,
                part: part_id,
                src: item.src.clone(),
                edge_type: item.edge_type,
                rank: item.rank,
                dst: item.dst.clone(),
            })?);
        }

        let mut batch = BatchHolder::new();
        for item in items {
            let (schema, _name) = snapshot.latest_edge_schema(self.space_id, item.edge_type)?;
            let new_val = encode_row(&schema, &item.prop_names, &item.values)?;
            let key = KeyUtils::edge_key(
                vid_len,
                part_id,
                &item.src,
                item.edge_type,
                item.rank,
                &item.dst,
            );
            let indexes = snapshot.edge_indexes(self.space_id, item.edge_type);
            let ident = RowIdentRef::Edge {
                src: &item.src,
                rank: item.rank,
                dst: &item.dst,
            };

            let old_raw = self.store.get(self.space_id, part_id, &key)?;
            let old_auth = match &old_raw {
                Some(bytes) => {
                    let (ver, _) = parse_row_version(bytes)?;
                    Some(snapshot.edge_schema_by_version(self.space_id, item.edge_type, ver)?)
                }
                None => None,
            };
            let new_reader = RowReader::new(&new_val, &schema)?;
            let ttl_anchor = ttl_anchor_of(&schema, &new_reader);
            match (&old_raw, &old_auth) {
                (Some(bytes), Some(auth)) => {
                    let old_reader = RowReader::new(bytes, auth)?;
                    append_index_ops(
                        &mut batch,
                        &self.index_states,
                        self.space_id,
                        part_id,
                        vid_len,
                        &ident,
                        indexes,
                        Some(&old_reader),
                        Some(&new_reader),
                        ttl_anchor,
                    )?;
                }
                _ => {
                    append_index_ops(
                        &mut batch,
                        &self.index_states,
                        self.space_id,
                        part_id,
                        vid_len,
                        &ident,
                        indexes,
                        None,
                        Some(&new_reader),
                        ttl_anchor,
                    )?;
                }
            }
            batch.put(key, new_val);
        }

        self.store
            .async_append_batch(self.space_id, part_id, batch)
            .await
    }
}
