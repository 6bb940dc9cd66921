//! 复制 KV 层边界
//!
//! 共识/复制层是外部协作方：假定提供"向分区 P 原子追加一个写批"
//! 原语与 leader 查询。写只在 leader 接受，非 leader 返回
//! LeaderChanged 并携带当前 leader 地址供调用方重定向。
//!
//! [`MemoryReplicatedStore`] 是测试实现：每个分区一个内存引擎，
//! 引擎互斥锁下整批应用，保证批的全有或全无；leader 可注入，
//! 用于模拟 leader 切换。

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::error::{StorageError, StorageResult};
use crate::core::types::{HostAddr, PartitionId, SpaceId};
use crate::storage::batch::BatchHolder;
use crate::storage::engine::{Engine, MemoryEngine};

/// 复制 KV 层
#[async_trait]
pub trait ReplicatedStore: Send + Sync {
    /// 原子追加一个写批；整批全有或全无
    async fn async_append_batch(
        &self,
        space: SpaceId,
        part: PartitionId,
        batch: BatchHolder,
    ) -> StorageResult<()>;

    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    fn prefix(
        &self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// 分区当前 leader
    fn part_leader(&self, space: SpaceId, part: PartitionId) -> StorageResult<HostAddr>;
}

struct PartState {
    engine: Mutex<MemoryEngine>,
    leader: Mutex<(HostAddr, bool)>,
}

/// 内存复制存储
pub struct MemoryReplicatedStore {
    local: HostAddr,
    parts: DashMap<(SpaceId, PartitionId), Arc<PartState>>,
}

impl MemoryReplicatedStore {
    pub fn new(local: HostAddr) -> Self {
        Self {
            local,
            parts: DashMap::new(),
        }
    }

    /// 注册分区，初始 leader 为本节点
    pub fn add_part(&self, space: SpaceId, part: PartitionId) {
        self.parts.insert(
            (space, part),
            Arc::new(PartState {
                engine: Mutex::new(MemoryEngine::new()),
                leader: Mutex::new((self.local.clone(), true)),
            }),
        );
    }

    /// 模拟 leader 切换到别的节点
    pub fn transfer_leader(&self, space: SpaceId, part: PartitionId, leader: HostAddr) {
        if let Some(state) = self.parts.get(&(space, part)) {
            *state.leader.lock() = (leader, false);
        }
    }

    /// leader 切回本节点
    pub fn claim_leader(&self, space: SpaceId, part: PartitionId) {
        if let Some(state) = self.parts.get(&(space, part)) {
            *state.leader.lock() = (self.local.clone(), true);
        }
    }

    fn part(&self, space: SpaceId, part: PartitionId) -> StorageResult<Arc<PartState>> {
        self.parts
            .get(&(space, part))
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| StorageError::KvError(format!("分区不存在: ({}, {})", space, part)))
    }
}

#[async_trait]
impl ReplicatedStore for MemoryReplicatedStore {
    async fn async_append_batch(
        &self,
        space: SpaceId,
        part: PartitionId,
        batch: BatchHolder,
    ) -> StorageResult<()> {
        let state = self.part(space, part)?;
        {
            let leader = state.leader.lock();
            if !leader.1 {
                return Err(StorageError::LeaderChanged(leader.0.clone()));
            }
        }
        let mut engine = state.engine.lock();
        engine.commit_batch(batch.into_ops())
    }

    fn get(&self, space: SpaceId, part: PartitionId, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let state = self.part(space, part)?;
        let engine = state.engine.lock();
        engine.get(key)
    }

    fn prefix(
        &self,
        space: SpaceId,
        part: PartitionId,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let state = self.part(space, part)?;
        let engine = state.engine.lock();
        let mut iter = engine.prefix(prefix)?;
        let mut result = Vec::new();
        while let (Some(k), Some(v)) = (iter.key(), iter.value()) {
            result.push((k.to_vec(), v.to_vec()));
            iter.next();
        }
        Ok(result)
    }

    fn part_leader(&self, space: SpaceId, part: PartitionId) -> StorageResult<HostAddr> {
        let state = self.part(space, part)?;
        let leader = state.leader.lock();
        Ok(leader.0.clone())
    }
}
