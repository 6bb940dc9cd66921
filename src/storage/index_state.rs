//! 索引状态
//!
//! 每个 (space, part, index) 的生命周期状态，写入方按状态决定
//! 直接维护索引、落操作日志、还是拒绝写入。状态可能在两次写
//! 之间变化，但不会在一个原子批内变化。
//!
//! 另含分区级的重建静默计数：每个执行器在存活期间计数加一，
//! 后台重建器等计数归零即可确认没有在途写入。

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::types::{IndexId, PartitionId, SpaceId};

/// 索引生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// 正常：写入方直接 put/remove 索引项
    Normal,
    /// 重建中：写入方落操作日志，由重建子系统回放
    Rebuilding,
    /// 锁定：拒绝写入
    Locked,
}

/// 索引状态预言机
#[derive(Default)]
pub struct IndexStateOracle {
    states: DashMap<(SpaceId, PartitionId, IndexId), IndexState>,
}

impl IndexStateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询状态，未登记视为 Normal
    pub fn state(&self, space: SpaceId, part: PartitionId, index: IndexId) -> IndexState {
        self.states
            .get(&(space, part, index))
            .map(|s| *s)
            .unwrap_or(IndexState::Normal)
    }

    pub fn set_state(
        &self,
        space: SpaceId,
        part: PartitionId,
        index: IndexId,
        state: IndexState,
    ) {
        self.states.insert((space, part, index), state);
    }
}

/// 分区级写入计数
#[derive(Default)]
pub struct IndexCountMap {
    counts: DashMap<(SpaceId, PartitionId), Arc<AtomicUsize>>,
}

impl IndexCountMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入写路径，守卫存活期间计数加一
    pub fn enter(&self, space: SpaceId, part: PartitionId) -> IndexCountGuard {
        let counter = Arc::clone(
            self.counts
                .entry((space, part))
                .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
                .value(),
        );
        counter.fetch_add(1, Ordering::SeqCst);
        IndexCountGuard { counter }
    }

    /// 在途写入数，重建器以此判断是否静默
    pub fn active(&self, space: SpaceId, part: PartitionId) -> usize {
        self.counts
            .get(&(space, part))
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

pub struct IndexCountGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for IndexCountGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
