//! 内存锁表
//!
//! 行粒度的非阻塞互斥：顶点按 (space, part, tag, vid)，
//! 边按 (space, part, src, type, rank, dst)。锁在一次读-改-写
//! 期间持有，冲突立即失败，不排队不重试，由调用方决定是否重试。
//!
//! 锁表是写路径上唯一的进程级可变共享状态，按行标识哈希分片。
//! 守卫持有键本身，在 Drop 时释放，保证任何退出路径都解锁。

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::error::{StorageError, StorageResult};
use crate::core::types::{EdgeType, PartitionId, SpaceId, TagId};

/// 行锁标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Vertex {
        space: SpaceId,
        part: PartitionId,
        tag_id: TagId,
        vid: Vec<u8>,
    },
    Edge {
        space: SpaceId,
        part: PartitionId,
        src: Vec<u8>,
        edge_type: EdgeType,
        rank: i64,
        dst: Vec<u8>,
    },
}

/// 分片内存锁表
#[derive(Debug)]
pub struct MemoryLockTable {
    shards: Vec<Mutex<HashSet<LockKey>>>,
}

impl MemoryLockTable {
    pub fn new(num_shards: usize) -> Arc<Self> {
        let num_shards = num_shards.max(1);
        Arc::new(Self {
            shards: (0..num_shards).map(|_| Mutex::new(HashSet::new())).collect(),
        })
    }

    fn shard_of(&self, key: &LockKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// 尝试加锁；冲突立即返回 ConcurrentModify，错误里带冲突键
    pub fn try_lock(self: &Arc<Self>, key: LockKey) -> StorageResult<LockGuard> {
        let shard = &self.shards[self.shard_of(&key)];
        let mut locked = shard.lock();
        if locked.contains(&key) {
            return Err(StorageError::ConcurrentModify(format!("{:?}", key)));
        }
        locked.insert(key.clone());
        drop(locked);
        Ok(LockGuard {
            table: Arc::clone(self),
            key: Some(key),
        })
    }

    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.shards[self.shard_of(key)].lock().contains(key)
    }

    fn unlock(&self, key: &LockKey) {
        self.shards[self.shard_of(key)].lock().remove(key);
    }
}

/// 锁守卫，Drop 时释放
#[derive(Debug)]
pub struct LockGuard {
    table: Arc<MemoryLockTable>,
    key: Option<LockKey>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        self.key.as_ref().expect("守卫存活期间键存在")
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.table.unlock(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_key(vid: &[u8]) -> LockKey {
        LockKey::Vertex {
            space: 1,
            part: 1,
            tag_id: 100,
            vid: vid.to_vec(),
        }
    }

    #[test]
    fn test_lock_conflict() {
        let table = MemoryLockTable::new(16);
        let _guard = table.try_lock(vertex_key(b"v1")).unwrap();

        let err = table.try_lock(vertex_key(b"v1")).unwrap_err();
        match err {
            StorageError::ConcurrentModify(key) => assert!(key.contains("v1")),
            other => panic!("期望 ConcurrentModify，实际 {:?}", other),
        }
        // 不同行不冲突
        assert!(table.try_lock(vertex_key(b"v2")).is_ok());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let table = MemoryLockTable::new(16);
        {
            let _guard = table.try_lock(vertex_key(b"v1")).unwrap();
            assert!(table.is_locked(&vertex_key(b"v1")));
        }
        assert!(!table.is_locked(&vertex_key(b"v1")));
        assert!(table.try_lock(vertex_key(b"v1")).is_ok());
    }

    #[test]
    fn test_vertex_edge_keys_independent() {
        let table = MemoryLockTable::new(16);
        let _v = table.try_lock(vertex_key(b"v1")).unwrap();
        let edge = LockKey::Edge {
            space: 1,
            part: 1,
            src: b"v1".to_vec(),
            edge_type: 200,
            rank: 0,
            dst: b"v2".to_vec(),
        };
        assert!(table.try_lock(edge).is_ok());
    }
}
