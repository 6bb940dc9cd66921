//! 存储层模块
//!
//! 嵌入式 KV 引擎边界、复制 KV 层边界、写批、内存锁、
//! 索引状态与数据修改处理器

pub mod batch;
pub mod engine;
pub mod index_state;
pub mod lock_manager;
pub mod mutate;
pub mod replicated;

pub use batch::{BatchHolder, BatchOp};
pub use engine::{Engine, MemoryEngine};
pub use index_state::{IndexCountGuard, IndexCountMap, IndexState, IndexStateOracle};
pub use lock_manager::{LockGuard, LockKey, MemoryLockTable};
pub use replicated::{MemoryReplicatedStore, ReplicatedStore};
