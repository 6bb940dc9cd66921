//! StarGraph Storage - 分布式属性图数据库的存储节点写路径
//!
//! 本 crate 实现单分区粒度的顶点/边写路径，包括：
//! - 读-改-写 UPDATE/UPSERT 处理器
//! - 模式目录视图与版本化行编解码
//! - 二级索引维护协议（普通 / 重建中 / 锁定）
//! - 行级内存锁与复制 KV 层的原子批量提交
//!
//! 共识/复制层、嵌入式 KV 引擎、RPC 传输作为外部协作方，
//! 仅以 trait 边界出现。

pub mod config;
pub mod core;
pub mod expression;
pub mod schema;
pub mod storage;

pub use crate::core::error::{ErrorCode, StorageError, StorageResult};
pub use crate::core::value::{NullType, Value};
