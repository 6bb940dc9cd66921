//! 存储节点配置
//!
//! 所有运行参数均以构造参数方式传入，不读取环境变量

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 存储节点配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// 数据目录
    pub data_path: PathBuf,
    /// 同一复制组的对端地址列表
    pub peers: Vec<String>,
    /// 更新执行器的并发上限（分发器扇出宽度）
    pub update_concurrency: usize,
    /// 复制追加的超时时间（秒），0 表示不限
    pub append_timeout_secs: u64,
    /// 内存锁表分片数
    pub lock_shards: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/storage"),
            peers: Vec::new(),
            update_concurrency: 16,
            append_timeout_secs: 30,
            lock_shards: 16,
        }
    }
}
