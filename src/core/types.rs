//! 标识类型定义
//!
//! 与存储层键布局直接对应的基础标识类型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 图空间 ID
pub type SpaceId = u32;

/// 分区 ID，占键前缀的 3 字节
pub type PartitionId = u32;

/// 标签 ID
pub type TagId = i32;

/// 边类型 ID，带符号：正为出边，负为入边
pub type EdgeType = i32;

/// 二级索引 ID
pub type IndexId = u32;

/// 模式版本号
pub type SchemaVer = u64;

/// 主机地址，LeaderChanged 重定向时携带
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
