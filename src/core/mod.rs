//! 核心类型模块
//!
//! 提供标识类型、值类型、错误类型与行/键编解码器

pub mod codec;
pub mod dataset;
pub mod error;
pub mod types;
pub mod value;

pub use dataset::DataSet;
pub use error::{ErrorCode, StorageError, StorageResult};
pub use types::{EdgeType, HostAddr, IndexId, PartitionId, SchemaVer, SpaceId, TagId};
pub use value::{NullType, Value};
