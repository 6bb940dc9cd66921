//! 编解码模块
//!
//! 键布局、索引键、操作日志键与行的二进制编解码。
//! 键布局是稳定的磁盘格式，改动即是格式破坏。

pub mod error;
pub mod index_key_utils;
pub mod key_utils;
pub mod operation_key_utils;
pub mod row_buffer;
pub mod row_reader;
pub mod row_writer;

pub use error::CodecError;
pub use index_key_utils::IndexKeyUtils;
pub use key_utils::KeyUtils;
pub use operation_key_utils::OperationKeyUtils;
pub use row_reader::{check_expired, parse_row_version, read_value, RowReader};
pub use row_writer::RowWriter;
