//! 存储层错误类型
//!
//! `StorageError` 在 crate 内部传播；`ErrorCode` 是对外可见的
//! 分区结果码，响应中按分区聚合

use thiserror::Error;

use crate::core::codec::CodecError;
use crate::core::types::{EdgeType, HostAddr, SpaceId, TagId};

/// 存储层结果类型
pub type StorageResult<T> = Result<T, StorageError>;

/// 对外可见的分区结果码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Succeeded,
    KeyNotFound,
    ConcurrentModify,
    LeaderChanged,
    FilteredOut,
    IllegalData,
    NoDefaultAndNotNullable,
    InvalidFieldValue,
    InvalidDefault,
    IndexLocked,
    IndexNotFound,
    TagNotFound,
    EdgeNotFound,
    KvError,
    Timeout,
}

impl ErrorCode {
    pub fn ok(&self) -> bool {
        matches!(self, ErrorCode::Succeeded)
    }
}

/// 存储层错误类型
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("目标行不存在")]
    KeyNotFound,
    #[error("行锁冲突: {0}")]
    ConcurrentModify(String),
    #[error("非 leader 节点，当前 leader: {0}")]
    LeaderChanged(HostAddr),
    #[error("过滤条件未通过")]
    Filtered,
    #[error("非法数据: {0}")]
    IllegalData(String),
    #[error("字段无默认值且不可为空: {0}")]
    NoDefaultAndNotNullable(String),
    #[error("字段值无效: {0}")]
    InvalidFieldValue(String),
    #[error("默认值无效: {0}")]
    InvalidDefault(String),
    #[error("索引已锁定，拒绝写入")]
    IndexLocked,
    #[error("索引不存在: {0}")]
    IndexNotFound(String),
    #[error("标签不存在: {0}")]
    TagNotFound(TagId),
    #[error("边类型不存在: {0}")]
    EdgeNotFound(EdgeType),
    #[error("图空间不存在: {0}")]
    SpaceNotFound(SpaceId),
    #[error("KV 引擎错误: {0}")]
    KvError(String),
    #[error("操作超时")]
    Timeout,
    #[error("参数无效: {0}")]
    InvalidArgument(String),
    #[error("编解码错误: {0}")]
    Codec(#[from] CodecError),
}

impl StorageError {
    /// 映射为对外分区结果码
    pub fn to_code(&self) -> ErrorCode {
        match self {
            StorageError::KeyNotFound => ErrorCode::KeyNotFound,
            StorageError::ConcurrentModify(_) => ErrorCode::ConcurrentModify,
            StorageError::LeaderChanged(_) => ErrorCode::LeaderChanged,
            StorageError::Filtered => ErrorCode::FilteredOut,
            StorageError::IllegalData(_) => ErrorCode::IllegalData,
            StorageError::NoDefaultAndNotNullable(_) => ErrorCode::NoDefaultAndNotNullable,
            StorageError::InvalidFieldValue(_) => ErrorCode::InvalidFieldValue,
            StorageError::InvalidDefault(_) => ErrorCode::InvalidDefault,
            StorageError::IndexLocked => ErrorCode::IndexLocked,
            StorageError::IndexNotFound(_) => ErrorCode::IndexNotFound,
            StorageError::TagNotFound(_) => ErrorCode::TagNotFound,
            StorageError::EdgeNotFound(_) => ErrorCode::EdgeNotFound,
            StorageError::SpaceNotFound(_) => ErrorCode::KvError,
            StorageError::KvError(_) => ErrorCode::KvError,
            StorageError::Timeout => ErrorCode::Timeout,
            StorageError::InvalidArgument(_) => ErrorCode::KvError,
            StorageError::Codec(e) => match e {
                CodecError::OutOfRange(_) | CodecError::TypeMismatch(_) => {
                    ErrorCode::InvalidFieldValue
                }
                CodecError::InvalidDefault(_) => ErrorCode::InvalidDefault,
                _ => ErrorCode::IllegalData,
            },
        }
    }

    /// 调用方可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::ConcurrentModify(_)
                | StorageError::LeaderChanged(_)
                | StorageError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            StorageError::KeyNotFound.to_code(),
            ErrorCode::KeyNotFound
        );
        assert_eq!(
            StorageError::ConcurrentModify("k".into()).to_code(),
            ErrorCode::ConcurrentModify
        );
        assert_eq!(StorageError::Filtered.to_code(), ErrorCode::FilteredOut);
        assert_eq!(
            StorageError::Codec(CodecError::OutOfRange("x".into())).to_code(),
            ErrorCode::InvalidFieldValue
        );
    }

    #[test]
    fn test_retryable() {
        assert!(StorageError::Timeout.is_retryable());
        assert!(!StorageError::KeyNotFound.is_retryable());
    }
}
