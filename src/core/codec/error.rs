//! 编解码错误类型

use thiserror::Error;

/// 编解码结果类型
pub type Result<T> = std::result::Result<T, CodecError>;

/// 编解码错误
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    #[error("数据格式无效: {0}")]
    InvalidData(String),
    #[error("字段不存在: {0}")]
    FieldNotFound(String),
    #[error("类型不匹配: {0}")]
    TypeMismatch(String),
    #[error("数值超出范围: {0}")]
    OutOfRange(String),
    #[error("读取属性失败: {0}")]
    ReadPropFailed(String),
    #[error("默认值无效: {0}")]
    InvalidDefault(String),
    #[error("不支持的数据类型: {0}")]
    UnsupportedDataType(String),
}
