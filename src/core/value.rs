//! 值类型系统
//!
//! 写路径上存储与求值共用的值类型。空值细分出坏数据来源，
//! 求值失败以坏空值表达而不是异常。

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Null 类型定义
///
/// - **Null**: 标准 null 值
/// - **BadData**: 坏数据（解析失败）
/// - **BadType**: 类型不匹配
/// - **ErrOverflow**: 数值溢出
/// - **UnknownProp**: 未知属性
/// - **DivByZero**: 除零错误
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Encode, Decode)]
pub enum NullType {
    Null,
    BadData,
    BadType,
    ErrOverflow,
    UnknownProp,
    DivByZero,
}

impl NullType {
    /// 是否为求值/解码错误产生的坏空值
    pub fn is_bad(&self) -> bool {
        !matches!(self, NullType::Null)
    }
}

/// 存储值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Encode, Decode)]
pub enum Value {
    Null(NullType),
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn null() -> Self {
        Value::Null(NullType::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// 是否为坏空值（类型错误、溢出等求值失败的产物）
    pub fn is_bad_null(&self) -> bool {
        matches!(self, Value::Null(t) if t.is_bad())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
