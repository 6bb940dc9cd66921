//! 表达式上下文
//!
//! 为写路径求值提供属性上下文：解码出的行属性加上隐式列

use std::collections::HashMap;

use crate::core::value::{NullType, Value};

/// 表达式上下文特征
///
/// 属性不存在或符号不匹配时返回坏空值，由调用方判定

pub trait ExpressionContext {
    fn get_prop(&self, sym: &str, prop: &str) -> Value;
}

/// 空上下文
///
/// 列默认值表达式在此上下文下求值，任何属性引用都是未知属性
pub struct NullContext;

impl ExpressionContext for NullContext {
    fn get_prop(&self, _sym: &str, _prop: &str) -> Value {
        Value::Null(NullType::UnknownProp)
    }
}

/// 行属性上下文
///
/// 同一符号（标签名或边类型名）下的属性映射。更新执行器在
/// 逐条应用 SET 时回写此上下文，使后面的更新能看到前面的赋值。
#[derive(Debug, Clone)]
pub struct PropContext {
    sym: String,
    props: HashMap<String, Value>,
}

impl PropContext {
    pub fn new(sym: impl Into<String>) -> Self {
        Self {
            sym: sym.into(),
            props: HashMap::new(),
        }
    }

    pub fn sym(&self) -> &str {
        &self.sym
    }

    pub fn set_prop(&mut self, name: impl Into<String>, value: Value) {
        self.props.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn props(&self) -> &HashMap<String, Value> {
        &self.props
    }
}

impl ExpressionContext for PropContext {
    fn get_prop(&self, sym: &str, prop: &str) -> Value {
        if sym != self.sym {
            return Value::Null(NullType::UnknownProp);
        }
        match self.props.get(prop) {
            Some(v) => v.clone(),
            None => Value::Null(NullType::UnknownProp),
        }
    }
}
