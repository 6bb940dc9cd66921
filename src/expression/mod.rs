//! 表达式引擎
//!
//! 更新请求中的过滤条件、新值表达式与 YIELD 列均以编码后的
//! 表达式字节传输；本模块负责解码与在属性上下文中求值。
//! 求值是纯函数：类型错误产生坏空值而非异常。

pub mod context;

pub use context::{ExpressionContext, NullContext, PropContext};

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::core::value::{NullType, Value};

/// 表达式错误
#[derive(Error, Debug, Clone)]
pub enum ExpressionError {
    #[error("表达式解码失败: {0}")]
    DecodeFailed(String),
}

/// 一元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// 表达式树
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum Expression {
    /// 常量
    Constant(Value),
    /// 属性引用，如 person.age
    Prop { sym: String, prop: String },
    /// 一元运算
    Unary(UnaryOp, Box<Expression>),
    /// 二元运算
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    /// 构造属性引用
    pub fn prop(sym: impl Into<String>, prop: impl Into<String>) -> Self {
        Expression::Prop {
            sym: sym.into(),
            prop: prop.into(),
        }
    }

    /// 构造常量
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    /// 从字节解码表达式
    pub fn decode(bytes: &[u8]) -> Result<Expression, ExpressionError> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .map(|(expr, _)| expr)
            .map_err(|e| ExpressionError::DecodeFailed(e.to_string()))
    }

    /// 编码为字节
    pub fn encode(&self) -> Vec<u8> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .expect("表达式编码不应失败")
    }

    /// 在上下文中求值
    pub fn eval(&self, ctx: &dyn ExpressionContext) -> Value {
        match self {
            Expression::Constant(v) => v.clone(),
            Expression::Prop { sym, prop } => ctx.get_prop(sym, prop),
            Expression::Unary(op, expr) => eval_unary(*op, expr.eval(ctx)),
            Expression::Binary(op, lhs, rhs) => {
                eval_binary(*op, lhs.eval(ctx), rhs.eval(ctx))
            }
        }
    }
}

fn eval_unary(op: UnaryOp, v: Value) -> Value {
    if let Value::Null(t) = v {
        return Value::Null(t);
    }
    match op {
        UnaryOp::Not => match v {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::Null(NullType::BadType),
        },
        UnaryOp::Neg => match v {
            Value::Int(i) => match i.checked_neg() {
                Some(n) => Value::Int(n),
                None => Value::Null(NullType::ErrOverflow),
            },
            Value::Float(f) => Value::Float(-f),
            _ => Value::Null(NullType::BadType),
        },
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    // 空值传播，左侧优先
    if let Value::Null(t) = lhs {
        return Value::Null(t);
    }
    if let Value::Null(t) = rhs {
        return Value::Null(t);
    }
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match a.checked_add(b) {
                Some(v) => Value::Int(v),
                None => Value::Null(NullType::ErrOverflow),
            },
            (Value::String(a), Value::String(b)) => Value::String(a + &b),
            (a, b) => numeric_op(a, b, |x, y| x + y),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match a.checked_sub(b) {
                Some(v) => Value::Int(v),
                None => Value::Null(NullType::ErrOverflow),
            },
            (a, b) => numeric_op(a, b, |x, y| x - y),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match a.checked_mul(b) {
                Some(v) => Value::Int(v),
                None => Value::Null(NullType::ErrOverflow),
            },
            (a, b) => numeric_op(a, b, |x, y| x * y),
        },
        BinaryOp::Div => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Value::Null(NullType::DivByZero),
            (Value::Int(a), Value::Int(b)) => match a.checked_div(b) {
                Some(v) => Value::Int(v),
                None => Value::Null(NullType::ErrOverflow),
            },
            (a, b) => match as_float(&b) {
                Some(f) if f == 0.0 => Value::Null(NullType::DivByZero),
                _ => numeric_op(a, b, |x, y| x / y),
            },
        },
        BinaryOp::Mod => match (lhs, rhs) {
            (Value::Int(_), Value::Int(0)) => Value::Null(NullType::DivByZero),
            (Value::Int(a), Value::Int(b)) => match a.checked_rem(b) {
                Some(v) => Value::Int(v),
                None => Value::Null(NullType::ErrOverflow),
            },
            _ => Value::Null(NullType::BadType),
        },
        BinaryOp::Eq => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o == std::cmp::Ordering::Equal)
        }),
        BinaryOp::Ne => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o != std::cmp::Ordering::Equal)
        }),
        BinaryOp::Lt => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o == std::cmp::Ordering::Less)
        }),
        BinaryOp::Le => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o != std::cmp::Ordering::Greater)
        }),
        BinaryOp::Gt => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o == std::cmp::Ordering::Greater)
        }),
        BinaryOp::Ge => compare(lhs, rhs).map_or(Value::Null(NullType::BadType), |o| {
            Value::Bool(o != std::cmp::Ordering::Less)
        }),
        BinaryOp::And => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a && b),
            _ => Value::Null(NullType::BadType),
        },
        BinaryOp::Or => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a || b),
            _ => Value::Null(NullType::BadType),
        },
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn numeric_op(lhs: Value, rhs: Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (as_float(&lhs), as_float(&rhs)) {
        (Some(a), Some(b)) => Value::Float(f(a, b)),
        _ => Value::Null(NullType::BadType),
    }
}

fn compare(lhs: Value, rhs: Value) -> Option<std::cmp::Ordering> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => match (as_float(&lhs), as_float(&rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let expr = Expression::Binary(
            BinaryOp::Add,
            Box::new(Expression::prop("person", "age")),
            Box::new(Expression::constant(1i64)),
        );
        let bytes = expr.encode();
        let decoded = Expression::decode(&bytes).unwrap();
        assert_eq!(decoded, expr);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(Expression::decode(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_eval_prop_arithmetic() {
        let mut ctx = PropContext::new("person");
        ctx.set_prop("age", Value::Int(30));

        let expr = Expression::Binary(
            BinaryOp::Add,
            Box::new(Expression::prop("person", "age")),
            Box::new(Expression::constant(1i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Int(31));
    }

    #[test]
    fn test_eval_filter_comparison() {
        let mut ctx = PropContext::new("person");
        ctx.set_prop("age", Value::Int(30));

        let expr = Expression::Binary(
            BinaryOp::Gt,
            Box::new(Expression::prop("person", "age")),
            Box::new(Expression::constant(100i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Bool(false));
    }

    #[test]
    fn test_type_error_yields_bad_null() {
        let ctx = PropContext::new("person");
        // 布尔与整数相加
        let expr = Expression::Binary(
            BinaryOp::Add,
            Box::new(Expression::constant(true)),
            Box::new(Expression::constant(1i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Null(NullType::BadType));

        // 未知属性传播
        let expr = Expression::Binary(
            BinaryOp::Add,
            Box::new(Expression::prop("person", "missing")),
            Box::new(Expression::constant(1i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Null(NullType::UnknownProp));
    }

    #[test]
    fn test_div_by_zero() {
        let ctx = NullContext;
        let expr = Expression::Binary(
            BinaryOp::Div,
            Box::new(Expression::constant(1i64)),
            Box::new(Expression::constant(0i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Null(NullType::DivByZero));
    }

    #[test]
    fn test_overflow() {
        let ctx = NullContext;
        let expr = Expression::Binary(
            BinaryOp::Add,
            Box::new(Expression::constant(i64::MAX)),
            Box::new(Expression::constant(1i64)),
        );
        assert_eq!(expr.eval(&ctx), Value::Null(NullType::ErrOverflow));
    }
}
