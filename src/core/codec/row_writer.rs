//! 行二进制编码器
//!
//! 以最新版模式编码一行。`set_value` 可按任意顺序调用，
//! `finish` 时补齐默认值与空值并做完整性检查：
//! 必填字段已设置、值类型与声明匹配（允许数值提升）、
//! 声明了 TTL 时 TTL 列已有值。

use super::error::{CodecError, Result};
use super::row_buffer::RowBuffer;
use crate::core::value::Value;
use crate::expression::NullContext;
use crate::schema::{FieldType, Schema};

pub struct RowWriter<'a> {
    schema: &'a Schema,
    buffer: RowBuffer,
    is_set: Vec<bool>,
    is_null: Vec<bool>,
}

impl<'a> RowWriter<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        let buffer = RowBuffer::with_schema(schema);
        let num_fields = schema.num_fields();
        Self {
            schema,
            buffer,
            is_set: vec![false; num_fields],
            is_null: vec![false; num_fields],
        }
    }

    pub fn set_value(&mut self, name: &str, value: &Value) -> Result<()> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| CodecError::FieldNotFound(name.to_string()))?;
        self.set_value_at(index, value)
    }

    pub fn set_null(&mut self, name: &str) -> Result<()> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| CodecError::FieldNotFound(name.to_string()))?;
        self.set_null_at(index)
    }

    fn set_null_at(&mut self, index: usize) -> Result<()> {
        let schema = self.schema;
        let field = schema
            .field(index)
            .ok_or_else(|| CodecError::FieldNotFound(format!("字段 #{}", index)))?;
        if !field.nullable {
            return Err(CodecError::TypeMismatch(format!(
                "字段 '{}' 不可为空",
                field.name
            )));
        }
        let pos = field.null_flag_pos.expect("可空字段必有 null 位");
        self.buffer.set_null_bit(pos);
        self.is_set[index] = true;
        self.is_null[index] = true;
        Ok(())
    }

    fn set_value_at(&mut self, index: usize, value: &Value) -> Result<()> {
        if value.is_null() {
            if value.is_bad_null() {
                return Err(CodecError::TypeMismatch(format!("坏空值: {:?}", value)));
            }
            return self.set_null_at(index);
        }

        let schema = self.schema;
        let field = schema
            .field(index)
            .ok_or_else(|| CodecError::FieldNotFound(format!("字段 #{}", index)))?;
        let offset = self.buffer.data_start() + field.offset;
        let name = &field.name;

        match (&field.field_type, value) {
            (FieldType::Bool, Value::Bool(b)) => self.buffer.write_bool(offset, *b),
            (FieldType::Int8, Value::Int(i)) => {
                let v = i8::try_from(*i)
                    .map_err(|_| CodecError::OutOfRange(format!("字段 '{}' 值 {}", name, i)))?;
                self.buffer.write_int8(offset, v);
            }
            (FieldType::Int16, Value::Int(i)) => {
                let v = i16::try_from(*i)
                    .map_err(|_| CodecError::OutOfRange(format!("字段 '{}' 值 {}", name, i)))?;
                self.buffer.write_int16(offset, v);
            }
            (FieldType::Int32, Value::Int(i)) => {
                let v = i32::try_from(*i)
                    .map_err(|_| CodecError::OutOfRange(format!("字段 '{}' 值 {}", name, i)))?;
                self.buffer.write_int32(offset, v);
            }
            (FieldType::Int64 | FieldType::Timestamp, Value::Int(i)) => {
                self.buffer.write_int64(offset, *i);
            }
            (FieldType::Float, Value::Float(f)) => {
                if f.is_finite() && f.abs() > f32::MAX as f64 {
                    return Err(CodecError::OutOfRange(format!("字段 '{}' 值 {}", name, f)));
                }
                self.buffer.write_float(offset, *f as f32);
            }
            (FieldType::Float, Value::Int(i)) => {
                self.buffer.write_float(offset, *i as f32);
            }
            (FieldType::Double, Value::Float(f)) => self.buffer.write_double(offset, *f),
            (FieldType::Double, Value::Int(i)) => self.buffer.write_double(offset, *i as f64),
            (FieldType::String, Value::String(s)) => {
                let str_offset = self.buffer.append_string_content(s.as_bytes()) as u32;
                self.buffer
                    .write_string_ref(offset, str_offset, s.len() as u32);
            }
            (FieldType::FixedString(len), Value::String(s)) => {
                let len = *len;
                self.buffer.write_fixed_string(offset, s, len);
            }
            _ => {
                return Err(CodecError::TypeMismatch(format!(
                    "字段 '{}' 声明为 {:?}，值为 {:?}",
                    name, field.field_type, value
                )));
            }
        }

        if let Some(pos) = field.null_flag_pos {
            self.buffer.clear_null_bit(pos);
        }
        self.is_set[index] = true;
        self.is_null[index] = false;
        Ok(())
    }

    /// 补齐未设置字段并产出编码字节
    pub fn finish(mut self) -> Result<Vec<u8>> {
        for index in 0..self.schema.num_fields() {
            if self.is_set[index] {
                continue;
            }
            let field = self.schema.field(index).expect("字段序号有效");
            let name = field.name.clone();
            let nullable = field.nullable;
            let default = field.default.clone();

            if let Some(expr) = default {
                let value = expr.eval(&NullContext);
                if value.is_bad_null() {
                    return Err(CodecError::InvalidDefault(name));
                }
                self.set_value_at(index, &value)
                    .map_err(|_| CodecError::InvalidDefault(name.clone()))?;
            } else if nullable {
                self.set_null_at(index)?;
            } else {
                return Err(CodecError::TypeMismatch(format!(
                    "必填字段 '{}' 未设置且无默认值",
                    name
                )));
            }
        }

        if let Some(ttl) = &self.schema.ttl {
            let index = self.schema.field_index(&ttl.col).ok_or_else(|| {
                CodecError::TypeMismatch(format!("TTL 列 '{}' 不在模式中", ttl.col))
            })?;
            if self.is_null[index] {
                return Err(CodecError::TypeMismatch(format!(
                    "TTL 列 '{}' 未设置",
                    ttl.col
                )));
            }
        }

        Ok(self.buffer.into_inner())
    }
}
