//! 行二进制解码器
//!
//! 用写入该行时的模式版本解码。版本号嵌在行头里，
//! 调用方先 [`parse_row_version`] 再到目录取对应版本。

use super::error::{CodecError, Result};
use super::row_buffer::version_len;
use crate::core::types::SchemaVer;
use crate::core::value::Value;
use crate::schema::{FieldDef, FieldType, Schema};

/// 解析行头，返回 (模式版本, 头长度)
pub fn parse_row_version(data: &[u8]) -> Result<(SchemaVer, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| CodecError::InvalidData("空行数据".to_string()))?;
    if first & 0xF8 != 0x08 {
        return Err(CodecError::InvalidData("行头标记错误".to_string()));
    }
    let ver_len = (first & 0x07) as usize;
    if data.len() < 1 + ver_len {
        return Err(CodecError::InvalidData("行头过短".to_string()));
    }
    let mut ver = [0u8; 8];
    ver[..ver_len].copy_from_slice(&data[1..1 + ver_len]);
    Ok((u64::from_le_bytes(ver), 1 + ver_len))
}

pub struct RowReader<'a> {
    data: &'a [u8],
    schema: &'a Schema,
    header_len: usize,
    data_start: usize,
}

impl<'a> RowReader<'a> {
    /// 构造读取器；模式必须是写入该行的版本
    pub fn new(data: &'a [u8], schema: &'a Schema) -> Result<Self> {
        let (ver, header_len) = parse_row_version(data)?;
        if ver != schema.version {
            return Err(CodecError::InvalidData(format!(
                "行版本 {} 与模式版本 {} 不一致",
                ver, schema.version
            )));
        }
        debug_assert_eq!(header_len, 1 + version_len(schema.version));
        let data_start = header_len + schema.null_bytes();
        if data.len() < data_start + schema.data_size() {
            return Err(CodecError::InvalidData("行数据过短".to_string()));
        }
        Ok(Self {
            data,
            schema,
            header_len,
            data_start,
        })
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn get_value(&self, name: &str) -> Result<Value> {
        let field = self
            .schema
            .field_by_name(name)
            .ok_or_else(|| CodecError::FieldNotFound(name.to_string()))?;
        self.decode_field(field)
    }

    fn is_null(&self, field: &FieldDef) -> bool {
        match field.null_flag_pos {
            Some(pos) => {
                let byte = self.data[self.header_len + (pos >> 3)];
                byte & (0x80 >> (pos & 0x07)) != 0
            }
            None => false,
        }
    }

    fn decode_field(&self, field: &FieldDef) -> Result<Value> {
        if self.is_null(field) {
            return Ok(Value::null());
        }
        let offset = self.data_start + field.offset;
        let value = match &field.field_type {
            FieldType::Bool => Value::Bool(self.data[offset] != 0),
            FieldType::Int8 => Value::Int(self.data[offset] as i8 as i64),
            FieldType::Int16 => {
                Value::Int(i16::from_le_bytes(self.data[offset..offset + 2].try_into().unwrap())
                    as i64)
            }
            FieldType::Int32 => {
                Value::Int(i32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
                    as i64)
            }
            FieldType::Int64 | FieldType::Timestamp => Value::Int(i64::from_le_bytes(
                self.data[offset..offset + 8].try_into().unwrap(),
            )),
            FieldType::Float => Value::Float(f32::from_le_bytes(
                self.data[offset..offset + 4].try_into().unwrap(),
            ) as f64),
            FieldType::Double => Value::Float(f64::from_le_bytes(
                self.data[offset..offset + 8].try_into().unwrap(),
            )),
            FieldType::String => {
                let str_offset =
                    u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap()) as usize;
                let str_len =
                    u32::from_le_bytes(self.data[offset + 4..offset + 8].try_into().unwrap())
                        as usize;
                if str_offset + str_len > self.data.len() {
                    return Err(CodecError::InvalidData(format!(
                        "字段 '{}' 字符串越界",
                        field.name
                    )));
                }
                let bytes = &self.data[str_offset..str_offset + str_len];
                Value::String(String::from_utf8(bytes.to_vec()).map_err(|_| {
                    CodecError::InvalidData(format!("字段 '{}' 不是合法 UTF-8", field.name))
                })?)
            }
            FieldType::FixedString(len) => {
                let raw = &self.data[offset..offset + len];
                let end = raw.iter().position(|b| *b == 0).unwrap_or(*len);
                Value::String(String::from_utf8(raw[..end].to_vec()).map_err(|_| {
                    CodecError::InvalidData(format!("字段 '{}' 不是合法 UTF-8", field.name))
                })?)
            }
        };
        Ok(value)
    }
}

/// 按最新模式读取一列
///
/// 优先级：行里存的值 > 最新模式的默认值（空上下文求值）> null。
/// 列缺失、不可空又无默认时返回 `ReadPropFailed`。
pub fn read_value(reader: Option<&RowReader<'_>>, name: &str, latest: &Schema) -> Result<Value> {
    if let Some(r) = reader {
        match r.get_value(name) {
            Ok(v) => return Ok(v),
            Err(CodecError::FieldNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    let field = latest
        .field_by_name(name)
        .ok_or_else(|| CodecError::FieldNotFound(name.to_string()))?;
    if let Some(value) = field.eval_default() {
        if value.is_bad_null() {
            return Err(CodecError::InvalidDefault(name.to_string()));
        }
        return Ok(value);
    }
    if field.nullable {
        return Ok(Value::null());
    }
    Err(CodecError::ReadPropFailed(name.to_string()))
}

/// TTL 过期判定；TTL 列缺失或非整数时视为未过期
pub fn check_expired(schema: &Schema, reader: &RowReader<'_>, now_secs: i64) -> bool {
    match &schema.ttl {
        Some(ttl) => match reader.get_value(&ttl.col) {
            Ok(Value::Int(ts)) => now_secs >= ts + ttl.duration_secs,
            _ => false,
        },
        None => false,
    }
}
