//! 索引键编码工具
//!
//! 索引键: index_marker(1) | part_id(3) | index_id(4) | 定宽字段值… | 主标识
//!
//! 字段值按索引定义自带的类型定宽编码，保证同一索引的键布局
//! 跨模式版本稳定；整数与浮点采用保序编码，字符串按声明的
//! 索引长度截断或补零。任一字段取不到值（空值）则不产生索引项。

use super::error::{CodecError, Result};
use super::key_utils::KeyUtils;
use super::row_reader::RowReader;
use crate::core::types::{IndexId, PartitionId};
use crate::core::value::Value;
use crate::schema::{FieldType, IndexItem};

pub struct IndexKeyUtils;

impl IndexKeyUtils {
    fn part_prefix(part_id: PartitionId, index_id: IndexId) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(8);
        prefix.extend_from_slice(&((part_id << 8) | KeyUtils::KEY_TYPE_INDEX).to_le_bytes());
        prefix.extend_from_slice(&index_id.to_le_bytes());
        prefix
    }

    /// 保序整数编码：符号位异或后大端写出
    fn encode_int(v: i64) -> [u8; 8] {
        ((v as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
    }

    /// 保序浮点编码：非负翻转符号位，负数全位取反
    fn encode_double(v: f64) -> [u8; 8] {
        let bits = v.to_bits();
        let ordered = if v >= 0.0 {
            bits ^ 0x8000_0000_0000_0000
        } else {
            !bits
        };
        ordered.to_be_bytes()
    }

    /// 单个字段值的定宽编码；空值返回 None
    pub fn encode_value(
        value: &Value,
        field_type: &FieldType,
        str_len: Option<usize>,
    ) -> Result<Option<Vec<u8>>> {
        if value.is_null() {
            return Ok(None);
        }
        let encoded = match (field_type, value) {
            (FieldType::Bool, Value::Bool(b)) => vec![*b as u8],
            (
                FieldType::Int8
                | FieldType::Int16
                | FieldType::Int32
                | FieldType::Int64
                | FieldType::Timestamp,
                Value::Int(i),
            ) => Self::encode_int(*i).to_vec(),
            (FieldType::Float | FieldType::Double, Value::Float(f)) => {
                Self::encode_double(*f).to_vec()
            }
            (FieldType::Float | FieldType::Double, Value::Int(i)) => {
                Self::encode_double(*i as f64).to_vec()
            }
            (FieldType::String | FieldType::FixedString(_), Value::String(s)) => {
                let len = match (str_len, field_type) {
                    (Some(n), _) => n,
                    (None, FieldType::FixedString(n)) => *n,
                    (None, _) => {
                        return Err(CodecError::UnsupportedDataType(
                            "变长字符串索引字段未声明长度".to_string(),
                        ))
                    }
                };
                let mut bytes = s.as_bytes().to_vec();
                bytes.resize(len, 0u8);
                bytes
            }
            _ => {
                return Err(CodecError::TypeMismatch(format!(
                    "索引字段类型 {:?} 与值 {:?} 不匹配",
                    field_type, value
                )))
            }
        };
        Ok(Some(encoded))
    }

    /// 从行读取器收集索引字段值并拼接
    ///
    /// 字段在行里缺失或为空值时返回 None，表示该行不产生索引项
    pub fn collect_index_values(
        reader: &RowReader<'_>,
        index: &IndexItem,
    ) -> Result<Option<Vec<u8>>> {
        let mut values = Vec::new();
        for field in &index.fields {
            let value = match reader.get_value(&field.name) {
                Ok(v) => v,
                Err(CodecError::FieldNotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            match Self::encode_value(&value, &field.field_type, field.str_len)? {
                Some(bytes) => values.extend(bytes),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    /// 顶点索引键
    pub fn vertex_index_key(
        vid_len: usize,
        part_id: PartitionId,
        index_id: IndexId,
        vid: &[u8],
        values: &[u8],
    ) -> Vec<u8> {
        let mut key = Self::part_prefix(part_id, index_id);
        key.extend_from_slice(values);
        key.extend_from_slice(vid);
        if vid.len() < vid_len {
            key.extend(std::iter::repeat(0u8).take(vid_len - vid.len()));
        }
        key
    }

    /// 边索引键，主标识为 src | rank | dst
    pub fn edge_index_key(
        vid_len: usize,
        part_id: PartitionId,
        index_id: IndexId,
        src: &[u8],
        rank: i64,
        dst: &[u8],
        values: &[u8],
    ) -> Vec<u8> {
        let mut key = Self::part_prefix(part_id, index_id);
        key.extend_from_slice(values);
        key.extend_from_slice(src);
        if src.len() < vid_len {
            key.extend(std::iter::repeat(0u8).take(vid_len - src.len()));
        }
        key.extend_from_slice(&KeyUtils::encode_rank(rank));
        key.extend_from_slice(dst);
        if dst.len() < vid_len {
            key.extend(std::iter::repeat(0u8).take(vid_len - dst.len()));
        }
        key
    }

    /// 某索引的全部索引项前缀
    pub fn index_prefix(part_id: PartitionId, index_id: IndexId) -> Vec<u8> {
        Self::part_prefix(part_id, index_id)
    }

    /// 索引项的值：无 TTL 为空，有 TTL 携带 8 字节锚点
    pub fn index_val(ttl_anchor: Option<i64>) -> Vec<u8> {
        match ttl_anchor {
            Some(ts) => ts.to_le_bytes().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn is_index_key(key: &[u8]) -> bool {
        key.len() >= 4 && key[0] as u32 == KeyUtils::KEY_TYPE_INDEX
    }
}
