//! 行二进制缓冲区管理
//!
//! 行布局: 头字节(0x08 | 版本字节数) | 版本(小端) | null 位图 |
//! 定宽数据区 | 字符串堆
//!
//! 变长字符串在数据区存 4 字节绝对偏移 + 4 字节长度，内容追加在堆上

use crate::schema::Schema;

/// 版本号的最少编码字节数，版本 0 占 0 字节
pub(crate) fn version_len(ver: u64) -> usize {
    if ver == 0 {
        0
    } else {
        ((64 - ver.leading_zeros() as usize) + 7) / 8
    }
}

pub struct RowBuffer {
    buffer: Vec<u8>,
    header_len: usize,
    null_bytes: usize,
    data_start: usize,
}

impl RowBuffer {
    pub fn with_schema(schema: &Schema) -> Self {
        let ver = schema.version;
        let ver_len = version_len(ver);
        let null_bytes = schema.null_bytes();
        let header_len = 1 + ver_len;

        let mut buffer = Vec::with_capacity(header_len + null_bytes + schema.data_size() + 16);
        buffer.push(0x08 | ver_len as u8);
        buffer.extend_from_slice(&ver.to_le_bytes()[..ver_len]);
        buffer.resize(header_len + null_bytes + schema.data_size(), 0);

        Self {
            buffer,
            header_len,
            null_bytes,
            data_start: header_len + null_bytes,
        }
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn null_bytes(&self) -> usize {
        self.null_bytes
    }

    pub fn data_start(&self) -> usize {
        self.data_start
    }

    pub fn set_null_bit(&mut self, pos: usize) {
        let byte = self.header_len + (pos >> 3);
        self.buffer[byte] |= 0x80 >> (pos & 0x07);
    }

    pub fn clear_null_bit(&mut self, pos: usize) {
        let byte = self.header_len + (pos >> 3);
        self.buffer[byte] &= !(0x80 >> (pos & 0x07));
    }

    pub fn write_bool(&mut self, offset: usize, value: bool) {
        self.buffer[offset] = value as u8;
    }

    pub fn write_int8(&mut self, offset: usize, value: i8) {
        self.buffer[offset] = value as u8;
    }

    pub fn write_int16(&mut self, offset: usize, value: i16) {
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_int32(&mut self, offset: usize, value: i32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_int64(&mut self, offset: usize, value: i64) {
        self.buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_float(&mut self, offset: usize, value: f32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_double(&mut self, offset: usize, value: f64) {
        self.buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// 追加字符串内容到堆上，返回绝对偏移
    pub fn append_string_content(&mut self, content: &[u8]) -> usize {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(content);
        start
    }

    pub fn write_string_ref(&mut self, offset: usize, str_offset: u32, str_len: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&str_offset.to_le_bytes());
        self.buffer[offset + 4..offset + 8].copy_from_slice(&str_len.to_le_bytes());
    }

    pub fn write_fixed_string(&mut self, offset: usize, value: &str, len: usize) {
        let write_len = std::cmp::min(value.len(), len);
        self.buffer[offset..offset + write_len].copy_from_slice(&value.as_bytes()[..write_len]);
        if write_len < len {
            self.buffer[offset + write_len..offset + len].fill(0u8);
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}
