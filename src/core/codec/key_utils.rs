//! 键编码工具
//!
//! 顶点键: tag_marker(1) | part_id(3) | vid(vid_len) | tag_id(4)
//! 边键:   edge_marker(1) | part_id(3) | src(vid_len) | edge_type(4) |
//!         rank(8, 大端符号偏置) | dst(vid_len) | 占位(1)
//!
//! 前 4 字节以 (part_id << 8) | 类型标记 的小端 u32 写出，
//! 因此标记占第 0 字节、分区号占第 1..4 字节，
//! 保证 part_id 先于变长尾部出现，前缀扫描才能按分区收敛。

use super::error::{CodecError, Result};
use crate::core::types::{EdgeType, PartitionId, TagId};

pub struct KeyUtils;

impl KeyUtils {
    pub const KEY_TYPE_TAG: u32 = 0x00000001;
    pub const KEY_TYPE_EDGE: u32 = 0x00000002;
    pub const KEY_TYPE_INDEX: u32 = 0x00000003;
    pub const KEY_TYPE_SYSTEM: u32 = 0x00000004;
    pub const KEY_TYPE_OPERATION: u32 = 0x00000005;

    /// 边键末尾的占位字节
    const EDGE_PLACEHOLDER: u8 = 0x01;

    fn part_prefix(part_id: PartitionId, key_type: u32) -> [u8; 4] {
        ((part_id << 8) | key_type).to_le_bytes()
    }

    fn pad_vid(key: &mut Vec<u8>, vid: &[u8], vid_len: usize) {
        key.extend_from_slice(vid);
        if vid.len() < vid_len {
            key.extend(std::iter::repeat(0u8).take(vid_len - vid.len()));
        }
    }

    /// rank 编码：符号位异或后大端写出，字典序即数值序
    pub fn encode_rank(rank: i64) -> [u8; 8] {
        ((rank as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
    }

    pub fn decode_rank(bytes: &[u8]) -> Result<i64> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidData("rank 字节长度错误".to_string()))?;
        Ok((u64::from_be_bytes(raw) ^ 0x8000_0000_0000_0000) as i64)
    }

    /// 顶点行键
    pub fn vertex_key(vid_len: usize, part_id: PartitionId, vid: &[u8], tag_id: TagId) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + vid_len + 4);
        key.extend_from_slice(&Self::part_prefix(part_id, Self::KEY_TYPE_TAG));
        Self::pad_vid(&mut key, vid, vid_len);
        key.extend_from_slice(&tag_id.to_le_bytes());
        key
    }

    /// 边行键
    pub fn edge_key(
        vid_len: usize,
        part_id: PartitionId,
        src: &[u8],
        edge_type: EdgeType,
        rank: i64,
        dst: &[u8],
    ) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + vid_len + 4 + 8 + vid_len + 1);
        key.extend_from_slice(&Self::part_prefix(part_id, Self::KEY_TYPE_EDGE));
        Self::pad_vid(&mut key, src, vid_len);
        key.extend_from_slice(&edge_type.to_le_bytes());
        key.extend_from_slice(&Self::encode_rank(rank));
        Self::pad_vid(&mut key, dst, vid_len);
        key.push(Self::EDGE_PLACEHOLDER);
        key
    }

    /// 某分区全部顶点行的前缀
    pub fn vertex_prefix(part_id: PartitionId) -> Vec<u8> {
        Self::part_prefix(part_id, Self::KEY_TYPE_TAG).to_vec()
    }

    /// 某顶点全部标签行的前缀
    pub fn vertex_tags_prefix(vid_len: usize, part_id: PartitionId, vid: &[u8]) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(4 + vid_len);
        prefix.extend_from_slice(&Self::part_prefix(part_id, Self::KEY_TYPE_TAG));
        Self::pad_vid(&mut prefix, vid, vid_len);
        prefix
    }

    /// 某源点全部出/入边的前缀
    pub fn edge_prefix(vid_len: usize, part_id: PartitionId, src: &[u8]) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(4 + vid_len);
        prefix.extend_from_slice(&Self::part_prefix(part_id, Self::KEY_TYPE_EDGE));
        Self::pad_vid(&mut prefix, src, vid_len);
        prefix
    }

    pub fn parse_vertex_key(key: &[u8], vid_len: usize) -> Result<(PartitionId, Vec<u8>, TagId)> {
        if key.len() != 4 + vid_len + 4 {
            return Err(CodecError::InvalidData("顶点键长度错误".to_string()));
        }
        let item = u32::from_le_bytes(key[0..4].try_into().unwrap());
        if item & 0xFF != Self::KEY_TYPE_TAG {
            return Err(CodecError::InvalidData("不是顶点键".to_string()));
        }
        let vid = key[4..4 + vid_len].to_vec();
        let tag_id = i32::from_le_bytes(key[4 + vid_len..].try_into().unwrap());
        Ok((item >> 8, vid, tag_id))
    }

    pub fn parse_edge_key(
        key: &[u8],
        vid_len: usize,
    ) -> Result<(PartitionId, Vec<u8>, EdgeType, i64, Vec<u8>)> {
        if key.len() != 4 + vid_len + 4 + 8 + vid_len + 1 {
            return Err(CodecError::InvalidData("边键长度错误".to_string()));
        }
        let item = u32::from_le_bytes(key[0..4].try_into().unwrap());
        if item & 0xFF != Self::KEY_TYPE_EDGE {
            return Err(CodecError::InvalidData("不是边键".to_string()));
        }
        let src = key[4..4 + vid_len].to_vec();
        let type_off = 4 + vid_len;
        let edge_type = i32::from_le_bytes(key[type_off..type_off + 4].try_into().unwrap());
        let rank_off = type_off + 4;
        let rank = Self::decode_rank(&key[rank_off..rank_off + 8])?;
        let dst_off = rank_off + 8;
        let dst = key[dst_off..dst_off + vid_len].to_vec();
        Ok((item >> 8, src, edge_type, rank, dst))
    }

    pub fn is_vertex_key(key: &[u8]) -> bool {
        key.len() >= 4 && key[0] as u32 == Self::KEY_TYPE_TAG
    }

    pub fn is_edge_key(key: &[u8]) -> bool {
        key.len() >= 4 && key[0] as u32 == Self::KEY_TYPE_EDGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_key_layout() {
        let key = KeyUtils::vertex_key(8, 3, b"v1", 100);
        assert_eq!(key.len(), 4 + 8 + 4);
        // 第 0 字节是标记，1..4 是分区号
        assert_eq!(key[0], 0x01);
        assert_eq!(key[1], 0x03);
        assert_eq!(key[2], 0x00);
        assert_eq!(key[3], 0x00);

        let (part, vid, tag_id) = KeyUtils::parse_vertex_key(&key, 8).unwrap();
        assert_eq!(part, 3);
        assert_eq!(&vid[..2], b"v1");
        assert_eq!(&vid[2..], &[0u8; 6]);
        assert_eq!(tag_id, 100);
    }

    #[test]
    fn test_edge_key_roundtrip() {
        let key = KeyUtils::edge_key(8, 7, b"src", -200, -5, b"dst");
        assert_eq!(key.len(), 4 + 8 + 4 + 8 + 8 + 1);
        assert!(KeyUtils::is_edge_key(&key));
        assert!(!KeyUtils::is_vertex_key(&key));

        let (part, src, edge_type, rank, dst) = KeyUtils::parse_edge_key(&key, 8).unwrap();
        assert_eq!(part, 7);
        assert_eq!(&src[..3], b"src");
        assert_eq!(edge_type, -200);
        assert_eq!(rank, -5);
        assert_eq!(&dst[..3], b"dst");
    }

    #[test]
    fn test_rank_order_preserving() {
        let ranks = [i64::MIN, -100, -1, 0, 1, 100, i64::MAX];
        let encoded: Vec<_> = ranks.iter().map(|r| KeyUtils::encode_rank(*r)).collect();
        for window in encoded.windows(2) {
            assert!(window[0] < window[1]);
        }
        for (r, e) in ranks.iter().zip(&encoded) {
            assert_eq!(KeyUtils::decode_rank(e).unwrap(), *r);
        }
    }

    #[test]
    fn test_prefix_covers_key() {
        let prefix = KeyUtils::vertex_tags_prefix(8, 3, b"v1");
        let key = KeyUtils::vertex_key(8, 3, b"v1", 100);
        assert!(key.starts_with(&prefix));

        let other_part = KeyUtils::vertex_key(8, 4, b"v1", 100);
        assert!(!other_part.starts_with(&prefix));
    }
}
