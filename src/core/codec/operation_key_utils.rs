//! 操作日志键编码工具
//!
//! 索引重建期间，写入方不直接改索引，而是落操作日志记录，
//! 由重建子系统回放。键布局是与重建子系统的稳定契约：
//!
//! 修改记录: op_marker(1) | part_id(3) | 0x01 | seq(8 大端) | 索引键
//! 删除记录: op_marker(1) | part_id(3) | 0x02 | seq(8 大端)
//!
//! 修改记录把新索引键嵌入操作键、值为索引项的值；
//! 删除记录的值是待删除的旧索引键。seq 单调递增保证回放有序。

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{CodecError, Result};
use super::key_utils::KeyUtils;
use crate::core::types::PartitionId;

static OPERATION_SEQ: AtomicU64 = AtomicU64::new(1);

const OP_TYPE_MODIFY: u8 = 0x01;
const OP_TYPE_DELETE: u8 = 0x02;

pub struct OperationKeyUtils;

impl OperationKeyUtils {
    fn prefix(part_id: PartitionId, op_type: u8) -> Vec<u8> {
        let mut key = Vec::with_capacity(13);
        key.extend_from_slice(&((part_id << 8) | KeyUtils::KEY_TYPE_OPERATION).to_le_bytes());
        key.push(op_type);
        key.extend_from_slice(&OPERATION_SEQ.fetch_add(1, Ordering::Relaxed).to_be_bytes());
        key
    }

    /// 修改操作日志键，嵌入目标索引键
    pub fn modify_operation_key(part_id: PartitionId, index_key: &[u8]) -> Vec<u8> {
        let mut key = Self::prefix(part_id, OP_TYPE_MODIFY);
        key.extend_from_slice(index_key);
        key
    }

    /// 删除操作日志键；待删除的索引键放在记录的值里
    pub fn delete_operation_key(part_id: PartitionId) -> Vec<u8> {
        Self::prefix(part_id, OP_TYPE_DELETE)
    }

    pub fn is_operation_key(key: &[u8]) -> bool {
        key.len() >= 13 && key[0] as u32 == KeyUtils::KEY_TYPE_OPERATION
    }

    pub fn is_modify_operation(key: &[u8]) -> bool {
        Self::is_operation_key(key) && key[4] == OP_TYPE_MODIFY
    }

    pub fn is_delete_operation(key: &[u8]) -> bool {
        Self::is_operation_key(key) && key[4] == OP_TYPE_DELETE
    }

    /// 从修改操作日志键里取出嵌入的索引键
    pub fn parse_modify_target(key: &[u8]) -> Result<&[u8]> {
        if !Self::is_modify_operation(key) {
            return Err(CodecError::InvalidData("不是修改操作日志键".to_string()));
        }
        Ok(&key[13..])
    }

    /// 某分区全部操作日志的前缀
    pub fn operation_prefix(part_id: PartitionId) -> Vec<u8> {
        ((part_id << 8) | KeyUtils::KEY_TYPE_OPERATION)
            .to_le_bytes()
            .to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_operation_key() {
        let index_key = vec![0x03, 0x01, 0x00, 0x00, 0xaa, 0xbb];
        let key = OperationKeyUtils::modify_operation_key(1, &index_key);

        assert!(OperationKeyUtils::is_modify_operation(&key));
        assert!(!OperationKeyUtils::is_delete_operation(&key));
        assert_eq!(OperationKeyUtils::parse_modify_target(&key).unwrap(), &index_key[..]);
    }

    #[test]
    fn test_delete_operation_key() {
        let key = OperationKeyUtils::delete_operation_key(1);
        assert!(OperationKeyUtils::is_delete_operation(&key));
        assert_eq!(key.len(), 13);
    }

    #[test]
    fn test_seq_monotonic() {
        let k1 = OperationKeyUtils::delete_operation_key(1);
        let k2 = OperationKeyUtils::delete_operation_key(1);
        // 同分区内 seq 大端编码，后写的键更大
        assert!(k2 > k1);
    }

    #[test]
    fn test_operation_prefix_covers() {
        let prefix = OperationKeyUtils::operation_prefix(1);
        let key = OperationKeyUtils::delete_operation_key(1);
        assert!(key.starts_with(&prefix));
    }
}
