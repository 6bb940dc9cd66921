//! 嵌入式 KV 引擎边界
//!
//! 引擎是外部协作方，这里只定义 trait 边界与测试用的内存实现。
//! 批内同一键以最后一次操作为准，由引擎的应用顺序保证。

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::error::{StorageError, StorageResult};
use crate::storage::batch::BatchOp;

/// 前缀扫描迭代器
pub trait StorageIterator: Send {
    fn key(&self) -> Option<&[u8]>;
    fn value(&self) -> Option<&[u8]>;
    fn next(&mut self) -> bool;
}

pub struct VecIterator {
    data: Vec<(Vec<u8>, Vec<u8>)>,
    index: usize,
}

impl VecIterator {
    pub fn new(data: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { data, index: 0 }
    }
}

impl StorageIterator for VecIterator {
    fn key(&self) -> Option<&[u8]> {
        self.data.get(self.index).map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.data.get(self.index).map(|(_, v)| v.as_slice())
    }

    fn next(&mut self) -> bool {
        if self.index < self.data.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }
}

/// 嵌入式 KV 引擎
pub trait Engine: Send + Sync {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;
    fn remove(&mut self, key: &[u8]) -> StorageResult<()>;
    fn prefix(&self, prefix: &[u8]) -> StorageResult<Box<dyn StorageIterator>>;
    /// 原子应用一批操作
    fn commit_batch(&mut self, ops: Vec<BatchOp>) -> StorageResult<()>;
    /// 摄入外部 SST 文件
    fn ingest(&mut self, files: Vec<PathBuf>) -> StorageResult<()>;
    /// 生成命名快照
    fn create_checkpoint(&self, name: &str) -> StorageResult<()>;
    /// 设置底层 DB 选项，值校验从严
    fn set_db_option(&mut self, key: &str, value: &str) -> StorageResult<()>;
}

/// 内存引擎，用于测试与单机运行
#[derive(Default)]
pub struct MemoryEngine {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 可调整的数值型 DB 选项
const DB_OPTIONS: &[&str] = &[
    "max_write_buffer_number",
    "write_buffer_size",
    "max_background_jobs",
    "level0_file_num_compaction_trigger",
];

impl Engine for MemoryEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> StorageResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn prefix(&self, prefix: &[u8]) -> StorageResult<Box<dyn StorageIterator>> {
        let matched: Vec<_> = self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(VecIterator::new(matched)))
    }

    fn commit_batch(&mut self, ops: Vec<BatchOp>) -> StorageResult<()> {
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    self.data.insert(key, value);
                }
                BatchOp::Remove { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn ingest(&mut self, _files: Vec<PathBuf>) -> StorageResult<()> {
        Err(StorageError::KvError(
            "内存引擎不支持 SST 摄入".to_string(),
        ))
    }

    fn create_checkpoint(&self, _name: &str) -> StorageResult<()> {
        Err(StorageError::KvError(
            "内存引擎不支持快照".to_string(),
        ))
    }

    fn set_db_option(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if !DB_OPTIONS.contains(&key) {
            return Err(StorageError::InvalidArgument(format!(
                "未知 DB 选项: {}",
                key
            )));
        }
        // 从严校验：整串必须是合法整数，拒绝 "2_" 这类尾随垃圾
        value.parse::<i64>().map_err(|_| {
            StorageError::InvalidArgument(format!("选项 {} 的值无效: {}", key, value))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_last_op_wins() {
        let mut engine = MemoryEngine::new();
        engine
            .commit_batch(vec![
                BatchOp::Put {
                    key: b"k".to_vec(),
                    value: b"v1".to_vec(),
                },
                BatchOp::Remove { key: b"k".to_vec() },
                BatchOp::Put {
                    key: b"k".to_vec(),
                    value: b"v2".to_vec(),
                },
            ])
            .unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_prefix_scan() {
        let mut engine = MemoryEngine::new();
        engine.put(b"aa1".to_vec(), b"1".to_vec()).unwrap();
        engine.put(b"aa2".to_vec(), b"2".to_vec()).unwrap();
        engine.put(b"ab1".to_vec(), b"3".to_vec()).unwrap();

        let mut iter = engine.prefix(b"aa").unwrap();
        let mut keys = Vec::new();
        while let Some(k) = iter.key() {
            keys.push(k.to_vec());
            iter.next();
        }
        assert_eq!(keys, vec![b"aa1".to_vec(), b"aa2".to_vec()]);
    }

    #[test]
    fn test_set_db_option_strict() {
        let mut engine = MemoryEngine::new();
        assert!(engine.set_db_option("max_write_buffer_number", "2").is_ok());
        // 尾随垃圾被拒绝
        assert!(engine
            .set_db_option("max_write_buffer_number", "2_")
            .is_err());
        assert!(engine.set_db_option("unknown_option", "1").is_err());
    }
}
