//! 数据修改模块
//!
//! 存储节点的写路径处理器：
//! - 顶点/边的读-改-写 UPDATE/UPSERT 执行器
//! - 插入与删除处理器
//! - 多分区请求分发器
//!
//! 单行内严格可串行化由内存锁保证；同一行的主数据与索引项
//! 始终在同一个原子批内生灭。

pub mod delete_processor;
pub mod dispatcher;
pub mod insert_processor;
pub mod plan;
pub mod update_executor;

pub use delete_processor::{DeleteEdgesProcessor, DeleteVerticesProcessor, EdgeKeyItem};
pub use dispatcher::UpdateDispatcher;
pub use insert_processor::{AddEdgesProcessor, AddVerticesProcessor, NewEdge, NewVertex};
pub use plan::{ExecState, ExecutorContext, Outcome, PlanNode, ResultStatus};
pub use update_executor::{execute_row, RowOutcome};

use async_trait::async_trait;

use crate::core::dataset::DataSet;
use crate::core::error::ErrorCode;
use crate::core::types::{EdgeType, HostAddr, PartitionId, SpaceId, TagId};

/// 隐式属性列名，过滤与 YIELD 表达式可引用
pub const PROP_VID: &str = "_vid";
pub const PROP_TAG: &str = "_tag";
pub const PROP_SRC: &str = "_src";
pub const PROP_TYPE: &str = "_type";
pub const PROP_RANK: &str = "_rank";
pub const PROP_DST: &str = "_dst";

/// 请求的目标模式：顶点标签或带符号的边类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTarget {
    Tag(TagId),
    Edge(EdgeType),
}

/// 行键
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    Vertex {
        vid: Vec<u8>,
    },
    Edge {
        src: Vec<u8>,
        edge_type: EdgeType,
        rank: i64,
        dst: Vec<u8>,
    },
}

/// 一条属性更新：属性名 + 编码后的新值表达式
#[derive(Debug, Clone)]
pub struct UpdatedProp {
    pub name: String,
    pub value: Vec<u8>,
}

impl UpdatedProp {
    pub fn new(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// 一行的更新项
#[derive(Debug, Clone)]
pub struct RowUpdate {
    pub part_id: PartitionId,
    pub key: RowKey,
    pub updated_props: Vec<UpdatedProp>,
    /// 编码后的过滤表达式
    pub condition: Option<Vec<u8>>,
    /// 编码后的 YIELD 表达式列表
    pub return_props: Vec<Vec<u8>>,
    /// UPSERT 语义：行不存在时是否走插入路径
    pub insertable: bool,
}

/// 更新请求，限定单个图空间，可跨多个分区
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub space_id: SpaceId,
    pub target: SchemaTarget,
    pub rows: Vec<RowUpdate>,
}

/// 分区结果
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    pub code: ErrorCode,
    pub part_id: PartitionId,
    /// LeaderChanged 时携带当前 leader
    pub leader: Option<HostAddr>,
}

/// 更新响应：分区结果向量 + 可选的 YIELD 结果集。
/// 部分成功是常态：有的分区成功，有的失败或重定向。
#[derive(Debug, Clone, Default)]
pub struct UpdateResponse {
    pub failed_parts: Vec<PartitionResult>,
    pub props: Option<DataSet>,
}

/// 跨分区事务管理器（仅边更新路径可选接入）
///
/// 闭包对调用方状态必须是纯的，返回写批或无批；
/// 两阶段协议由管理器在 src/dst 分区间完成。
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn update_edge_atomic(
        &self,
        vid_len: usize,
        space: SpaceId,
        part: PartitionId,
        edge_key: Vec<u8>,
        op: Box<dyn FnOnce() -> Outcome + Send>,
    ) -> ErrorCode;
}
