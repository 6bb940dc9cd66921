//! 模式目录视图
//!
//! 解析 (space, tag/edge type) 到当前模式与名称，提供版本化读取。
//! 目录以整体快照方式原子刷新：meta 推送到达时替换整个快照，
//! 执行器在一次调用内只使用同一份快照。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::{StorageError, StorageResult};
use crate::core::types::{EdgeType, IndexId, SchemaVer, SpaceId, TagId};
use crate::core::value::Value;
use crate::expression::{Expression, NullContext};

/// 字段类型
///
/// 行编码中每种类型的定长区宽度是固定的
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// 布尔，1 字节
    Bool,
    /// 8 位整数
    Int8,
    /// 16 位整数
    Int16,
    /// 32 位整数
    Int32,
    /// 64 位整数
    Int64,
    /// 单精度浮点，4 字节
    Float,
    /// 双精度浮点，8 字节
    Double,
    /// 变长字符串：8 字节（4 字节偏移 + 4 字节长度）
    String,
    /// 定长字符串
    FixedString(usize),
    /// 秒级 Unix 时间戳，8 字节
    Timestamp,
}

impl FieldType {
    /// 定长区宽度
    pub fn fixed_width(&self) -> usize {
        match self {
            FieldType::Bool | FieldType::Int8 => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 | FieldType::Float => 4,
            FieldType::Int64 | FieldType::Double | FieldType::String | FieldType::Timestamp => 8,
            FieldType::FixedString(n) => *n,
        }
    }
}

/// 字段定义
///
/// offset 与 null_flag_pos 由 [`Schema::build`] 计算，构造时无需填写
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// 默认值表达式，在空上下文下求值
    pub default: Option<Expression>,
    pub offset: usize,
    pub null_flag_pos: Option<usize>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            default: None,
            offset: 0,
            null_flag_pos: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default_value(mut self, expr: Expression) -> Self {
        self.default = Some(expr);
        self
    }

    /// 在空上下文下求出默认值；无默认返回 None
    pub fn eval_default(&self) -> Option<Value> {
        self.default.as_ref().map(|e| e.eval(&NullContext))
    }
}

/// TTL 定义：列 + 时长
#[derive(Debug, Clone, PartialEq)]
pub struct Ttl {
    pub col: String,
    pub duration_secs: i64,
}

/// 标签/边类型模式
///
/// 同一 id 下多版本并存；最新版本用于编码新行，旧版本保持可解码
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub version: SchemaVer,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    pub ttl: Option<Ttl>,
    data_size: usize,
    num_nullable: usize,
}

impl Schema {
    /// 构建模式并计算字段布局
    pub fn build(
        name: impl Into<String>,
        version: SchemaVer,
        mut fields: Vec<FieldDef>,
        ttl: Option<Ttl>,
    ) -> Self {
        let mut offset = 0usize;
        let mut null_pos = 0usize;
        let mut index = HashMap::new();
        for (i, field) in fields.iter_mut().enumerate() {
            field.offset = offset;
            offset += field.field_type.fixed_width();
            if field.nullable {
                field.null_flag_pos = Some(null_pos);
                null_pos += 1;
            }
            index.insert(field.name.clone(), i);
        }
        Self {
            name: name.into(),
            version,
            fields,
            index,
            ttl,
            data_size: offset,
            num_nullable: null_pos,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, i: usize) -> Option<&FieldDef> {
        self.fields.get(i)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.field_index(name).and_then(|i| self.field(i))
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// 定长数据区大小
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn num_nullable_fields(&self) -> usize {
        self.num_nullable
    }

    /// null 位图字节数
    pub fn null_bytes(&self) -> usize {
        if self.num_nullable > 0 {
            ((self.num_nullable - 1) >> 3) + 1
        } else {
            0
        }
    }
}

/// 索引字段
///
/// 索引内的编码类型与宽度由索引定义自带，跨模式版本保持稳定；
/// 字符串字段必须声明索引长度
#[derive(Debug, Clone)]
pub struct IndexField {
    pub name: String,
    pub field_type: FieldType,
    pub str_len: Option<usize>,
}

impl IndexField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            str_len: None,
        }
    }

    pub fn str_len(mut self, len: usize) -> Self {
        self.str_len = Some(len);
        self
    }
}

/// 二级索引定义
///
/// schema_id：顶点索引为 tag id，边索引为正的 edge type
#[derive(Debug, Clone)]
pub struct IndexItem {
    pub index_id: IndexId,
    pub name: String,
    pub schema_id: i32,
    pub fields: Vec<IndexField>,
}

/// 图空间信息
#[derive(Debug, Clone)]
pub struct SpaceInfo {
    pub space_id: SpaceId,
    pub name: String,
    /// 顶点 ID 定长字节数，空间内统一，创建后不可变
    pub vid_len: usize,
}

/// 模式快照
///
/// 一次 meta 推送产生的完整只读视图
#[derive(Debug, Default)]
pub struct SchemaSnapshot {
    spaces: HashMap<SpaceId, SpaceInfo>,
    tag_schemas: HashMap<(SpaceId, TagId), Vec<Arc<Schema>>>,
    edge_schemas: HashMap<(SpaceId, EdgeType), Vec<Arc<Schema>>>,
    tag_indexes: HashMap<(SpaceId, TagId), Vec<Arc<IndexItem>>>,
    edge_indexes: HashMap<(SpaceId, EdgeType), Vec<Arc<IndexItem>>>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_space(&mut self, info: SpaceInfo) {
        self.spaces.insert(info.space_id, info);
    }

    /// 注册标签模式版本，按版本升序追加
    pub fn add_tag_schema(&mut self, space: SpaceId, tag_id: TagId, schema: Schema) {
        self.tag_schemas
            .entry((space, tag_id))
            .or_default()
            .push(Arc::new(schema));
    }

    /// 注册边类型模式版本，edge_type 取正值
    pub fn add_edge_schema(&mut self, space: SpaceId, edge_type: EdgeType, schema: Schema) {
        self.edge_schemas
            .entry((space, edge_type.abs()))
            .or_default()
            .push(Arc::new(schema));
    }

    pub fn add_tag_index(&mut self, space: SpaceId, index: IndexItem) {
        self.tag_indexes
            .entry((space, index.schema_id))
            .or_default()
            .push(Arc::new(index));
    }

    pub fn add_edge_index(&mut self, space: SpaceId, index: IndexItem) {
        self.edge_indexes
            .entry((space, index.schema_id))
            .or_default()
            .push(Arc::new(index));
    }

    pub fn vid_len(&self, space: SpaceId) -> StorageResult<usize> {
        self.spaces
            .get(&space)
            .map(|s| s.vid_len)
            .ok_or(StorageError::SpaceNotFound(space))
    }

    /// 最新标签模式，同时返回标签名
    pub fn latest_tag_schema(
        &self,
        space: SpaceId,
        tag_id: TagId,
    ) -> StorageResult<(Arc<Schema>, String)> {
        let versions = self
            .tag_schemas
            .get(&(space, tag_id))
            .filter(|v| !v.is_empty())
            .ok_or(StorageError::TagNotFound(tag_id))?;
        let latest = versions.last().cloned().expect("版本列表非空");
        let name = latest.name.clone();
        Ok((latest, name))
    }

    pub fn tag_schema_by_version(
        &self,
        space: SpaceId,
        tag_id: TagId,
        ver: SchemaVer,
    ) -> StorageResult<Arc<Schema>> {
        self.tag_schemas
            .get(&(space, tag_id))
            .and_then(|v| v.iter().find(|s| s.version == ver))
            .cloned()
            .ok_or(StorageError::TagNotFound(tag_id))
    }

    /// 最新边模式，同时返回边类型名；edge_type 符号不影响查找
    pub fn latest_edge_schema(
        &self,
        space: SpaceId,
        edge_type: EdgeType,
    ) -> StorageResult<(Arc<Schema>, String)> {
        let versions = self
            .edge_schemas
            .get(&(space, edge_type.abs()))
            .filter(|v| !v.is_empty())
            .ok_or(StorageError::EdgeNotFound(edge_type))?;
        let latest = versions.last().cloned().expect("版本列表非空");
        let name = latest.name.clone();
        Ok((latest, name))
    }

    pub fn edge_schema_by_version(
        &self,
        space: SpaceId,
        edge_type: EdgeType,
        ver: SchemaVer,
    ) -> StorageResult<Arc<Schema>> {
        self.edge_schemas
            .get(&(space, edge_type.abs()))
            .and_then(|v| v.iter().find(|s| s.version == ver))
            .cloned()
            .ok_or(StorageError::EdgeNotFound(edge_type))
    }

    /// 指向该标签的全部索引
    pub fn tag_indexes(&self, space: SpaceId, tag_id: TagId) -> &[Arc<IndexItem>] {
        self.tag_indexes
            .get(&(space, tag_id))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 指向该边类型的全部索引
    pub fn edge_indexes(&self, space: SpaceId, edge_type: EdgeType) -> &[Arc<IndexItem>] {
        self.edge_indexes
            .get(&(space, edge_type.abs()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// 模式目录
///
/// 共享读、极少写；meta 推送到达时整体替换快照，
/// 变更只在操作之间可见，不会出现在操作中途
pub struct SchemaCatalog {
    current: RwLock<Arc<SchemaSnapshot>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SchemaSnapshot::new())),
        }
    }

    /// 取当前快照；一次执行器调用内只取一次
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        self.current.read().clone()
    }

    /// 原子发布新快照
    pub fn publish(&self, snapshot: SchemaSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}
