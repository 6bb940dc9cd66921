//! 更新执行器
//!
//! 单行读-改-写状态机。加锁后读当前行、求值过滤条件、
//! 收集属性、按序应用更新、以最新模式重编码、按索引状态
//! 计算索引增量、整批交给复制 KV 层原子追加。
//! 锁与写入计数守卫在任何退出路径上都随 Drop 释放。

use std::time::{SystemTime, UNIX_EPOCH};

use log::{error, warn};

use crate::core::codec::{
    check_expired, parse_row_version, read_value, IndexKeyUtils, OperationKeyUtils, RowReader,
    RowWriter,
};
use crate::core::error::{ErrorCode, StorageError, StorageResult};
use crate::core::types::{HostAddr, PartitionId};
use crate::core::value::Value;
use crate::expression::Expression;
use crate::storage::batch::BatchHolder;
use crate::storage::index_state::IndexState;
use crate::storage::mutate::plan::{
    ExecState, ExecutorContext, Outcome, PlanNode, ResultStatus,
};
use crate::storage::mutate::{
    RowKey, RowUpdate, SchemaTarget, PROP_DST, PROP_RANK, PROP_SRC, PROP_TAG, PROP_TYPE, PROP_VID,
};

/// 单行执行结果
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub part_id: PartitionId,
    pub code: ErrorCode,
    pub leader: Option<HostAddr>,
    pub columns: Option<(Vec<String>, Vec<Value>)>,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// 计划节点分派：同一个函数按变体执行全部节点
pub fn execute_node(
    node: &PlanNode,
    ctx: &ExecutorContext,
    state: &mut ExecState,
) -> StorageResult<()> {
    match node {
        PlanNode::Fetch => execute_fetch(ctx, state),
        PlanNode::Filter { condition } => execute_filter(state, condition.as_ref()),
        PlanNode::Update {
            updated_props,
            insertable,
        } => execute_update(ctx, state, updated_props, *insertable),
        PlanNode::Yield { return_props } => {
            execute_yield(state, return_props);
            Ok(())
        }
    }
}

/// 读取当前行并做 TTL 判定；过期行按缺失处理
fn execute_fetch(ctx: &ExecutorContext, state: &mut ExecState) -> StorageResult<()> {
    let raw = ctx.store.get(ctx.space_id, state.part_id, &state.key)?;
    let bytes = match raw {
        Some(bytes) => bytes,
        None => return Ok(()),
    };

    let (ver, _) = parse_row_version(&bytes)?;
    let auth = match ctx.target {
        SchemaTarget::Tag(tag_id) => {
            state
                .snapshot
                .tag_schema_by_version(ctx.space_id, tag_id, ver)?
        }
        SchemaTarget::Edge(edge_type) => {
            state
                .snapshot
                .edge_schema_by_version(ctx.space_id, edge_type, ver)?
        }
    };

    let expired = {
        let reader = RowReader::new(&bytes, &auth)?;
        check_expired(&state.schema, &reader, now_secs())
    };
    if !expired {
        state.old_raw = bytes;
        state.auth_schema = Some(auth);
    }
    Ok(())
}

/// 物化属性上下文并求值过滤条件
///
/// 缺失行不做过滤，由更新节点决定插入路径或 KeyNotFound
fn execute_filter(state: &mut ExecState, condition: Option<&Expression>) -> StorageResult<()> {
    if state.old_raw.is_empty() {
        return Ok(());
    }

    // 最新模式的每一列都经 read_value 物化，
    // 模式演进后新增的列取默认值或 null
    let mut collected = Vec::with_capacity(state.schema.num_fields());
    {
        let auth = state.auth_schema.as_ref().expect("有旧行必有版本模式");
        let reader = RowReader::new(&state.old_raw, auth)?;
        for field in state.schema.fields() {
            let value = read_value(Some(&reader), &field.name, &state.schema)?;
            collected.push((field.name.clone(), value));
        }
    }
    for (name, value) in collected {
        state.props.set_prop(name, value);
    }
    set_implicit_props(state);

    if let Some(cond) = condition {
        match cond.eval(&state.props) {
            Value::Bool(true) => {}
            Value::Bool(false) => state.status = ResultStatus::FilterOut,
            _ => state.status = ResultStatus::IllegalData,
        }
    }
    Ok(())
}

/// 读-改-写主体，产物是 Outcome
fn execute_update(
    ctx: &ExecutorContext,
    state: &mut ExecState,
    updated_props: &[(String, Expression)],
    insertable: bool,
) -> StorageResult<()> {
    // 边的存储类型必须与请求类型完全一致，符号不同即是另一条逻辑边
    if let (SchemaTarget::Edge(req_type), RowKey::Edge { edge_type, .. }) =
        (&ctx.target, &state.row_key)
    {
        if edge_type != req_type {
            state.outcome = Some(Outcome::NoBatch(ErrorCode::KeyNotFound));
            return Ok(());
        }
    }

    match state.status {
        ResultStatus::IllegalData => {
            state.outcome = Some(Outcome::NoBatch(ErrorCode::IllegalData));
            return Ok(());
        }
        ResultStatus::FilterOut => {
            state.outcome = Some(Outcome::NoBatch(ErrorCode::FilteredOut));
            return Ok(());
        }
        ResultStatus::Normal => {}
    }

    if state.old_raw.is_empty() {
        if !insertable {
            state.outcome = Some(Outcome::NoBatch(ErrorCode::KeyNotFound));
            return Ok(());
        }
        insert_props(state, updated_props)?;
    }

    // 按序应用更新并回写上下文，后面的更新能看到前面的赋值：
    // set a=1, b=a+1 无论旧 a 为何，b 必为 2
    for (name, expr) in updated_props {
        let value = expr.eval(&state.props);
        state.props.set_prop(name.clone(), value);
    }

    // 以最新模式重编码
    let mut writer = RowWriter::new(&state.schema);
    for field in state.schema.fields() {
        let value = state
            .props
            .get(&field.name)
            .cloned()
            .unwrap_or_else(Value::null);
        writer.set_value(&field.name, &value)?;
    }
    let new_val = writer.finish()?;

    let batch = build_index_delta(ctx, state, new_val)?;
    state.outcome = Some(Outcome::Batch(batch));
    Ok(())
}

/// 插入路径：每列取默认值，否则 null；
/// 无默认且不可空的列必须由本次更新赋值，否则拒绝
fn insert_props(
    state: &mut ExecState,
    updated_props: &[(String, Expression)],
) -> StorageResult<()> {
    state.insert = true;
    for field in state.schema.fields() {
        if let Some(value) = field.eval_default() {
            if value.is_bad_null() {
                return Err(StorageError::InvalidDefault(field.name.clone()));
            }
            state.props.set_prop(field.name.clone(), value);
        } else if field.nullable {
            state.props.set_prop(field.name.clone(), Value::null());
        } else if updated_props.iter().any(|(name, _)| name == &field.name) {
            // 随后的应用阶段会赋值
            continue;
        } else {
            return Err(StorageError::NoDefaultAndNotNullable(field.name.clone()));
        }
    }
    set_implicit_props(state);
    Ok(())
}

/// 设置隐式列：顶点为 _vid/_tag，边为 _src/_type/_rank/_dst
fn set_implicit_props(state: &mut ExecState) {
    match (&state.target, &state.row_key) {
        (SchemaTarget::Tag(tag_id), RowKey::Vertex { vid }) => {
            let vid = String::from_utf8_lossy(vid).into_owned();
            state.props.set_prop(PROP_VID, Value::String(vid));
            state.props.set_prop(PROP_TAG, Value::Int(*tag_id as i64));
        }
        (
            _,
            RowKey::Edge {
                src,
                edge_type,
                rank,
                dst,
            },
        ) => {
            let src = String::from_utf8_lossy(src).into_owned();
            let dst = String::from_utf8_lossy(dst).into_owned();
            state.props.set_prop(PROP_SRC, Value::String(src));
            state
                .props
                .set_prop(PROP_TYPE, Value::Int(*edge_type as i64));
            state.props.set_prop(PROP_RANK, Value::Int(*rank));
            state.props.set_prop(PROP_DST, Value::String(dst));
        }
        _ => {}
    }
}

/// 组装写批：索引增量在前，主行最后写入
fn build_index_delta(
    ctx: &ExecutorContext,
    state: &ExecState,
    new_val: Vec<u8>,
) -> StorageResult<BatchHolder> {
    let mut batch = BatchHolder::new();
    let indexes = match ctx.target {
        SchemaTarget::Tag(tag_id) => state.snapshot.tag_indexes(ctx.space_id, tag_id),
        SchemaTarget::Edge(edge_type) => state.snapshot.edge_indexes(ctx.space_id, edge_type),
    };

    if !indexes.is_empty() {
        let ttl_anchor = state
            .schema
            .ttl
            .as_ref()
            .and_then(|ttl| state.props.get(&ttl.col).and_then(|v| v.as_int()));

        for index in indexes {
            let index_state = ctx
                .index_states
                .state(ctx.space_id, state.part_id, index.index_id);
            // 锁定的索引在任何写入发生之前中止整个操作
            if index_state == IndexState::Locked {
                return Err(StorageError::IndexLocked);
            }

            // 旧索引项：插入路径无旧行，TTL 过期的行也没有留下索引
            if !state.old_raw.is_empty() {
                let auth = state.auth_schema.as_ref().expect("有旧行必有版本模式");
                let old_reader = RowReader::new(&state.old_raw, auth)?;
                if let Some(values) = IndexKeyUtils::collect_index_values(&old_reader, index)? {
                    let old_key = index_key_for(state, index.index_id, &values);
                    match index_state {
                        IndexState::Normal => batch.remove(old_key),
                        IndexState::Rebuilding => batch.put(
                            OperationKeyUtils::delete_operation_key(state.part_id),
                            old_key,
                        ),
                        IndexState::Locked => unreachable!(),
                    }
                }
            }

            // 新索引项经新读取器读取编码后的行，吸收编码归一化
            let new_reader = RowReader::new(&new_val, &state.schema)?;
            if let Some(values) = IndexKeyUtils::collect_index_values(&new_reader, index)? {
                let new_key = index_key_for(state, index.index_id, &values);
                let index_val = IndexKeyUtils::index_val(ttl_anchor);
                match index_state {
                    IndexState::Normal => batch.put(new_key, index_val),
                    IndexState::Rebuilding => batch.put(
                        OperationKeyUtils::modify_operation_key(state.part_id, &new_key),
                        index_val,
                    ),
                    IndexState::Locked => unreachable!(),
                }
            }
        }
    }

    batch.put(state.key.clone(), new_val);
    Ok(batch)
}

fn index_key_for(state: &ExecState, index_id: crate::core::types::IndexId, values: &[u8]) -> Vec<u8> {
    match &state.row_key {
        RowKey::Vertex { vid } => IndexKeyUtils::vertex_index_key(
            state.vid_len,
            state.part_id,
            index_id,
            vid,
            values,
        ),
        RowKey::Edge {
            src, rank, dst, ..
        } => IndexKeyUtils::edge_index_key(
            state.vid_len,
            state.part_id,
            index_id,
            src,
            *rank,
            dst,
            values,
        ),
    }
}

/// 产出 YIELD 列；被过滤时上下文里仍是旧值
fn execute_yield(state: &mut ExecState, return_props: &[Expression]) {
    if !matches!(
        state.commit_code,
        ErrorCode::Succeeded | ErrorCode::FilteredOut
    ) {
        return;
    }
    let mut names = Vec::with_capacity(return_props.len() + 1);
    let mut row = Vec::with_capacity(return_props.len() + 1);
    names.push("_inserted".to_string());
    row.push(Value::Bool(state.insert));
    for expr in return_props {
        let name = match expr {
            Expression::Prop { sym, prop } => format!("{}.{}", sym, prop),
            _ => "NULL".to_string(),
        };
        names.push(name);
        row.push(expr.eval(&state.props));
    }
    state.columns = Some((names, row));
}

/// 执行单行更新
pub async fn execute_row(ctx: &ExecutorContext, row: RowUpdate) -> RowOutcome {
    let part_id = row.part_id;
    match execute_row_inner(ctx, row).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let leader = match &e {
                StorageError::LeaderChanged(addr) => Some(addr.clone()),
                _ => None,
            };
            match &e {
                StorageError::ConcurrentModify(_)
                | StorageError::KeyNotFound
                | StorageError::LeaderChanged(_) => {}
                other => warn!("分区 {} 更新失败: {}", part_id, other),
            }
            RowOutcome {
                part_id,
                code: e.to_code(),
                leader,
                columns: None,
            }
        }
    }
}

async fn execute_row_inner(
    ctx: &ExecutorContext,
    row: RowUpdate,
) -> StorageResult<RowOutcome> {
    // 表达式预解码，解码失败即非法数据
    let condition = row
        .condition
        .as_deref()
        .map(Expression::decode)
        .transpose()
        .map_err(|e| StorageError::IllegalData(e.to_string()))?;
    let mut updated_props = Vec::with_capacity(row.updated_props.len());
    for prop in &row.updated_props {
        let expr = Expression::decode(&prop.value)
            .map_err(|e| StorageError::IllegalData(e.to_string()))?;
        updated_props.push((prop.name.clone(), expr));
    }
    let mut return_props = Vec::with_capacity(row.return_props.len());
    for bytes in &row.return_props {
        return_props.push(
            Expression::decode(bytes).map_err(|e| StorageError::IllegalData(e.to_string()))?,
        );
    }

    // 一次调用只取一份模式快照
    let snapshot = ctx.catalog.snapshot();
    let mut state = ExecState::new(ctx, snapshot, row.part_id, row.key)?;

    // 行锁 + 分区写入计数，守卫覆盖全部退出路径
    let _lock = ctx.locks.try_lock(state.lock_key(ctx.space_id))?;
    let _count = ctx.index_counts.enter(ctx.space_id, state.part_id);

    let plan = [
        PlanNode::Fetch,
        PlanNode::Filter { condition },
        PlanNode::Update {
            updated_props,
            insertable: row.insertable,
        },
    ];
    for node in &plan {
        execute_node(node, ctx, &mut state)?;
    }

    let outcome = state.outcome.take().expect("更新节点必产出 Outcome");
    let (code, leader) = match outcome {
        Outcome::NoBatch(code) => (code, None),
        Outcome::Batch(batch) => commit(ctx, &mut state, batch).await?,
    };
    state.commit_code = code;

    execute_node(
        &PlanNode::Yield { return_props },
        ctx,
        &mut state,
    )?;

    Ok(RowOutcome {
        part_id: state.part_id,
        code,
        leader,
        columns: state.columns.take(),
    })
}

/// 提交写批；边路径配置了事务管理器时经由其两阶段协议
async fn commit(
    ctx: &ExecutorContext,
    state: &mut ExecState,
    batch: BatchHolder,
) -> StorageResult<(ErrorCode, Option<HostAddr>)> {
    if matches!(state.row_key, RowKey::Edge { .. }) {
        if let Some(txn) = &ctx.txn {
            let code = txn
                .update_edge_atomic(
                    state.vid_len,
                    ctx.space_id,
                    state.part_id,
                    state.key.clone(),
                    Box::new(move || Outcome::Batch(batch)),
                )
                .await;
            return Ok((code, None));
        }
    }

    let append = ctx
        .store
        .async_append_batch(ctx.space_id, state.part_id, batch);
    let result = match ctx.append_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, append).await {
            Ok(r) => r,
            Err(_) => Err(StorageError::Timeout),
        },
        None => append.await,
    };
    match result {
        Ok(()) => Ok((ErrorCode::Succeeded, None)),
        Err(StorageError::LeaderChanged(addr)) => {
            Ok((ErrorCode::LeaderChanged, Some(addr)))
        }
        Err(e) => {
            error!(
                "分区 {} 批量追加失败: {}",
                state.part_id, e
            );
            Err(e)
        }
    }
}
