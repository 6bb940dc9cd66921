//! 写路径端到端测试
//!
//! 覆盖更新/UPSERT 执行器、索引联动、内存锁、leader 重定向
//! 与分发器聚合行为

use std::sync::Arc;

use stargraph_storage::config::StorageConfig;
use stargraph_storage::core::codec::{parse_row_version, IndexKeyUtils, KeyUtils, OperationKeyUtils, RowReader};
use stargraph_storage::core::error::ErrorCode;
use stargraph_storage::core::types::HostAddr;
use stargraph_storage::core::value::Value;
use stargraph_storage::expression::{BinaryOp, Expression};
use stargraph_storage::schema::{
    FieldDef, FieldType, IndexField, IndexItem, Schema, SchemaCatalog, SchemaSnapshot, SpaceInfo,
};
use stargraph_storage::storage::lock_manager::{LockKey, MemoryLockTable};
use stargraph_storage::storage::mutate::{
    AddEdgesProcessor, AddVerticesProcessor, DeleteEdgesProcessor, DeleteVerticesProcessor,
    EdgeKeyItem, NewEdge, NewVertex, RowKey, RowUpdate, SchemaTarget, UpdateDispatcher,
    UpdateRequest, UpdatedProp,
};
use stargraph_storage::storage::replicated::ReplicatedStore;
use stargraph_storage::storage::{
    IndexCountMap, IndexState, IndexStateOracle, MemoryReplicatedStore,
};

const SPACE: u32 = 1;
const PART: u32 = 1;
const VID_LEN: usize = 8;
const TAG_PERSON: i32 = 100;
const TAG_PLAYER: i32 = 101;
const EDGE_LIKE: i32 = 200;
const INDEX_AGE: u32 = 9;
const INDEX_LIKENESS: u32 = 10;

struct World {
    store: Arc<MemoryReplicatedStore>,
    catalog: Arc<SchemaCatalog>,
    locks: Arc<MemoryLockTable>,
    index_states: Arc<IndexStateOracle>,
    index_counts: Arc<IndexCountMap>,
}

impl World {
    fn new() -> Arc<Self> {
        let store = Arc::new(MemoryReplicatedStore::new(HostAddr::new("127.0.0.1", 9779)));
        store.add_part(SPACE, PART);
        store.add_part(SPACE, 2);

        let mut snap = SchemaSnapshot::new();
        snap.add_space(SpaceInfo {
            space_id: SPACE,
            name: "test".to_string(),
            vid_len: VID_LEN,
        });
        snap.add_tag_schema(
            SPACE,
            TAG_PERSON,
            Schema::build(
                "person",
                1,
                vec![
                    FieldDef::new("name", FieldType::String),
                    FieldDef::new("age", FieldType::Int64).nullable(true),
                ],
                None,
            ),
        );
        snap.add_tag_schema(
            SPACE,
            TAG_PLAYER,
            Schema::build(
                "player",
                1,
                vec![
                    FieldDef::new("a", FieldType::Int64).nullable(true),
                    FieldDef::new("x", FieldType::Int64).nullable(true),
                    FieldDef::new("y", FieldType::Int64).nullable(true),
                    FieldDef::new("count", FieldType::Int64)
                        .default_value(Expression::constant(0i64)),
                ],
                None,
            ),
        );
        snap.add_edge_schema(
            SPACE,
            EDGE_LIKE,
            Schema::build(
                "like",
                1,
                vec![FieldDef::new("likeness", FieldType::Int64).nullable(true)],
                None,
            ),
        );
        snap.add_tag_index(
            SPACE,
            IndexItem {
                index_id: INDEX_AGE,
                name: "person_age_index".to_string(),
                schema_id: TAG_PERSON,
                fields: vec![IndexField::new("age", FieldType::Int64)],
            },
        );
        snap.add_edge_index(
            SPACE,
            IndexItem {
                index_id: INDEX_LIKENESS,
                name: "like_likeness_index".to_string(),
                schema_id: EDGE_LIKE,
                fields: vec![IndexField::new("likeness", FieldType::Int64)],
            },
        );
        let catalog = Arc::new(SchemaCatalog::new());
        catalog.publish(snap);

        Arc::new(Self {
            store,
            catalog,
            locks: MemoryLockTable::new(16),
            index_states: Arc::new(IndexStateOracle::new()),
            index_counts: Arc::new(IndexCountMap::new()),
        })
    }

    fn store_dyn(&self) -> Arc<dyn ReplicatedStore> {
        self.store.clone()
    }

    fn dispatcher(&self) -> UpdateDispatcher {
        UpdateDispatcher::new(
            self.store_dyn(),
            self.catalog.clone(),
            self.locks.clone(),
            self.index_states.clone(),
            self.index_counts.clone(),
            None,
            &StorageConfig::default(),
        )
    }

    async fn insert_person(&self, vid: &[u8], name: &str, age: i64) {
        let processor = AddVerticesProcessor::new(
            SPACE,
            self.store_dyn(),
            self.catalog.clone(),
            self.locks.clone(),
            self.index_states.clone(),
            self.index_counts.clone(),
        );
        let failed = processor
            .process(vec![NewVertex {
                part_id: PART,
                vid: vid.to_vec(),
                tag_id: TAG_PERSON,
                prop_names: vec!["name".to_string(), "age".to_string()],
                values: vec![Value::from(name), Value::Int(age)],
            }])
            .await;
        assert!(failed.is_empty(), "插入失败: {:?}", failed);
    }

    async fn insert_player(&self, vid: &[u8], a: i64, x: i64, y: i64) {
        let processor = AddVerticesProcessor::new(
            SPACE,
            self.store_dyn(),
            self.catalog.clone(),
            self.locks.clone(),
            self.index_states.clone(),
            self.index_counts.clone(),
        );
        let failed = processor
            .process(vec![NewVertex {
                part_id: PART,
                vid: vid.to_vec(),
                tag_id: TAG_PLAYER,
                prop_names: vec!["a".to_string(), "x".to_string(), "y".to_string()],
                values: vec![Value::Int(a), Value::Int(x), Value::Int(y)],
            }])
            .await;
        assert!(failed.is_empty(), "插入失败: {:?}", failed);
    }

    fn read_prop(&self, tag_id: i32, vid: &[u8], prop: &str) -> Option<Value> {
        let snap = self.catalog.snapshot();
        let key = KeyUtils::vertex_key(VID_LEN, PART, vid, tag_id);
        let raw = self.store.get(SPACE, PART, &key).unwrap()?;
        let (ver, _) = parse_row_version(&raw).unwrap();
        let schema = snap.tag_schema_by_version(SPACE, tag_id, ver).unwrap();
        let reader = RowReader::new(&raw, &schema).unwrap();
        Some(reader.get_value(prop).unwrap())
    }

    fn age_index_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.store
            .prefix(SPACE, PART, &IndexKeyUtils::index_prefix(PART, INDEX_AGE))
            .unwrap()
    }

    fn operation_logs(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.store
            .prefix(SPACE, PART, &OperationKeyUtils::operation_prefix(PART))
            .unwrap()
    }
}

fn age_index_key(vid: &[u8], age: i64) -> Vec<u8> {
    let values = IndexKeyUtils::encode_value(&Value::Int(age), &FieldType::Int64, None)
        .unwrap()
        .unwrap();
    IndexKeyUtils::vertex_index_key(VID_LEN, PART, INDEX_AGE, vid, &values)
}

fn person_update(
    vid: &[u8],
    sets: Vec<(&str, Expression)>,
    condition: Option<Expression>,
    insertable: bool,
) -> UpdateRequest {
    UpdateRequest {
        space_id: SPACE,
        target: SchemaTarget::Tag(TAG_PERSON),
        rows: vec![RowUpdate {
            part_id: PART,
            key: RowKey::Vertex { vid: vid.to_vec() },
            updated_props: sets
                .into_iter()
                .map(|(name, expr)| UpdatedProp::new(name, expr.encode()))
                .collect(),
            condition: condition.map(|e| e.encode()),
            return_props: vec![Expression::prop("person", "age").encode()],
            insertable,
        }],
    }
}

fn player_increment(vid: &[u8]) -> UpdateRequest {
    let incr = Expression::Binary(
        BinaryOp::Add,
        Box::new(Expression::prop("player", "count")),
        Box::new(Expression::constant(1i64)),
    );
    UpdateRequest {
        space_id: SPACE,
        target: SchemaTarget::Tag(TAG_PLAYER),
        rows: vec![RowUpdate {
            part_id: PART,
            key: RowKey::Vertex { vid: vid.to_vec() },
            updated_props: vec![UpdatedProp::new("count", incr.encode())],
            condition: None,
            return_props: vec![Expression::prop("player", "count").encode()],
            insertable: true,
        }],
    }
}

// 简单更新，索引同批换新
#[tokio::test]
async fn test_simple_update() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;

    // 插入后索引上有 age=30 的项
    assert_eq!(
        world.age_index_entries(),
        vec![(age_index_key(b"v1", 30), Vec::new())]
    );

    let resp = world
        .dispatcher()
        .process(person_update(
            b"v1",
            vec![("age", Expression::constant(31i64))],
            None,
            false,
        ))
        .await;

    assert!(resp.failed_parts.is_empty(), "{:?}", resp.failed_parts);
    let props = resp.props.expect("有 YIELD 列");
    assert_eq!(
        props.col_names,
        vec!["_inserted".to_string(), "person.age".to_string()]
    );
    assert_eq!(props.rows, vec![vec![Value::Bool(false), Value::Int(31)]]);

    // 主行写入、旧索引项移除、新索引项写入
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v1", "age"),
        Some(Value::Int(31))
    );
    assert_eq!(
        world.age_index_entries(),
        vec![(age_index_key(b"v1", 31), Vec::new())]
    );
}

// UPSERT 插入路径，未赋值列取默认或 null
#[tokio::test]
async fn test_upsert_insert_path() {
    let world = World::new();

    let resp = world
        .dispatcher()
        .process(person_update(
            b"v2",
            vec![("name", Expression::constant("b"))],
            None,
            true,
        ))
        .await;

    assert!(resp.failed_parts.is_empty(), "{:?}", resp.failed_parts);
    let props = resp.props.expect("有 YIELD 列");
    assert_eq!(props.rows.len(), 1);
    assert_eq!(props.rows[0][0], Value::Bool(true));

    assert_eq!(
        world.read_prop(TAG_PERSON, b"v2", "name"),
        Some(Value::from("b"))
    );
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v2", "age"),
        Some(Value::null())
    );
    // age 为 null，不产生索引项
    assert!(world.age_index_entries().is_empty());
}

// insertable=false 时缺失行报 KeyNotFound
#[tokio::test]
async fn test_missing_row_not_insertable() {
    let world = World::new();

    let resp = world
        .dispatcher()
        .process(person_update(
            b"v9",
            vec![("age", Expression::constant(1i64))],
            None,
            false,
        ))
        .await;

    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::KeyNotFound);
    assert!(resp.props.is_none());
}

// 过滤未通过，不落盘，旧值照常产出
#[tokio::test]
async fn test_filter_out() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;

    let cond = Expression::Binary(
        BinaryOp::Gt,
        Box::new(Expression::prop("person", "age")),
        Box::new(Expression::constant(100i64)),
    );
    let resp = world
        .dispatcher()
        .process(person_update(
            b"v1",
            vec![("age", Expression::constant(99i64))],
            Some(cond),
            false,
        ))
        .await;

    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::FilteredOut);

    let props = resp.props.expect("被过滤仍产出旧值");
    assert_eq!(props.rows, vec![vec![Value::Bool(false), Value::Int(30)]]);

    // 没有任何写入
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v1", "age"),
        Some(Value::Int(30))
    );
    assert_eq!(
        world.age_index_entries(),
        vec![(age_index_key(b"v1", 30), Vec::new())]
    );
}

// 过滤表达式类型错误报 IllegalData
#[tokio::test]
async fn test_filter_type_error() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;

    // age + name 类型错误
    let cond = Expression::Binary(
        BinaryOp::Add,
        Box::new(Expression::prop("person", "age")),
        Box::new(Expression::prop("person", "name")),
    );
    let resp = world
        .dispatcher()
        .process(person_update(
            b"v1",
            vec![("age", Expression::constant(1i64))],
            Some(cond),
            false,
        ))
        .await;

    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::IllegalData);
    assert!(resp.props.is_none());
}

// 锁冲突立即失败，重试后总增量不丢
#[tokio::test]
async fn test_concurrent_modify_and_retry() {
    let world = World::new();

    // UPSERT 初始化：count 默认 0，加一后为 1
    let resp = world.dispatcher().process(player_increment(b"p1")).await;
    assert!(resp.failed_parts.is_empty());
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p1", "count"),
        Some(Value::Int(1))
    );

    // 持有行锁模拟并发执行器
    let guard = world
        .locks
        .try_lock(LockKey::Vertex {
            space: SPACE,
            part: PART,
            tag_id: TAG_PLAYER,
            vid: b"p1".to_vec(),
        })
        .unwrap();

    let resp = world.dispatcher().process(player_increment(b"p1")).await;
    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::ConcurrentModify);
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p1", "count"),
        Some(Value::Int(1))
    );

    // 锁释放后重试，总量 = 初始 + 2
    drop(guard);
    let resp = world.dispatcher().process(player_increment(b"p1")).await;
    assert!(resp.failed_parts.is_empty());
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p1", "count"),
        Some(Value::Int(2))
    );
}

// 并发自增的结果等价于某个串行顺序
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_increments_serializable() {
    let world = World::new();
    let total = 10usize;

    let mut handles = Vec::new();
    for _ in 0..total {
        let world = world.clone();
        handles.push(tokio::spawn(async move {
            let resp = world.dispatcher().process(player_increment(b"p2")).await;
            resp.failed_parts.is_empty()
        }));
    }

    let mut successes = 0i64;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert!(successes >= 1);
    // 最终计数 = 成功次数
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p2", "count"),
        Some(Value::Int(successes))
    );
}

// 更新按序应用，后面的更新看到前面的赋值
#[tokio::test]
async fn test_update_ordering() {
    let world = World::new();
    world.insert_player(b"p3", 5, 100, 0).await;

    let set_x = Expression::prop("player", "a");
    let set_y = Expression::Binary(
        BinaryOp::Add,
        Box::new(Expression::prop("player", "x")),
        Box::new(Expression::constant(1i64)),
    );
    let req = UpdateRequest {
        space_id: SPACE,
        target: SchemaTarget::Tag(TAG_PLAYER),
        rows: vec![RowUpdate {
            part_id: PART,
            key: RowKey::Vertex {
                vid: b"p3".to_vec(),
            },
            updated_props: vec![
                UpdatedProp::new("x", set_x.encode()),
                UpdatedProp::new("y", set_y.encode()),
            ],
            condition: None,
            return_props: Vec::new(),
            insertable: false,
        }],
    };
    let resp = world.dispatcher().process(req).await;
    assert!(resp.failed_parts.is_empty(), "{:?}", resp.failed_parts);

    // 不管旧 x 是 100，y 必须看到新 x
    assert_eq!(world.read_prop(TAG_PLAYER, b"p3", "x"), Some(Value::Int(5)));
    assert_eq!(world.read_prop(TAG_PLAYER, b"p3", "y"), Some(Value::Int(6)));
}

// 重建中的索引走操作日志而非直接读写
#[tokio::test]
async fn test_rebuilding_emits_operation_logs() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;
    world
        .index_states
        .set_state(SPACE, PART, INDEX_AGE, IndexState::Rebuilding);

    let resp = world
        .dispatcher()
        .process(person_update(
            b"v1",
            vec![("age", Expression::constant(31i64))],
            None,
            false,
        ))
        .await;
    assert!(resp.failed_parts.is_empty(), "{:?}", resp.failed_parts);

    // 直接索引项保持原样：旧项未删、新项未写
    assert_eq!(
        world.age_index_entries(),
        vec![(age_index_key(b"v1", 30), Vec::new())]
    );

    // 操作日志：一条删除记录带旧索引键，一条修改记录嵌新索引键
    let logs = world.operation_logs();
    assert_eq!(logs.len(), 2);
    let deletes: Vec<_> = logs
        .iter()
        .filter(|(k, _)| OperationKeyUtils::is_delete_operation(k))
        .collect();
    let modifies: Vec<_> = logs
        .iter()
        .filter(|(k, _)| OperationKeyUtils::is_modify_operation(k))
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].1, age_index_key(b"v1", 30));
    assert_eq!(modifies.len(), 1);
    assert_eq!(
        OperationKeyUtils::parse_modify_target(&modifies[0].0).unwrap(),
        age_index_key(b"v1", 31).as_slice()
    );

    // 主行照常更新
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v1", "age"),
        Some(Value::Int(31))
    );
}

// 锁定的索引在任何写入之前拒绝整个操作
#[tokio::test]
async fn test_index_locked_refused() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;
    world
        .index_states
        .set_state(SPACE, PART, INDEX_AGE, IndexState::Locked);

    let resp = world
        .dispatcher()
        .process(person_update(
            b"v1",
            vec![("age", Expression::constant(31i64))],
            None,
            false,
        ))
        .await;

    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::IndexLocked);
    // 无任何可见变化
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v1", "age"),
        Some(Value::Int(30))
    );
    assert_eq!(
        world.age_index_entries(),
        vec![(age_index_key(b"v1", 30), Vec::new())]
    );
}

// leader 变更重定向，客户端照提示重试恰好生效一次
#[tokio::test]
async fn test_leader_changed_redirect_and_retry() {
    let world = World::new();
    let resp = world.dispatcher().process(player_increment(b"p4")).await;
    assert!(resp.failed_parts.is_empty());

    let new_leader = HostAddr::new("10.0.0.2", 9779);
    world.store.transfer_leader(SPACE, PART, new_leader.clone());

    let resp = world.dispatcher().process(player_increment(b"p4")).await;
    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::LeaderChanged);
    assert_eq!(resp.failed_parts[0].part_id, PART);
    assert_eq!(resp.failed_parts[0].leader, Some(new_leader));
    // 批没有任何部分可见
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p4", "count"),
        Some(Value::Int(1))
    );

    // 重试恰好生效一次
    world.store.claim_leader(SPACE, PART);
    let resp = world.dispatcher().process(player_increment(b"p4")).await;
    assert!(resp.failed_parts.is_empty());
    assert_eq!(
        world.read_prop(TAG_PLAYER, b"p4", "count"),
        Some(Value::Int(2))
    );
}

// 边更新与符号不匹配语义
#[tokio::test]
async fn test_edge_update_and_sign_mismatch() {
    let world = World::new();
    let processor = AddEdgesProcessor::new(
        SPACE,
        world.store_dyn(),
        world.catalog.clone(),
        world.locks.clone(),
        world.index_states.clone(),
        world.index_counts.clone(),
    );
    let failed = processor
        .process(vec![NewEdge {
            part_id: PART,
            src: b"v1".to_vec(),
            edge_type: EDGE_LIKE,
            rank: 0,
            dst: b"v2".to_vec(),
            prop_names: vec!["likeness".to_string()],
            values: vec![Value::Int(10)],
        }])
        .await;
    assert!(failed.is_empty(), "{:?}", failed);

    let edge_row = |edge_type: i32, insertable: bool| UpdateRequest {
        space_id: SPACE,
        target: SchemaTarget::Edge(EDGE_LIKE),
        rows: vec![RowUpdate {
            part_id: PART,
            key: RowKey::Edge {
                src: b"v1".to_vec(),
                edge_type,
                rank: 0,
                dst: b"v2".to_vec(),
            },
            updated_props: vec![UpdatedProp::new(
                "likeness",
                Expression::constant(20i64).encode(),
            )],
            condition: None,
            return_props: vec![Expression::prop("like", "likeness").encode()],
            insertable,
        }],
    };

    let resp = world.dispatcher().process(edge_row(EDGE_LIKE, false)).await;
    assert!(resp.failed_parts.is_empty(), "{:?}", resp.failed_parts);
    let props = resp.props.expect("有 YIELD 列");
    assert_eq!(
        props.col_names,
        vec!["_inserted".to_string(), "like.likeness".to_string()]
    );
    assert_eq!(props.rows, vec![vec![Value::Bool(false), Value::Int(20)]]);

    // 边索引同批换新
    let likeness_index_key = |v: i64| {
        let values = IndexKeyUtils::encode_value(&Value::Int(v), &FieldType::Int64, None)
            .unwrap()
            .unwrap();
        IndexKeyUtils::edge_index_key(VID_LEN, PART, INDEX_LIKENESS, b"v1", 0, b"v2", &values)
    };
    let entries = world
        .store
        .prefix(
            SPACE,
            PART,
            &IndexKeyUtils::index_prefix(PART, INDEX_LIKENESS),
        )
        .unwrap();
    assert_eq!(entries, vec![(likeness_index_key(20), Vec::new())]);

    // 符号不匹配是另一条逻辑边，即使 insertable 也报 KeyNotFound
    let resp = world.dispatcher().process(edge_row(-EDGE_LIKE, true)).await;
    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::KeyNotFound);
}

// 边删除连同索引项一起消亡
#[tokio::test]
async fn test_delete_edge_removes_row_and_index() {
    let world = World::new();
    let processor = AddEdgesProcessor::new(
        SPACE,
        world.store_dyn(),
        world.catalog.clone(),
        world.locks.clone(),
        world.index_states.clone(),
        world.index_counts.clone(),
    );
    let failed = processor
        .process(vec![NewEdge {
            part_id: PART,
            src: b"v1".to_vec(),
            edge_type: EDGE_LIKE,
            rank: 7,
            dst: b"v2".to_vec(),
            prop_names: vec!["likeness".to_string()],
            values: vec![Value::Int(10)],
        }])
        .await;
    assert!(failed.is_empty(), "{:?}", failed);
    assert_eq!(
        world
            .store
            .prefix(
                SPACE,
                PART,
                &IndexKeyUtils::index_prefix(PART, INDEX_LIKENESS)
            )
            .unwrap()
            .len(),
        1
    );

    let deleter = DeleteEdgesProcessor::new(
        SPACE,
        world.store_dyn(),
        world.catalog.clone(),
        world.locks.clone(),
        world.index_states.clone(),
        world.index_counts.clone(),
    );
    let failed = deleter
        .process(vec![EdgeKeyItem {
            part_id: PART,
            src: b"v1".to_vec(),
            edge_type: EDGE_LIKE,
            rank: 7,
            dst: b"v2".to_vec(),
        }])
        .await;
    assert!(failed.is_empty(), "{:?}", failed);

    let key = KeyUtils::edge_key(VID_LEN, PART, b"v1", EDGE_LIKE, 7, b"v2");
    assert_eq!(world.store.get(SPACE, PART, &key).unwrap(), None);
    assert!(world
        .store
        .prefix(
            SPACE,
            PART,
            &IndexKeyUtils::index_prefix(PART, INDEX_LIKENESS)
        )
        .unwrap()
        .is_empty());
}

// 索引项与行同批生灭
#[tokio::test]
async fn test_delete_vertex_removes_index() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;
    assert_eq!(world.age_index_entries().len(), 1);

    let processor = DeleteVerticesProcessor::new(
        SPACE,
        world.store_dyn(),
        world.catalog.clone(),
        world.locks.clone(),
        world.index_states.clone(),
        world.index_counts.clone(),
    );
    let failed = processor.process(vec![(PART, b"v1".to_vec())]).await;
    assert!(failed.is_empty(), "{:?}", failed);

    assert!(world.read_prop(TAG_PERSON, b"v1", "age").is_none());
    assert!(world.age_index_entries().is_empty());
}

// 多分区请求：失败按分区去重，成功分区照常生效
#[tokio::test]
async fn test_multi_partition_aggregation() {
    let world = World::new();
    world.insert_person(b"v1", "a", 30).await;

    let req = UpdateRequest {
        space_id: SPACE,
        target: SchemaTarget::Tag(TAG_PERSON),
        rows: vec![
            RowUpdate {
                part_id: PART,
                key: RowKey::Vertex { vid: b"v1".to_vec() },
                updated_props: vec![UpdatedProp::new(
                    "age",
                    Expression::constant(31i64).encode(),
                )],
                condition: None,
                return_props: vec![Expression::prop("person", "age").encode()],
                insertable: false,
            },
            // 分区 2 上没有这一行
            RowUpdate {
                part_id: 2,
                key: RowKey::Vertex { vid: b"v8".to_vec() },
                updated_props: vec![UpdatedProp::new(
                    "age",
                    Expression::constant(1i64).encode(),
                )],
                condition: None,
                return_props: Vec::new(),
                insertable: false,
            },
        ],
    };
    let resp = world.dispatcher().process(req).await;

    assert_eq!(resp.failed_parts.len(), 1);
    assert_eq!(resp.failed_parts[0].part_id, 2);
    assert_eq!(resp.failed_parts[0].code, ErrorCode::KeyNotFound);
    // 分区 1 成功
    assert_eq!(
        world.read_prop(TAG_PERSON, b"v1", "age"),
        Some(Value::Int(31))
    );
    assert!(resp.props.is_some());
}
