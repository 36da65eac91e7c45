//! End-to-end coverage of the iterator tree: build small plan trees by hand
//! (skipping the wire codec, which `plan::decode` already covers on its
//! own) and drive them through `Operator::next` the way the executor does.

use nosql_query_engine::error::QueryResult;
use nosql_query_engine::exec::client::{
    ConsistencyLevel, ConsumedCapacity, ExecutorOptions, FetchRequest, FetchResponse, QueryClient,
    Row, TopologySnapshot,
};
use nosql_query_engine::exec::memory::MemoryCounter;
use nosql_query_engine::iter::register::RegisterFile;
use nosql_query_engine::iter::{build, read_register, ExecCtx, Operator};
use nosql_query_engine::plan::{DistributionKind, FuncCode, Location, PlanNode, SortSpec};
use nosql_query_engine::value::{NullRank, Value};

/// A `QueryClient` that hands out one pre-built page per call and never
/// paginates further.
struct OnePageClient {
    page: Option<FetchResponse>,
}

impl OnePageClient {
    fn new(rows: Vec<Row>) -> Self {
        Self {
            page: Some(FetchResponse {
                rows,
                consumed_capacity: Some(ConsumedCapacity::default()),
                continuation_key: None,
                ..FetchResponse::default()
            }),
        }
    }
}

impl QueryClient for OnePageClient {
    fn execute_query(&mut self, _request: &FetchRequest) -> QueryResult<FetchResponse> {
        Ok(self.page.take().unwrap_or_default())
    }

    fn topology(&self, _statement_id: u64) -> TopologySnapshot {
        TopologySnapshot::default()
    }
}

fn row(fields: &[(&str, Value)]) -> Row {
    fields.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

/// Captures the options on the last `FetchRequest` it served, so tests can
/// confirm the caller's `ExecutorOptions` actually reached the wire.
struct RecordingClient {
    page: Option<FetchResponse>,
    last_options: Option<ExecutorOptions>,
}

impl RecordingClient {
    fn new(rows: Vec<Row>) -> Self {
        Self {
            page: Some(FetchResponse {
                rows,
                continuation_key: None,
                ..FetchResponse::default()
            }),
            last_options: None,
        }
    }
}

impl QueryClient for RecordingClient {
    fn execute_query(&mut self, request: &FetchRequest) -> QueryResult<FetchResponse> {
        self.last_options = Some(request.options.clone());
        Ok(self.page.take().unwrap_or_default())
    }

    fn topology(&self, _statement_id: u64) -> TopologySnapshot {
        TopologySnapshot::default()
    }
}

fn var_ref(res_pos: i32, name: &str) -> PlanNode {
    PlanNode::VarRef {
        res_pos,
        loc: Location::default(),
        name: name.to_string(),
    }
}

fn field_step(res_pos: i32, input: PlanNode, field_name: &str) -> PlanNode {
    PlanNode::FieldStep {
        res_pos,
        loc: Location::default(),
        input: Box::new(input),
        field_name: field_name.to_string(),
    }
}

fn drain_all(client: &mut dyn QueryClient, mut root: impl Operator) -> QueryResult<Vec<Row>> {
    let mut registers = RegisterFile::new();
    let mut memory = MemoryCounter::new(256);
    let mut fetch_done = false;
    let mut need_user_continuation = false;
    let mut rows = Vec::new();
    loop {
        let mut ctx = ExecCtx {
            registers: &mut registers,
            ext_vars: &[],
            memory: &mut memory,
            fetch_done: &mut fetch_done,
            need_user_continuation: &mut need_user_continuation,
            client,
        };
        if !root.next(&mut ctx)? {
            break;
        }
        let value = read_register(&ctx, root.res_pos());
        rows.push(match value {
            Value::Record(fields) => fields,
            other => vec![("value".to_string(), other)],
        });
        // A single test page never sets need_user_continuation; guard
        // against an infinite loop if that invariant is ever broken.
        if rows.len() > 1000 {
            panic!("drain_all did not terminate");
        }
    }
    Ok(rows)
}

#[test]
fn receive_simple_deduplicates_by_primary_key() {
    let rows = vec![
        row(&[("id", Value::Int(1))]),
        row(&[("id", Value::Int(2))]),
        row(&[("id", Value::Int(2))]),
        row(&[("id", Value::Int(3))]),
    ];
    let mut client = OnePageClient::new(rows);

    let plan = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: vec!["id".to_string()],
    };
    let root = build(&plan).unwrap();

    let out = drain_all(&mut client, root).unwrap();
    let ids: Vec<i32> = out
        .iter()
        .map(|r| match &r[0].1 {
            Value::Int(v) => *v,
            other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn sort_orders_rows_and_converts_empty_to_null() {
    let rows = vec![
        row(&[("n", Value::Int(3))]),
        row(&[("n", Value::Int(1))]),
        row(&[("n", Value::Int(2))]),
    ];
    let mut client = OnePageClient::new(rows);

    let recv = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: Vec::new(),
    };
    let sort = PlanNode::Sort {
        res_pos: 1,
        loc: Location::default(),
        input: Box::new(recv),
        sort_specs: vec![SortSpec {
            field_name: "n".to_string(),
            is_desc: false,
            null_rank: NullRank::Last,
        }],
    };
    let root = build(&sort).unwrap();

    let out = drain_all(&mut client, root).unwrap();
    let ns: Vec<i32> = out
        .iter()
        .map(|r| match &r[0].1 {
            Value::Int(v) => *v,
            other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    assert_eq!(ns, vec![1, 2, 3]);
}

#[test]
fn configure_options_threads_caller_options_into_fetch_requests() {
    let rows = vec![row(&[("id", Value::Int(1))])];
    let mut client = RecordingClient::new(rows);

    let plan = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: Vec::new(),
    };
    let mut root = build(&plan).unwrap();
    let options = ExecutorOptions {
        timeout_ms: Some(5_000),
        max_memory_mb: 128,
        consistency: ConsistencyLevel::Absolute,
        limit: None,
        continuation_key: None,
    };
    root.configure_options(&options);

    drain_all(&mut client, root).unwrap();

    let observed = client.last_options.expect("RECEIVE must issue at least one fetch");
    assert_eq!(observed.consistency, ConsistencyLevel::Absolute);
    assert_eq!(observed.timeout_ms, Some(5_000));
}

#[test]
fn sort_converts_a_genuinely_empty_row_field_to_null() {
    let rows = vec![
        row(&[("n", Value::Int(2)), ("tag", Value::Empty)]),
        row(&[("n", Value::Int(1)), ("tag", Value::String("present".into()))]),
    ];
    let mut client = OnePageClient::new(rows);

    let recv = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: Vec::new(),
    };
    let sort = PlanNode::Sort {
        res_pos: 1,
        loc: Location::default(),
        input: Box::new(recv),
        sort_specs: vec![SortSpec {
            field_name: "n".to_string(),
            is_desc: false,
            null_rank: NullRank::Last,
        }],
    };
    let root = build(&sort).unwrap();

    let out = drain_all(&mut client, root).unwrap();
    let tags: Vec<Value> = out
        .iter()
        .map(|r| r.iter().find(|(k, _)| k == "tag").unwrap().1.clone())
        .collect();
    assert_eq!(tags, vec![Value::String("present".into()), Value::Null]);
}

#[test]
fn sfw_groups_and_sums_per_group() {
    let rows = vec![
        row(&[("g", Value::String("b".into())), ("x", Value::Int(5))]),
        row(&[("g", Value::String("a".into())), ("x", Value::Int(1))]),
        row(&[("g", Value::String("a".into())), ("x", Value::Int(2))]),
    ];
    let mut client = OnePageClient::new(rows);

    let recv = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: Vec::new(),
    };
    let sorted_from = PlanNode::Sort {
        res_pos: 10,
        loc: Location::default(),
        input: Box::new(recv),
        sort_specs: vec![SortSpec {
            field_name: "g".to_string(),
            is_desc: false,
            null_rank: NullRank::Last,
        }],
    };

    let group_col = field_step(11, var_ref(10, "$from"), "g");
    let sum_col = PlanNode::FnSum {
        res_pos: 12,
        loc: Location::default(),
        func_code: FuncCode::FnSum,
        input: Box::new(field_step(13, var_ref(10, "$from"), "x")),
    };

    let sfw = PlanNode::Sfw {
        res_pos: 20,
        loc: Location::default(),
        column_names: vec!["g".to_string(), "sum_x".to_string()],
        num_gb_columns: 1,
        from_var_name: "$from".to_string(),
        is_select_star: false,
        column_steps: vec![group_col, sum_col],
        from_step: Box::new(sorted_from),
        offset_step: Box::new(PlanNode::Empty),
        limit_step: Box::new(PlanNode::Empty),
    };
    let root = build(&sfw).unwrap();

    let out = drain_all(&mut client, root).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], row(&[("g", Value::String("a".into())), ("sum_x", Value::Int(3))]));
    assert_eq!(out[1], row(&[("g", Value::String("b".into())), ("sum_x", Value::Int(5))]));
}

#[test]
fn sfw_offset_and_limit_bound_ungrouped_output() {
    let rows = (1..=5)
        .map(|n| row(&[("n", Value::Int(n))]))
        .collect::<Vec<_>>();
    let mut client = OnePageClient::new(rows);

    let recv = PlanNode::Recv {
        res_pos: 0,
        loc: Location::default(),
        distribution_kind: DistributionKind::SinglePartition,
        sort_specs: Vec::new(),
        prim_key_fields: Vec::new(),
    };
    let select_col = field_step(1, var_ref(0, "$from"), "n");
    let sfw = PlanNode::Sfw {
        res_pos: 20,
        loc: Location::default(),
        column_names: vec!["n".to_string()],
        num_gb_columns: -1,
        from_var_name: "$from".to_string(),
        is_select_star: false,
        column_steps: vec![select_col],
        from_step: Box::new(recv),
        offset_step: Box::new(PlanNode::Const {
            res_pos: 2,
            loc: Location::default(),
            value: Value::Int(1),
        }),
        limit_step: Box::new(PlanNode::Const {
            res_pos: 3,
            loc: Location::default(),
            value: Value::Int(2),
        }),
    };
    let root = build(&sfw).unwrap();

    let out = drain_all(&mut client, root).unwrap();
    let ns: Vec<i32> = out
        .iter()
        .map(|r| match &r[0].1 {
            Value::Int(v) => *v,
            other => panic!("expected Int, got {other:?}"),
        })
        .collect();
    assert_eq!(ns, vec![2, 3]);
}

#[test]
fn arith_op_promotes_int_addition_to_double_on_division() {
    let args = vec![
        PlanNode::Const {
            res_pos: 1,
            loc: Location::default(),
            value: Value::Int(7),
        },
        PlanNode::Const {
            res_pos: 2,
            loc: Location::default(),
            value: Value::Int(2),
        },
    ];
    let plan = PlanNode::ArithOp {
        res_pos: 0,
        loc: Location::default(),
        func_code: FuncCode::OpMultDiv,
        args,
        ops: b"*/".to_vec(),
    };
    let root = build(&plan).unwrap();
    let mut client = OnePageClient::new(Vec::new());
    let out = drain_all(&mut client, root).unwrap();
    assert_eq!(out.len(), 1);
    match &out[0][0].1 {
        Value::Double(v) => assert!((v - 3.5).abs() < 1e-9),
        other => panic!("expected Double, got {other:?}"),
    }
}
