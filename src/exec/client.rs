//! The RPC facade the engine fetches pages through. Transport, auth, retry
//! and rate-limiting all live on the other side of this trait; the engine
//! only ever calls `execute_query` at most once per user call.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::exec::serialize;
use crate::value::Value;
use std::collections::BTreeMap;

///
/// ConsistencyLevel
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsistencyLevel {
    Absolute,
    Eventual,
}

///
/// ExecutorOptions
///
/// Recognized user-facing options for one `execute` call.
///

#[derive(Clone, Debug)]
pub struct ExecutorOptions {
    pub timeout_ms: Option<u64>,
    pub max_memory_mb: u64,
    pub consistency: ConsistencyLevel,
    pub limit: Option<u32>,
    pub continuation_key: Option<Vec<u8>>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_memory_mb: 256,
            consistency: ConsistencyLevel::Eventual,
            limit: None,
            continuation_key: None,
        }
    }
}

impl ExecutorOptions {
    #[must_use]
    pub fn builder() -> ExecutorOptionsBuilder {
        ExecutorOptionsBuilder::default()
    }
}

///
/// ExecutorOptionsBuilder
///
/// Mirrors the teacher's sanitize/validate split: fields accumulate on the
/// builder with no checks, and `build()` is the single point where an
/// invalid combination (a zero memory cap, a zero timeout, a zero limit) is
/// rejected rather than silently accepted.
///

#[derive(Clone, Debug, Default)]
pub struct ExecutorOptionsBuilder {
    timeout_ms: Option<u64>,
    max_memory_mb: Option<u64>,
    consistency: Option<ConsistencyLevel>,
    limit: Option<u32>,
    continuation_key: Option<Vec<u8>>,
}

impl ExecutorOptionsBuilder {
    #[must_use]
    pub const fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub const fn max_memory_mb(mut self, max_memory_mb: u64) -> Self {
        self.max_memory_mb = Some(max_memory_mb);
        self
    }

    #[must_use]
    pub const fn consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = Some(consistency);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn continuation_key(mut self, continuation_key: Vec<u8>) -> Self {
        self.continuation_key = Some(continuation_key);
        self
    }

    /// Validates and materializes the options. Rejects a zero timeout, a
    /// zero memory cap, and a zero row limit — each would otherwise silently
    /// starve the executor instead of raising a clear construction error.
    pub fn build(self) -> QueryResult<ExecutorOptions> {
        if self.timeout_ms == Some(0) {
            return Err(QueryError::illegal_argument(
                IterOrigin::Executor,
                "timeout_ms must be greater than zero",
            ));
        }
        let max_memory_mb = self.max_memory_mb.unwrap_or(256);
        if max_memory_mb == 0 {
            return Err(QueryError::illegal_argument(
                IterOrigin::Executor,
                "max_memory_mb must be greater than zero",
            ));
        }
        if self.limit == Some(0) {
            return Err(QueryError::illegal_argument(
                IterOrigin::Executor,
                "limit must be greater than zero",
            ));
        }
        Ok(ExecutorOptions {
            timeout_ms: self.timeout_ms,
            max_memory_mb,
            consistency: self.consistency.unwrap_or(ConsistencyLevel::Eventual),
            limit: self.limit,
            continuation_key: self.continuation_key,
        })
    }
}

/// One remote fetch request: which prepared statement, which source (a
/// partition or a shard) to read from, and the continuation to resume at.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub statement_id: u64,
    pub source_id: i32,
    pub continuation_key: Option<Vec<u8>>,
    pub options: ExecutorOptions,
}

/// Consumed-capacity accounting returned alongside a page, when the store
/// reports it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsumedCapacity {
    pub read_units: u32,
    pub write_units: u32,
}

/// One row as returned from the store: an ordered field list, matching
/// [`Value::Record`].
pub type Row = Vec<(String, Value)>;

/// One server response to a [`FetchRequest`].
#[derive(Clone, Debug, Default)]
pub struct FetchResponse {
    pub rows: Vec<Row>,
    pub consumed_capacity: Option<ConsumedCapacity>,
    pub continuation_key: Option<Vec<u8>>,
    pub reached_limit: bool,
    /// Set on all-partitions sort queries while the server is still in
    /// phase 1.
    pub cont_all_part_sort_phase1: bool,
    pub part_ids: Vec<i32>,
    pub num_results_per_part_id: Vec<i32>,
    pub part_cont_keys: Vec<Option<Vec<u8>>>,
}

/// A topology snapshot keyed by prepared statement: the set of shard ids
/// currently known for an all-shards RECEIVE. Swapped in atomically by the
/// owner of the [`PreparedStatement`]; a RECEIVE pins one snapshot per
/// fetch cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopologySnapshot {
    pub shard_ids: Vec<i32>,
}

/// The RPC facade. Implementations own transport, authorization, retry,
/// and rate limiting; the engine treats failures as already classified
/// [`crate::error::QueryError`]s (retryable ones get re-queued by RECEIVE
/// before being rethrown).
pub trait QueryClient {
    fn execute_query(&mut self, request: &FetchRequest) -> QueryResult<FetchResponse>;

    fn topology(&self, statement_id: u64) -> TopologySnapshot;
}

///
/// PreparedStatement
///

#[derive(Clone, Debug)]
pub struct PreparedStatement {
    pub statement_id: u64,
    pub plan_bytes: Vec<u8>,
    /// Opaque plan fingerprint, used only for cache-reuse/log correlation
    /// diagnostics; never consulted by query execution itself.
    pub query_id: Vec<u8>,
    /// Declared external-variable names, in declaration order.
    pub external_var_names: Vec<String>,
    pub bindings: BTreeMap<String, Value>,
    pub topology: Option<TopologySnapshot>,
}

impl PreparedStatement {
    /// Bound-checks `plan_bytes` and `query_id` before admitting them into
    /// the executor.
    pub fn new(
        statement_id: u64,
        plan_bytes: Vec<u8>,
        query_id: Vec<u8>,
        external_var_names: Vec<String>,
    ) -> QueryResult<Self> {
        serialize::validate_plan_bytes(&plan_bytes)
            .map_err(|err| QueryError::illegal_argument(IterOrigin::Executor, err.to_string()))?;
        serialize::validate_fingerprint(&query_id)
            .map_err(|err| QueryError::illegal_argument(IterOrigin::Executor, err.to_string()))?;
        Ok(Self {
            statement_id,
            plan_bytes,
            query_id,
            external_var_names,
            bindings: BTreeMap::new(),
            topology: None,
        })
    }

    /// Bind a value to a declared external variable. Unknown names raise
    /// "illegal-argument".
    pub fn bind(&mut self, name: &str, value: Value) -> QueryResult<()> {
        if !self.external_var_names.iter().any(|n| n == name) {
            return Err(crate::error::QueryError::illegal_argument(
                crate::error::IterOrigin::Executor,
                format!("'{name}' is not a declared external variable"),
            ));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolve bindings into the positional vector RECEIVE's EXT_VAR_REF
    /// reads from, failing if any declared name is missing.
    pub fn resolve_bindings(&self) -> QueryResult<Vec<Value>> {
        self.external_var_names
            .iter()
            .map(|name| {
                self.bindings.get(name).cloned().ok_or_else(|| {
                    crate::error::QueryError::illegal_argument(
                        crate::error::IterOrigin::Executor,
                        format!("missing binding for external variable '{name}'"),
                    )
                })
            })
            .collect()
    }
}
