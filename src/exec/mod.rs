//! The executor: owns the register file, external-variable bindings, and
//! memory counter for one running query, and drives the root iterator one
//! page at a time.

pub mod client;
pub mod memory;
pub mod serialize;

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::register::RegisterFile;
use crate::iter::{build, read_register, ExecCtx, Operator, PlanIter};
use crate::plan::decode_plan;
use crate::plan::reader::Reader;
use crate::value::Value;
use client::{ExecutorOptions, PreparedStatement, QueryClient, Row};
use memory::MemoryCounter;
use tracing::debug;

///
/// Page
///
/// One batch of results returned to the caller: the rows produced this
/// call, and, if more remain, an opaque continuation to resume with.
///

#[derive(Clone, Debug, Default)]
pub struct Page {
    pub rows: Vec<Row>,
    pub continuation: Option<String>,
}

///
/// Executor
///
/// One query's worth of running state. Built lazily on the first `fetch`
/// call from the prepared statement's plan bytes; subsequent calls reuse
/// the same operator tree, register file, and memory counter.
///

pub struct Executor<'a> {
    registers: RegisterFile,
    ext_vars: Vec<Value>,
    memory: MemoryCounter,
    fetch_done: bool,
    need_user_continuation: bool,
    root: PlanIter,
    client: &'a mut dyn QueryClient,
}

impl<'a> Executor<'a> {
    /// Decode and build the operator tree for `statement`, resolving its
    /// external-variable bindings up front.
    pub fn new(
        statement: &PreparedStatement,
        options: &ExecutorOptions,
        client: &'a mut dyn QueryClient,
    ) -> QueryResult<Self> {
        serialize::validate_plan_bytes(&statement.plan_bytes).map_err(|err| {
            QueryError::illegal_argument(IterOrigin::Executor, err.to_string())
        })?;
        let mut reader = Reader::new(&statement.plan_bytes);
        let plan = decode_plan(&mut reader)?;
        let mut root = build(&plan)?;
        root.configure_receive(statement.statement_id);
        root.configure_options(options);
        let ext_vars = statement.resolve_bindings()?;
        Ok(Self {
            registers: RegisterFile::new(),
            ext_vars,
            memory: MemoryCounter::new(options.max_memory_mb),
            fetch_done: false,
            need_user_continuation: false,
            root,
            client,
        })
    }

    fn ctx(&mut self) -> ExecCtx<'_> {
        ExecCtx {
            registers: &mut self.registers,
            ext_vars: &self.ext_vars,
            memory: &mut self.memory,
            fetch_done: &mut self.fetch_done,
            need_user_continuation: &mut self.need_user_continuation,
            client: &mut *self.client,
        }
    }

    /// Pull one page of rows, honoring `limit` and stopping after at most
    /// one remote fetch. `fetch_done`/`need_user_continuation` are cleared
    /// at the start of every call, matching "the next user invocation
    /// clears both".
    pub fn fetch(&mut self, limit: Option<u32>) -> QueryResult<Page> {
        self.fetch_done = false;
        self.need_user_continuation = false;

        let mut rows = Vec::new();
        let cap = limit.map(|n| n as usize);

        loop {
            if let Some(cap) = cap {
                if rows.len() >= cap {
                    break;
                }
            }
            let mut ctx = self.ctx();
            if !self.root.next(&mut ctx)? {
                break;
            }
            let value = read_register(&ctx, self.root.res_pos());
            rows.push(row_from_value(value));
            if self.need_user_continuation {
                break;
            }
        }

        // Resumption state lives inside the still-live operator tree (RECV's
        // per-source continuation keys, SORT's buffer); this token is just a
        // non-empty opaque marker telling the caller to invoke `fetch` again
        // on the same executor rather than carrying data of its own.
        let continuation = if self.need_user_continuation {
            Some(serialize::encode_continuation(&[1]))
        } else {
            None
        };

        debug!(
            row_count = rows.len(),
            has_continuation = continuation.is_some(),
            "executor fetch completed"
        );
        Ok(Page { rows, continuation })
    }
}

fn row_from_value(value: Value) -> Row {
    match value {
        Value::Record(fields) => fields,
        other => vec![(String::new(), other)],
    }
}
