//! RECEIVE: the only asynchronous operator in the engine. Fetches pages from
//! the store, optionally merges sorted streams across shards or partitions,
//! and optionally deduplicates by primary key. At most one remote fetch
//! happens per user call; everything else is a pure local transformation of
//! already-buffered rows.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::exec::client::{ExecutorOptions, FetchRequest, Row, TopologySnapshot};
use crate::exec::memory::estimate_size;
use crate::iter::{ExecCtx, Operator};
use crate::plan::{DistributionKind, SortSpec};
use crate::value::{compare_values, Value};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

/// Two-phase row-limit floor: a `remaining/avg` fetch size is clamped into
/// `[MIN_PHASE2_LIMIT, MAX_PHASE2_LIMIT]`.
const MIN_PHASE2_LIMIT: u32 = 1;
const MAX_PHASE2_LIMIT: u32 = 2048;

///
/// SourceBuffer
///
/// One shard's or partition's buffered, not-yet-emitted rows, plus enough
/// state to resume fetching it: its own continuation key and whether the
/// store has told us it's exhausted.
///

#[derive(Debug, Default)]
struct SourceBuffer {
    source_id: i32,
    rows: VecDeque<Row>,
    continuation_key: Option<Vec<u8>>,
    exhausted: bool,
}

impl SourceBuffer {
    fn new(source_id: i32) -> Self {
        Self {
            source_id,
            rows: VecDeque::new(),
            continuation_key: None,
            exhausted: false,
        }
    }

    /// A source with nothing buffered and no way to fetch more is done for
    /// good; it's dropped from the merge rather than re-queued.
    fn is_finished(&self) -> bool {
        self.rows.is_empty() && self.exhausted
    }
}

///
/// DedupTracker
///
/// Canonical string keys for primary-key dedup: strings pass through,
/// numbers stringify, timestamps render ISO-8601 UTC, decimals via their
/// string form. Each newly-seen key's size is charged to the memory
/// counter and released on reset.
///

#[derive(Debug, Default)]
struct DedupTracker {
    fields: Vec<String>,
    seen: HashSet<String>,
    charged_bytes: u64,
}

impl DedupTracker {
    fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            seen: HashSet::new(),
            charged_bytes: 0,
        }
    }

    fn enabled(&self) -> bool {
        !self.fields.is_empty()
    }

    fn canonical_part(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Number(d) => d.to_string(),
            Value::Timestamp(t) => t.to_rfc3339(),
            Value::Bool(v) => v.to_string(),
            other => format!("{other:?}"),
        }
    }

    fn key_for(&self, row: &Row) -> String {
        self.fields
            .iter()
            .map(|field| {
                row.iter()
                    .find(|(k, _)| k == field)
                    .map(|(_, v)| Self::canonical_part(v))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\u{1}")
    }

    /// Returns `true` if the row is new (should be kept).
    fn admit(&mut self, row: &Row, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if !self.enabled() {
            return Ok(true);
        }
        let key = self.key_for(row);
        if self.seen.contains(&key) {
            return Ok(false);
        }
        let size = key.len() as u64 + 16;
        ctx.memory.inc(size)?;
        self.charged_bytes += size;
        self.seen.insert(key);
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx) {
        ctx.memory.dec(self.charged_bytes);
        self.charged_bytes = 0;
        self.seen.clear();
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    One,
    Two,
}

///
/// ReceiveIter
///

#[derive(Debug)]
pub struct ReceiveIter {
    res_pos: i32,
    statement_id: u64,
    distribution_kind: DistributionKind,
    sort_specs: Vec<SortSpec>,
    dedup: DedupTracker,

    // Simple mode.
    simple: SourceBuffer,

    // All-shards / all-partitions (phase 2) merge-sort mode.
    heap: Vec<SourceBuffer>,
    topology: TopologySnapshot,

    // All-partitions mode only.
    phase: Phase,
    phase1_rows: Vec<(i32, Row)>,
    phase2_rows_seen: u64,
    phase2_bytes_seen: u64,

    options: ExecutorOptions,
    done: bool,
}

impl ReceiveIter {
    #[must_use]
    pub fn new(
        res_pos: i32,
        distribution_kind: DistributionKind,
        sort_specs: Vec<SortSpec>,
        prim_key_fields: Vec<String>,
    ) -> Self {
        Self {
            res_pos,
            statement_id: 0,
            distribution_kind,
            sort_specs,
            dedup: DedupTracker::new(prim_key_fields),
            simple: SourceBuffer::new(0),
            heap: Vec::new(),
            topology: TopologySnapshot::default(),
            phase: Phase::One,
            phase1_rows: Vec::new(),
            phase2_rows_seen: 0,
            phase2_bytes_seen: 0,
            options: ExecutorOptions::default(),
            done: false,
        }
    }

    fn sorted(&self) -> bool {
        !self.sort_specs.is_empty()
    }

    /// Set by the executor from the owning prepared statement; plan bytes
    /// carry no statement identity of their own.
    pub fn set_statement_id(&mut self, statement_id: u64) {
        self.statement_id = statement_id;
    }

    /// Set by the executor from the caller-supplied `ExecutorOptions`; plan
    /// bytes carry no options of their own, so every fetch this RECEIVE
    /// issues otherwise silently falls back to the defaults.
    pub fn set_options(&mut self, options: ExecutorOptions) {
        self.options = options;
    }

    /// Performs the single fetch this user call is allowed, if any remain.
    /// Returns `Ok(None)` when the budget is already spent (and sets
    /// `need_user_continuation`), `Ok(Some(response))` on success.
    fn take_fetch_slot(
        &mut self,
        ctx: &mut ExecCtx,
        source_id: i32,
        continuation_key: Option<Vec<u8>>,
    ) -> QueryResult<Option<crate::exec::client::FetchResponse>> {
        if *ctx.fetch_done {
            *ctx.need_user_continuation = true;
            return Ok(None);
        }
        let request = FetchRequest {
            statement_id: self.statement_id,
            source_id,
            continuation_key,
            options: self.options.clone(),
        };
        trace!(statement_id = self.statement_id, source_id, "RECEIVE fetching a page");
        let response = ctx.client.execute_query(&request);
        *ctx.fetch_done = true;
        Ok(Some(response?))
    }

    fn emit(&mut self, ctx: &mut ExecCtx, row: Row) {
        ctx.registers.set(self.res_pos, Value::Record(row));
    }

    // --- Simple (unsorted) mode ---------------------------------------

    fn next_simple(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        loop {
            while let Some(row) = self.simple.rows.pop_front() {
                if self.dedup.admit(&row, ctx)? {
                    self.emit(ctx, row);
                    return Ok(true);
                }
            }
            if self.simple.exhausted {
                debug!(statement_id = self.statement_id, "RECEIVE simple mode exhausted");
                self.done = true;
                return Ok(false);
            }
            let continuation = self.simple.continuation_key.take();
            let Some(response) = self.take_fetch_slot(ctx, 0, continuation)? else {
                return Ok(false);
            };
            self.simple.continuation_key = response.continuation_key;
            self.simple.exhausted = self.simple.continuation_key.is_none();
            self.simple.rows.extend(response.rows);
        }
    }

    // --- All-shards merge sort -----------------------------------------

    fn sync_shard_topology(&mut self, ctx: &ExecCtx) {
        let fresh = ctx.client.topology(self.statement_id);
        if fresh == self.topology {
            return;
        }
        self.heap.retain(|b| fresh.shard_ids.contains(&b.source_id) || !b.is_finished());
        for &shard_id in &fresh.shard_ids {
            if !self.heap.iter().any(|b| b.source_id == shard_id) {
                self.heap.push(SourceBuffer::new(shard_id));
            }
        }
        self.topology = fresh;
    }

    /// Index of the source that should be emitted from (or fetched) next:
    /// the smallest per the sort-specs comparator, with a source lacking a
    /// buffered row always sorting first.
    fn top_index(&self) -> Option<usize> {
        (0..self.heap.len()).min_by(|&a, &b| self.compare_sources(&self.heap[a], &self.heap[b]))
    }

    fn compare_sources(&self, a: &SourceBuffer, b: &SourceBuffer) -> Ordering {
        match (a.rows.front(), b.rows.front()) {
            (None, None) => a.source_id.cmp(&b.source_id),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(ra), Some(rb)) => {
                for spec in &self.sort_specs {
                    let ka = ra
                        .iter()
                        .find(|(k, _)| *k == spec.field_name)
                        .map_or(Value::Empty, |(_, v)| v.clone());
                    let kb = rb
                        .iter()
                        .find(|(k, _)| *k == spec.field_name)
                        .map_or(Value::Empty, |(_, v)| v.clone());
                    let mut ord = compare_values(&ka, &kb, spec.null_rank);
                    if spec.is_desc {
                        ord = ord.reverse();
                    }
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.source_id.cmp(&b.source_id)
            }
        }
    }

    fn next_merge(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if self.distribution_kind == DistributionKind::AllShards {
            self.sync_shard_topology(ctx);
        }
        loop {
            self.heap.retain(|b| !b.is_finished());
            let Some(idx) = self.top_index() else {
                self.done = true;
                return Ok(false);
            };
            if self.heap[idx].rows.is_empty() {
                let source_id = self.heap[idx].source_id;
                let continuation = self.heap[idx].continuation_key.take();
                let fetch = self.take_fetch_slot(ctx, source_id, continuation);
                match fetch {
                    Ok(None) => return Ok(false),
                    Ok(Some(response)) => {
                        self.heap[idx].continuation_key = response.continuation_key;
                        self.heap[idx].exhausted = self.heap[idx].continuation_key.is_none();
                        self.phase2_rows_seen += response.rows.len() as u64;
                        self.phase2_bytes_seen += response.rows.iter().map(|r| estimate_size(&Value::Record(r.clone()))).sum::<u64>();
                        self.heap[idx].rows.extend(response.rows);
                        continue;
                    }
                    Err(err) if err.is_retryable() => {
                        debug!(source_id, "RECEIVE fetch failed retryably, leaving source queued");
                        // Leave the placeholder in the heap so a retry resumes
                        // at the same source.
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            }
            let row = self.heap[idx].rows.pop_front().expect("checked non-empty above");
            if self.dedup.admit(&row, ctx)? {
                self.emit(ctx, row);
                return Ok(true);
            }
        }
    }

    // --- All-partitions two-phase sort -----------------------------------

    fn advance_phase1(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        let continuation = self.simple.continuation_key.take();
        let Some(response) = self.take_fetch_slot(ctx, 0, continuation)? else {
            return Ok(false);
        };
        if response.part_ids.len() != response.num_results_per_part_id.len() {
            return Err(QueryError::bad_protocol(
                IterOrigin::Receive,
                "all-partitions phase 1: partIds and numResultsPerPartId length mismatch",
            ));
        }
        let mut cursor = 0usize;
        for (&part_id, &count) in response
            .part_ids
            .iter()
            .zip(response.num_results_per_part_id.iter())
        {
            let count = count.max(0) as usize;
            if cursor + count > response.rows.len() {
                return Err(QueryError::bad_protocol(
                    IterOrigin::Receive,
                    "all-partitions phase 1: declared row counts exceed page size",
                ));
            }
            for row in &response.rows[cursor..cursor + count] {
                self.phase1_rows.push((part_id, row.clone()));
            }
            cursor += count;
        }
        if cursor != response.rows.len() {
            return Err(QueryError::bad_protocol(
                IterOrigin::Receive,
                "all-partitions phase 1: declared row counts do not cover the full page",
            ));
        }

        if response.cont_all_part_sort_phase1 {
            if response.continuation_key.is_none() {
                return Err(QueryError::bad_protocol(
                    IterOrigin::Receive,
                    "all-partitions phase 1: missing continuation key before phase 1 completion",
                ));
            }
            self.simple.continuation_key = response.continuation_key;
            return Ok(true);
        }

        // Phase 1 complete: bucket the accumulated rows per partition and
        // seed the phase-2 merge heap.
        for (part_id, row) in self.phase1_rows.drain(..) {
            if let Some(buffer) = self.heap.iter_mut().find(|b| b.source_id == part_id) {
                buffer.rows.push_back(row);
            } else {
                let mut buffer = SourceBuffer::new(part_id);
                buffer.rows.push_back(row);
                self.heap.push(buffer);
            }
        }
        for buffer in &mut self.heap {
            buffer.exhausted = true;
        }
        self.phase = Phase::Two;
        Ok(true)
    }

    /// `floor((memCap - dedupMem) / avgBytesPerRow)`, clamped to
    /// `[MIN_PHASE2_LIMIT, MAX_PHASE2_LIMIT]`. Before any phase-2 row has
    /// been observed, a conservative default average stands in.
    fn phase2_row_limit(&self, ctx: &ExecCtx) -> u32 {
        const DEFAULT_AVG_BYTES: u64 = 256;
        let avg = if self.phase2_rows_seen == 0 {
            DEFAULT_AVG_BYTES
        } else {
            (self.phase2_bytes_seen / self.phase2_rows_seen).max(1)
        };
        let remaining = ctx
            .memory
            .cap_bytes()
            .saturating_sub(ctx.memory.used())
            .saturating_sub(self.dedup.charged_bytes);
        let limit = remaining / avg;
        u32::try_from(limit)
            .unwrap_or(MAX_PHASE2_LIMIT)
            .clamp(MIN_PHASE2_LIMIT, MAX_PHASE2_LIMIT)
    }
}

impl Operator for ReceiveIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if self.done {
            return Ok(false);
        }
        match self.distribution_kind {
            DistributionKind::SinglePartition => self.next_simple(ctx),
            DistributionKind::AllShards => {
                if self.sorted() {
                    self.next_merge(ctx)
                } else {
                    self.next_simple(ctx)
                }
            }
            DistributionKind::AllPartitions => {
                if !self.sorted() {
                    return self.next_simple(ctx);
                }
                loop {
                    if self.phase == Phase::One {
                        if !self.advance_phase1(ctx)? {
                            return Ok(false);
                        }
                        continue;
                    }
                    // Phase 2 uses the same merge machinery as all-shards;
                    // the dynamic row limit only bounds the *next* fetch
                    // request, not anything already buffered.
                    self.options.limit = Some(self.phase2_row_limit(ctx));
                    return self.next_merge(ctx);
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.simple = SourceBuffer::new(0);
        self.heap.clear();
        self.phase = Phase::One;
        self.phase1_rows.clear();
        self.phase2_rows_seen = 0;
        self.phase2_bytes_seen = 0;
        self.dedup.reset(ctx);
        self.done = false;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
