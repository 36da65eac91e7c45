//! SELECT-FROM-WHERE: projection, client-side grouping, offset, limit, and
//! `SELECT *`.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::group::{new_aggregator, Aggregator};
use crate::iter::{eval_non_negative_i32, read_register, ExecCtx, Operator, PlanIter};
use crate::value::wire::write_group_key;
use crate::value::Value;

/// Binary-serialized, numeric-normalized grouping key for a tuple of
/// grouping-column values, so a `Decimal` and a query-equal `Double` land in
/// the same group.
fn group_key(tuple: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_group_key(&mut buf, &Value::Array(tuple.to_vec()));
    buf
}

///
/// SfwIter
///

#[derive(Debug)]
pub struct SfwIter {
    res_pos: i32,
    column_names: Vec<String>,
    num_gb_columns: i32,
    is_select_star: bool,
    columns: Vec<PlanIter>,
    from: PlanIter,
    offset_iter: PlanIter,
    limit_iter: PlanIter,

    opened: bool,
    done: bool,
    exhausted: bool,
    offset: i64,
    limit: i64,

    current_tuple: Option<Vec<Value>>,
    current_key: Option<Vec<u8>>,
    aggregators: Vec<Box<dyn Aggregator>>,
    pending_start: Option<(Vec<Value>, Vec<Value>)>,
}

impl SfwIter {
    pub fn new(
        res_pos: i32,
        column_names: Vec<String>,
        num_gb_columns: i32,
        is_select_star: bool,
        columns: Vec<PlanIter>,
        from: PlanIter,
        offset_iter: PlanIter,
        limit_iter: PlanIter,
    ) -> QueryResult<Self> {
        Ok(Self {
            res_pos,
            column_names,
            num_gb_columns,
            is_select_star,
            columns,
            from,
            offset_iter,
            limit_iter,
            opened: false,
            done: false,
            exhausted: false,
            offset: 0,
            limit: i64::MAX,
            current_tuple: None,
            current_key: None,
            aggregators: Vec::new(),
            pending_start: None,
        })
    }

    fn ensure_opened(&mut self, ctx: &mut ExecCtx) -> QueryResult<()> {
        if self.opened {
            return Ok(());
        }
        self.offset = eval_non_negative_i32(ctx, &mut self.offset_iter, "offset")?.unwrap_or(0);
        self.limit = eval_non_negative_i32(ctx, &mut self.limit_iter, "limit")?.unwrap_or(i64::MAX);
        self.opened = true;
        Ok(())
    }

    pub fn configure_receive(&mut self, statement_id: u64) {
        self.from.configure_receive(statement_id);
        self.offset_iter.configure_receive(statement_id);
        self.limit_iter.configure_receive(statement_id);
        for col in &mut self.columns {
            col.configure_receive(statement_id);
        }
    }

    pub fn configure_options(&mut self, options: &crate::exec::client::ExecutorOptions) {
        self.from.configure_options(options);
        self.offset_iter.configure_options(options);
        self.limit_iter.configure_options(options);
        for col in &mut self.columns {
            col.configure_options(options);
        }
    }

    fn gb_count(&self) -> usize {
        self.num_gb_columns.max(0) as usize
    }

    fn is_grouping(&self) -> bool {
        self.num_gb_columns >= 0
    }

    fn next_ungrouped(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        loop {
            if !self.from.next(ctx)? {
                self.done = true;
                return Ok(false);
            }
            let row = if self.is_select_star {
                let col = &mut self.columns[0];
                if col.next(ctx)? {
                    read_register(ctx, col.res_pos())
                } else {
                    Value::Empty
                }
            } else {
                let mut fields = Vec::with_capacity(self.columns.len());
                for (name, col) in self.column_names.iter().zip(self.columns.iter_mut()) {
                    let value = if col.next(ctx)? {
                        read_register(ctx, col.res_pos())
                    } else {
                        Value::Empty
                    };
                    fields.push((name.clone(), value));
                }
                Value::Record(fields)
            };
            if self.offset > 0 {
                self.offset -= 1;
                continue;
            }
            self.limit -= 1;
            ctx.registers.set(self.res_pos, row);
            return Ok(true);
        }
    }

    fn start_group(&mut self, tuple: Vec<Value>) -> QueryResult<()> {
        let gb_count = self.gb_count();
        self.aggregators = self.columns[gb_count..]
            .iter_mut()
            .map(|col| {
                col.as_aggregate()
                    .map(|(func_code, _)| new_aggregator(func_code))
                    .ok_or_else(|| {
                        QueryError::illegal_state(
                            IterOrigin::Sfw,
                            "non-group-by SFW column in grouping mode is not an aggregate",
                        )
                    })
            })
            .collect::<QueryResult<Vec<_>>>()?;
        self.current_key = Some(group_key(&tuple));
        self.current_tuple = Some(tuple);
        Ok(())
    }

    fn apply_aggregates(&mut self, raw_values: &[Value]) -> QueryResult<()> {
        for (aggregator, value) in self.aggregators.iter_mut().zip(raw_values) {
            aggregator.update(value)?;
        }
        Ok(())
    }

    fn emit_group(&mut self, ctx: &mut ExecCtx, tuple: Vec<Value>) -> bool {
        let mut fields = Vec::with_capacity(self.column_names.len());
        for (name, value) in self.column_names.iter().zip(tuple) {
            fields.push((name.clone(), value));
        }
        for (name, aggregator) in self.column_names[self.gb_count()..]
            .iter()
            .zip(self.aggregators.iter_mut())
        {
            fields.push((name.clone(), aggregator.finish()));
        }
        self.limit -= 1;
        ctx.registers.set(self.res_pos, Value::Record(fields));
        true
    }

    fn next_grouped(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        let gb_count = self.gb_count();
        loop {
            if let Some((tuple, raw_values)) = self.pending_start.take() {
                self.start_group(tuple)?;
                self.apply_aggregates(&raw_values)?;
                continue;
            }

            if self.exhausted {
                let Some(tuple) = self.current_tuple.take() else {
                    self.done = true;
                    return Ok(false);
                };
                if *ctx.need_user_continuation || self.offset > 0 {
                    self.current_tuple = Some(tuple);
                    return Ok(false);
                }
                self.done = true;
                return Ok(self.emit_group(ctx, tuple));
            }

            if !self.from.next(ctx)? {
                self.exhausted = true;
                continue;
            }

            let (gb_cols, aggr_cols) = self.columns.split_at_mut(gb_count);

            let mut tuple = Vec::with_capacity(gb_count);
            let mut skip = false;
            for col in gb_cols {
                if !col.next(ctx)? {
                    skip = true;
                    break;
                }
                let value = read_register(ctx, col.res_pos());
                if matches!(value, Value::Empty) {
                    skip = true;
                    break;
                }
                tuple.push(value);
            }
            if skip {
                continue;
            }

            let mut raw_values = Vec::with_capacity(aggr_cols.len());
            for col in aggr_cols.iter_mut() {
                let (_, input) = col.as_aggregate().ok_or_else(|| {
                    QueryError::illegal_state(IterOrigin::Sfw, "expected an aggregate SFW column")
                })?;
                let value = if input.next(ctx)? {
                    read_register(ctx, input.res_pos())
                } else {
                    Value::Empty
                };
                raw_values.push(value);
            }

            let incoming_key = group_key(&tuple);
            match &self.current_key {
                None => {
                    self.start_group(tuple)?;
                    self.apply_aggregates(&raw_values)?;
                }
                Some(current) if *current == incoming_key => {
                    self.apply_aggregates(&raw_values)?;
                }
                Some(_) => {
                    let old = self.current_tuple.take().unwrap();
                    self.current_key = None;
                    self.pending_start = Some((tuple, raw_values));
                    if *ctx.need_user_continuation {
                        continue;
                    }
                    if self.offset > 0 {
                        self.offset -= 1;
                        continue;
                    }
                    return Ok(self.emit_group(ctx, old));
                }
            }
        }
    }
}

impl Operator for SfwIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        self.ensure_opened(ctx)?;
        if self.done || self.limit <= 0 {
            self.done = true;
            return Ok(false);
        }
        if self.is_grouping() {
            self.next_grouped(ctx)
        } else {
            self.next_ungrouped(ctx)
        }
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.from.reset(ctx, true);
        self.offset_iter.reset(ctx, true);
        self.limit_iter.reset(ctx, true);
        for col in &mut self.columns {
            col.reset(ctx, true);
        }
        self.opened = false;
        self.done = false;
        self.exhausted = false;
        self.current_tuple = None;
        self.current_key = None;
        self.aggregators.clear();
        self.pending_start = None;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
