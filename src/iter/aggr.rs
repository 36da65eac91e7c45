//! Whole-stream scalar aggregators: FN_SUM (which also covers the COUNT*
//! and ARRAY_COLLECT* variants via its function code) and FN_MIN_MAX.
//! Unlike the grouping engine in [`crate::iter::group`], these consume
//! their entire input in one `next` call and emit a single result.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::group::{new_aggregator, Aggregator};
use crate::iter::{read_register, ExecCtx, IterState, Operator, PlanIter};
use crate::plan::FuncCode;
use crate::value::{compare_values, NullRank, Value};

///
/// FnAggrIter
///
/// General aggregate-function iterator: SUM, COUNT, COUNT_STAR,
/// COUNT_NUMBERS, ARRAY_COLLECT, or ARRAY_COLLECT_DISTINCT over its entire
/// input stream.
///

#[derive(Debug)]
pub struct FnAggrIter {
    res_pos: i32,
    func_code: FuncCode,
    input: Box<PlanIter>,
    state: IterState,
    aggregator: Option<Box<dyn Aggregator>>,
}

impl FnAggrIter {
    #[must_use]
    pub fn new(res_pos: i32, func_code: FuncCode, input: PlanIter) -> Self {
        Self {
            res_pos,
            func_code,
            input: Box::new(input),
            state: IterState::Uninitialized,
            aggregator: None,
        }
    }
}

impl FnAggrIter {
    #[must_use]
    pub const fn func_code(&self) -> FuncCode {
        self.func_code
    }

    pub fn input_mut(&mut self) -> &mut PlanIter {
        &mut self.input
    }
}

impl Operator for FnAggrIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        let aggregator = self
            .aggregator
            .get_or_insert_with(|| new_aggregator(self.func_code));
        while self.input.next(ctx)? {
            let value = read_register(ctx, self.input.res_pos());
            aggregator.update(&value)?;
        }
        if *ctx.need_user_continuation {
            return Ok(false);
        }
        let mut aggregator = self.aggregator.take().expect("set above");
        ctx.registers.set(self.res_pos, aggregator.finish());
        self.state = IterState::Done;
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.input.reset(ctx, true);
        self.state = IterState::Uninitialized;
        self.aggregator = None;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}

///
/// FnMinMaxIter
///
/// Aggregates its entire input stream down to a single MIN or MAX; values
/// that can't be compared (incomparable types) are skipped rather than
/// raising an error.
///

#[derive(Debug)]
pub struct FnMinMaxIter {
    res_pos: i32,
    is_max: bool,
    input: Box<PlanIter>,
    state: IterState,
    best: Value,
}

impl FnMinMaxIter {
    #[must_use]
    pub fn new(res_pos: i32, func_code: FuncCode, input: PlanIter) -> QueryResult<Self> {
        let is_max = match func_code {
            FuncCode::FnMax => true,
            FuncCode::FnMin => false,
            other => {
                return Err(QueryError::illegal_state(
                    IterOrigin::FnMinMax,
                    format!("FN_MIN_MAX constructed with function code {other:?}"),
                ))
            }
        };
        Ok(Self {
            res_pos,
            is_max,
            input: Box::new(input),
            state: IterState::Uninitialized,
            best: Value::Null,
        })
    }
}

impl FnMinMaxIter {
    #[must_use]
    pub const fn func_code(&self) -> FuncCode {
        if self.is_max {
            FuncCode::FnMax
        } else {
            FuncCode::FnMin
        }
    }

    pub fn input_mut(&mut self) -> &mut PlanIter {
        &mut self.input
    }
}

impl Operator for FnMinMaxIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        while self.input.next(ctx)? {
            let value = read_register(ctx, self.input.res_pos());
            if value.is_absent() || !comparable(&value) {
                continue;
            }
            if self.best.is_absent() {
                self.best = value;
                continue;
            }
            let cmp = compare_values(&value, &self.best, NullRank::Last);
            let take = if self.is_max {
                cmp == std::cmp::Ordering::Greater
            } else {
                cmp == std::cmp::Ordering::Less
            };
            if take {
                self.best = value;
            }
        }
        if *ctx.need_user_continuation {
            return Ok(false);
        }
        ctx.registers.set(self.res_pos, std::mem::replace(&mut self.best, Value::Null));
        self.state = IterState::Done;
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.input.reset(ctx, true);
        self.state = IterState::Uninitialized;
        self.best = Value::Null;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}

fn comparable(value: &Value) -> bool {
    !matches!(value, Value::Map(_) | Value::Record(_))
}
