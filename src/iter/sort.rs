use crate::error::QueryResult;
use crate::exec::memory::estimate_size;
use crate::iter::{read_register, ExecCtx, Operator, PlanIter};
use crate::plan::SortSpec;
use crate::value::{compare_values, Value};
use std::collections::VecDeque;
use tracing::debug;

///
/// SortState
///
/// FILLING pulls the whole input into a buffer; once exhausted, a single
/// stable sort runs and the iterator moves to DRAINING, handing rows out
/// one at a time and releasing their memory as they go.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum SortState {
    #[default]
    Filling,
    Draining,
    Done,
}

///
/// SortIter
///
/// Buffer-and-sort over the sort-specs comparator. EMPTY is converted to
/// SQL NULL only at drain time (when a row is handed out), matching the
/// reference driver's behavior rather than normalizing during FILLING.
///

#[derive(Clone, Debug)]
pub struct SortIter {
    res_pos: i32,
    input: Box<PlanIter>,
    sort_specs: Vec<SortSpec>,
    state: SortState,
    buffer: VecDeque<(Value, u64)>,
}

impl SortIter {
    #[must_use]
    pub fn new(res_pos: i32, input: PlanIter, sort_specs: Vec<SortSpec>) -> Self {
        Self {
            res_pos,
            input: Box::new(input),
            sort_specs,
            state: SortState::Filling,
            buffer: VecDeque::new(),
        }
    }

    pub fn input_mut(&mut self) -> &mut PlanIter {
        &mut self.input
    }

    fn sort_key(&self, row: &Value, field: &str) -> Value {
        row.get_field(field)
    }

    fn compare_rows(&self, a: &Value, b: &Value) -> std::cmp::Ordering {
        for spec in &self.sort_specs {
            let ka = self.sort_key(a, &spec.field_name);
            let kb = self.sort_key(b, &spec.field_name);
            let mut ordering = compare_values(&ka, &kb, spec.null_rank);
            if spec.is_desc {
                ordering = ordering.reverse();
            }
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl Operator for SortIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        loop {
            match self.state {
                SortState::Done => return Ok(false),
                SortState::Draining => {
                    let Some((row, size)) = self.buffer.pop_front() else {
                        self.state = SortState::Done;
                        continue;
                    };
                    ctx.memory.dec(size);
                    ctx.registers.set(self.res_pos, row.empty_to_null());
                    return Ok(true);
                }
                SortState::Filling => {
                    if *ctx.need_user_continuation {
                        return Ok(false);
                    }
                    if self.input.next(ctx)? {
                        let row = read_register(ctx, self.input.res_pos());
                        let size = estimate_size(&row);
                        ctx.memory.inc(size)?;
                        self.buffer.push_back((row, size));
                        continue;
                    }
                    let mut rows: Vec<(Value, u64)> = self.buffer.drain(..).collect();
                    rows.sort_by(|(a, _), (b, _)| self.compare_rows(a, b));
                    debug!(row_count = rows.len(), "SORT filled, transitioning to draining");
                    self.buffer = rows.into_iter().collect();
                    self.state = SortState::Draining;
                }
            }
        }
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        for (_, size) in self.buffer.drain(..) {
            ctx.memory.dec(size);
        }
        self.input.reset(ctx, true);
        self.state = SortState::Filling;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
