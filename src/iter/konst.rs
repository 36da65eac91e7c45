use crate::iter::{ExecCtx, IterState, Operator};
use crate::value::Value;

///
/// ConstIter
///
/// Emits its literal value once, then terminates.
///

#[derive(Clone, Debug)]
pub struct ConstIter {
    res_pos: i32,
    value: Value,
    state: IterState,
}

impl ConstIter {
    #[must_use]
    pub const fn new(res_pos: i32, value: Value) -> Self {
        Self {
            res_pos,
            value,
            state: IterState::Uninitialized,
        }
    }
}

impl Operator for ConstIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> crate::error::QueryResult<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        ctx.registers.set(self.res_pos, self.value.clone());
        self.state = IterState::Done;
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.state = IterState::Uninitialized;
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
