use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::{ExecCtx, IterState, Operator};

///
/// ExtVarIter
///
/// Emits the bound value for a declared external variable once, then
/// terminates. An unbound variable is an "illegal-state" error naming it.
///

#[derive(Clone, Debug)]
pub struct ExtVarIter {
    res_pos: i32,
    name: String,
    index: i32,
    state: IterState,
}

impl ExtVarIter {
    #[must_use]
    pub const fn new(res_pos: i32, name: String, index: i32) -> Self {
        Self {
            res_pos,
            name,
            index,
            state: IterState::Uninitialized,
        }
    }
}

impl Operator for ExtVarIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if self.state.is_done() {
            return Ok(false);
        }
        let value = ctx.ext_vars.get(self.index as usize).ok_or_else(|| {
            QueryError::illegal_state(
                IterOrigin::ExtVarRef,
                format!("no binding for external variable '{}'", self.name),
            )
        })?;
        ctx.registers.set(self.res_pos, value.clone());
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
