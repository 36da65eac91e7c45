use crate::error::QueryResult;
use crate::iter::{ExecCtx, Operator};

///
/// VarRefIter
///
/// A pure reference to another iterator's register: the value is produced
/// by whichever iterator owns `name`'s register, so `next` is a no-op that
/// always reports a result is available (the caller only reaches a
/// VAR_REF after its defining iterator has already run this round).
///

#[derive(Clone, Debug)]
pub struct VarRefIter {
    res_pos: i32,
    #[allow(dead_code)]
    name: String,
}

impl VarRefIter {
    #[must_use]
    pub const fn new(res_pos: i32, name: String) -> Self {
        Self { res_pos, name }
    }
}

impl Operator for VarRefIter {
    fn next(&mut self, _ctx: &mut ExecCtx) -> QueryResult<bool> {
        Ok(true)
    }

    fn reset(&mut self, _ctx: &mut ExecCtx, _reset_register: bool) {}

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
