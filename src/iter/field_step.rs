use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::{read_register, ExecCtx, Operator, PlanIter};
use crate::value::Value;

///
/// FieldStepIter
///
/// Reads a named field out of its input's object (map or record). A
/// missing field, or a field whose value is EMPTY, is "no result" for this
/// round rather than an error; a non-object input is an engine bug.
///

#[derive(Clone, Debug)]
pub struct FieldStepIter {
    res_pos: i32,
    input: Box<PlanIter>,
    field_name: String,
}

impl FieldStepIter {
    #[must_use]
    pub fn new(res_pos: i32, input: PlanIter, field_name: String) -> Self {
        Self {
            res_pos,
            input: Box::new(input),
            field_name,
        }
    }

    pub fn input_mut(&mut self) -> &mut PlanIter {
        &mut self.input
    }
}

impl Operator for FieldStepIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        if !self.input.next(ctx)? {
            return Ok(false);
        }
        let input_value = read_register(ctx, self.input.res_pos());
        if input_value.is_absent() {
            return Ok(false);
        }
        if !matches!(input_value, Value::Map(_) | Value::Record(_)) {
            return Err(QueryError::illegal_state(
                IterOrigin::FieldStep,
                format!("FIELD_STEP input for '{}' is not an object", self.field_name),
            ));
        }
        let field = input_value.get_field(&self.field_name);
        if field.is_absent() {
            return Ok(false);
        }
        ctx.registers.set(self.res_pos, field);
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        self.input.reset(ctx, true);
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}
