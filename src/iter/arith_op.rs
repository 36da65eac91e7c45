use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::iter::{read_register, ExecCtx, Operator, PlanIter};
use crate::plan::FuncCode;
use crate::value::coercion::{as_decimal, as_f64, promote, NumericRepr};
use crate::value::Value;
use rust_decimal::Decimal;

///
/// ArithOpIter
///
/// Applies a left-to-right sequence of `+`/`-` or `*`/`/` operators across
/// its argument iterators, promoting through the numeric lattice. Division
/// always promotes at least to `Double` so that `int / int` is real
/// division rather than a silent truncation.
///

#[derive(Clone, Debug)]
pub struct ArithOpIter {
    res_pos: i32,
    func_code: FuncCode,
    args: Vec<PlanIter>,
    ops: Vec<u8>,
}

impl ArithOpIter {
    #[must_use]
    pub const fn new(res_pos: i32, func_code: FuncCode, args: Vec<PlanIter>, ops: Vec<u8>) -> Self {
        Self {
            res_pos,
            func_code,
            args,
            ops,
        }
    }

    fn has_division(&self) -> bool {
        self.ops.contains(&b'/')
    }

    pub fn args_mut(&mut self) -> &mut [PlanIter] {
        &mut self.args
    }
}

impl Operator for ArithOpIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &mut self.args {
            if !arg.next(ctx)? {
                return Ok(false);
            }
            values.push(read_register(ctx, arg.res_pos()));
        }

        let mut repr = NumericRepr::Int;
        for value in &values {
            let Some(r) = NumericRepr::of(value) else {
                return Err(QueryError::illegal_state(
                    IterOrigin::ArithOp,
                    "ARITH_OP argument is not numeric",
                ));
            };
            repr = promote(repr, r);
        }
        if self.has_division() && repr < NumericRepr::Double {
            repr = NumericRepr::Double;
        }

        let result = match repr {
            NumericRepr::Decimal => Value::Number(self.fold_decimal(&values)?),
            NumericRepr::Double => Value::Double(self.fold_f64(&values)?),
            NumericRepr::Long => Value::Long(self.fold_i64(&values)?),
            NumericRepr::Int => Value::Int(self.fold_i64(&values)? as i32),
        };
        ctx.registers.set(self.res_pos, result);
        Ok(true)
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        for arg in &mut self.args {
            arg.reset(ctx, true);
        }
        if reset_register {
            ctx.registers.clear(self.res_pos);
        }
    }

    fn res_pos(&self) -> i32 {
        self.res_pos
    }
}

impl ArithOpIter {
    fn init(&self) -> bool {
        matches!(self.func_code, FuncCode::OpAddSub)
    }

    fn fold_decimal(&self, values: &[Value]) -> QueryResult<Decimal> {
        let mut acc = if self.init() { Decimal::ZERO } else { Decimal::ONE };
        for (value, &op) in values.iter().zip(&self.ops) {
            let d = as_decimal(value).ok_or_else(|| {
                QueryError::illegal_state(IterOrigin::ArithOp, "argument cannot be represented as NUMBER")
            })?;
            acc = apply_decimal(acc, op, d);
        }
        Ok(acc)
    }

    fn fold_f64(&self, values: &[Value]) -> QueryResult<f64> {
        let mut acc = if self.init() { 0.0 } else { 1.0 };
        for (value, &op) in values.iter().zip(&self.ops) {
            let v = as_f64(value).ok_or_else(|| {
                QueryError::illegal_state(IterOrigin::ArithOp, "argument cannot be widened to a double")
            })?;
            acc = apply_f64(acc, op, v);
        }
        Ok(acc)
    }

    fn fold_i64(&self, values: &[Value]) -> QueryResult<i64> {
        let mut acc: i64 = if self.init() { 0 } else { 1 };
        for (value, &op) in values.iter().zip(&self.ops) {
            let v = match value {
                Value::Int(v) => i64::from(*v),
                Value::Long(v) => *v,
                _ => {
                    return Err(QueryError::illegal_state(
                        IterOrigin::ArithOp,
                        "argument is not an integer",
                    ))
                }
            };
            acc = apply_i64(acc, op, v);
        }
        Ok(acc)
    }
}

fn apply_decimal(acc: Decimal, op: u8, v: Decimal) -> Decimal {
    match op {
        b'+' => acc + v,
        b'-' => acc - v,
        b'*' => acc * v,
        b'/' => acc / v,
        _ => acc,
    }
}

fn apply_f64(acc: f64, op: u8, v: f64) -> f64 {
    match op {
        b'+' => acc + v,
        b'-' => acc - v,
        b'*' => acc * v,
        b'/' => acc / v,
        _ => acc,
    }
}

fn apply_i64(acc: i64, op: u8, v: i64) -> i64 {
    match op {
        b'+' => acc + v,
        b'-' => acc - v,
        b'*' => acc * v,
        b'/' => acc / v,
        _ => acc,
    }
}
