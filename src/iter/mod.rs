//! The iterator tree: one variant per operator kind, dispatched through a
//! small shared trait, pulling values through a register file owned by the
//! executor.

pub mod aggr;
pub mod arith_op;
pub mod ext_var;
pub mod field_step;
pub mod group;
pub mod konst;
pub mod receive;
pub mod register;
pub mod sfw;
pub mod sort;
pub mod var_ref;

use crate::error::QueryResult;
use crate::exec::client::QueryClient;
use crate::exec::memory::MemoryCounter;
use crate::value::Value;
use register::RegisterFile;

///
/// IterState
///
/// Lifecycle common to the scalar and aggregate iterators. SORT and SFW
/// track additional, operator-specific state on top of this.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IterState {
    #[default]
    Uninitialized,
    Open,
    Running,
    Done,
}

impl IterState {
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Everything an operator needs at each `next` call: its register file, the
/// bound external variables, the memory counter, continuation bookkeeping,
/// and the RPC facade RECEIVE uses to fetch pages.
pub struct ExecCtx<'a> {
    pub registers: &'a mut RegisterFile,
    pub ext_vars: &'a [Value],
    pub memory: &'a mut MemoryCounter,
    pub fetch_done: &'a mut bool,
    pub need_user_continuation: &'a mut bool,
    pub client: &'a mut dyn QueryClient,
}

/// Shared contract every operator implements. `next` pulls (at most) one
/// result and reports whether one is available; the result itself, for
/// non-aggregating iterators, is left in the iterator's register.
/// Aggregating iterators (FN_SUM, FN_MIN_MAX, and the group aggregators
/// inside SFW) keep their running value internally instead.
pub trait Operator {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool>;

    /// Clears the iterator's own state. `reset_register` additionally
    /// clears the slot the iterator owns in the register file; SORT uses
    /// `false` to resume draining across user calls.
    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool);

    fn res_pos(&self) -> i32;
}

/// Read this iterator's current register slot. Iterators that pulled no
/// result leave the slot at its default, [`Value::Empty`] is used by the
/// common "no result" convention instead.
pub fn read_register(ctx: &ExecCtx, pos: i32) -> Value {
    ctx.registers.get(pos).clone()
}

pub fn write_register(ctx: &mut ExecCtx, pos: i32, value: Value) {
    ctx.registers.set(pos, value);
}

use crate::error::{IterOrigin, QueryError};
use crate::plan::PlanNode;
use aggr::{FnAggrIter, FnMinMaxIter};
use arith_op::ArithOpIter;
use ext_var::ExtVarIter;
use field_step::FieldStepIter;
use konst::ConstIter;
use receive::ReceiveIter;
use sfw::SfwIter;
use sort::SortIter;
use var_ref::VarRefIter;

/// The full operator tree, dispatched through [`Operator`]. One variant
/// per plan-iterator kind, plus `Empty` for an absent optional step.
#[derive(Debug)]
pub enum PlanIter {
    Empty,
    Const(ConstIter),
    VarRef(VarRefIter),
    ExtVarRef(ExtVarIter),
    FieldStep(FieldStepIter),
    ArithOp(ArithOpIter),
    FnAggr(FnAggrIter),
    FnMinMax(FnMinMaxIter),
    Sort(SortIter),
    Sfw(Box<SfwIter>),
    Recv(Box<ReceiveIter>),
}

impl Operator for PlanIter {
    fn next(&mut self, ctx: &mut ExecCtx) -> QueryResult<bool> {
        match self {
            Self::Empty => Ok(false),
            Self::Const(it) => it.next(ctx),
            Self::VarRef(it) => it.next(ctx),
            Self::ExtVarRef(it) => it.next(ctx),
            Self::FieldStep(it) => it.next(ctx),
            Self::ArithOp(it) => it.next(ctx),
            Self::FnAggr(it) => it.next(ctx),
            Self::FnMinMax(it) => it.next(ctx),
            Self::Sort(it) => it.next(ctx),
            Self::Sfw(it) => it.next(ctx),
            Self::Recv(it) => it.next(ctx),
        }
    }

    fn reset(&mut self, ctx: &mut ExecCtx, reset_register: bool) {
        match self {
            Self::Empty => {}
            Self::Const(it) => it.reset(ctx, reset_register),
            Self::VarRef(it) => it.reset(ctx, reset_register),
            Self::ExtVarRef(it) => it.reset(ctx, reset_register),
            Self::FieldStep(it) => it.reset(ctx, reset_register),
            Self::ArithOp(it) => it.reset(ctx, reset_register),
            Self::FnAggr(it) => it.reset(ctx, reset_register),
            Self::FnMinMax(it) => it.reset(ctx, reset_register),
            Self::Sort(it) => it.reset(ctx, reset_register),
            Self::Sfw(it) => it.reset(ctx, reset_register),
            Self::Recv(it) => it.reset(ctx, reset_register),
        }
    }

    fn res_pos(&self) -> i32 {
        match self {
            Self::Empty => -1,
            Self::Const(it) => it.res_pos(),
            Self::VarRef(it) => it.res_pos(),
            Self::ExtVarRef(it) => it.res_pos(),
            Self::FieldStep(it) => it.res_pos(),
            Self::ArithOp(it) => it.res_pos(),
            Self::FnAggr(it) => it.res_pos(),
            Self::FnMinMax(it) => it.res_pos(),
            Self::Sort(it) => it.res_pos(),
            Self::Sfw(it) => it.res_pos(),
            Self::Recv(it) => it.res_pos(),
        }
    }
}

impl PlanIter {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// If this node is a grouped-aggregate column (FN_SUM-family or
    /// FN_MIN_MAX), expose its function code and argument iterator so the
    /// SFW grouping engine can drive a fresh per-group [`group::Aggregator`]
    /// instead of running the node's own whole-stream loop.
    pub fn as_aggregate(&mut self) -> Option<(crate::plan::FuncCode, &mut PlanIter)> {
        match self {
            Self::FnAggr(it) => Some((it.func_code(), it.input_mut())),
            Self::FnMinMax(it) => Some((it.func_code(), it.input_mut())),
            _ => None,
        }
    }

    /// Walk the tree, pointing every RECV node at the owning prepared
    /// statement's id. Plan bytes carry no statement identity of their own.
    pub fn configure_receive(&mut self, statement_id: u64) {
        match self {
            Self::Empty | Self::Const(_) | Self::VarRef(_) | Self::ExtVarRef(_) => {}
            Self::FieldStep(it) => it.input_mut().configure_receive(statement_id),
            Self::ArithOp(it) => {
                for arg in it.args_mut() {
                    arg.configure_receive(statement_id);
                }
            }
            Self::FnAggr(it) => it.input_mut().configure_receive(statement_id),
            Self::FnMinMax(it) => it.input_mut().configure_receive(statement_id),
            Self::Sort(it) => it.input_mut().configure_receive(statement_id),
            Self::Sfw(it) => it.configure_receive(statement_id),
            Self::Recv(it) => it.set_statement_id(statement_id),
        }
    }

    /// Walk the tree, handing every RECV node the caller-supplied
    /// `ExecutorOptions` so consistency, timeout, and continuation key
    /// actually reach the server-facing `FetchRequest`.
    pub fn configure_options(&mut self, options: &crate::exec::client::ExecutorOptions) {
        match self {
            Self::Empty | Self::Const(_) | Self::VarRef(_) | Self::ExtVarRef(_) => {}
            Self::FieldStep(it) => it.input_mut().configure_options(options),
            Self::ArithOp(it) => {
                for arg in it.args_mut() {
                    arg.configure_options(options);
                }
            }
            Self::FnAggr(it) => it.input_mut().configure_options(options),
            Self::FnMinMax(it) => it.input_mut().configure_options(options),
            Self::Sort(it) => it.input_mut().configure_options(options),
            Self::Sfw(it) => it.configure_options(options),
            Self::Recv(it) => it.set_options(options.clone()),
        }
    }
}

/// Build the executable operator tree from a decoded [`PlanNode`].
pub fn build(node: &PlanNode) -> QueryResult<PlanIter> {
    let iter = match node {
        PlanNode::Empty => PlanIter::Empty,
        PlanNode::Const { res_pos, value, .. } => PlanIter::Const(ConstIter::new(*res_pos, value.clone())),
        PlanNode::VarRef { res_pos, name, .. } => PlanIter::VarRef(VarRefIter::new(*res_pos, name.clone())),
        PlanNode::ExternalVarRef {
            res_pos,
            name,
            index,
            ..
        } => PlanIter::ExtVarRef(ExtVarIter::new(*res_pos, name.clone(), *index)),
        PlanNode::FieldStep {
            res_pos,
            input,
            field_name,
            ..
        } => PlanIter::FieldStep(FieldStepIter::new(*res_pos, build(input)?, field_name.clone())),
        PlanNode::ArithOp {
            res_pos,
            func_code,
            args,
            ops,
            ..
        } => {
            let args = args.iter().map(build).collect::<QueryResult<Vec<_>>>()?;
            PlanIter::ArithOp(ArithOpIter::new(*res_pos, *func_code, args, ops.clone()))
        }
        PlanNode::FnSum {
            res_pos,
            func_code,
            input,
            ..
        } => PlanIter::FnAggr(FnAggrIter::new(*res_pos, *func_code, build(input)?)),
        PlanNode::FnMinMax {
            res_pos,
            func_code,
            input,
            ..
        } => PlanIter::FnMinMax(FnMinMaxIter::new(*res_pos, *func_code, build(input)?)?),
        PlanNode::Sort {
            res_pos,
            input,
            sort_specs,
            ..
        } => PlanIter::Sort(SortIter::new(*res_pos, build(input)?, sort_specs.clone())),
        PlanNode::Recv {
            res_pos,
            distribution_kind,
            sort_specs,
            prim_key_fields,
            ..
        } => PlanIter::Recv(Box::new(ReceiveIter::new(
            *res_pos,
            *distribution_kind,
            sort_specs.clone(),
            prim_key_fields.clone(),
        ))),
        PlanNode::Sfw {
            res_pos,
            column_names,
            num_gb_columns,
            is_select_star,
            column_steps,
            from_step,
            offset_step,
            limit_step,
            ..
        } => {
            let columns = column_steps
                .iter()
                .map(build)
                .collect::<QueryResult<Vec<_>>>()?;
            let from = build(from_step)?;
            let offset = build(offset_step)?;
            let limit = build(limit_step)?;
            PlanIter::Sfw(Box::new(sfw::SfwIter::new(
                *res_pos,
                column_names.clone(),
                *num_gb_columns,
                *is_select_star,
                columns,
                from,
                offset,
                limit,
            )?))
        }
    };
    Ok(iter)
}

/// Evaluate an optional synchronous offset/limit sub-iterator to a
/// non-negative integer, returning `None` when the step is absent
/// (meaning "no bound"). Raises "illegal-argument" with `field` named on a
/// non-integer or negative value.
pub fn eval_non_negative_i32(
    ctx: &mut ExecCtx,
    iter: &mut PlanIter,
    field: &str,
) -> QueryResult<Option<i64>> {
    if iter.is_empty() {
        return Ok(None);
    }
    if !iter.next(ctx)? {
        return Ok(None);
    }
    let value = read_register(ctx, iter.res_pos());
    let n = match value {
        Value::Int(v) => i64::from(v),
        Value::Long(v) => v,
        other => {
            return Err(QueryError::illegal_argument(
                IterOrigin::Sfw,
                format!("{field} must be an integer, got {other:?}"),
            ))
        }
    };
    if n < 0 {
        return Err(QueryError::illegal_argument(
            IterOrigin::Sfw,
            format!("{field} must be non-negative, got {n}"),
        ));
    }
    Ok(Some(n))
}
