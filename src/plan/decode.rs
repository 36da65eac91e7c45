//! Decodes a server-sent plan byte buffer into a tree of [`PlanNode`]s.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::plan::reader::Reader;
use crate::plan::{DistributionKind, FuncCode, Location, PlanIterKind, SortSpec};
use crate::value::{read_value, NullRank, Value};

/// A decoded, validated operator-tree node. `resPos`/`exprLoc` are common to
/// every non-empty node; the rest of the fields are kind-specific and are
/// left default (empty/zero) on kinds that don't use them.
#[derive(Clone, Debug)]
pub enum PlanNode {
    /// An absent optional step (wire tag -1).
    Empty,
    Const {
        res_pos: i32,
        loc: Location,
        value: Value,
    },
    VarRef {
        res_pos: i32,
        loc: Location,
        name: String,
    },
    ExternalVarRef {
        res_pos: i32,
        loc: Location,
        name: String,
        index: i32,
    },
    FieldStep {
        res_pos: i32,
        loc: Location,
        input: Box<PlanNode>,
        field_name: String,
    },
    ArithOp {
        res_pos: i32,
        loc: Location,
        func_code: FuncCode,
        args: Vec<PlanNode>,
        ops: Vec<u8>,
    },
    FnMinMax {
        res_pos: i32,
        loc: Location,
        func_code: FuncCode,
        input: Box<PlanNode>,
    },
    /// General-purpose aggregate-function node: which aggregate to compute
    /// (SUM, a COUNT variant, or an ARRAY_COLLECT variant) is carried in
    /// `func_code` rather than split across separate wire kinds.
    FnSum {
        res_pos: i32,
        loc: Location,
        func_code: FuncCode,
        input: Box<PlanNode>,
    },
    Sort {
        res_pos: i32,
        loc: Location,
        input: Box<PlanNode>,
        sort_specs: Vec<SortSpec>,
    },
    Recv {
        res_pos: i32,
        loc: Location,
        distribution_kind: DistributionKind,
        sort_specs: Vec<SortSpec>,
        prim_key_fields: Vec<String>,
    },
    Sfw {
        res_pos: i32,
        loc: Location,
        column_names: Vec<String>,
        num_gb_columns: i32,
        from_var_name: String,
        is_select_star: bool,
        column_steps: Vec<PlanNode>,
        from_step: Box<PlanNode>,
        offset_step: Box<PlanNode>,
        limit_step: Box<PlanNode>,
    },
}

impl PlanNode {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn res_pos(&self) -> Option<i32> {
        match self {
            Self::Empty => None,
            Self::Const { res_pos, .. }
            | Self::VarRef { res_pos, .. }
            | Self::ExternalVarRef { res_pos, .. }
            | Self::FieldStep { res_pos, .. }
            | Self::ArithOp { res_pos, .. }
            | Self::FnMinMax { res_pos, .. }
            | Self::FnSum { res_pos, .. }
            | Self::Sort { res_pos, .. }
            | Self::Recv { res_pos, .. }
            | Self::Sfw { res_pos, .. } => Some(*res_pos),
        }
    }

    /// A node is synchronous unless it is (or, transitively, contains as its
    /// own root) the one asynchronous operator, RECV.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        !matches!(self, Self::Recv { .. })
    }
}

struct CommonHeader {
    res_pos: i32,
    loc: Location,
}

fn read_common_header(r: &mut Reader) -> QueryResult<CommonHeader> {
    let res_pos = r.read_i32()?;
    let _state_pos = r.read_i32()?;
    let loc = Location::from_reader(r)?;
    Ok(CommonHeader { res_pos, loc })
}

fn read_sort_specs(r: &mut Reader) -> QueryResult<Vec<SortSpec>> {
    let field_names = r.read_string_array()?;
    let len = r.read_i32()?;
    let mut specs = Vec::new();
    if len > 0 {
        for _ in 0..len {
            let is_desc = r.read_bool()?;
            let nulls_lowest = r.read_bool()?;
            specs.push((is_desc, nulls_lowest));
        }
    }
    if specs.len() != field_names.len() {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            format!(
                "sort-spec arrays disagree in length: {} field names, {} specs",
                field_names.len(),
                specs.len()
            ),
        ));
    }
    Ok(field_names
        .into_iter()
        .zip(specs)
        .map(|(field_name, (is_desc, nulls_lowest))| SortSpec {
            field_name,
            is_desc,
            null_rank: NullRank::from_nulls_lowest(nulls_lowest),
        })
        .collect())
}

/// Decode a single tagged step, which may be the -1 "absent" sentinel.
pub fn decode_plan(r: &mut Reader) -> QueryResult<PlanNode> {
    let tag = i32::from(r.read_byte()? as i8);
    let kind = PlanIterKind::from_wire(tag)?;
    if kind == PlanIterKind::Empty {
        return Ok(PlanNode::Empty);
    }
    let header = read_common_header(r)?;
    let node = match kind {
        PlanIterKind::Empty => unreachable!(),
        PlanIterKind::Const => PlanNode::Const {
            res_pos: header.res_pos,
            loc: header.loc,
            value: read_value(r)?,
        },
        PlanIterKind::VarRef => PlanNode::VarRef {
            res_pos: header.res_pos,
            loc: header.loc,
            name: r.read_string()?,
        },
        PlanIterKind::ExternalVarRef => {
            let name = r.read_string()?;
            let index = r.read_i32_non_negative("externalVarIndex")?;
            PlanNode::ExternalVarRef {
                res_pos: header.res_pos,
                loc: header.loc,
                name,
                index,
            }
        }
        PlanIterKind::FieldStep => {
            let input = decode_plan(r)?;
            let field_name = r.read_string()?;
            PlanNode::FieldStep {
                res_pos: header.res_pos,
                loc: header.loc,
                input: Box::new(input),
                field_name,
            }
        }
        PlanIterKind::ArithOp => {
            let func_code = FuncCode::from_wire(r.read_i32()?)?;
            let args = decode_plan_array(r)?;
            let ops = r.read_string()?.into_bytes();
            let node = PlanNode::ArithOp {
                res_pos: header.res_pos,
                loc: header.loc,
                func_code,
                args,
                ops,
            };
            validate_arith_op(&node)?;
            node
        }
        PlanIterKind::Sfw => {
            let column_names = r.read_string_array()?;
            let num_gb_columns = r.read_i32()?;
            let from_var_name = r.read_string()?;
            let is_select_star = r.read_bool()?;
            let column_steps = decode_plan_array(r)?;
            let from_step = decode_plan(r)?;
            let offset_step = decode_plan(r)?;
            let limit_step = decode_plan(r)?;
            let node = PlanNode::Sfw {
                res_pos: header.res_pos,
                loc: header.loc,
                column_names,
                num_gb_columns,
                from_var_name,
                is_select_star,
                column_steps,
                from_step: Box::new(from_step),
                offset_step: Box::new(offset_step),
                limit_step: Box::new(limit_step),
            };
            validate_sfw(&node)?;
            node
        }
        PlanIterKind::Recv => {
            let distribution_kind = DistributionKind::from_wire(r.read_i32()?)?;
            let sort_specs = read_sort_specs(r)?;
            let prim_key_fields = r.read_string_array()?;
            PlanNode::Recv {
                res_pos: header.res_pos,
                loc: header.loc,
                distribution_kind,
                sort_specs,
                prim_key_fields,
            }
        }
        PlanIterKind::FnSum => {
            let func_code = FuncCode::from_wire(r.read_i32()?)?;
            if !matches!(
                func_code,
                FuncCode::FnSum
                    | FuncCode::FnCountStar
                    | FuncCode::FnCount
                    | FuncCode::FnCountNumbers
                    | FuncCode::FnArrayCollect
                    | FuncCode::FnArrayCollectDistinct
            ) {
                return Err(QueryError::bad_protocol(
                    IterOrigin::Deserializer,
                    format!("FN_SUM does not permit function code {func_code:?}"),
                ));
            }
            let input = decode_plan(r)?;
            PlanNode::FnSum {
                res_pos: header.res_pos,
                loc: header.loc,
                func_code,
                input: Box::new(input),
            }
        }
        PlanIterKind::FnMinMax => {
            let func_code = FuncCode::from_wire(r.read_i32()?)?;
            if !matches!(func_code, FuncCode::FnMin | FuncCode::FnMax) {
                return Err(QueryError::bad_protocol(
                    IterOrigin::Deserializer,
                    format!("FN_MIN_MAX does not permit function code {func_code:?}"),
                ));
            }
            let input = decode_plan(r)?;
            PlanNode::FnMinMax {
                res_pos: header.res_pos,
                loc: header.loc,
                func_code,
                input: Box::new(input),
            }
        }
        PlanIterKind::Sort => {
            let input = decode_plan(r)?;
            let sort_specs = read_sort_specs(r)?;
            PlanNode::Sort {
                res_pos: header.res_pos,
                loc: header.loc,
                input: Box::new(input),
                sort_specs,
            }
        }
    };
    Ok(node)
}

fn decode_plan_array(r: &mut Reader) -> QueryResult<Vec<PlanNode>> {
    let len = r.read_i32()?;
    if len < 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(len as usize);
    for _ in 0..len {
        out.push(decode_plan(r)?);
    }
    Ok(out)
}

fn validate_arith_op(node: &PlanNode) -> QueryResult<()> {
    let PlanNode::ArithOp {
        func_code,
        args,
        ops,
        ..
    } = node
    else {
        unreachable!()
    };
    if !matches!(func_code, FuncCode::OpAddSub | FuncCode::OpMultDiv) {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            format!("ARITH_OP does not permit function code {func_code:?}"),
        ));
    }
    if ops.len() != args.len() {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            format!(
                "ARITH_OP has {} operator chars for {} arguments",
                ops.len(),
                args.len()
            ),
        ));
    }
    let allowed: &[u8] = if matches!(func_code, FuncCode::OpAddSub) {
        b"+-"
    } else {
        b"*/"
    };
    for &op in ops {
        if !allowed.contains(&op) {
            return Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!("ARITH_OP operator char '{}' not permitted for {func_code:?}", op as char),
            ));
        }
    }
    Ok(())
}

fn validate_sfw(node: &PlanNode) -> QueryResult<()> {
    let PlanNode::Sfw {
        column_names,
        from_step,
        is_select_star,
        column_steps,
        offset_step,
        limit_step,
        ..
    } = node
    else {
        unreachable!()
    };
    if from_step.is_empty() {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            "SFW is missing its FROM step",
        ));
    }
    if column_names.is_empty() || column_steps.is_empty() {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            "SFW has an empty column list",
        ));
    }
    if *is_select_star && column_steps.len() != 1 {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            format!(
                "SELECT * requires exactly one column iterator, found {}",
                column_steps.len()
            ),
        ));
    }
    for step in column_steps {
        if !step.is_sync() {
            return Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                "SFW column iterators must be synchronous",
            ));
        }
    }
    if !offset_step.is_sync() || !limit_step.is_sync() {
        return Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            "SFW offset/limit iterators must be synchronous",
        ));
    }
    Ok(())
}
