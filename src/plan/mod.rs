//! Deserialized plan model: the tree of operator descriptions shipped by the
//! server, and the tag enums used to decode it.

pub mod decode;
pub mod reader;

pub use decode::{decode_plan, PlanNode};

use crate::error::{IterOrigin, QueryError, QueryResult};
use reader::Reader;

///
/// Location
///
/// Source-text span a plan node was compiled from, carried through purely
/// for diagnostics attached to [`crate::error::QueryError`].
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Location {
    pub start_line: i32,
    pub start_column: i32,
    pub end_line: i32,
    pub end_column: i32,
}

impl Location {
    pub fn from_reader(r: &mut Reader) -> QueryResult<Self> {
        Ok(Self {
            start_line: r.read_i32_non_negative("startLine")?,
            start_column: r.read_i32_non_negative("startColumn")?,
            end_line: r.read_i32_non_negative("endLine")?,
            end_column: r.read_i32_non_negative("endColumn")?,
        })
    }
}

///
/// PlanIterKind
///
/// Wire ordinal of an operator, as assigned by the server's plan-iterator
/// enum. `Empty` (-1 on the wire) marks an absent optional child step.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PlanIterKind {
    #[default]
    Empty,
    Const,
    VarRef,
    ExternalVarRef,
    ArithOp,
    FieldStep,
    Sfw,
    Recv,
    FnSum,
    FnMinMax,
    Sort,
}

impl PlanIterKind {
    pub fn from_wire(tag: i32) -> QueryResult<Self> {
        match tag {
            -1 => Ok(Self::Empty),
            0 => Ok(Self::Const),
            1 => Ok(Self::VarRef),
            2 => Ok(Self::ExternalVarRef),
            8 => Ok(Self::ArithOp),
            11 => Ok(Self::FieldStep),
            14 => Ok(Self::Sfw),
            17 => Ok(Self::Recv),
            39 => Ok(Self::FnSum),
            41 => Ok(Self::FnMinMax),
            47 => Ok(Self::Sort),
            other => Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!("unrecognized plan iterator kind ordinal {other}"),
            )),
        }
    }
}

///
/// FuncCode
///
/// Wire ordinal identifying which function/operator an ARITH_OP or
/// aggregator node applies.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FuncCode {
    OpAddSub,
    OpMultDiv,
    FnCountStar,
    FnCount,
    FnCountNumbers,
    FnSum,
    FnMin,
    FnMax,
    FnArrayCollect,
    FnArrayCollectDistinct,
}

impl FuncCode {
    pub fn from_wire(tag: i32) -> QueryResult<Self> {
        match tag {
            14 => Ok(Self::OpAddSub),
            15 => Ok(Self::OpMultDiv),
            42 => Ok(Self::FnCountStar),
            43 => Ok(Self::FnCount),
            44 => Ok(Self::FnCountNumbers),
            45 => Ok(Self::FnSum),
            47 => Ok(Self::FnMin),
            48 => Ok(Self::FnMax),
            91 => Ok(Self::FnArrayCollect),
            92 => Ok(Self::FnArrayCollectDistinct),
            other => Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!("unrecognized function code ordinal {other}"),
            )),
        }
    }
}

///
/// DistributionKind
///
/// How a RECV operator's input is spread across the store: a single
/// partition, every partition, or every shard.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistributionKind {
    SinglePartition,
    AllPartitions,
    AllShards,
}

impl DistributionKind {
    pub fn from_wire(tag: i32) -> QueryResult<Self> {
        match tag {
            0 => Ok(Self::SinglePartition),
            1 => Ok(Self::AllPartitions),
            2 => Ok(Self::AllShards),
            other => Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!("unrecognized distribution kind ordinal {other}"),
            )),
        }
    }
}

///
/// SortSpec
///
/// One sort key: the field to compare on, its direction, and where nulls
/// land relative to non-null values.
///

#[derive(Clone, Debug)]
pub struct SortSpec {
    pub field_name: String,
    pub is_desc: bool,
    pub null_rank: crate::value::NullRank,
}
