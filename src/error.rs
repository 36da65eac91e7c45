//! Structured error taxonomy for the query execution engine.
//!
//! Mirrors the class/origin split used elsewhere in this codebase's error
//! handling: a stable [`QueryErrorKind`] for programmatic matching, plus an
//! `origin` naming which part of the iterator tree raised the error, and an
//! optional source [`Location`] for user-facing diagnostics.

use crate::plan::Location;
use std::fmt;
use thiserror::Error as ThisError;

///
/// QueryErrorKind
///
/// Stable classification for engine errors. Not a stable wire format; may
/// grow new variants without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryErrorKind {
    /// Malformed server-sent plan or page data.
    BadProtocol,
    /// Broken engine invariant (a bug, not user input).
    IllegalState,
    /// Bad external input: bindings, options, or plan values.
    IllegalArgument,
    /// The configured memory budget was exceeded.
    MemoryLimitExceeded,
    /// Network/throttling error that the transport layer may retry.
    Retryable,
    /// A deadline attached to the request passed.
    Timeout,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BadProtocol => "bad_protocol",
            Self::IllegalState => "illegal_state",
            Self::IllegalArgument => "illegal_argument",
            Self::MemoryLimitExceeded => "memory_limit_exceeded",
            Self::Retryable => "retryable",
            Self::Timeout => "timeout",
        };
        write!(f, "{label}")
    }
}

///
/// IterOrigin
///
/// Names which iterator/component raised an error, for debugging.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IterOrigin {
    Deserializer,
    Const,
    VarRef,
    ExtVarRef,
    FieldStep,
    ArithOp,
    FnSum,
    FnMinMax,
    Sort,
    Group,
    Sfw,
    Receive,
    Executor,
}

impl fmt::Display for IterOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Deserializer => "deserializer",
            Self::Const => "const",
            Self::VarRef => "var_ref",
            Self::ExtVarRef => "ext_var_ref",
            Self::FieldStep => "field_step",
            Self::ArithOp => "arith_op",
            Self::FnSum => "fn_sum",
            Self::FnMinMax => "fn_min_max",
            Self::Sort => "sort",
            Self::Group => "group",
            Self::Sfw => "sfw",
            Self::Receive => "receive",
            Self::Executor => "executor",
        };
        write!(f, "{label}")
    }
}

///
/// QueryError
///

#[derive(Debug, ThisError)]
#[error("{origin}: {message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub origin: IterOrigin,
    pub message: String,
    pub location: Option<Location>,
}

impl QueryError {
    #[must_use]
    pub fn new(
        kind: QueryErrorKind,
        origin: IterOrigin,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, QueryErrorKind::Retryable)
    }

    pub fn bad_protocol(origin: IterOrigin, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::BadProtocol, origin, message)
    }

    pub fn illegal_state(origin: IterOrigin, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::IllegalState, origin, message)
    }

    pub fn illegal_argument(origin: IterOrigin, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::IllegalArgument, origin, message)
    }

    pub fn memory_limit(cap_mb: u64) -> Self {
        Self::new(
            QueryErrorKind::MemoryLimitExceeded,
            IterOrigin::Executor,
            format!("memory limit of {cap_mb} MB exceeded"),
        )
    }

    pub fn retryable(origin: IterOrigin, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Retryable, origin, message)
    }

    pub fn timeout(origin: IterOrigin, message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Timeout, origin, message)
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
