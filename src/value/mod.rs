pub(crate) mod coercion;
mod compare;
mod rank;
pub(crate) mod wire;

#[cfg(test)]
mod tests;

pub use coercion::{promote, NumericRepr};
pub use compare::{compare_values, values_equal};
pub use rank::NullRank;
pub use wire::{read_value, write_value};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;

///
/// Value
///
/// Tagged union of every runtime value the engine can produce, compare, sort,
/// or group on. `Empty` (absence of a field) is distinct from SQL `Null` and
/// from `JsonNull`: missing-field access yields `Empty`, JSON `null` is not
/// SQL `NULL`.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// JSON null, distinct from SQL NULL.
    JsonNull,
    /// Absence of a field; never produced by a literal.
    Empty,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary-precision decimal ("NUMBER"), present only when a
    /// big-decimal handler is installed; see [`crate::value::coercion`].
    Number(Decimal),
    String(String),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    /// Unordered string-keyed map. Iteration order of the caller-visible
    /// `BTreeMap` is always sorted, which doubles as the canonical key order
    /// required by the grouping/dedup binary codec.
    Map(BTreeMap<String, Value>),
    /// Ordered, named field list (a "row").
    Record(Vec<(String, Value)>),
    Enum(EnumValue),
}

///
/// EnumValue
///
/// Nominal, ordinal-identified enum value: `path` names the declared enum
/// type, `ordinal` identifies the selected variant.
///

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EnumValue {
    pub path: String,
    pub ordinal: u32,
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_json_null(&self) -> bool {
        matches!(self, Self::JsonNull)
    }

    #[must_use]
    pub const fn is_empty_value(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// True for SQL NULL, JSON NULL, and EMPTY — the three "nothing here"
    /// states that most operators treat as absent input.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Null | Self::JsonNull | Self::Empty)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Double(_) | Self::Number(_)
        )
    }

    #[must_use]
    pub const fn is_atomic(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Map(_) | Self::Record(_))
    }

    /// Read a field by name from a `Map` or `Record`. Returns `Empty` for a
    /// missing field and for any non-object value.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Value {
        match self {
            Self::Map(m) => m.get(name).cloned().unwrap_or(Value::Empty),
            Self::Record(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Empty),
            _ => Value::Empty,
        }
    }

    /// Convert `EMPTY` to SQL `NULL`, recursing into `Record` field values
    /// and `Map` values so a row with an absent field converts too, not just
    /// a bare `EMPTY` scalar. Used by SORT at drain time and by DISTINCT
    /// grouping keys, kept bug-compatible with the reference driver's
    /// behavior.
    #[must_use]
    pub fn empty_to_null(self) -> Self {
        match self {
            Self::Empty => Self::Null,
            Self::Record(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.empty_to_null()))
                    .collect(),
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.empty_to_null()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Canonical rank used for cross-type ordering and the numeric
    /// normalization pre-filter in grouping keys. Within the same rank,
    /// [`compare_values`] does the real comparison.
    #[must_use]
    pub(crate) const fn type_rank(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Null => 1,
            Self::JsonNull => 2,
            Self::Bool(_) => 3,
            Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Double(_) | Self::Number(_) => 4,
            Self::String(_) => 5,
            Self::Timestamp(_) => 6,
            Self::Binary(_) => 7,
            Self::Enum(_) => 8,
            Self::Array(_) => 9,
            Self::Map(_) => 10,
            Self::Record(_) => 11,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare_values(self, other, NullRank::Last))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
