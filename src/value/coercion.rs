//! Numeric promotion lattice: `Int ⊂ Long ⊂ Double`, with `Number` (decimal)
//! as a lateral branch that pulls the whole computation to decimal whenever
//! it appears among the operands.

use crate::value::Value;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

///
/// NumericRepr
///
/// The representation a group of numeric operands should be promoted to
/// before an arithmetic or aggregate op is applied.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum NumericRepr {
    Int,
    Long,
    Double,
    Decimal,
}

impl NumericRepr {
    #[must_use]
    pub const fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(Self::Int),
            Value::Long(_) => Some(Self::Long),
            Value::Float(_) | Value::Double(_) => Some(Self::Double),
            Value::Number(_) => Some(Self::Decimal),
            _ => None,
        }
    }
}

/// Widen `current` to accommodate `next`, per the promotion lattice.
#[must_use]
pub fn promote(current: NumericRepr, next: NumericRepr) -> NumericRepr {
    current.max(next)
}

/// Convert a numeric value to `f64`, widening as needed. Returns `None` for
/// non-numeric input.
#[must_use]
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(f64::from(*v)),
        Value::Long(v) => Some(*v as f64),
        Value::Float(v) => Some(f64::from(*v)),
        Value::Double(v) => Some(*v),
        Value::Number(v) => v.to_f64(),
        _ => None,
    }
}

/// Convert a numeric value to `Decimal`, widening as needed. Returns `None`
/// for non-numeric input or a double that cannot be represented.
#[must_use]
pub fn as_decimal(value: &Value) -> Option<Decimal> {
    use rust_decimal::prelude::FromPrimitive;
    match value {
        Value::Int(v) => Some(Decimal::from(*v)),
        Value::Long(v) => Some(Decimal::from(*v)),
        Value::Float(v) => Decimal::from_f32(*v),
        Value::Double(v) => Decimal::from_f64(*v),
        Value::Number(v) => Some(*v),
        _ => None,
    }
}

/// A double is "query-equal" to a decimal when the decimal's exact `f64`
/// image matches it. Used by the grouping-key numeric-normalization
/// pre-filter so a decimal and the double it equals serialize identically.
#[must_use]
pub fn decimal_equals_double(decimal: Decimal, double: f64) -> bool {
    match decimal.to_f64() {
        Some(d) => (d - double).abs() == 0.0,
        None => false,
    }
}
