use crate::value::coercion::as_f64;
use crate::value::rank::NullRank;
use crate::value::Value;
use std::cmp::Ordering;

/// Total ordering comparator used by SORT and FN_MIN_MAX/FN_MAX.
///
/// NULL-like values (`Null`, `JsonNull`, `Empty`) are grouped together and
/// placed according to `null_rank`; numeric values of any representation
/// compare across representations by value, never by variant rank.
#[must_use]
pub fn compare_values(left: &Value, right: &Value, null_rank: NullRank) -> Ordering {
    let left_null = left.is_absent();
    let right_null = right.is_absent();

    match (left_null, right_null) {
        (true, true) => Ordering::Equal,
        (true, false) => null_side(null_rank, true),
        (false, true) => null_side(null_rank, false),
        (false, false) => compare_non_null(left, right),
    }
}

const fn null_side(null_rank: NullRank, left_is_null: bool) -> Ordering {
    // `left_is_null` tells us which side is the null; `null_rank` tells us
    // whether nulls sort first (Less) or last (Greater).
    let null_goes_first = matches!(null_rank, NullRank::First);
    match (left_is_null, null_goes_first) {
        (true, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Less,
    }
}

fn compare_non_null(left: &Value, right: &Value) -> Ordering {
    if left.is_numeric() && right.is_numeric() {
        return compare_numeric(left, right);
    }

    if left.type_rank() != right.type_rank() {
        return left.type_rank().cmp(&right.type_rank());
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
        (Value::Enum(a), Value::Enum(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => compare_seq(a, b),
        _ => Ordering::Equal,
    }
}

fn compare_seq(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        let cmp = compare_values(l, r, NullRank::Last);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    left.len().cmp(&right.len())
}

/// Compare two numeric values across representations by numeric value,
/// falling back to `Equal` only when both sides genuinely cannot be
/// widened (which should not happen for `is_numeric` values).
fn compare_numeric(left: &Value, right: &Value) -> Ordering {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        return a.cmp(b);
    }
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Structural equality used for SFW group-tuple comparisons. Two `Empty`
/// values are equal to each other, but never to `Null`.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}
