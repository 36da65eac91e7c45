//! Per-group aggregators used by [`crate::iter::sfw::SfwIter`]'s grouping
//! mode, keyed by a binary serialization of the group-by columns.
//!
//! Each aggregator kind also doubles as the merge step for server-side
//! partial aggregates: accumulating a stream of already-partial values with
//! the same per-kind update rule reproduces "SUM merges sums", "MIN/MAX
//! merges extrema", "COUNT* merges by addition", and "ARRAY_COLLECT merges
//! by concatenation (with dedup)", since each partial arrives as its own
//! row through the same input stream the raw-value rules consume.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::plan::FuncCode;
use crate::value::wire::write_group_key;
use crate::value::{compare_values, NullRank, Value};
use std::collections::HashSet;

/// A single running aggregate. `update` is called once per input row seen
/// for the owning group; `finish` materializes the final column value.
pub trait Aggregator: std::fmt::Debug {
    fn update(&mut self, value: &Value) -> QueryResult<()>;
    fn finish(&mut self) -> Value;
}

#[must_use]
pub fn new_aggregator(func_code: FuncCode) -> Box<dyn Aggregator> {
    match func_code {
        FuncCode::FnSum => Box::new(SumAggregator::default()),
        FuncCode::FnCountStar => Box::new(CountAggregator::new(CountKind::Star)),
        FuncCode::FnCount => Box::new(CountAggregator::new(CountKind::NotAbsent)),
        FuncCode::FnCountNumbers => Box::new(CountAggregator::new(CountKind::Numeric)),
        FuncCode::FnMin => Box::new(MinMaxAggregator::new(false)),
        FuncCode::FnMax => Box::new(MinMaxAggregator::new(true)),
        FuncCode::FnArrayCollect => Box::new(CollectAggregator::new(false)),
        FuncCode::FnArrayCollectDistinct => Box::new(CollectAggregator::new(true)),
        FuncCode::OpAddSub | FuncCode::OpMultDiv => {
            // Not reachable: the decoder restricts ARITH_OP function codes
            // to OpAddSub/OpMultDiv and never hands those to a group.
            Box::new(SumAggregator::default())
        }
    }
}

#[derive(Debug, Default)]
struct SumAggregator {
    acc: Option<Value>,
}

impl Aggregator for SumAggregator {
    fn update(&mut self, value: &Value) -> QueryResult<()> {
        if !value.is_numeric() {
            return Ok(());
        }
        self.acc = Some(match self.acc.take() {
            None => value.clone(),
            Some(acc) => add_numeric(&acc, value),
        });
        Ok(())
    }

    fn finish(&mut self) -> Value {
        self.acc.take().unwrap_or(Value::Null)
    }
}

fn add_numeric(a: &Value, b: &Value) -> Value {
    use crate::value::coercion::{as_decimal, as_f64, promote, NumericRepr};
    let ra = NumericRepr::of(a).unwrap_or(NumericRepr::Double);
    let rb = NumericRepr::of(b).unwrap_or(NumericRepr::Double);
    match promote(ra, rb) {
        NumericRepr::Decimal => Value::Number(
            as_decimal(a).unwrap_or_default() + as_decimal(b).unwrap_or_default(),
        ),
        NumericRepr::Double => Value::Double(as_f64(a).unwrap_or(0.0) + as_f64(b).unwrap_or(0.0)),
        NumericRepr::Long => {
            Value::Long(as_i64(a).unwrap_or(0) + as_i64(b).unwrap_or(0))
        }
        NumericRepr::Int => Value::Int((as_i64(a).unwrap_or(0) + as_i64(b).unwrap_or(0)) as i32),
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(v) => Some(i64::from(*v)),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum CountKind {
    Star,
    NotAbsent,
    Numeric,
}

#[derive(Debug)]
struct CountAggregator {
    kind: CountKind,
    count: i64,
}

impl CountAggregator {
    const fn new(kind: CountKind) -> Self {
        Self { kind, count: 0 }
    }
}

impl Aggregator for CountAggregator {
    fn update(&mut self, value: &Value) -> QueryResult<()> {
        let counts = match self.kind {
            CountKind::Star => true,
            CountKind::NotAbsent => !value.is_absent(),
            CountKind::Numeric => value.is_numeric(),
        };
        if counts {
            self.count += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Value {
        Value::Long(self.count)
    }
}

#[derive(Debug)]
struct MinMaxAggregator {
    is_max: bool,
    best: Value,
}

impl MinMaxAggregator {
    const fn new(is_max: bool) -> Self {
        Self {
            is_max,
            best: Value::Null,
        }
    }
}

impl Aggregator for MinMaxAggregator {
    fn update(&mut self, value: &Value) -> QueryResult<()> {
        if value.is_absent() || matches!(value, Value::Map(_) | Value::Record(_)) {
            return Ok(());
        }
        if self.best.is_absent() {
            self.best = value.clone();
            return Ok(());
        }
        let cmp = compare_values(value, &self.best, NullRank::Last);
        let take = if self.is_max {
            cmp == std::cmp::Ordering::Greater
        } else {
            cmp == std::cmp::Ordering::Less
        };
        if take {
            self.best = value.clone();
        }
        Ok(())
    }

    fn finish(&mut self) -> Value {
        std::mem::replace(&mut self.best, Value::Null)
    }
}

#[derive(Debug, Default)]
struct CollectAggregator {
    distinct: bool,
    items: Vec<Value>,
    seen: HashSet<Vec<u8>>,
}

impl CollectAggregator {
    fn new(distinct: bool) -> Self {
        Self {
            distinct,
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

impl Aggregator for CollectAggregator {
    fn update(&mut self, value: &Value) -> QueryResult<()> {
        let Value::Array(elements) = value else {
            return Err(QueryError::illegal_state(
                IterOrigin::Group,
                "ARRAY_COLLECT input is not an array",
            ));
        };
        for element in elements {
            let element = element.clone().empty_to_null();
            if self.distinct {
                let mut key = Vec::new();
                write_group_key(&mut key, &element);
                if !self.seen.insert(key) {
                    continue;
                }
            }
            self.items.push(element);
        }
        Ok(())
    }

    fn finish(&mut self) -> Value {
        Value::Array(std::mem::take(&mut self.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FuncCode;

    #[test]
    fn distinct_collect_represents_empty_elements_as_null() {
        let mut aggregator = new_aggregator(FuncCode::FnArrayCollectDistinct);
        aggregator
            .update(&Value::Array(vec![Value::Empty, Value::Int(1), Value::Empty]))
            .unwrap();
        assert_eq!(
            aggregator.finish(),
            Value::Array(vec![Value::Null, Value::Int(1)])
        );
    }

    #[test]
    fn plain_collect_also_normalizes_empty_to_null() {
        let mut aggregator = new_aggregator(FuncCode::FnArrayCollect);
        aggregator
            .update(&Value::Array(vec![Value::Empty, Value::Int(1)]))
            .unwrap();
        assert_eq!(
            aggregator.finish(),
            Value::Array(vec![Value::Null, Value::Int(1)])
        );
    }
}
