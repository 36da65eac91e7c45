//! Deterministic binary field codec for keys derived from values.
//!
//! Two related but distinct uses:
//! - [`write_value`] / [`read_value`]: the general value wire format, used to
//!   decode CONST literals out of a plan and to encode primary-key fields for
//!   RECEIVE duplicate elimination.
//! - [`write_group_key`]: a variant of the writer used only for grouping and
//!   DISTINCT keys, which sorts map entries by key and normalizes numerics so
//!   that query-equal numerics (e.g. a decimal equal to its double form)
//!   serialize identically.

use crate::error::{IterOrigin, QueryError, QueryResult};
use crate::plan::reader::Reader;
use crate::value::coercion::decimal_equals_double;
use crate::value::{EnumValue, Value};
use chrono::{DateTime, TimeZone, Utc};

const TAG_NULL: u8 = 0;
const TAG_JSON_NULL: u8 = 1;
const TAG_EMPTY: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_INT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_FLOAT: u8 = 6;
const TAG_DOUBLE: u8 = 7;
const TAG_NUMBER: u8 = 8;
const TAG_STRING: u8 = 9;
const TAG_BINARY: u8 = 10;
const TAG_TIMESTAMP: u8 = 11;
const TAG_ARRAY: u8 = 12;
const TAG_MAP: u8 = 13;
const TAG_RECORD: u8 = 14;
const TAG_ENUM: u8 = 15;

/// Write a value in the general wire format: one discriminator byte
/// followed by the type-specific payload.
pub fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::JsonNull => buf.push(TAG_JSON_NULL),
        Value::Empty => buf.push(TAG_EMPTY),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(v) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Long(v) => {
            buf.push(TAG_LONG);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float(v) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Double(v) => {
            buf.push(TAG_DOUBLE);
            buf.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Number(d) => {
            buf.push(TAG_NUMBER);
            write_len_string(buf, &d.to_string());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            write_len_string(buf, s);
        }
        Value::Binary(b) => {
            buf.push(TAG_BINARY);
            write_len_bytes(buf, b);
        }
        Value::Timestamp(ts) => {
            buf.push(TAG_TIMESTAMP);
            buf.extend_from_slice(&ts.timestamp_millis().to_be_bytes());
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            buf.extend_from_slice(&(items.len() as i32).to_be_bytes());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Map(entries) => {
            buf.push(TAG_MAP);
            buf.extend_from_slice(&(entries.len() as i32).to_be_bytes());
            // `Value::Map` is a `BTreeMap`, so iteration is already in
            // sorted key order.
            for (k, v) in entries {
                write_len_string(buf, k);
                write_value(buf, v);
            }
        }
        Value::Record(fields) => {
            buf.push(TAG_RECORD);
            buf.extend_from_slice(&(fields.len() as i32).to_be_bytes());
            for (k, v) in fields {
                write_len_string(buf, k);
                write_value(buf, v);
            }
        }
        Value::Enum(e) => {
            buf.push(TAG_ENUM);
            write_len_string(buf, &e.path);
            buf.extend_from_slice(&e.ordinal.to_be_bytes());
        }
    }
}

fn write_len_string(buf: &mut Vec<u8>, s: &str) {
    write_len_bytes(buf, s.as_bytes());
}

fn write_len_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Read a value in the general wire format produced by [`write_value`].
pub fn read_value(r: &mut Reader) -> QueryResult<Value> {
    let tag = r.read_byte()?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_JSON_NULL => Ok(Value::JsonNull),
        TAG_EMPTY => Ok(Value::Empty),
        TAG_BOOL => Ok(Value::Bool(r.read_bool()?)),
        TAG_INT => Ok(Value::Int(r.read_i32()?)),
        TAG_LONG => Ok(Value::Long(r.read_i64()?)),
        TAG_FLOAT => Ok(Value::Float(r.read_f32()?)),
        TAG_DOUBLE => Ok(Value::Double(r.read_f64()?)),
        TAG_NUMBER => {
            let s = r.read_string()?;
            s.parse().map(Value::Number).map_err(|e| {
                QueryError::bad_protocol(IterOrigin::Deserializer, format!("invalid NUMBER: {e}"))
            })
        }
        TAG_STRING => Ok(Value::String(r.read_string()?)),
        TAG_BINARY => Ok(Value::Binary(r.read_bytes()?)),
        TAG_TIMESTAMP => {
            let millis = r.read_i64()?;
            let ts: DateTime<Utc> = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                QueryError::bad_protocol(IterOrigin::Deserializer, "timestamp out of range")
            })?;
            Ok(Value::Timestamp(ts))
        }
        TAG_ARRAY => {
            let len = r.read_i32()?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len {
                items.push(read_value(r)?);
            }
            Ok(Value::Array(items))
        }
        TAG_MAP => {
            let len = r.read_i32()?;
            let mut map = std::collections::BTreeMap::new();
            for _ in 0..len {
                let k = r.read_string()?;
                let v = read_value(r)?;
                map.insert(k, v);
            }
            Ok(Value::Map(map))
        }
        TAG_RECORD => {
            let len = r.read_i32()?;
            let mut fields = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len {
                let k = r.read_string()?;
                let v = read_value(r)?;
                fields.push((k, v));
            }
            Ok(Value::Record(fields))
        }
        TAG_ENUM => {
            let path = r.read_string()?;
            let ordinal = r.read_i32()?;
            Ok(Value::Enum(EnumValue {
                path,
                ordinal: ordinal as u32,
            }))
        }
        other => Err(QueryError::bad_protocol(
            IterOrigin::Deserializer,
            format!("unrecognized value tag {other}"),
        )),
    }
}

/// Write a value for use as (part of) a grouping or DISTINCT key: map
/// entries are sorted by key and numerics are normalized so a decimal that
/// equals its double form serializes identically to that double.
pub fn write_group_key(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Number(d) => {
            if let Some(f) = rust_decimal::prelude::ToPrimitive::to_f64(d) {
                if decimal_equals_double(*d, f) {
                    write_value(buf, &Value::Double(f));
                    return;
                }
            }
            write_value(buf, value);
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            buf.extend_from_slice(&(items.len() as i32).to_be_bytes());
            for item in items {
                write_group_key(buf, item);
            }
        }
        Value::Map(entries) => {
            // Already sorted (BTreeMap); normalize each value recursively.
            buf.push(TAG_MAP);
            buf.extend_from_slice(&(entries.len() as i32).to_be_bytes());
            for (k, v) in entries {
                write_len_string(buf, k);
                write_group_key(buf, v);
            }
        }
        Value::Record(fields) => {
            let mut sorted: Vec<&(String, Value)> = fields.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            buf.push(TAG_RECORD);
            buf.extend_from_slice(&(sorted.len() as i32).to_be_bytes());
            for (k, v) in sorted {
                write_len_string(buf, k);
                write_group_key(buf, v);
            }
        }
        _ => write_value(buf, value),
    }
}
