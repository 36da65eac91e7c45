//! Engine-imposed memory budget tracking.

use crate::error::{IterOrigin, QueryError, QueryResult};

///
/// MemoryCounter
///
/// Tracks bytes accounted by SORT buffers, RECEIVE dedup keys, and merge
/// scanners against a cap configured in megabytes. `inc`/`dec` are the only
/// mutators; the counter never goes negative.
///

#[derive(Clone, Copy, Debug)]
pub struct MemoryCounter {
    used: u64,
    cap_bytes: u64,
    cap_mb: u64,
}

impl MemoryCounter {
    #[must_use]
    pub fn new(cap_mb: u64) -> Self {
        Self {
            used: 0,
            cap_bytes: cap_mb.saturating_mul(1024 * 1024),
            cap_mb,
        }
    }

    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    #[must_use]
    pub const fn cap_bytes(&self) -> u64 {
        self.cap_bytes
    }

    pub fn inc(&mut self, size: u64) -> QueryResult<()> {
        let next = self.used.saturating_add(size);
        if next > self.cap_bytes {
            return Err(QueryError::memory_limit(self.cap_mb));
        }
        self.used = next;
        Ok(())
    }

    pub fn dec(&mut self, size: u64) {
        self.used = self.used.saturating_sub(size);
    }
}

/// Approximate in-memory footprint of a value, used for memory accounting.
/// Deliberately coarse: exact byte-for-byte accounting is not required, only
/// a stable, monotonic-with-size estimate.
#[must_use]
pub fn estimate_size(value: &crate::value::Value) -> u64 {
    use crate::value::Value;
    const BASE: u64 = 16;
    match value {
        Value::Null | Value::JsonNull | Value::Empty | Value::Bool(_) => BASE,
        Value::Int(_) | Value::Float(_) => BASE + 4,
        Value::Long(_) | Value::Double(_) => BASE + 8,
        Value::Number(d) => BASE + d.to_string().len() as u64,
        Value::String(s) => BASE + s.len() as u64,
        Value::Binary(b) => BASE + b.len() as u64,
        Value::Timestamp(_) => BASE + 8,
        Value::Enum(e) => BASE + e.path.len() as u64 + 4,
        Value::Array(items) => BASE + items.iter().map(estimate_size).sum::<u64>(),
        Value::Map(entries) => {
            BASE + entries
                .iter()
                .map(|(k, v)| k.len() as u64 + estimate_size(v))
                .sum::<u64>()
        }
        Value::Record(fields) => {
            BASE + fields
                .iter()
                .map(|(k, v)| k.len() as u64 + estimate_size(v))
                .sum::<u64>()
        }
    }
}
