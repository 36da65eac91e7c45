//! The flat result-register file shared by every iterator in one executor.

use crate::value::Value;

///
/// RegisterFile
///
/// Indexed by `resPos` as assigned during plan decoding. Grows lazily: a
/// position beyond the current length reads back as [`Value::Empty`] until
/// written.
///

#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    slots: Vec<Value>,
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, pos: i32) -> &Value {
        self.slots.get(pos as usize).unwrap_or(&Value::Empty)
    }

    pub fn set(&mut self, pos: i32, value: Value) {
        let idx = pos as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, Value::Empty);
        }
        self.slots[idx] = value;
    }

    pub fn clear(&mut self, pos: i32) {
        self.set(pos, Value::Empty);
    }
}
