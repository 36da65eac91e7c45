//! Big-endian binary reader for the server's plan wire format.

use crate::error::{IterOrigin, QueryError, QueryResult};

///
/// Reader
///
/// A cursor over an in-memory byte slice. All multi-byte integers on the
/// wire are big-endian.
///

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> QueryResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!(
                    "unexpected end of plan data: wanted {n} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len()
                ),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> QueryResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> QueryResult<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_i16(&mut self) -> QueryResult<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u16(&mut self) -> QueryResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> QueryResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 32-bit integer and check it is non-negative, as required for
    /// the four `Location` fields.
    pub fn read_i32_non_negative(&mut self, field: &str) -> QueryResult<i32> {
        let v = self.read_i32()?;
        if v < 0 {
            return Err(QueryError::bad_protocol(
                IterOrigin::Deserializer,
                format!("field '{field}' must be non-negative, got {v}"),
            ));
        }
        Ok(v)
    }

    pub fn read_i64(&mut self) -> QueryResult<i64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_be_bytes(arr))
    }

    pub fn read_f32(&mut self) -> QueryResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> QueryResult<f64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(f64::from_bits(u64::from_be_bytes(arr)))
    }

    fn read_u32(&mut self) -> QueryResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Length-prefixed byte array. A sentinel length of -1 means "absent",
    /// represented here as an empty vec; callers that need to distinguish
    /// absent-vs-empty should check the raw length via [`Self::read_opt_len`]
    /// themselves.
    pub fn read_bytes(&mut self) -> QueryResult<Vec<u8>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn read_opt_bytes(&mut self) -> QueryResult<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    pub fn read_string(&mut self) -> QueryResult<String> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            QueryError::bad_protocol(IterOrigin::Deserializer, format!("invalid UTF-8 string: {e}"))
        })
    }

    /// Length-prefixed array of length-prefixed UTF-8 strings. A sentinel
    /// length of -1 decodes as an empty vec (absent optional array).
    pub fn read_string_array(&mut self) -> QueryResult<Vec<String>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn read_i32_array(&mut self) -> QueryResult<Vec<i32>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(len as usize);
        for _ in 0..len {
            out.push(self.read_i32()?);
        }
        Ok(out)
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}
