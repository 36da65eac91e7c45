//! Serialization boundary: bounded (de)serialization of the opaque bytes
//! that cross the engine's edge — a prepared statement's compiled plan, its
//! diagnostic fingerprint, and the continuation tokens handed back to
//! callers. None of these are interpreted here; this module only enforces
//! size bounds and, for continuation tokens, a transport-safe hex encoding.

const MAX_TOKEN_HEX_LEN: usize = 16 * 1024;

/// Plan bytes this large would indicate a corrupted or hostile prepared
/// statement long before the decoder gets a chance to reject it structurally.
pub const MAX_PLAN_BYTES: usize = 1024 * 1024;

/// Fingerprints are a short diagnostic tag, not a hash of the full plan.
pub const MAX_FINGERPRINT_BYTES: usize = 64;

///
/// ContinuationDecodeError
///

#[derive(Debug, Eq, thiserror::Error, PartialEq)]
pub enum ContinuationDecodeError {
    #[error("continuation token is empty")]
    Empty,

    #[error("continuation token exceeds max length: {len} hex chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("continuation token must have an even number of hex characters")]
    OddLength,

    #[error("invalid hex character at position {position}")]
    InvalidHex { position: usize },
}

/// Encode a continuation key as a lowercase hex token.
#[must_use]
pub fn encode_continuation(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Decode a hex continuation token into the raw bytes the server expects.
pub fn decode_continuation(token: &str) -> Result<Vec<u8>, ContinuationDecodeError> {
    let token = token.trim();

    if token.is_empty() {
        return Err(ContinuationDecodeError::Empty);
    }

    if token.len() > MAX_TOKEN_HEX_LEN {
        return Err(ContinuationDecodeError::TooLong {
            len: token.len(),
            max: MAX_TOKEN_HEX_LEN,
        });
    }

    if token.len() % 2 != 0 {
        return Err(ContinuationDecodeError::OddLength);
    }

    let mut out = Vec::with_capacity(token.len() / 2);
    let bytes = token.as_bytes();

    for idx in (0..bytes.len()).step_by(2) {
        let hi = decode_hex_nibble(bytes[idx])
            .ok_or(ContinuationDecodeError::InvalidHex { position: idx + 1 })?;
        let lo = decode_hex_nibble(bytes[idx + 1])
            .ok_or(ContinuationDecodeError::InvalidHex { position: idx + 2 })?;
        out.push((hi << 4) | lo);
    }

    Ok(out)
}

const fn decode_hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

///
/// PreparedStatementError
///
/// Raised by [`crate::exec::client::PreparedStatement`] construction when the
/// opaque plan bytes or fingerprint the host application hands in exceed the
/// bounds this engine is willing to hold in memory.
///

#[derive(Debug, Eq, thiserror::Error, PartialEq)]
pub enum PreparedStatementError {
    #[error("plan bytes exceed max length: {len} bytes (max {max})")]
    PlanTooLong { len: usize, max: usize },

    #[error("fingerprint exceeds max length: {len} bytes (max {max})")]
    FingerprintTooLong { len: usize, max: usize },
}

/// Bound-check plan bytes before they're handed to the decoder.
pub fn validate_plan_bytes(bytes: &[u8]) -> Result<(), PreparedStatementError> {
    if bytes.len() > MAX_PLAN_BYTES {
        return Err(PreparedStatementError::PlanTooLong {
            len: bytes.len(),
            max: MAX_PLAN_BYTES,
        });
    }
    Ok(())
}

/// Bound-check a diagnostic plan fingerprint.
pub fn validate_fingerprint(bytes: &[u8]) -> Result<(), PreparedStatementError> {
    if bytes.len() > MAX_FINGERPRINT_BYTES {
        return Err(PreparedStatementError::FingerprintTooLong {
            len: bytes.len(),
            max: MAX_FINGERPRINT_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_continuation, encode_continuation, validate_fingerprint, validate_plan_bytes,
        ContinuationDecodeError, PreparedStatementError, MAX_FINGERPRINT_BYTES, MAX_PLAN_BYTES,
    };

    #[test]
    fn round_trips_arbitrary_bytes() {
        let bytes = vec![0u8, 1, 255, 16, 128];
        let token = encode_continuation(&bytes);
        assert_eq!(decode_continuation(&token).unwrap(), bytes);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(decode_continuation("").unwrap_err(), ContinuationDecodeError::Empty);
        assert_eq!(
            decode_continuation("   ").unwrap_err(),
            ContinuationDecodeError::Empty
        );
    }

    #[test]
    fn rejects_odd_length() {
        assert_eq!(
            decode_continuation("abc").unwrap_err(),
            ContinuationDecodeError::OddLength
        );
    }

    #[test]
    fn rejects_invalid_hex() {
        assert_eq!(
            decode_continuation("zz").unwrap_err(),
            ContinuationDecodeError::InvalidHex { position: 1 }
        );
    }

    #[test]
    fn rejects_oversized_token() {
        let token = "ab".repeat(16 * 1024 / 2 + 1);
        assert!(matches!(
            decode_continuation(&token),
            Err(ContinuationDecodeError::TooLong { .. })
        ));
    }

    #[test]
    fn accepts_plan_bytes_within_bound() {
        assert!(validate_plan_bytes(&vec![0u8; MAX_PLAN_BYTES]).is_ok());
    }

    #[test]
    fn rejects_oversized_plan_bytes() {
        assert_eq!(
            validate_plan_bytes(&vec![0u8; MAX_PLAN_BYTES + 1]).unwrap_err(),
            PreparedStatementError::PlanTooLong {
                len: MAX_PLAN_BYTES + 1,
                max: MAX_PLAN_BYTES,
            }
        );
    }

    #[test]
    fn rejects_oversized_fingerprint() {
        assert_eq!(
            validate_fingerprint(&vec![0u8; MAX_FINGERPRINT_BYTES + 1]).unwrap_err(),
            PreparedStatementError::FingerprintTooLong {
                len: MAX_FINGERPRINT_BYTES + 1,
                max: MAX_FINGERPRINT_BYTES,
            }
        );
    }
}
