//! Base64 encoding and decoding utilities.
//!
//! Payment challenges and proofs travel as base64-of-JSON in HTTP
//! headers. [`Base64Bytes`] wraps the encoded form; [`decode_json`] and
//! [`encode_json`] are the header-to-JSON paths the wire parsers and the
//! delivery loop use.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::fmt::Display;

/// A wrapper for base64-encoded byte data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        let encoded = b64.encode(input.as_ref());
        Self(encoded.into_bytes())
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Decodes a base64 header value into a JSON value.
///
/// Returns `None` on invalid base64 or invalid JSON; header parsing moves
/// on to the next wire source in that case.
#[must_use]
pub fn decode_json(value: &str) -> Option<serde_json::Value> {
    let bytes = Base64Bytes::from(value.trim().as_bytes()).decode().ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Encodes a JSON value as base64 of its UTF-8 text.
#[must_use]
pub fn encode_json(value: &serde_json::Value) -> String {
    Base64Bytes::encode(value.to_string()).to_string()
}
