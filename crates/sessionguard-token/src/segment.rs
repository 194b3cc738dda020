//! Shared behaviour of the two JSON segments (header and payload)

use serde_json::{Map, Value};

use crate::base64url;
use crate::error::TokenError;

/// A base64url-encoded JSON object segment of a token
///
/// Decoded segments remember the exact substring they came from. Signature
/// verification must run over that substring: re-encoding may reorder or
/// reformat fields and would break tokens produced by other implementations.
pub trait Segment {
    /// JSON object in canonical emission order
    fn to_json(&self) -> Map<String, Value>;

    /// The encoded substring this segment was decoded from, if any
    fn source(&self) -> Option<&str>;

    /// Canonical base64url encoding of the segment
    fn encode(&self) -> String {
        // Serializing a Map of Values cannot fail
        let json = serde_json::to_vec(&Value::Object(self.to_json())).unwrap_or_default();
        base64url::encode(json)
    }

    /// Bytes to feed the signer: the original source when present, else the
    /// canonical encoding
    fn signing_part(&self) -> String {
        match self.source() {
            Some(source) => source.to_string(),
            None => self.encode(),
        }
    }
}

/// Decode one base64url part into a JSON object
pub(crate) fn decode_object(part: &str, what: &str) -> Result<Map<String, Value>, TokenError> {
    let bytes = base64url::decode(part)
        .map_err(|e| TokenError::structure(format!("{what} is not valid base64url: {e}")))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenError::structure(format!("{what} is not a JSON object"))),
        Err(e) => Err(TokenError::structure(format!("Invalid JSON in {what}: {e}"))),
    }
}

/// Read an optional string field, rejecting other JSON types
pub(crate) fn optional_string(
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, TokenError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(TokenError::structure(format!("`{key}` must be a string"))),
    }
}

/// Read an optional integer field, rejecting other JSON types
pub(crate) fn optional_int(map: &Map<String, Value>, key: &str) -> Result<Option<i64>, TokenError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| TokenError::structure(format!("`{key}` must be an integer"))),
        Some(_) => Err(TokenError::structure(format!("`{key}` must be an integer"))),
    }
}
