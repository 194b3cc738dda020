//! Token error taxonomy
//!
//! Every failure the codec, signer or validator can produce is a [`TokenError`].
//! Each variant exposes a structured [`ErrorContext`] for diagnostics and an
//! HTTP-style status code (400 for malformed input, 401 for authentication
//! failures) so integration layers can map errors without string matching.

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Ordered diagnostic context attached to an error (e.g. `{exp, now}`)
pub type ErrorContext = Map<String, Value>;

/// Errors produced while decoding, signing or validating a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Input is not valid unpadded base64url
    #[error("Invalid base64url encoding: {reason}")]
    MalformedEncoding {
        /// What made the input undecodable
        reason: String,
    },

    /// Wrong part count, empty part, bad JSON or a claim of the wrong type
    #[error("Invalid JWT token structure: {reason}")]
    InvalidTokenStructure {
        /// Which structural rule was violated
        reason: String,
    },

    /// Header `alg` names an algorithm this crate does not implement
    #[error("Unsupported JWT algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// The algorithm name as it appeared in the header
        algorithm: String,
    },

    /// Signature does not match the signed header and payload
    #[error("JWT signature verification failed")]
    InvalidSignature,

    /// Current time is past the `exp` claim
    #[error("JWT token has expired")]
    ExpiredToken {
        /// Expiry claim (seconds since epoch)
        exp: i64,
        /// Validation time (seconds since epoch)
        now: i64,
    },

    /// Current time is before the `nbf` claim
    #[error("JWT token is not yet valid")]
    FutureToken {
        /// Not-before claim (seconds since epoch)
        nbf: i64,
        /// Validation time (seconds since epoch)
        now: i64,
    },
}

impl TokenError {
    /// Shorthand for [`TokenError::InvalidTokenStructure`]
    pub fn structure(reason: impl Into<String>) -> Self {
        Self::InvalidTokenStructure {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TokenError::MalformedEncoding`]
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            reason: reason.into(),
        }
    }

    /// Structured diagnostic context for this error
    #[must_use]
    pub fn context(&self) -> ErrorContext {
        let value = match self {
            Self::MalformedEncoding { reason } | Self::InvalidTokenStructure { reason } => {
                json!({ "reason": reason })
            }
            Self::UnsupportedAlgorithm { algorithm } => json!({ "algorithm": algorithm }),
            Self::InvalidSignature => json!({}),
            Self::ExpiredToken { exp, now } => json!({ "exp": exp, "current_time": now }),
            Self::FutureToken { nbf, now } => json!({ "nbf": nbf, "current_time": now }),
        };
        match value {
            Value::Object(map) => map,
            _ => ErrorContext::new(),
        }
    }

    /// HTTP-style status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedEncoding { .. }
            | Self::InvalidTokenStructure { .. }
            | Self::UnsupportedAlgorithm { .. } => 400,
            Self::InvalidSignature | Self::ExpiredToken { .. } | Self::FutureToken { .. } => 401,
        }
    }

    /// Whether this is an expiry failure (the only one eligible for auto-refresh)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::ExpiredToken { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_context_carries_times() {
        let err = TokenError::ExpiredToken {
            exp: 100,
            now: 250,
        };
        let ctx = err.context();
        assert_eq!(ctx["exp"], 100);
        assert_eq!(ctx["current_time"], 250);
        assert_eq!(err.status_code(), 401);
        assert!(err.is_expired());
    }

    #[test]
    fn test_structural_errors_are_client_errors() {
        assert_eq!(TokenError::structure("bad").status_code(), 400);
        assert_eq!(TokenError::encoding("bad").status_code(), 400);
        let unsupported = TokenError::UnsupportedAlgorithm {
            algorithm: "none".to_string(),
        };
        assert_eq!(unsupported.status_code(), 400);
        assert_eq!(unsupported.context()["algorithm"], "none");
        assert_eq!(unsupported.to_string(), "Unsupported JWT algorithm: none");
    }

    #[test]
    fn test_signature_context_is_empty() {
        assert!(TokenError::InvalidSignature.context().is_empty());
        assert!(!TokenError::InvalidSignature.is_expired());
    }
}
