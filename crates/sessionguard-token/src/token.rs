//! Compact three-part token
//!
//! `base64url(header) "." base64url(payload) "." base64url(signature)`

use std::fmt;

use tracing::trace;

use crate::clock::now_seconds;
use crate::error::TokenError;
use crate::header::Header;
use crate::payload::Payload;
use crate::segment::Segment;
use crate::signer::HmacSigner;

/// A decoded or freshly built token
///
/// Tokens are values: refreshing produces a new token rather than mutating
/// this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Header segment
    pub header: Header,
    /// Payload segment
    pub payload: Payload,
    signature: Option<String>,
}

impl Token {
    /// Unsigned token from its two segments
    #[must_use]
    pub fn new(header: Header, payload: Payload) -> Self {
        Self {
            header,
            payload,
            signature: None,
        }
    }

    /// Decode a compact token, defaulting missing `iat`/`exp` to the system clock
    ///
    /// # Errors
    ///
    /// See [`Token::decode_at`].
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        Self::decode_at(token, now_seconds())
    }

    /// Decode a compact token, defaulting missing `iat`/`exp` to `now`
    ///
    /// The signature is kept in its encoded form; nothing is verified here.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidTokenStructure`] unless there are exactly three
    ///   non-empty parts with well-formed header and payload JSON
    /// - [`TokenError::UnsupportedAlgorithm`] for a non-HS* `alg`
    pub fn decode_at(token: &str, now: i64) -> Result<Self, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(TokenError::structure(format!(
                "expected 3 parts, found {}",
                parts.len()
            )));
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(TokenError::structure("token part is empty"));
        }

        let token = Self {
            header: Header::decode(header)?,
            payload: Payload::decode(payload, now)?,
            signature: Some((*signature).to_string()),
        };
        trace!(alg = %token.header.algorithm, sub = ?token.payload.sub, "Decoded token");
        Ok(token)
    }

    /// Bytes covered by the signature: `header "." payload`, using the
    /// original substrings when the token was decoded
    #[must_use]
    pub fn signing_input(&self) -> String {
        format!(
            "{}.{}",
            self.header.signing_part(),
            self.payload.signing_part()
        )
    }

    /// Sign and serialize to the compact form
    ///
    /// Always emits the canonical encoding of both segments with a fresh
    /// signature over them.
    #[must_use]
    pub fn encode(&self, signer: &HmacSigner) -> String {
        let input = format!("{}.{}", self.header.encode(), self.payload.encode());
        let signature = signer.sign_encoded(self.header.algorithm, input.as_bytes());
        format!("{input}.{signature}")
    }

    /// Encoded signature part, if the token was decoded
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Coalescing key for this exact token: its encoded signature
    ///
    /// Never use this for authorization decisions.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.signature()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signing_input())?;
        if let Some(signature) = &self.signature {
            write!(f, ".{signature}")?;
        }
        Ok(())
    }
}
