//! HMAC signing algorithms
//!
//! Only the symmetric HS* family is supported. The `alg` header value maps
//! one-to-one onto a `ring::hmac` primitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// HMAC algorithm selector carried in the token header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// HMAC with SHA-256
    #[default]
    #[serde(rename = "HS256")]
    HS256,

    /// HMAC with SHA-384
    #[serde(rename = "HS384")]
    HS384,

    /// HMAC with SHA-512
    #[serde(rename = "HS512")]
    HS512,
}

impl Algorithm {
    /// All supported algorithms
    pub const ALL: [Self; 3] = [Self::HS256, Self::HS384, Self::HS512];

    /// Header name for the algorithm
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    /// The `ring` HMAC primitive backing this algorithm
    #[must_use]
    pub fn hmac(self) -> ring::hmac::Algorithm {
        match self {
            Self::HS256 => ring::hmac::HMAC_SHA256,
            Self::HS384 => ring::hmac::HMAC_SHA384,
            Self::HS512 => ring::hmac::HMAC_SHA512,
        }
    }

    /// Raw signature length in bytes
    #[must_use]
    pub fn signature_len(self) -> usize {
        match self {
            Self::HS256 => 32,
            Self::HS384 => 48,
            Self::HS512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(TokenError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}
