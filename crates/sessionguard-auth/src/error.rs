//! Authentication error types

use serde_json::json;
use sessionguard_token::{ErrorContext, TokenError};
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;

/// Errors surfaced by the refresh exchange and the authentication service
#[derive(Debug, Error)]
pub enum AuthError {
    /// Decoding or validating a token failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Refresh token is unknown, expired, already used, or its identity is gone
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// The TTL cache backend failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The identity store failed
    #[error("Identity store error: {0}")]
    Identity(String),

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl AuthError {
    /// Shorthand for [`AuthError::Identity`]
    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity(message.into())
    }

    /// Structured diagnostic context
    pub fn context(&self) -> ErrorContext {
        match self {
            Self::Token(e) => e.context(),
            Self::InvalidRefreshToken => ErrorContext::new(),
            Self::Cache(e) => object(json!({ "reason": e.to_string() })),
            Self::Identity(reason) | Self::Configuration(reason) => {
                object(json!({ "reason": reason }))
            }
        }
    }

    /// HTTP-style status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Token(e) => e.status_code(),
            Self::InvalidRefreshToken => 401,
            Self::Cache(_) | Self::Identity(_) | Self::Configuration(_) => 500,
        }
    }
}

fn object(value: serde_json::Value) -> ErrorContext {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ErrorContext::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_keep_their_context() {
        let err = AuthError::from(TokenError::ExpiredToken { exp: 10, now: 20 });
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.context()["exp"], 10);
        assert_eq!(err.to_string(), "JWT token has expired");
    }

    #[test]
    fn test_refresh_and_backend_errors() {
        assert_eq!(AuthError::InvalidRefreshToken.status_code(), 401);
        assert!(AuthError::InvalidRefreshToken.context().is_empty());

        let err = AuthError::identity("database offline");
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.context()["reason"], "database offline");
    }
}
