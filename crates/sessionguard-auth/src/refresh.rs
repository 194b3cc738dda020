//! Opaque single-use refresh tokens
//!
//! A refresh token is 128 random alphanumeric characters. Only its MD5 digest
//! appears in the cache key, and the record holds the identifier plus the
//! lifetime of the session it belongs to, so an exchange can mint a token
//! with the same duration.

use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cache::{TtlCache, ttl_from_secs};
use crate::error::AuthError;

/// Length of issued refresh tokens
pub const REFRESH_TOKEN_LENGTH: usize = 128;

/// Cached state behind a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Identity the session belongs to
    pub identifier: String,
    /// Access-token lifetime to reuse on exchange, in seconds
    pub lifetime: i64,
}

/// Random alphanumeric string of `len` characters from the thread-local CSPRNG
pub(crate) fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Refresh-token records in a [`TtlCache`]
#[derive(Clone)]
pub struct RefreshTokenStore {
    cache: Arc<dyn TtlCache>,
    prefix: String,
    refresh_lifetime: i64,
}

impl fmt::Debug for RefreshTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenStore")
            .field("prefix", &self.prefix)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenStore {
    /// `refresh_lifetime` is how long a refresh token outlives its access token
    pub fn new(cache: Arc<dyn TtlCache>, prefix: impl Into<String>, refresh_lifetime: i64) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            refresh_lifetime,
        }
    }

    /// Cache key for a refresh token: `{prefix}rt:{md5 hex}`
    pub fn key(&self, refresh_token: &str) -> String {
        format!(
            "{}rt:{:x}",
            self.prefix,
            Md5::digest(refresh_token.as_bytes())
        )
    }

    /// Issue a refresh token for `identifier`, paired with an access token
    /// expiring at `access_expires_at`
    ///
    /// The record expires `refresh_lifetime` seconds after the access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] when the record cannot be stored.
    pub async fn issue(
        &self,
        identifier: &str,
        access_expires_at: i64,
        lifetime: i64,
        now: i64,
    ) -> Result<String, AuthError> {
        let refresh_token = random_alphanumeric(REFRESH_TOKEN_LENGTH);
        let record = RefreshTokenRecord {
            identifier: identifier.to_string(),
            lifetime,
        };

        let ttl_secs = access_expires_at + self.refresh_lifetime - now;
        match ttl_from_secs(ttl_secs) {
            Some(ttl) => {
                let value = serde_json::to_value(&record).map_err(crate::cache::CacheError::from)?;
                self.cache.put(&self.key(&refresh_token), value, ttl).await?;
                trace!(subject = identifier, ttl_secs, "Stored refresh token record");
            }
            None => {
                warn!(
                    subject = identifier,
                    ttl_secs, "Refresh token would already be expired, not storing it"
                );
            }
        }

        Ok(refresh_token)
    }

    /// Look up a record without consuming it
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] on backend failure.
    pub async fn peek(&self, refresh_token: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let value = self.cache.get(&self.key(refresh_token)).await?;
        Ok(value.and_then(decode_record))
    }

    /// Atomically fetch and delete the record for `refresh_token`
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRefreshToken`] when there is no live record
    /// - [`AuthError::Cache`] on backend failure
    pub async fn take(&self, refresh_token: &str) -> Result<RefreshTokenRecord, AuthError> {
        let value = self.cache.pull(&self.key(refresh_token)).await?;
        value.and_then(decode_record).ok_or_else(|| {
            debug!("Refresh token not found or already used");
            AuthError::InvalidRefreshToken
        })
    }

    /// Delete a refresh token, returning whether it was live
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] on backend failure.
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool, AuthError> {
        Ok(self.cache.forget(&self.key(refresh_token)).await?)
    }
}

fn decode_record(value: serde_json::Value) -> Option<RefreshTokenRecord> {
    serde_json::from_value(value)
        .inspect_err(|e| warn!(error = %e, "Discarding malformed refresh token record"))
        .ok()
}
