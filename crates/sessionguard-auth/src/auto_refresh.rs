//! Transparent renewal of expiring and recently expired access tokens
//!
//! Two cache entries are keyed by the fingerprint of the token being
//! replaced:
//!
//! - `auto_refresh:token:{fp}` holds the encoded replacement so concurrent
//!   requests carrying the same token share one new token
//! - `auto_refresh:processed:{fp}` marks the token as handled until its grace
//!   period ends, so it cannot spawn a chain of replacements
//!
//! Both are best-effort. Every failure here degrades to "no refresh".

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sessionguard_token::Token;
use tracing::{debug, info, warn};

use crate::cache::{TtlCache, ttl_from_secs};
use crate::config::AutoRefreshConfig;
use crate::identity::IdentityStore;
use crate::issuer::TokenIssuer;

/// How a refresh was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshMode {
    /// The token is still valid and close to expiry
    pub preemptive: bool,
    /// Skip the dedup and staleness checks and always mint
    pub force: bool,
}

impl RefreshMode {
    /// Token failed validation as expired
    pub const GRACE: Self = Self {
        preemptive: false,
        force: false,
    };

    /// Token is valid but inside the preemptive window
    pub const PREEMPTIVE: Self = Self {
        preemptive: true,
        force: false,
    };

    /// Explicit refresh requested by the caller
    pub const FORCED: Self = Self {
        preemptive: true,
        force: true,
    };
}

/// Cache-coordinated auto-refresh
pub struct AutoRefreshCoordinator<S> {
    cache: Arc<dyn TtlCache>,
    identities: Arc<S>,
    issuer: TokenIssuer,
    prefix: String,
    grace_period: i64,
    cache_ttl: i64,
}

impl<S> fmt::Debug for AutoRefreshCoordinator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRefreshCoordinator")
            .field("prefix", &self.prefix)
            .field("grace_period", &self.grace_period)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl<S: IdentityStore> AutoRefreshCoordinator<S> {
    pub fn new(
        cache: Arc<dyn TtlCache>,
        identities: Arc<S>,
        issuer: TokenIssuer,
        prefix: impl Into<String>,
        settings: &AutoRefreshConfig,
    ) -> Self {
        Self {
            cache,
            identities,
            issuer,
            prefix: prefix.into(),
            grace_period: settings.grace_period,
            cache_ttl: settings.cache_ttl,
        }
    }

    /// Key of the cached replacement for `fingerprint`
    pub fn token_key(&self, fingerprint: &str) -> String {
        format!("{}auto_refresh:token:{fingerprint}", self.prefix)
    }

    /// Key of the processed marker for `fingerprint`
    pub fn processed_key(&self, fingerprint: &str) -> String {
        format!("{}auto_refresh:processed:{fingerprint}", self.prefix)
    }

    /// Produce a replacement for `token`, or `None`
    ///
    /// Unless forced, a replacement already minted for this exact token is
    /// returned as-is, and tokens past their grace period or already handled
    /// are refused. A new token keeps the original `exp - iat` lifetime.
    pub async fn refresh(&self, token: &Token, mode: RefreshMode, now: i64) -> Option<Token> {
        let Some(fingerprint) = token.fingerprint() else {
            debug!("Cannot auto-refresh an unsigned token");
            return None;
        };
        let fp = short(fingerprint);

        if !mode.force {
            if let Some(cached) = self.cached_replacement(fingerprint, now).await {
                debug!(fingerprint = fp, "Reusing cached replacement token");
                return Some(cached);
            }

            let overdue = now.saturating_sub(token.payload.exp);
            if overdue > self.grace_period {
                debug!(
                    fingerprint = fp,
                    overdue,
                    grace_period = self.grace_period,
                    "Token is past its grace period"
                );
                return None;
            }

            match self.cache.has(&self.processed_key(fingerprint)).await {
                Ok(false) => {}
                Ok(true) => {
                    debug!(fingerprint = fp, "Token was already refreshed once");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Auto-refresh marker lookup failed");
                    return None;
                }
            }
        }

        let subject = token.payload.sub.as_deref()?;
        let identity = match self.identities.find(subject).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!(subject, "Auto-refresh subject no longer exists");
                return None;
            }
            Err(e) => {
                warn!(subject, error = %e, "Auto-refresh identity lookup failed");
                return None;
            }
        };

        let original_lifetime = token.payload.lifetime();
        let lifetime = if original_lifetime > 0 {
            original_lifetime
        } else {
            self.issuer.default_lifetime()
        };

        let issued = match self.issuer.mint(&identity, Some(lifetime), now).await {
            Ok(issued) => issued,
            Err(e) => {
                warn!(subject, error = %e, "Auto-refresh minting failed");
                return None;
            }
        };

        let cache_ttl = if mode.preemptive {
            issued.token.payload.remaining(now)
        } else {
            self.cache_ttl
        };
        self.remember(token, fingerprint, &issued.access_token, cache_ttl, now)
            .await;

        info!(
            subject,
            preemptive = mode.preemptive,
            forced = mode.force,
            expires_at = issued.expires_at,
            "Auto-refreshed access token"
        );
        Some(issued.token)
    }

    async fn cached_replacement(&self, fingerprint: &str, now: i64) -> Option<Token> {
        let value = match self.cache.get(&self.token_key(fingerprint)).await {
            Ok(value) => value?,
            Err(e) => {
                warn!(error = %e, "Auto-refresh cache lookup failed");
                return None;
            }
        };
        let Value::String(encoded) = value else {
            warn!("Ignoring non-string cached replacement token");
            return None;
        };
        Token::decode_at(&encoded, now)
            .inspect_err(|e| warn!(error = %e, "Ignoring undecodable cached replacement token"))
            .ok()
    }

    async fn remember(
        &self,
        original: &Token,
        fingerprint: &str,
        replacement: &str,
        cache_ttl: i64,
        now: i64,
    ) {
        if let Some(ttl) = ttl_from_secs(cache_ttl)
            && let Err(e) = self
                .cache
                .put(
                    &self.token_key(fingerprint),
                    Value::String(replacement.to_string()),
                    ttl,
                )
                .await
        {
            warn!(error = %e, "Failed to cache replacement token");
        }

        let marker_ttl = original
            .payload
            .exp
            .saturating_add(self.grace_period)
            .saturating_sub(now);
        if let Some(ttl) = ttl_from_secs(marker_ttl)
            && let Err(e) = self
                .cache
                .put(&self.processed_key(fingerprint), Value::Bool(true), ttl)
                .await
        {
            warn!(error = %e, "Failed to mark token as refreshed");
        }
    }
}

/// Log-safe prefix of a fingerprint
fn short(fingerprint: &str) -> &str {
    fingerprint.get(..8).unwrap_or(fingerprint)
}
