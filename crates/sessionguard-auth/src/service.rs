//! Request-level authentication: validation, renewal and refresh exchange

use std::fmt;
use std::sync::Arc;

use sessionguard_token::{AccessTokenValidator, Token};
use tracing::{debug, warn};

use crate::auto_refresh::{AutoRefreshCoordinator, RefreshMode};
use crate::cache::TtlCache;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::identity::IdentityStore;
use crate::issuer::{IssuedTokens, TokenIssuer};
use crate::refresh::RefreshTokenStore;

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively; surrounding whitespace is ignored.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Outcome of a successful [`AuthService::authenticate`]
#[derive(Debug, Clone)]
pub struct Authenticated<I> {
    /// The resolved identity
    pub identity: I,
    /// The token the identity was resolved from (the replacement, if any)
    pub token: Token,
    /// Encoded replacement when the presented token was renewed
    pub refreshed_token: Option<String>,
}

impl<I> Authenticated<I> {
    /// Whether a replacement token was minted for this request
    pub fn was_refreshed(&self) -> bool {
        self.refreshed_token.is_some()
    }
}

/// Issues, validates and renews session tokens for one identity store
pub struct AuthService<S> {
    config: Arc<AuthConfig>,
    validator: AccessTokenValidator,
    issuer: TokenIssuer,
    refresh_tokens: RefreshTokenStore,
    coordinator: AutoRefreshCoordinator<S>,
    identities: Arc<S>,
}

impl<S> fmt::Debug for AuthService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl<S: IdentityStore> AuthService<S> {
    /// Wire a service from validated configuration, a cache and an identity store
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `config` fails validation.
    pub fn new(config: AuthConfig, cache: Arc<dyn TtlCache>, identities: S) -> Result<Self, AuthError> {
        Self::with_shared_identities(config, cache, Arc::new(identities))
    }

    /// Like [`AuthService::new`] for an identity store shared with the host
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `config` fails validation.
    pub fn with_shared_identities(
        config: AuthConfig,
        cache: Arc<dyn TtlCache>,
        identities: Arc<S>,
    ) -> Result<Self, AuthError> {
        config.validate()?;

        let signer = config.signer();
        let refresh_tokens = RefreshTokenStore::new(
            Arc::clone(&cache),
            config.cache_prefix.clone(),
            config.refresh_token.lifetime,
        );
        let issuer = TokenIssuer::new(
            signer.clone(),
            config.algorithm,
            config.access_token.lifetime,
            refresh_tokens.clone(),
        );
        let coordinator = AutoRefreshCoordinator::new(
            cache,
            Arc::clone(&identities),
            issuer.clone(),
            config.cache_prefix.clone(),
            &config.auto_refresh,
        );

        Ok(Self {
            config: Arc::new(config),
            validator: AccessTokenValidator::new(signer),
            issuer,
            refresh_tokens,
            coordinator,
            identities,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn identities(&self) -> &S {
        &self.identities
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    /// Mint a token pair, e.g. after a successful login
    ///
    /// `lifetime` defaults to the configured access-token lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] when the refresh token cannot be stored.
    pub async fn generate_tokens(
        &self,
        identity: &S::Identity,
        lifetime: Option<i64>,
        now: i64,
    ) -> Result<IssuedTokens, AuthError> {
        self.issuer.mint(identity, lifetime, now).await
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The refresh token is consumed before anything is minted, so a
    /// concurrent second exchange fails. The new access token keeps the
    /// session's original lifetime.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRefreshToken`] if the token is unknown, expired,
    ///   already used, or its identity no longer exists
    /// - [`AuthError::Cache`] / [`AuthError::Identity`] on backend failures
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        now: i64,
    ) -> Result<IssuedTokens, AuthError> {
        let record = self.refresh_tokens.take(refresh_token).await?;

        let Some(identity) = self.identities.find(&record.identifier).await? else {
            debug!(subject = %record.identifier, "Refresh token identity no longer exists");
            return Err(AuthError::InvalidRefreshToken);
        };

        let issued = self
            .issuer
            .mint(&identity, Some(record.lifetime), now)
            .await?;
        debug!(subject = %record.identifier, "Exchanged refresh token");
        Ok(issued)
    }

    /// Check signature and time window
    ///
    /// # Errors
    ///
    /// [`AuthError::Token`] with `InvalidSignature`, `FutureToken` or
    /// `ExpiredToken`.
    pub fn validate_access_token(&self, token: &Token, now: i64) -> Result<(), AuthError> {
        Ok(self.validator.validate(token, now)?)
    }

    /// Run the auto-refresh coordinator for `token`
    pub async fn handle_auto_refresh(
        &self,
        token: &Token,
        preemptive: bool,
        force: bool,
        now: i64,
    ) -> Option<Token> {
        self.coordinator
            .refresh(token, RefreshMode { preemptive, force }, now)
            .await
    }

    /// Authenticate a bearer token, renewing it when configured to
    ///
    /// Expired tokens are renewed within the grace period and valid tokens
    /// within the preemptive window, both only with auto-refresh enabled.
    /// Any failure yields `None`.
    pub async fn authenticate(&self, bearer: &str, now: i64) -> Option<Authenticated<S::Identity>> {
        let token = match Token::decode_at(bearer, now) {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Rejected malformed bearer token");
                return None;
            }
        };

        let auto_refresh = &self.config.auto_refresh;
        let (token, refreshed) = match self.validator.validate(&token, now) {
            Ok(()) => {
                let remaining = token.payload.remaining(now);
                let window = auto_refresh.preemptive_refresh;
                if auto_refresh.enabled && window > 0 && remaining > 0 && remaining < window {
                    match self.coordinator.refresh(&token, RefreshMode::PREEMPTIVE, now).await {
                        Some(replacement) => (replacement, true),
                        None => (token, false),
                    }
                } else {
                    (token, false)
                }
            }
            Err(e) if e.is_expired() && auto_refresh.enabled => {
                self.coordinator
                    .refresh(&token, RefreshMode::GRACE, now)
                    .await
                    .map(|replacement| (replacement, true))?
            }
            Err(_) => return None,
        };

        let identity = self.resolve(token.payload.sub.as_deref()?).await?;
        let refreshed_token = refreshed.then(|| token.to_string());
        Some(Authenticated {
            identity,
            token,
            refreshed_token,
        })
    }

    /// Renew the presented token on request, returning the encoded replacement
    ///
    /// The signature and `nbf` are checked first; only an expired token is
    /// accepted in place of a currently valid one. `force` skips the dedup
    /// and staleness checks. The replacement is cached until it expires.
    pub async fn refresh_current(&self, bearer: &str, force: bool, now: i64) -> Option<String> {
        let token = Token::decode_at(bearer, now)
            .inspect_err(|e| debug!(error = %e, "Cannot refresh malformed token"))
            .ok()?;
        match self.validator.validate(&token, now) {
            Ok(()) => {}
            Err(e) if e.is_expired() => {}
            Err(e) => {
                debug!(error = %e, "Refusing to refresh unverified token");
                return None;
            }
        }
        let mode = RefreshMode {
            preemptive: true,
            force,
        };
        self.coordinator
            .refresh(&token, mode, now)
            .await
            .map(|replacement| replacement.to_string())
    }

    async fn resolve(&self, identifier: &str) -> Option<S::Identity> {
        match self.identities.find(identifier).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(subject = identifier, error = %e, "Identity lookup failed");
                None
            }
        }
    }
}
