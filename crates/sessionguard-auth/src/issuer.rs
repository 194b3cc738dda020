//! Minting access tokens paired with refresh tokens

use serde::Serialize;
use sessionguard_token::{Algorithm, Header, HmacSigner, Payload, Token};
use tracing::debug;

use crate::error::AuthError;
use crate::identity::JwtSubject;
use crate::refresh::{RefreshTokenStore, random_alphanumeric};

/// Length of the random suffix in `jti`
const JTI_SUFFIX_LENGTH: usize = 32;

/// Result of minting: what a login or refresh endpoint hands back
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    /// Encoded access token
    pub access_token: String,
    /// Decoded access token, carrying its source substrings and signature
    #[serde(skip)]
    pub token: Token,
    /// Single-use refresh token
    pub refresh_token: String,
    /// Access-token expiry, seconds since epoch
    pub expires_at: i64,
}

/// Signs access tokens and issues the matching refresh tokens
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    signer: HmacSigner,
    algorithm: Algorithm,
    default_lifetime: i64,
    refresh_tokens: RefreshTokenStore,
}

impl TokenIssuer {
    pub fn new(
        signer: HmacSigner,
        algorithm: Algorithm,
        default_lifetime: i64,
        refresh_tokens: RefreshTokenStore,
    ) -> Self {
        Self {
            signer,
            algorithm,
            default_lifetime,
            refresh_tokens,
        }
    }

    /// Lifetime used when `mint` is given none
    pub fn default_lifetime(&self) -> i64 {
        self.default_lifetime
    }

    /// Mint an access token for `identity` plus a fresh refresh token
    ///
    /// The payload carries `jti` (`<identifier>:<random>`), `iat`, `exp`,
    /// `sub` and the identity's custom claims. The custom claims are read on
    /// every call, so refreshed tokens pick up changed attributes.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Cache`] when the refresh token cannot be stored
    /// - [`AuthError::Token`] if the freshly signed token fails to decode
    pub async fn mint<I>(
        &self,
        identity: &I,
        lifetime: Option<i64>,
        now: i64,
    ) -> Result<IssuedTokens, AuthError>
    where
        I: JwtSubject + ?Sized,
    {
        let lifetime = lifetime.unwrap_or(self.default_lifetime);
        let identifier = identity.identifier();
        let expires_at = now + lifetime;

        let payload = Payload::new(now, expires_at)
            .with_jti(format!(
                "{identifier}:{}",
                random_alphanumeric(JTI_SUFFIX_LENGTH)
            ))
            .with_subject(identifier.as_str())
            .with_props(identity.custom_claims());

        let access_token = Token::new(Header::new(self.algorithm), payload).encode(&self.signer);
        let token = Token::decode_at(&access_token, now)?;

        let refresh_token = self
            .refresh_tokens
            .issue(&identifier, expires_at, lifetime, now)
            .await?;

        debug!(subject = %identifier, lifetime, expires_at, "Minted access token");

        Ok(IssuedTokens {
            access_token,
            token,
            refresh_token,
            expires_at,
        })
    }
}
