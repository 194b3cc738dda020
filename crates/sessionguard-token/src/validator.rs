//! Access-token validation: signature first, then the time window

use tracing::debug;

use crate::error::TokenError;
use crate::signer::HmacSigner;
use crate::token::Token;

/// Validate `token` at `now`
///
/// Checks run in a fixed order so a forged token never reaches the time
/// checks: signature, then `nbf`, then `exp`. A token is still valid in the
/// second `now == exp`.
///
/// # Errors
///
/// - [`TokenError::InvalidSignature`] if the signature is missing or wrong
/// - [`TokenError::FutureToken`] if `now < nbf`
/// - [`TokenError::ExpiredToken`] if `now > exp`
pub fn validate(token: &Token, signer: &HmacSigner, now: i64) -> Result<(), TokenError> {
    let signature = token.signature().ok_or(TokenError::InvalidSignature)?;
    signer.verify(
        token.header.algorithm,
        token.signing_input().as_bytes(),
        signature,
    )?;

    if let Some(nbf) = token.payload.nbf
        && now < nbf
    {
        return Err(TokenError::FutureToken { nbf, now });
    }

    let exp = token.payload.exp;
    if now > exp {
        return Err(TokenError::ExpiredToken { exp, now });
    }

    Ok(())
}

/// Validator bound to a signer
#[derive(Debug, Clone)]
pub struct AccessTokenValidator {
    signer: HmacSigner,
}

impl AccessTokenValidator {
    pub fn new(signer: HmacSigner) -> Self {
        Self { signer }
    }

    /// The signer used for verification
    pub fn signer(&self) -> &HmacSigner {
        &self.signer
    }

    /// Validate a decoded token at `now`
    ///
    /// # Errors
    ///
    /// See [`validate`].
    pub fn validate(&self, token: &Token, now: i64) -> Result<(), TokenError> {
        validate(token, &self.signer, now).inspect_err(|e| {
            debug!(error = %e, sub = ?token.payload.sub, "Access token rejected");
        })
    }

    /// Decode and validate a compact token at `now`
    ///
    /// # Errors
    ///
    /// Any decode error from [`Token::decode_at`], then see [`validate`].
    pub fn validate_str(&self, token: &str, now: i64) -> Result<Token, TokenError> {
        let token = Token::decode_at(token, now)?;
        self.validate(&token, now)?;
        Ok(token)
    }
}
