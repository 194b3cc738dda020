//! HMAC signing and constant-time verification
//!
//! Signatures are computed with `ring::hmac` and compared in their base64url
//! form using `subtle`, so verification time does not depend on where a
//! forged signature first differs from the expected one.

use std::fmt;
use std::sync::Arc;

use ring::hmac;
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

use crate::algorithm::Algorithm;
use crate::base64url;
use crate::error::TokenError;

/// Compute the raw HMAC of `message` under `key`
#[must_use]
pub fn sign(algorithm: Algorithm, key: &[u8], message: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(algorithm.hmac(), key);
    hmac::sign(&key, message).as_ref().to_vec()
}

/// Verify a base64url-encoded signature over `message`
///
/// # Errors
///
/// Returns [`TokenError::InvalidSignature`] when the signature does not match.
pub fn verify(
    algorithm: Algorithm,
    key: &[u8],
    message: &[u8],
    encoded_signature: &str,
) -> Result<(), TokenError> {
    let expected = base64url::encode(sign(algorithm, key, message));
    if constant_time_compare(&expected, encoded_signature) {
        Ok(())
    } else {
        Err(TokenError::InvalidSignature)
    }
}

/// Constant-time string comparison
///
/// `ct_eq` on slices of different length returns false without inspecting
/// content; the length of a signature is public information.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Signer bound to a shared secret
///
/// Cheap to clone; the key material is shared and zeroized when the last
/// clone is dropped.
#[derive(Clone)]
pub struct HmacSigner {
    key: Arc<Secret<Vec<u8>>>,
}

impl HmacSigner {
    /// Create a signer from raw secret bytes
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key: Arc::new(Secret::new(secret.into())),
        }
    }

    /// Compute the raw signature of `message`
    #[must_use]
    pub fn sign(&self, algorithm: Algorithm, message: &[u8]) -> Vec<u8> {
        sign(algorithm, self.key.expose_secret(), message)
    }

    /// Compute the base64url-encoded signature of `message`
    #[must_use]
    pub fn sign_encoded(&self, algorithm: Algorithm, message: &[u8]) -> String {
        base64url::encode(self.sign(algorithm, message))
    }

    /// Verify a base64url-encoded signature of `message`
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidSignature`] when the signature does not match.
    pub fn verify(
        &self,
        algorithm: Algorithm,
        message: &[u8],
        encoded_signature: &str,
    ) -> Result<(), TokenError> {
        verify(
            algorithm,
            self.key.expose_secret(),
            message,
            encoded_signature,
        )
    }

    /// Secret length in bytes
    #[must_use]
    pub fn key_len(&self) -> usize {
        self.key.expose_secret().len()
    }
}

// Never print key material
impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("key", &"<redacted>")
            .field("key_len", &self.key_len())
            .finish()
    }
}
