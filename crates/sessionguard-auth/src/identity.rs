//! Identity adapter contracts
//!
//! The host application owns users. This crate only needs to turn an
//! identifier back into an identity and read the claims to embed in tokens.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AuthError;

/// An identity that can be the subject of a token
pub trait JwtSubject: Send + Sync {
    /// Stable identifier written to the `sub` claim
    fn identifier(&self) -> String;

    /// Extra claims embedded in every token minted for this identity
    fn custom_claims(&self) -> Map<String, Value> {
        Map::new()
    }
}

impl<T: JwtSubject + ?Sized> JwtSubject for Arc<T> {
    fn identifier(&self) -> String {
        (**self).identifier()
    }

    fn custom_claims(&self) -> Map<String, Value> {
        (**self).custom_claims()
    }
}

/// Lookup of identities by identifier
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Identity type returned by this store
    type Identity: JwtSubject + Clone + Send + Sync + 'static;

    /// Resolve an identifier; `Ok(None)` when no such identity exists
    ///
    /// # Errors
    ///
    /// Backend failures, usually [`AuthError::Identity`].
    async fn find(&self, identifier: &str) -> Result<Option<Self::Identity>, AuthError>;
}

#[async_trait]
impl<S: IdentityStore + ?Sized> IdentityStore for Arc<S> {
    type Identity = S::Identity;

    async fn find(&self, identifier: &str) -> Result<Option<Self::Identity>, AuthError> {
        (**self).find(identifier).await
    }
}
