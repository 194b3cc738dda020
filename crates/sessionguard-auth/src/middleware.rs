//! Tower middleware that authenticates requests and hands renewed tokens back
//!
//! On each request the `Authorization: Bearer` token is run through
//! [`AuthService::authenticate`]. On success the [`Authenticated`] value is
//! inserted into the request extensions. When a replacement token was minted,
//! the response carries it in [`REFRESHED_TOKEN_HEADER`] so clients can swap
//! tokens without a separate refresh round-trip.
//!
//! Unauthenticated requests pass through untouched; rejecting them is up to
//! the inner service.
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use sessionguard_auth::middleware::AutoRefreshLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(AutoRefreshLayer::new(auth_service))
//!     .service(my_http_handler);
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use sessionguard_token::now_seconds;
use tower::Layer;
use tower_service::Service;
use tracing::{trace, warn};

use crate::identity::IdentityStore;
use crate::service::{AuthService, bearer_token};

/// Response header carrying a renewed access token
pub const REFRESHED_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-refreshed-token");

/// Layer producing [`AutoRefreshService`]
pub struct AutoRefreshLayer<S> {
    auth: Arc<AuthService<S>>,
}

impl<S> Clone for AutoRefreshLayer<S> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<S> AutoRefreshLayer<S> {
    pub fn new(auth: AuthService<S>) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }

    /// Share an existing service with other parts of the host
    pub fn from_arc(auth: Arc<AuthService<S>>) -> Self {
        Self { auth }
    }
}

impl<Inner, S> Layer<Inner> for AutoRefreshLayer<S> {
    type Service = AutoRefreshService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AutoRefreshService {
            inner,
            auth: Arc::clone(&self.auth),
        }
    }
}

/// Service that authenticates requests and surfaces renewed tokens
pub struct AutoRefreshService<Inner, S> {
    inner: Inner,
    auth: Arc<AuthService<S>>,
}

impl<Inner: Clone, S> Clone for AutoRefreshService<Inner, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<Inner, S> AutoRefreshService<Inner, S> {
    pub fn inner(&self) -> &Inner {
        &self.inner
    }
}

impl<Inner, S, B, ResBody> Service<http::Request<B>> for AutoRefreshService<Inner, S>
where
    Inner: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    Inner::Future: Send,
    S: IdentityStore + 'static,
    B: Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = Inner::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // the clone is not ready; use the one poll_ready was called on
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let auth = Arc::clone(&self.auth);

        let bearer = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        Box::pin(async move {
            let mut refreshed = None;
            if let Some(bearer) = bearer
                && let Some(authenticated) = auth.authenticate(&bearer, now_seconds()).await
            {
                refreshed = authenticated.refreshed_token.clone();
                req.extensions_mut().insert(authenticated);
            } else {
                trace!("Request is not authenticated");
            }

            let mut response = inner.call(req).await?;

            if let Some(token) = refreshed {
                match HeaderValue::from_str(&token) {
                    Ok(value) => {
                        response
                            .headers_mut()
                            .insert(REFRESHED_TOKEN_HEADER, value);
                    }
                    Err(e) => warn!(error = %e, "Refreshed token is not a valid header value"),
                }
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::AuthConfig;
    use crate::error::AuthError;
    use crate::identity::JwtSubject;
    use crate::service::Authenticated;
    use async_trait::async_trait;
    use std::convert::Infallible;
    use tower::{ServiceBuilder, ServiceExt, service_fn};

    #[derive(Debug, Clone)]
    struct User(String);

    impl JwtSubject for User {
        fn identifier(&self) -> String {
            self.0.clone()
        }
    }

    struct Users;

    #[async_trait]
    impl IdentityStore for Users {
        type Identity = User;

        async fn find(&self, identifier: &str) -> Result<Option<User>, AuthError> {
            Ok((identifier == "u1").then(|| User("u1".into())))
        }
    }

    fn auth() -> AuthService<Users> {
        let config = AuthConfig::builder()
            .secret_key("s3cr3t-key-32-bytes-minimum-xx")
            .auto_refresh(true)
            .build()
            .unwrap();
        AuthService::new(config, Arc::new(MemoryCache::new()), Users).unwrap()
    }

    async fn echo_subject(
        req: http::Request<()>,
    ) -> Result<http::Response<String>, Infallible> {
        let body = req
            .extensions()
            .get::<Authenticated<User>>()
            .map(|a| a.identity.0.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        Ok(http::Response::new(body))
    }

    fn request(token: Option<&str>) -> http::Request<()> {
        let mut builder = http::Request::builder().uri("/me");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_sets_extension_without_header() {
        let auth = auth();
        let now = now_seconds();
        let issued = auth
            .generate_tokens(&User("u1".into()), None, now)
            .await
            .unwrap();

        let service = ServiceBuilder::new()
            .layer(AutoRefreshLayer::new(auth))
            .service(service_fn(echo_subject));
        let response = service
            .oneshot(request(Some(&issued.access_token)))
            .await
            .unwrap();

        assert_eq!(response.body(), "u1");
        assert!(response.headers().get(REFRESHED_TOKEN_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_expired_token_gets_replacement_header() {
        let auth = auth();
        let now = now_seconds();
        let issued = auth
            .generate_tokens(&User("u1".into()), Some(60), now - 120)
            .await
            .unwrap();

        let service = ServiceBuilder::new()
            .layer(AutoRefreshLayer::new(auth))
            .service(service_fn(echo_subject));
        let response = service
            .oneshot(request(Some(&issued.access_token)))
            .await
            .unwrap();

        assert_eq!(response.body(), "u1");
        let header = response.headers().get(REFRESHED_TOKEN_HEADER).unwrap();
        assert_ne!(header.to_str().unwrap(), issued.access_token);
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_passes_through() {
        for token in [None, Some("not-a-token")] {
            let service = ServiceBuilder::new()
                .layer(AutoRefreshLayer::new(auth()))
                .service(service_fn(echo_subject));
            let response = service.oneshot(request(token)).await.unwrap();
            assert_eq!(response.body(), "anonymous");
            assert!(response.headers().get(REFRESHED_TOKEN_HEADER).is_none());
        }
    }
}
