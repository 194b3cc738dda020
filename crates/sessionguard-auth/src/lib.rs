//! # SessionGuard Auth
//!
//! Session management on top of [`sessionguard_token`]: minting token pairs,
//! single-use refresh-token exchange, and transparent auto-refresh that
//! coalesces concurrent requests carrying the same expiring token.
//!
//! ## Architecture
//!
//! - `cache` - [`TtlCache`] contract and the in-memory [`MemoryCache`]
//! - `redis_cache` - Redis backend (feature-gated: `redis-storage`)
//! - `identity` - [`JwtSubject`] and [`IdentityStore`], implemented by the host
//! - `issuer` - [`TokenIssuer`] signs access tokens and issues refresh tokens
//! - `refresh` - [`RefreshTokenStore`] records behind opaque refresh tokens
//! - `auto_refresh` - [`AutoRefreshCoordinator`] and its two cache entries
//! - `service` - [`AuthService`], the request-level entry point
//! - `middleware` - tower layer (feature-gated: `middleware`)
//! - `config` - [`AuthConfig`] loaded from files, environment or a builder
//!
//! ## Feature Flags
//!
//! - `middleware` / `tower` - [`middleware::AutoRefreshLayer`]
//! - `redis-storage` - `RedisCache`
//! - `full` - everything
//!
//! All time-dependent operations take `now` (seconds since epoch) explicitly.

pub mod auto_refresh;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod refresh;
pub mod service;

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "redis-storage")]
pub mod redis_cache;

pub use auto_refresh::{AutoRefreshCoordinator, RefreshMode};
pub use cache::{CacheError, MemoryCache, TtlCache};
pub use config::{AuthConfig, AuthConfigBuilder, ConfigError};
pub use error::AuthError;
pub use identity::{IdentityStore, JwtSubject};
pub use issuer::{IssuedTokens, TokenIssuer};
pub use refresh::{RefreshTokenRecord, RefreshTokenStore};
pub use service::{AuthService, Authenticated, bearer_token};

#[cfg(feature = "redis-storage")]
pub use redis_cache::RedisCache;

pub use sessionguard_token as token;

/// Auth result type
pub type Result<T> = std::result::Result<T, AuthError>;
