//! Redis-backed [`TtlCache`]
//!
//! Values are stored as JSON strings with `SET EX`; `pull` maps to `GETDEL`
//! so refresh-token exchange stays single-use across processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::{CacheError, TtlCache};

/// Shared cache on a Redis server
#[derive(Debug, Clone)]
pub struct RedisCache {
    client: Client,
    max_retries: u32,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] when the URL is invalid or the server is
    /// unreachable.
    pub async fn new(connection_string: &str) -> Result<Self, CacheError> {
        let client = Client::open(connection_string)
            .map_err(|e| CacheError::backend(format!("Failed to create Redis client: {e}")))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::backend(format!("Failed to connect to Redis: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend(format!("Redis ping failed: {e}")))?;

        debug!("Redis connection established");

        Ok(Self {
            client,
            max_retries: 3,
        })
    }

    /// Override the retry budget per operation
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    async fn with_retries<F, T>(&self, operation: F) -> Result<T, CacheError>
    where
        F: Fn() -> futures::future::BoxFuture<'static, RedisResult<T>>,
        T: Send + 'static,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempts >= self.max_retries => {
                    error!(attempts, error = %e, "Redis operation failed");
                    return Err(CacheError::backend(format!("Redis operation failed: {e}")));
                }
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Redis operation failed, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempts))).await;
                }
            }
        }
    }

    fn parse(raw: Option<String>) -> Result<Option<Value>, CacheError> {
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(CacheError::from)
    }
}

#[async_trait]
impl TtlCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let client = self.client.clone();
        let key = key.to_string();
        let raw: Option<String> = self
            .with_retries(|| {
                let client = client.clone();
                let key = key.clone();
                Box::pin(async move {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    conn.get(&key).await
                })
            })
            .await?;
        Self::parse(raw)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return Ok(());
        }
        let serialized = serde_json::to_string(&value)?;
        let client = self.client.clone();
        let key = key.to_string();
        self.with_retries(|| {
            let client = client.clone();
            let key = key.clone();
            let serialized = serialized.clone();
            Box::pin(async move {
                let mut conn = client.get_multiplexed_async_connection().await?;
                conn.set_ex(&key, serialized, ttl_secs).await
            })
        })
        .await
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        let client = self.client.clone();
        let key = key.to_string();
        let removed: u64 = self
            .with_retries(|| {
                let client = client.clone();
                let key = key.clone();
                Box::pin(async move {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    conn.del(&key).await
                })
            })
            .await?;
        Ok(removed > 0)
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let client = self.client.clone();
        let key = key.to_string();
        self.with_retries(|| {
            let client = client.clone();
            let key = key.clone();
            Box::pin(async move {
                let mut conn = client.get_multiplexed_async_connection().await?;
                conn.exists(&key).await
            })
        })
        .await
    }

    async fn pull(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let client = self.client.clone();
        let key = key.to_string();
        let raw: Option<String> = self
            .with_retries(|| {
                let client = client.clone();
                let key = key.clone();
                Box::pin(async move {
                    let mut conn = client.get_multiplexed_async_connection().await?;
                    conn.get_del(&key).await
                })
            })
            .await?;
        Self::parse(raw)
    }
}
