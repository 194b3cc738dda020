//! SessionGuard walkthrough
//!
//! Issues a token pair, authenticates with it, lets it expire into the grace
//! period to show transparent renewal (directly and through the tower layer),
//! then exchanges the refresh token.
//!
//! ```text
//! RUST_LOG=sessionguard_auth=debug cargo run -p sessionguard-demo
//! SESSIONGUARD_CONFIG=auth.toml cargo run -p sessionguard-demo
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use sessionguard_auth::middleware::{AutoRefreshLayer, REFRESHED_TOKEN_HEADER};
use sessionguard_auth::token::now_seconds;
use sessionguard_auth::{
    AuthConfig, AuthError, AuthService, Authenticated, IdentityStore, JwtSubject, MemoryCache,
};
use tower::{ServiceBuilder, ServiceExt, service_fn};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Account {
    id: String,
    plan: String,
}

impl JwtSubject for Account {
    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn custom_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("plan".into(), json!(self.plan));
        claims
    }
}

#[derive(Debug, Default)]
struct Accounts(DashMap<String, Account>);

impl Accounts {
    fn insert(&self, id: &str, plan: &str) {
        self.0.insert(
            id.to_string(),
            Account {
                id: id.to_string(),
                plan: plan.to_string(),
            },
        );
    }
}

#[async_trait]
impl IdentityStore for Accounts {
    type Identity = Account;

    async fn find(&self, identifier: &str) -> Result<Option<Account>, AuthError> {
        Ok(self.0.get(identifier).map(|a| a.clone()))
    }
}

fn load_config() -> anyhow::Result<AuthConfig> {
    if let Ok(path) = std::env::var("SESSIONGUARD_CONFIG") {
        return AuthConfig::from_file(&path).with_context(|| format!("loading {path}"));
    }
    Ok(AuthConfig::builder()
        .secret_key("demo-secret-key-that-is-32-bytes!")
        .access_token_lifetime(900)
        .auto_refresh(true)
        .grace_period(600)
        .preemptive_refresh(60)
        .build()?)
}

async fn whoami(req: http::Request<()>) -> Result<http::Response<String>, Infallible> {
    let body = req
        .extensions()
        .get::<Authenticated<Account>>()
        .map(|a| format!("hello {}", a.identity.id))
        .unwrap_or_else(|| "anonymous".to_string());
    Ok(http::Response::new(body))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let accounts = Arc::new(Accounts::default());
    accounts.insert("alice", "pro");

    let auth = Arc::new(AuthService::with_shared_identities(
        config,
        Arc::new(MemoryCache::new()),
        Arc::clone(&accounts),
    )?);
    let alice = accounts
        .find("alice")
        .await?
        .context("demo account missing")?;

    // 1. login
    let now = now_seconds();
    let issued = auth.generate_tokens(&alice, None, now).await?;
    info!(expires_at = issued.expires_at, "Issued token pair");
    println!("{}", serde_json::to_string_pretty(&issued)?);

    // 2. authenticate while valid
    let session = auth
        .authenticate(&issued.access_token, now)
        .await
        .context("fresh token rejected")?;
    info!(subject = %session.identity.id, refreshed = session.was_refreshed(), "Authenticated");

    // 3. two minutes after expiry the token is still inside the grace period
    let later = issued.expires_at + 120;
    accounts.insert("alice", "enterprise");
    let renewed = auth
        .authenticate(&issued.access_token, later)
        .await
        .context("grace-period renewal failed")?;
    info!(
        plan = ?renewed.token.payload.prop("plan"),
        "Expired token renewed with current claims"
    );

    // 4. the same flow through the tower layer, with a token that just expired
    let stale = auth.generate_tokens(&alice, Some(1), now - 30).await?;
    let service = ServiceBuilder::new()
        .layer(AutoRefreshLayer::from_arc(Arc::clone(&auth)))
        .service(service_fn(whoami));
    let response = service
        .oneshot(
            http::Request::builder()
                .header(
                    http::header::AUTHORIZATION,
                    format!("Bearer {}", stale.access_token),
                )
                .body(())?,
        )
        .await?;
    info!(
        body = %response.body(),
        refreshed = response.headers().contains_key(REFRESHED_TOKEN_HEADER),
        "Middleware response"
    );

    // 5. exchange the refresh token, then try to reuse it
    let exchanged = auth.refresh_access_token(&issued.refresh_token, later).await?;
    info!(expires_at = exchanged.expires_at, "Exchanged refresh token");
    match auth.refresh_access_token(&issued.refresh_token, later).await {
        Err(AuthError::InvalidRefreshToken) => info!("Reused refresh token rejected"),
        other => anyhow::bail!("refresh token was accepted twice: {other:?}"),
    }

    Ok(())
}
