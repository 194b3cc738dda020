//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use sessionguard_auth::{
    AuthConfig, AuthError, AuthService, CacheError, IdentityStore, JwtSubject, MemoryCache,
    TtlCache,
};

pub const SECRET: &str = "s3cr3t-key-32-bytes-minimum-xx";
pub const NOW: i64 = 1_700_000_000;

/// Test user with a mutable role claim
#[derive(Debug, Clone, PartialEq)]
pub struct TestUser {
    pub id: String,
    pub role: String,
}

impl TestUser {
    pub fn new(id: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            role: role.to_string(),
        }
    }
}

impl JwtSubject for TestUser {
    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn custom_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("role".into(), json!(self.role));
        claims
    }
}

/// Identity store counting lookups
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    users: DashMap<String, TestUser>,
    lookups: AtomicUsize,
}

impl InMemoryUsers {
    pub fn with(users: impl IntoIterator<Item = TestUser>) -> Self {
        let store = Self::default();
        for user in users {
            store.insert(user);
        }
        store
    }

    pub fn insert(&self, user: TestUser) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn remove(&self, id: &str) {
        self.users.remove(id);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for InMemoryUsers {
    type Identity = TestUser;

    async fn find(&self, identifier: &str) -> Result<Option<TestUser>, AuthError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.get(identifier).map(|u| u.clone()))
    }
}

/// Cache whose every operation fails
#[derive(Debug, Default)]
pub struct BrokenCache;

#[async_trait]
impl TtlCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Err(CacheError::backend("connection refused"))
    }

    async fn put(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::backend("connection refused"))
    }

    async fn forget(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::backend("connection refused"))
    }
}

pub fn config() -> AuthConfig {
    AuthConfig::builder()
        .secret_key(SECRET)
        .auto_refresh(true)
        .build()
        .expect("valid test config")
}

pub struct Harness {
    pub auth: AuthService<InMemoryUsers>,
    pub users: Arc<InMemoryUsers>,
    pub cache: Arc<MemoryCache>,
}

pub fn harness_with(config: AuthConfig) -> Harness {
    let users = Arc::new(InMemoryUsers::with([
        TestUser::new("u1", "member"),
        TestUser::new("u2", "admin"),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let auth = AuthService::with_shared_identities(config, cache.clone(), Arc::clone(&users))
        .expect("service wiring");
    Harness { auth, users, cache }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn user(id: &str) -> TestUser {
    TestUser::new(id, if id == "u2" { "admin" } else { "member" })
}
