//! Configuration for token issuance, refresh and auto-refresh
//!
//! All durations are whole seconds.
//!
//! ```toml
//! secret_key = "s3cr3t-key-32-bytes-minimum-xx"
//! algorithm = "HS256"
//!
//! [access_token]
//! lifetime = 3600
//!
//! [refresh_token]
//! lifetime = 14400
//!
//! [auto_refresh]
//! enabled = true
//! grace_period = 3600
//! cache_ttl = 10
//! preemptive_refresh = 300
//! ```

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sessionguard_token::{Algorithm, HmacSigner};
use thiserror::Error;
use tracing::warn;

/// Environment variable prefix, e.g. `SESSIONGUARD_AUTO_REFRESH__ENABLED=true`
pub const ENV_PREFIX: &str = "SESSIONGUARD";

/// Secrets shorter than this trigger a warning
pub const RECOMMENDED_SECRET_LEN: usize = 32;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Access-token settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccessTokenConfig {
    /// Default access-token lifetime
    pub lifetime: i64,
}

impl Default for AccessTokenConfig {
    fn default() -> Self {
        Self { lifetime: 3600 }
    }
}

/// Refresh-token settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshTokenConfig {
    /// How long a refresh token outlives its access token
    pub lifetime: i64,
}

impl Default for RefreshTokenConfig {
    fn default() -> Self {
        Self { lifetime: 3600 }
    }
}

/// Transparent renewal settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoRefreshConfig {
    /// Renew expired tokens within the grace period
    pub enabled: bool,
    /// How long after expiry a token may still be renewed once
    pub grace_period: i64,
    /// Coalescing window for replacements minted after expiry
    pub cache_ttl: i64,
    /// Renew valid tokens this close to expiry; 0 disables
    pub preemptive_refresh: i64,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            grace_period: 3600,
            cache_ttl: 10,
            preemptive_refresh: 0,
        }
    }
}

/// Top-level authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret (zeroized on drop)
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub secret_key: SecretString,
    /// Signing algorithm
    pub algorithm: Algorithm,
    /// Access-token settings
    pub access_token: AccessTokenConfig,
    /// Refresh-token settings
    pub refresh_token: RefreshTokenConfig,
    /// Auto-refresh settings
    pub auto_refresh: AutoRefreshConfig,
    /// Prefix for every cache key this crate writes
    pub cache_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: SecretString::new(String::new()),
            algorithm: Algorithm::default(),
            access_token: AccessTokenConfig::default(),
            refresh_token: RefreshTokenConfig::default(),
            auto_refresh: AutoRefreshConfig::default(),
            cache_prefix: "jwt:".to_string(),
        }
    }
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

impl AuthConfig {
    /// Load from a TOML, YAML or JSON file, with `SESSIONGUARD_*` environment
    /// variables overriding file values (`__` separates nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, has an unknown extension, fails
    /// to parse, or fails [`AuthConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment())
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from `SESSIONGUARD_*` environment variables over the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or the result fails
    /// [`AuthConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder().add_source(environment()).build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Programmatic configuration
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Reject unusable values; warn on a short secret
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty secret, a non-positive
    /// lifetime or cache TTL, or a negative grace period or preemptive window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret_len = self.secret_key.expose_secret().len();
        if secret_len == 0 {
            return Err(ConfigError::Invalid("secret_key must not be empty".into()));
        }
        if secret_len < RECOMMENDED_SECRET_LEN {
            warn!(
                secret_len,
                recommended = RECOMMENDED_SECRET_LEN,
                "secret_key is shorter than recommended"
            );
        }

        let positive = [
            ("access_token.lifetime", self.access_token.lifetime),
            ("refresh_token.lifetime", self.refresh_token.lifetime),
            ("auto_refresh.cache_ttl", self.auto_refresh.cache_ttl),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        let non_negative = [
            ("auto_refresh.grace_period", self.auto_refresh.grace_period),
            (
                "auto_refresh.preemptive_refresh",
                self.auto_refresh.preemptive_refresh,
            ),
        ];
        for (name, value) in non_negative {
            if value < 0 {
                return Err(ConfigError::Invalid(format!("{name} must not be negative")));
            }
        }

        Ok(())
    }

    /// Signer for the configured secret
    pub fn signer(&self) -> HmacSigner {
        HmacSigner::new(self.secret_key.expose_secret().as_bytes())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Builder for [`AuthConfig`]
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn secret_key(mut self, secret: impl Into<String>) -> Self {
        self.config.secret_key = SecretString::new(secret.into());
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn access_token_lifetime(mut self, secs: i64) -> Self {
        self.config.access_token.lifetime = secs;
        self
    }

    pub fn refresh_token_lifetime(mut self, secs: i64) -> Self {
        self.config.refresh_token.lifetime = secs;
        self
    }

    /// Enable or disable renewal of expired tokens
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.auto_refresh.enabled = enabled;
        self
    }

    pub fn grace_period(mut self, secs: i64) -> Self {
        self.config.auto_refresh.grace_period = secs;
        self
    }

    pub fn auto_refresh_cache_ttl(mut self, secs: i64) -> Self {
        self.config.auto_refresh.cache_ttl = secs;
        self
    }

    /// Renew valid tokens within `secs` of expiry
    pub fn preemptive_refresh(mut self, secs: i64) -> Self {
        self.config.auto_refresh.preemptive_refresh = secs;
        self
    }

    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.cache_prefix = prefix.into();
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::validate`].
    pub fn build(self) -> Result<AuthConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SECRET: &str = "s3cr3t-key-32-bytes-minimum-xx";

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.algorithm, Algorithm::HS256);
        assert_eq!(config.access_token.lifetime, 3600);
        assert_eq!(config.refresh_token.lifetime, 3600);
        assert_eq!(config.auto_refresh, AutoRefreshConfig::default());
        assert!(!config.auto_refresh.enabled);
        assert_eq!(config.auto_refresh.grace_period, 3600);
        assert_eq!(config.auto_refresh.cache_ttl, 10);
        assert_eq!(config.auto_refresh.preemptive_refresh, 0);
        assert_eq!(config.cache_prefix, "jwt:");
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(matches!(
            AuthConfig::default().validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_builder_validates() {
        let config = AuthConfig::builder()
            .secret_key(SECRET)
            .algorithm(Algorithm::HS512)
            .auto_refresh(true)
            .preemptive_refresh(300)
            .build()
            .unwrap();
        assert_eq!(config.algorithm, Algorithm::HS512);
        assert!(config.auto_refresh.enabled);
        assert_eq!(config.signer().key_len(), SECRET.len());

        assert!(
            AuthConfig::builder()
                .secret_key(SECRET)
                .access_token_lifetime(0)
                .build()
                .is_err()
        );
        assert!(
            AuthConfig::builder()
                .secret_key(SECRET)
                .grace_period(-1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
secret_key = "{SECRET}"
algorithm = "HS384"

[refresh_token]
lifetime = 14400

[auto_refresh]
enabled = true
preemptive_refresh = 120
"#
        )
        .unwrap();

        let config = AuthConfig::from_file(file.path()).unwrap();
        assert_eq!(config.algorithm, Algorithm::HS384);
        assert_eq!(config.refresh_token.lifetime, 14400);
        assert_eq!(config.access_token.lifetime, 3600);
        assert!(config.auto_refresh.enabled);
        assert_eq!(config.auto_refresh.preemptive_refresh, 120);
        assert_eq!(config.auto_refresh.grace_period, 3600);
        assert_eq!(config.secret_key.expose_secret(), SECRET);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"secret_key": "{SECRET}", "access_token": {{"lifetime": 60}}}}"#
        )
        .unwrap();
        let config = AuthConfig::from_file(file.path()).unwrap();
        assert_eq!(config.access_token.lifetime, 60);
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        assert!(matches!(
            AuthConfig::from_file("/nonexistent/sessionguard.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            AuthConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_file_without_secret_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "algorithm = \"HS256\"").unwrap();
        assert!(matches!(
            AuthConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_serialized_config_loads_back() {
        let config = AuthConfig::builder().secret_key(SECRET).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: AuthConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.secret_key.expose_secret(), SECRET);
        assert_eq!(back.cache_prefix, "jwt:");
    }
}
