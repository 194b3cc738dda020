//! Token payload: registered claims plus flattened extension claims

use serde_json::{Map, Value};

use crate::error::TokenError;
use crate::segment::{Segment, decode_object, optional_int, optional_string};

/// Claim names with a dedicated field, in emission order
pub const REGISTERED_CLAIMS: [&str; 8] = ["jti", "iat", "exp", "sub", "iss", "aud", "amr", "nbf"];

/// Decoded or freshly built token payload
///
/// Extension claims live in `props` and are written at the top level of the
/// JSON object, after the registered claims.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Token identifier
    pub jti: Option<String>,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Subject identifier
    pub sub: Option<String>,
    /// Issuer
    pub iss: Option<String>,
    /// Audience
    pub aud: Option<String>,
    /// Authentication methods references
    pub amr: Option<Vec<String>>,
    /// Not-before, seconds since epoch
    pub nbf: Option<i64>,
    /// Extension claims; `None` when there are none
    pub props: Option<Map<String, Value>>,
    source: Option<String>,
}

impl Payload {
    /// Payload with only the time claims set
    #[must_use]
    pub fn new(iat: i64, exp: i64) -> Self {
        Self {
            jti: None,
            iat,
            exp,
            sub: None,
            iss: None,
            aud: None,
            amr: None,
            nbf: None,
            props: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    #[must_use]
    pub fn with_amr<I, S>(mut self, amr: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.amr = Some(amr.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    /// Add a single extension claim
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace all extension claims; an empty map clears them
    #[must_use]
    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = if props.is_empty() { None } else { Some(props) };
        self
    }

    /// Look up an extension claim
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.as_ref().and_then(|p| p.get(key))
    }

    /// `exp - iat`
    #[must_use]
    pub fn lifetime(&self) -> i64 {
        self.exp.saturating_sub(self.iat)
    }

    /// Seconds until expiry at `now`; negative once expired
    #[must_use]
    pub fn remaining(&self, now: i64) -> i64 {
        self.exp.saturating_sub(now)
    }

    /// Decode the second part of a compact token
    ///
    /// Missing `iat`/`exp` default to `now`. Keys outside
    /// [`REGISTERED_CLAIMS`] are collected into `props`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidTokenStructure`] for bad base64url/JSON or a
    /// registered claim of the wrong type.
    pub fn decode(part: &str, now: i64) -> Result<Self, TokenError> {
        let map = decode_object(part, "payload")?;

        let sub = match map.get("sub") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            Some(_) => return Err(TokenError::structure("`sub` must be a string or integer")),
        };

        let amr = match map.get("amr") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| TokenError::structure("`amr` must contain strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => return Err(TokenError::structure("`amr` must be an array of strings")),
        };

        let props: Map<String, Value> = map
            .iter()
            .filter(|(key, _)| !REGISTERED_CLAIMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            jti: optional_string(&map, "jti")?,
            iat: optional_int(&map, "iat")?.unwrap_or(now),
            exp: optional_int(&map, "exp")?.unwrap_or(now),
            sub,
            iss: optional_string(&map, "iss")?,
            aud: optional_string(&map, "aud")?,
            amr,
            nbf: optional_int(&map, "nbf")?,
            props: if props.is_empty() { None } else { Some(props) },
            source: Some(part.to_string()),
        })
    }
}

impl Segment for Payload {
    fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(jti) = &self.jti {
            map.insert("jti".into(), Value::from(jti.as_str()));
        }
        map.insert("iat".into(), Value::from(self.iat));
        map.insert("exp".into(), Value::from(self.exp));
        if let Some(sub) = &self.sub {
            map.insert("sub".into(), Value::from(sub.as_str()));
        }
        if let Some(iss) = &self.iss {
            map.insert("iss".into(), Value::from(iss.as_str()));
        }
        if let Some(aud) = &self.aud {
            map.insert("aud".into(), Value::from(aud.as_str()));
        }
        if let Some(amr) = &self.amr {
            map.insert("amr".into(), Value::from(amr.clone()));
        }
        if let Some(nbf) = self.nbf {
            map.insert("nbf".into(), Value::from(nbf));
        }
        if let Some(props) = &self.props {
            for (key, value) in props {
                // registered claims win
                if !REGISTERED_CLAIMS.contains(&key.as_str()) {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
        map
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}
