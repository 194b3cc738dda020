//! Token header: `{"alg", "kid"?, "typ"?}`

use serde_json::{Map, Value};

use crate::algorithm::Algorithm;
use crate::error::TokenError;
use crate::segment::{Segment, decode_object, optional_string};

/// Decoded or freshly built token header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Signing algorithm
    pub algorithm: Algorithm,
    /// Key identifier
    pub kid: Option<String>,
    /// Media type, usually `JWT`
    pub typ: Option<String>,
    source: Option<String>,
}

impl Header {
    /// Header with only an algorithm
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            kid: None,
            typ: None,
            source: None,
        }
    }

    /// Set the key identifier
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Set the media type
    #[must_use]
    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Decode the first part of a compact token
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidTokenStructure`] for bad base64url/JSON, a missing
    ///   `alg`, or non-string `alg`/`kid`/`typ`
    /// - [`TokenError::UnsupportedAlgorithm`] when `alg` is not an HS* algorithm
    pub fn decode(part: &str) -> Result<Self, TokenError> {
        let map = decode_object(part, "header")?;

        let algorithm = match map.get("alg") {
            Some(Value::String(name)) => name.parse::<Algorithm>()?,
            Some(_) => return Err(TokenError::structure("`alg` must be a string")),
            None => return Err(TokenError::structure("header is missing `alg`")),
        };

        Ok(Self {
            algorithm,
            kid: optional_string(&map, "kid")?,
            typ: optional_string(&map, "typ")?,
            source: Some(part.to_string()),
        })
    }
}

impl Segment for Header {
    fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("alg".into(), Value::from(self.algorithm.as_str()));
        if let Some(kid) = &self.kid {
            map.insert("kid".into(), Value::from(kid.as_str()));
        }
        if let Some(typ) = &self.typ {
            map.insert("typ".into(), Value::from(typ.as_str()));
        }
        map
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base64url;

    fn encode_json(json: &str) -> String {
        base64url::encode(json.as_bytes())
    }

    #[test]
    fn test_emission_order_is_alg_kid_typ() {
        let header = Header::new(Algorithm::HS256).with_typ("JWT").with_kid("k1");
        let json = String::from_utf8(base64url::decode(&header.encode()).unwrap()).unwrap();
        assert_eq!(json, r#"{"alg":"HS256","kid":"k1","typ":"JWT"}"#);

        let bare = Header::new(Algorithm::HS512);
        let json = String::from_utf8(base64url::decode(&bare.encode()).unwrap()).unwrap();
        assert_eq!(json, r#"{"alg":"HS512"}"#);
    }

    #[test]
    fn test_decode_keeps_source_verbatim() {
        // Non-canonical order and whitespace must survive in the source
        let part = encode_json(r#"{ "typ": "JWT", "alg": "HS384" }"#);
        let header = Header::decode(&part).unwrap();
        assert_eq!(header.algorithm, Algorithm::HS384);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
        assert_eq!(header.kid, None);
        assert_eq!(header.source(), Some(part.as_str()));
        assert_eq!(header.signing_part(), part);
        assert_ne!(header.encode(), part);
    }

    #[test]
    fn test_unknown_algorithm() {
        let part = encode_json(r#"{"alg":"RS256"}"#);
        assert_eq!(
            Header::decode(&part),
            Err(TokenError::UnsupportedAlgorithm {
                algorithm: "RS256".to_string()
            })
        );
    }

    #[test]
    fn test_missing_or_mistyped_fields() {
        for json in [r#"{}"#, r#"{"alg":256}"#, r#"{"alg":"HS256","kid":7}"#] {
            assert!(matches!(
                Header::decode(&encode_json(json)),
                Err(TokenError::InvalidTokenStructure { .. })
            ));
        }
    }

    #[test]
    fn test_fresh_header_has_no_source() {
        let header = Header::new(Algorithm::HS256);
        assert_eq!(header.source(), None);
        assert_eq!(header.signing_part(), header.encode());
    }
}
