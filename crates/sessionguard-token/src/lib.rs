//! # SessionGuard Token
//!
//! Compact HMAC-signed session tokens in the familiar three-part
//! `header.payload.signature` form.
//!
//! ## Architecture
//!
//! - `base64url` - unpadded URL-safe base64
//! - `algorithm` - HS256 / HS384 / HS512
//! - `signer` - HMAC signing with constant-time verification
//! - `header`, `payload`, `token` - the codec; decoded segments keep their
//!   original substrings so verification never depends on re-encoding
//! - `validator` - signature, then `nbf`, then `exp`
//! - `error` - [`TokenError`] with structured context and status codes
//!
//! ## Example
//!
//! ```
//! use sessionguard_token::{Algorithm, Header, HmacSigner, Payload, Token, validate};
//!
//! let signer = HmacSigner::new("s3cr3t-key-32-bytes-minimum-xx");
//! let encoded = Token::new(
//!     Header::new(Algorithm::HS256),
//!     Payload::new(1_700_000_000, 1_700_003_600).with_subject("u1"),
//! )
//! .encode(&signer);
//!
//! let token = Token::decode(&encoded)?;
//! validate(&token, &signer, 1_700_000_100)?;
//! assert_eq!(token.payload.sub.as_deref(), Some("u1"));
//! # Ok::<(), sessionguard_token::TokenError>(())
//! ```

pub mod algorithm;
pub mod base64url;
pub mod clock;
pub mod error;
pub mod header;
pub mod payload;
mod segment;
pub mod signer;
pub mod token;
pub mod validator;

pub use algorithm::Algorithm;
pub use clock::now_seconds;
pub use error::{ErrorContext, TokenError};
pub use header::Header;
pub use payload::{Payload, REGISTERED_CLAIMS};
pub use segment::Segment;
pub use signer::HmacSigner;
pub use token::Token;
pub use validator::{AccessTokenValidator, validate};

/// Token result type
pub type Result<T> = std::result::Result<T, TokenError>;
