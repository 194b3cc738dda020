//! Unpadded base64url (RFC 4648 §5) helpers
//!
//! Encoding never emits `=` padding. Decoding accepts input with or without
//! padding, which matches re-padding to a multiple of four before decoding.

use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::error::TokenError;

/// Decoder that tolerates optional padding and non-canonical trailing bits
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode bytes as unpadded base64url
#[must_use]
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an unpadded (or padded) base64url string
///
/// # Errors
///
/// Returns [`TokenError::MalformedEncoding`] if the input is not valid base64url.
pub fn decode(input: &str) -> Result<Vec<u8>, TokenError> {
    LENIENT_URL_SAFE
        .decode(input)
        .map_err(|e| TokenError::encoding(e.to_string()))
}
