//! Hex and URL-safe base64 helpers.

use base64::{
    alphabet,
    engine::{general_purpose::URL_SAFE_NO_PAD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

/// URL-safe alphabet that decodes both padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Lowercase hex encoding.
pub fn hex_from_data(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string. Returns `None` for odd lengths or non-hex characters.
pub fn data_from_hex(hex_str: &str) -> Option<Vec<u8>> {
    hex::decode(hex_str).ok()
}

/// Base64 with `-` and `_` in place of `+` and `/`, without padding.
pub fn url_safe_base64_from_data(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Inverse of [`url_safe_base64_from_data`]; trailing `=` padding is accepted.
pub fn data_from_url_safe_base64(encoded: &str) -> Option<Vec<u8>> {
    URL_SAFE_LENIENT.decode(encoded).ok()
}
