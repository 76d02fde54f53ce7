//! JSON Web Key types and RS256 ID token signature verification.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Stage};

/// A single JSON Web Key. Only the RSA members are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// The provider's published key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

fn signature_error(message: &str) -> Error {
    Error::new(Stage::IdTokenValidation, ErrorKind::SignatureInvalid, message)
}

/// Verify the RS256 signature of a compact JWS against `jwk` and decode its payload.
///
/// The key must be RSA and published with `use` set to `sig`.
///
/// Only the signature is checked here. Claim rules (issuer, audience, expiry, nonce) are
/// applied afterwards by the caller on the returned claims.
pub fn verify_id_token<T: DeserializeOwned>(compact_jws: &str, jwk: &Jwk) -> Result<T, Error> {
    if jwk.kty != "RSA" {
        return Err(signature_error(&format!(
            "unsupported key type '{}'",
            jwk.kty
        )));
    }
    match jwk.key_use.as_deref() {
        Some("sig") => {}
        Some(key_use) => {
            return Err(signature_error(&format!(
                "key is published for '{}', not signing",
                key_use
            )))
        }
        None => return Err(signature_error("JWK does not declare 'use'")),
    }

    let n = jwk
        .n
        .as_deref()
        .ok_or_else(|| signature_error("RSA JWK missing 'n' field"))?;
    let e = jwk
        .e
        .as_deref()
        .ok_or_else(|| signature_error("RSA JWK missing 'e' field"))?;

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
        Error::with_source(Stage::IdTokenValidation, ErrorKind::SignatureInvalid, err)
    })?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<T>(compact_jws, &decoding_key, &validation).map_err(|err| {
        tracing::warn!("ID token signature verification failed: {}", err);
        Error::with_source(Stage::IdTokenValidation, ErrorKind::SignatureInvalid, err)
    })?;

    Ok(token_data.claims)
}
