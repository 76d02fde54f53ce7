//! ID token claim validation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::{verify_id_token, JwkSet};
use crate::error::{claim_error, parse_error, ClaimErrorKind, Error, Stage};

/// `aud` as published: a single string or an array of strings. Only the array form can
/// satisfy validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// True only when the audience is the array `[client_id]`. A bare string and
    /// multi-audience tokens are rejected even when they name the client.
    pub fn is_only(&self, client_id: &str) -> bool {
        match self {
            Audience::One(_) => false,
            Audience::Many(auds) => matches!(auds.as_slice(), [aud] if aud == client_id),
        }
    }
}

/// Claims read from a verified ID token. Absent claims fail the matching check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub aud: Option<Audience>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub nonce: Option<String>,
}

/// Values the token must match.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedClaims<'a> {
    pub issuer: &'a str,
    pub client_id: &'a str,
    pub nonce: &'a str,
}

impl IdTokenClaims {
    /// Validate against the current time.
    pub fn validate(&self, expected: ExpectedClaims<'_>) -> Result<(), Error> {
        self.validate_at(expected, Utc::now().timestamp())
    }

    /// Check issuer, audience, expiry and nonce in that order; the first failure wins.
    ///
    /// The token is valid while `now < exp`.
    pub fn validate_at(&self, expected: ExpectedClaims<'_>, now: i64) -> Result<(), Error> {
        if self.iss.as_deref() != Some(expected.issuer) {
            warn!(
                "ID token issuer {:?} does not match {}",
                self.iss, expected.issuer
            );
            return Err(claim_error(ClaimErrorKind::Issuer, "issuer mismatch"));
        }

        let audience_ok = self
            .aud
            .as_ref()
            .map(|aud| aud.is_only(expected.client_id))
            .unwrap_or(false);
        if !audience_ok {
            warn!("ID token audience is not exactly {}", expected.client_id);
            return Err(claim_error(
                ClaimErrorKind::Audience,
                "audience must be the client id alone",
            ));
        }

        match self.exp {
            Some(exp) if now < exp => {}
            _ => return Err(claim_error(ClaimErrorKind::Expired, "token expired")),
        }

        if self.nonce.as_deref() != Some(expected.nonce) {
            return Err(claim_error(ClaimErrorKind::Nonce, "nonce mismatch"));
        }

        Ok(())
    }
}

/// Verify the token against the first published key, then validate its claims.
pub fn verify_and_validate(
    id_token: &str,
    jwks: &JwkSet,
    expected: ExpectedClaims<'_>,
) -> Result<IdTokenClaims, Error> {
    let jwk = jwks
        .keys
        .first()
        .ok_or_else(|| parse_error(Stage::JwksFetch, "key set is empty"))?;

    let claims: IdTokenClaims = verify_id_token(id_token, jwk)?;
    claims.validate(expected)?;
    Ok(claims)
}
