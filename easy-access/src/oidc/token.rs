//! Authorization code exchange with `private_key_jwt` client authentication, and JWKS retrieval.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::ProviderMetadata;
use crate::crypto::{JwkSet, KeyHandle, PkceVerifier};
use crate::error::{network_error, url_error, Error, Stage};
use crate::http::{expect_status, parse_json, Accept};

pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";
pub const JWT_BEARER_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a client assertion.
pub const CLIENT_ASSERTION_TTL_SECS: i64 = 60;

/// Tokens returned by a successful code exchange.
///
/// Every field is required in the response body. The access and ID tokens are kept behind
/// `SecretString` so they never end up in logs through `Debug`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResult {
    pub access_token: SecretString,
    pub expires_in: i64,
    pub id_token: SecretString,
    pub scope: String,
    pub token_type: String,
}

/// Claims of the signed client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl ClientAssertionClaims {
    pub fn new(client_id: &str, token_endpoint: &str, issued_at: DateTime<Utc>) -> Self {
        let iat = issued_at.timestamp();
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: token_endpoint.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: iat + CLIENT_ASSERTION_TTL_SECS,
        }
    }
}

/// Sign a fresh client assertion for `token_endpoint` with the installation key.
///
/// The JWS header `kid` is the client id.
pub fn client_assertion(
    key: &KeyHandle,
    client_id: &str,
    token_endpoint: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, Error> {
    let claims = ClientAssertionClaims::new(client_id, token_endpoint, issued_at);
    key.sign_jwt(client_id, &claims).map_err(|mut e| {
        e.stage = Stage::TokenExchange;
        e
    })
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    code_verifier: &'a str,
    code: &'a str,
    client_id: &'a str,
    redirect_uri: &'a str,
    client_assertion: &'a str,
    client_assertion_type: &'a str,
}

/// Everything the token request needs besides the HTTP client and signing key.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub auth_code: &'a str,
    pub redirect_uri: &'a str,
    pub verifier: &'a PkceVerifier,
    pub client_id: &'a str,
}

/// Redeem an authorization code at the token endpoint. Only HTTP 200 is accepted.
pub async fn exchange_token(
    client: &reqwest::Client,
    metadata: &ProviderMetadata,
    exchange: CodeExchange<'_>,
    key: &KeyHandle,
) -> Result<AccessTokenResult, Error> {
    let url = Url::parse(&metadata.token_endpoint)
        .map_err(|e| url_error(Stage::TokenExchange, &metadata.token_endpoint, e))?;
    let assertion = client_assertion(key, exchange.client_id, &metadata.token_endpoint, Utc::now())?;

    let form = TokenRequest {
        grant_type: AUTHORIZATION_CODE_GRANT,
        code_verifier: exchange.verifier.as_str(),
        code: exchange.auth_code,
        client_id: exchange.client_id,
        redirect_uri: exchange.redirect_uri,
        client_assertion: &assertion,
        client_assertion_type: JWT_BEARER_ASSERTION_TYPE,
    };

    info!("Exchanging authorization code at {}", url);
    let response = client
        .post(url)
        .form(&form)
        .send()
        .await
        .map_err(|e| network_error(Stage::TokenExchange, e))?;
    let response = expect_status(response, Accept::Only(&[200]), Stage::TokenExchange).await?;
    let tokens: AccessTokenResult = parse_json(response, Stage::TokenExchange).await?;

    debug!(
        "Received {} token, expires in {}s",
        tokens.token_type, tokens.expires_in
    );
    Ok(tokens)
}

/// Fetch the provider's signing keys. Accepts HTTP 200 and 201.
pub async fn fetch_signing_keys(client: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, Error> {
    let url = Url::parse(jwks_uri).map_err(|e| url_error(Stage::JwksFetch, jwks_uri, e))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_error(Stage::JwksFetch, e))?;
    let response = expect_status(response, Accept::Only(&[200, 201]), Stage::JwksFetch).await?;
    parse_json(response, Stage::JwksFetch).await
}

impl AccessTokenResult {
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn id_token(&self) -> &str {
        self.id_token.expose_secret()
    }
}
