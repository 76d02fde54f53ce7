//! Client registration with the authorization server.
//!
//! Exchanges a one-time backend token and the installation's public key for a persistent
//! client id. The id only counts as registered once it has been written to secure storage.

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::crypto::Jwk;
use crate::error::{network_error, parse_error, url_error, Error, Stage};
use crate::http::{expect_status, parse_json, Accept};
use crate::storage::SecureStorage;

/// Registration path on the authorization server.
pub const REGISTRATION_PATH: &str = "/api/v1/client";

/// Inputs for registering this installation.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    /// One-time token issued by the app backend.
    pub client_token: String,
    pub redirect_uris: Vec<String>,
    pub public_key: Jwk,
    pub device_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationRequest<'a> {
    key: &'a Jwk,
    redirect_urls: &'a [String],
    client_token: &'a str,
    device_id: &'a str,
    redirect: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationResponse {
    client_id: String,
}

/// Register the installation and persist the returned client id under `client_id_key`.
pub async fn register_client(
    client: &reqwest::Client,
    storage: &dyn SecureStorage,
    auth_server_address: &str,
    registration: &ClientRegistration,
    client_id_key: &str,
) -> Result<String, Error> {
    let address = format!(
        "{}{}",
        auth_server_address.trim_end_matches('/'),
        REGISTRATION_PATH
    );
    let url = Url::parse(&address).map_err(|e| url_error(Stage::Registration, &address, e))?;
    info!("Registering client at {}", url);

    let request = RegistrationRequest {
        key: &registration.public_key,
        redirect_urls: &registration.redirect_uris,
        client_token: &registration.client_token,
        device_id: &registration.device_id,
        redirect: false,
    };

    let response = client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| network_error(Stage::Registration, e))?;
    let response = expect_status(response, Accept::Only(&[200, 201]), Stage::Registration).await?;
    let body: RegistrationResponse = parse_json(response, Stage::Registration).await?;

    if body.client_id.is_empty() {
        return Err(parse_error(Stage::Registration, "empty clientId in response"));
    }

    storage.set_string(client_id_key, &body.client_id).await?;
    info!("Registered client {}", body.client_id);

    Ok(body.client_id)
}
