//! OpenID provider metadata discovery.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{network_error, url_error, Error, Stage};
use crate::http::{expect_status, parse_json, Accept};

/// Well-known path appended to the authorization server address.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// The subset of the discovery document this client relies on.
///
/// All four fields are required; a document missing any of them is a `Parse` error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Build the discovery URL for an authorization server address.
pub fn discovery_url(auth_server_address: &str) -> Result<Url, Error> {
    let address = format!("{}{}", auth_server_address.trim_end_matches('/'), DISCOVERY_PATH);
    Url::parse(&address).map_err(|e| url_error(Stage::Discovery, &address, e))
}

/// Fetch and parse the provider metadata. Accepts HTTP 200 and 201.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    auth_server_address: &str,
) -> Result<ProviderMetadata, Error> {
    let url = discovery_url(auth_server_address)?;
    info!("Fetching provider metadata from {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network_error(Stage::Discovery, e))?;
    let response = expect_status(response, Accept::Only(&[200, 201]), Stage::Discovery).await?;
    let metadata: ProviderMetadata = parse_json(response, Stage::Discovery).await?;

    debug!("Provider issuer is {}", metadata.issuer);
    Ok(metadata)
}
