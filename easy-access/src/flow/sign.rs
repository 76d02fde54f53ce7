//! Signing arbitrary data through the companion app.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::handoff::{hand_off, CompanionApp, HandoffMode, Launcher};
use super::session::SignSession;
use crate::error::{network_error, parse_error, url_error, Error, Stage};
use crate::http::{expect_status, parse_json, Accept};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    sign_data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    signature_code: String,
}

/// Requests signatures and hands them to the companion app for approval.
pub struct Signer {
    http: reqwest::Client,
    launcher: Arc<dyn Launcher>,
    companion: CompanionApp,
}

impl Signer {
    pub fn new(http: reqwest::Client, launcher: Arc<dyn Launcher>, companion: CompanionApp) -> Self {
        Self {
            http,
            launcher,
            companion,
        }
    }

    /// Submit data for signing and return the signature code. Accepts any 2xx status.
    pub async fn initiate_sign(
        &self,
        signature_endpoint: &str,
        data_to_sign: &str,
    ) -> Result<String, Error> {
        let url = Url::parse(signature_endpoint)
            .map_err(|e| url_error(Stage::Sign, signature_endpoint, e))?;

        info!("Requesting signature at {}", url);
        let response = self
            .http
            .post(url)
            .json(&SignRequest {
                sign_data: data_to_sign,
            })
            .send()
            .await
            .map_err(|e| network_error(Stage::Sign, e))?;
        let response = expect_status(response, Accept::AnySuccess, Stage::Sign).await?;
        let body: SignResponse = parse_json(response, Stage::Sign).await?;

        if body.signature_code.is_empty() {
            return Err(parse_error(Stage::Sign, "empty signatureCode in response"));
        }
        Ok(body.signature_code)
    }

    /// Open the companion app with the signature code.
    ///
    /// Fails with `AppLaunchFailed` when the app is not installed.
    pub async fn sign(
        &self,
        signature_code: &str,
        callback_uri: &str,
        mode: HandoffMode,
    ) -> Result<(), Error> {
        let uri = self.companion.signature_uri(signature_code, callback_uri);
        hand_off(self.launcher.as_ref(), &uri, mode, Stage::Sign).await
    }

    /// Submit data and hand the resulting signature code to the companion app.
    pub async fn request_signature(
        &self,
        signature_endpoint: &str,
        data_to_sign: &str,
        callback_uri: &str,
        mode: HandoffMode,
    ) -> Result<SignSession, Error> {
        let signature_code = self.initiate_sign(signature_endpoint, data_to_sign).await?;
        self.sign(&signature_code, callback_uri, mode).await?;

        Ok(SignSession {
            signature_code,
            data_to_sign: data_to_sign.to_string(),
        })
    }
}
