//! Status checks and JSON decoding shared by every call.

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{network_error, Error, ErrorKind, Stage};

/// Status codes a call accepts as success.
#[derive(Debug, Clone, Copy)]
pub enum Accept {
    Only(&'static [u16]),
    AnySuccess,
}

impl Accept {
    fn allows(&self, status: u16) -> bool {
        match self {
            Accept::Only(codes) => codes.contains(&status),
            Accept::AnySuccess => (200..300).contains(&status),
        }
    }
}

/// Pass the response through when its status is accepted, otherwise fail with
/// `BadStatus` carrying the status and body.
pub async fn expect_status(
    response: Response,
    accept: Accept,
    stage: Stage,
) -> Result<Response, Error> {
    let status = response.status().as_u16();
    if accept.allows(status) {
        return Ok(response);
    }

    let body = response.text().await.ok().filter(|b| !b.is_empty());
    warn!(
        "{} got HTTP {}, body: {}",
        stage,
        status,
        body.as_deref().unwrap_or("<empty>")
    );

    Err(Error {
        source: Some(format!("unexpected HTTP status {}", status).into()),
        error_kind: ErrorKind::BadStatus { status, body },
        stage,
    })
}

/// Read the body and decode it as `T`. Missing required fields are `Parse` errors.
pub async fn parse_json<T: DeserializeOwned>(response: Response, stage: Stage) -> Result<T, Error> {
    let body = response.text().await.map_err(|e| network_error(stage, e))?;
    serde_json::from_str(&body).map_err(|e| {
        warn!("{} returned an unparseable body: {}", stage, e);
        Error::with_source(stage, ErrorKind::Parse, e)
    })
}
