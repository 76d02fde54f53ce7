//! HTTP client building and response handling.

mod client;
mod response;

pub use client::{HttpClientBuilder, HttpClientConfig};
pub(crate) use response::{expect_status, parse_json, Accept};
