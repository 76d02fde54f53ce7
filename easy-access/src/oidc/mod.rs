//! OpenID Connect protocol calls: discovery, registration, code exchange and ID token checks.

pub mod discovery;
pub mod id_token;
pub mod registration;
pub mod token;

pub use discovery::{fetch_metadata, ProviderMetadata};
pub use id_token::{verify_and_validate, Audience, ExpectedClaims, IdTokenClaims};
pub use registration::{register_client, ClientRegistration};
pub use token::{exchange_token, fetch_signing_keys, AccessTokenResult, CodeExchange};
