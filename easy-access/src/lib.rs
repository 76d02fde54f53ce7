//! # easy-access
//!
//! Client SDK for signing in and signing data through the Easy Access companion app:
//! - One-time client registration with a per-installation RSA key pair
//! - OpenID Connect authorization code flow with PKCE (S256)
//! - `private_key_jwt` client authentication at the token endpoint
//! - RS256 ID token verification and claim validation
//! - Handoff to the companion app by app switch or QR code
//! - Redirect interception for the registered callback URIs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use easy_access::{
//!     flow::{Authorizer, CallbackUris, HandoffMode, RedirectInterceptor},
//!     storage::FileSecureStorage,
//!     crypto::StoredKeyStore,
//! };
//!
//! let (interceptor, mut redirects) = RedirectInterceptor::new(&[oauth_callback])?;
//! let session = authorizer.authorize(auth_server, callbacks, HandoffMode::AppSwitch).await?;
//! let event = redirects.recv().await;
//! let tokens = authorizer.handle_auth_code_callback(&event, &session).await?;
//! ```

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod flow;
pub mod http;
pub mod oidc;
pub mod storage;

// Re-export commonly used types
pub use config::EasyAccessConfig;
pub use error::{ClaimErrorKind, Error, ErrorKind, Stage};
