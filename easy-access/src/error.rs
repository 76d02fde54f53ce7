//! Error types for the `easy-access` crate.
//!
//! A root `Error` struct holding an error kind enum and an optional source for error
//! chaining. Every error also records the `Stage` of the flow it came from so callers can
//! log stage and cause together.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the easy-access crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
    pub stage: Stage,
}

/// Major categories of errors surfaced by the flows.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Transport failure, including timeouts and refused connections.
    Network,
    /// The server answered with a status code the call does not accept.
    BadStatus { status: u16, body: Option<String> },
    /// Malformed JSON or a missing required field.
    Parse,
    /// An endpoint or callback address could not be parsed.
    InvalidUrl,
    /// No client id has been persisted; registration must run first.
    NotRegistered,
    /// The secure random source could not produce bytes.
    RandomSource,
    SignatureInvalid,
    ClaimValidation(ClaimErrorKind),
    /// The platform reported that the companion app URI was not handled.
    AppLaunchFailed,
    /// A login code or redirect state does not belong to the active session.
    SessionMismatch,
    /// The attempt was overtaken by a newer `authorize` call or cancelled.
    Superseded,
    KeyStore,
    Storage,
}

/// ID token claim checks, in the order they are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimErrorKind {
    Issuer,
    Audience,
    Expired,
    Nonce,
}

/// Where in the flow an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Registration,
    LoginInitiation,
    Handoff,
    Redirect,
    Verify,
    TokenExchange,
    JwksFetch,
    IdTokenValidation,
    Sign,
    Pkce,
    KeyStore,
    SecureStorage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Registration => "registration",
            Stage::LoginInitiation => "login initiation",
            Stage::Handoff => "handoff",
            Stage::Redirect => "redirect",
            Stage::Verify => "verify",
            Stage::TokenExchange => "token exchange",
            Stage::JwksFetch => "jwks fetch",
            Stage::IdTokenValidation => "id token validation",
            Stage::Sign => "sign",
            Stage::Pkce => "pkce",
            Stage::KeyStore => "key store",
            Stage::SecureStorage => "secure storage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::BadStatus { status, .. } => {
                write!(f, "{} failed: unexpected HTTP status {}", self.stage, status)
            }
            ErrorKind::ClaimValidation(kind) => {
                write!(f, "{} failed: invalid {:?} claim", self.stage, kind)
            }
            kind => write!(f, "{} failed: {:?}", self.stage, kind),
        }?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    /// Create an error with a plain message as its source.
    pub fn new(stage: Stage, kind: ErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: kind,
            stage,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        stage: Stage,
        kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error {
            source: Some(source.into()),
            error_kind: kind,
            stage,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }
}

/// Helper function to wrap transport failures.
pub fn network_error(stage: Stage, err: reqwest::Error) -> Error {
    Error::with_source(stage, ErrorKind::Network, err)
}

/// Helper function to create parse errors.
pub fn parse_error(stage: Stage, message: &str) -> Error {
    Error::new(stage, ErrorKind::Parse, message)
}

/// Helper function for endpoint addresses that do not parse.
pub fn url_error(stage: Stage, address: &str, err: url::ParseError) -> Error {
    Error {
        source: Some(format!("{}: {}", address, err).into()),
        error_kind: ErrorKind::InvalidUrl,
        stage,
    }
}

/// Helper function to create claim validation errors.
pub fn claim_error(kind: ClaimErrorKind, message: &str) -> Error {
    Error::new(
        Stage::IdTokenValidation,
        ErrorKind::ClaimValidation(kind),
        message,
    )
}

/// Helper function to create key store errors.
pub fn key_store_error(message: &str) -> Error {
    Error::new(Stage::KeyStore, ErrorKind::KeyStore, message)
}

/// Helper function to create secure storage errors.
pub fn storage_error(message: &str) -> Error {
    Error::new(Stage::SecureStorage, ErrorKind::Storage, message)
}
