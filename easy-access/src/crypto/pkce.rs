//! PKCE (Proof Key for Code Exchange) support for OAuth 2.0.
//!
//! Implements RFC 7636 with the S256 method. Verifiers are drawn from the unreserved URI
//! character set using the operating system's secure random source.

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::encoding::{data_from_hex, hex_from_data, url_safe_base64_from_data};
use crate::error::{Error, ErrorKind, Stage};

/// Length of every generated verifier.
pub const CODE_VERIFIER_LENGTH: usize = 128;

/// RFC 3986 unreserved characters.
pub const UNRESERVED_URI_CHARS: &[u8; 66] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-._~";

// Largest multiple of 66 that fits in a byte; bytes at or above it are rejected.
const REJECTION_BOUND: u8 = 198;

/// PKCE code verifier. Only sent at token exchange.
#[derive(Debug, Clone)]
pub struct PkceVerifier(SecretString);

impl PkceVerifier {
    /// Generate a new 128 character verifier from the OS random source.
    pub fn generate() -> Result<Self, Error> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a verifier from the given random source.
    ///
    /// Fails with `RandomSource` instead of falling back to a weaker generator.
    pub fn generate_with<R: RngCore>(rng: &mut R) -> Result<Self, Error> {
        let mut verifier = String::with_capacity(CODE_VERIFIER_LENGTH);
        let mut buffer = [0u8; 64];

        while verifier.len() < CODE_VERIFIER_LENGTH {
            rng.try_fill_bytes(&mut buffer).map_err(|e| {
                tracing::error!("Secure random source failed: {}", e);
                Error::with_source(Stage::Pkce, ErrorKind::RandomSource, e)
            })?;

            for byte in buffer.iter().filter(|b| **b < REJECTION_BOUND) {
                if verifier.len() == CODE_VERIFIER_LENGTH {
                    break;
                }
                let index = (*byte as usize) % UNRESERVED_URI_CHARS.len();
                verifier.push(UNRESERVED_URI_CHARS[index] as char);
            }
        }

        Ok(Self(SecretString::from(verifier)))
    }

    /// Create a PKCE verifier from an existing string.
    pub fn from_string(verifier: String) -> Self {
        Self(SecretString::from(verifier))
    }

    /// Get the verifier string.
    pub fn as_str(&self) -> &str {
        self.0.expose_secret()
    }

    /// Generate the corresponding code challenge.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge, sent with the authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// SHA-256 over the ASCII verifier, taken through its hex form back to raw bytes, then
    /// URL-safe base64 without padding.
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let digest = Sha256::digest(verifier.as_str().as_bytes());
        let digest_hex = hex_from_data(&digest);
        let raw = data_from_hex(&digest_hex).unwrap_or_else(|| digest.to_vec());
        Self(url_safe_base64_from_data(&raw))
    }

    /// Get the challenge string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The only method this client sends.
    pub fn method(&self) -> &'static str {
        "S256"
    }
}
