//! Secure storage for the persisted client id and key material.

mod encrypted_file;
mod memory;

use async_trait::async_trait;

use crate::error::Error;

pub use encrypted_file::{decrypt, encrypt, FileSecureStorage};
pub use memory::MemorySecureStorage;

/// String key-value store backed by the host's secure storage primitive.
///
/// Implementations should:
/// - Keep values encrypted at rest
/// - Make a successful `set_string` durable before returning
/// - Handle concurrent access safely
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Read a value. `Ok(None)` when nothing is stored under `key`.
    async fn get_string(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store or replace a value.
    async fn set_string(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}
