//! AES-256-GCM encrypted file storage.
//!
//! Each stored key maps to one file in the storage directory. The file holds the random
//! nonce followed by the ciphertext, base64-encoded. The encryption key is a 32-byte key
//! provided as a hex-encoded string (64 characters).

use std::path::{Path, PathBuf};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::SecureStorage;
use crate::error::{storage_error, Error, ErrorKind, Stage};

/// 12-byte nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

const FILE_EXTENSION: &str = "enc";

fn encryption_err() -> Error {
    storage_error("encryption failed")
}

fn decryption_err() -> Error {
    storage_error("decryption failed")
}

fn io_err(err: std::io::Error) -> Error {
    Error::with_source(Stage::SecureStorage, ErrorKind::Storage, err)
}

/// Encrypts plaintext using AES-256-GCM with a random nonce.
///
/// # Returns
/// Base64-encoded string containing nonce + ciphertext
pub fn encrypt(plaintext: &str, key_hex: &str) -> Result<String, Error> {
    let key = parse_key(key_hex)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| encryption_err())?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| encryption_err())?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend(ciphertext);

    Ok(BASE64.encode(combined))
}

/// Decrypts a base64-encoded ciphertext that was encrypted with `encrypt()`.
pub fn decrypt(ciphertext_b64: &str, key_hex: &str) -> Result<String, Error> {
    let key = parse_key(key_hex)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| decryption_err())?;

    let combined = BASE64
        .decode(ciphertext_b64.trim())
        .map_err(|e| Error::with_source(Stage::SecureStorage, ErrorKind::Storage, e))?;

    if combined.len() < NONCE_SIZE {
        return Err(decryption_err());
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext_bytes = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| decryption_err())?;

    String::from_utf8(plaintext_bytes)
        .map_err(|e| Error::with_source(Stage::SecureStorage, ErrorKind::Storage, e))
}

fn parse_key(key_hex: &str) -> Result<[u8; 32], Error> {
    let bytes = hex::decode(key_hex)
        .map_err(|e| Error::with_source(Stage::SecureStorage, ErrorKind::Storage, e))?;
    if bytes.len() != 32 {
        return Err(storage_error("encryption key must be 32 bytes"));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Secure storage for desktop and terminal hosts: one encrypted file per key.
pub struct FileSecureStorage {
    directory: PathBuf,
    key_hex: SecretString,
}

impl FileSecureStorage {
    /// Create a storage rooted at `directory`. The directory is created on first write.
    pub fn new(directory: impl Into<PathBuf>, key_hex: SecretString) -> Result<Self, Error> {
        parse_key(key_hex.expose_secret())?;
        Ok(Self {
            directory: directory.into(),
            key_hex,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    // Key names are hex encoded so any string maps to a safe file name.
    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", hex::encode(key.as_bytes()), FILE_EXTENSION))
    }
}

#[async_trait]
impl SecureStorage for FileSecureStorage {
    async fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => decrypt(&contents, self.key_hex.expose_secret()).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), Error> {
        let encrypted = encrypt(value, self.key_hex.expose_secret())?;
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(io_err)?;

        let path = self.path_for(key);
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, encrypted).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err)?;

        debug!("Stored secure value at {}", path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}
