use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SecureStorage;
use crate::error::Error;

/// In-memory storage for tests and hosts that manage persistence themselves.
#[derive(Default)]
pub struct MemorySecureStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySecureStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStorage for MemorySecureStorage {
    async fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
