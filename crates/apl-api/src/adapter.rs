use async_trait::async_trait;
use apl_core::SecretStore;

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Adapter that writes ingested secrets straight into a [`SecretStore`].
pub struct SecretStoreAdapter {
    store: SecretStore,
}

impl SecretStoreAdapter {
    pub fn new(store: SecretStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ApiHandler for SecretStoreAdapter {
    async fn save_secret(&self, key: String, value: String) -> Result<(), ApiError> {
        self.store.put(key, value);
        Ok(())
    }
}
