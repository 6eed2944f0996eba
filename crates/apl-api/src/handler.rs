use async_trait::async_trait;

use crate::error::ApiError;

/// Backend of the secret ingestion API.
///
/// Implementations receive already validated input: `key` is never empty.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value.
    async fn save_secret(&self, key: String, value: String) -> Result<(), ApiError>;
}
