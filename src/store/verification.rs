//! Pending verifications keyed by their token.

use std::sync::Arc;
use std::time::Duration;

use crate::config::VERIFICATION_TTL_SECS;
use crate::error::AppError;
use crate::models::verification::PendingVerification;
use crate::store::EphemeralStore;

fn pending_key(token: &str) -> String {
    format!("pending:{}", token)
}

/// Typed view of pending verifications kept in an [`EphemeralStore`].
///
/// Entries are written once and never updated; they disappear on redemption
/// or when the 30 minute TTL runs out.
#[derive(Clone)]
pub struct VerificationStore {
    inner: Arc<dyn EphemeralStore>,
}

impl VerificationStore {
    pub fn new(inner: Arc<dyn EphemeralStore>) -> Self {
        Self { inner }
    }

    pub async fn put(&self, token: &str, pending: &PendingVerification) -> Result<(), AppError> {
        let data = serde_json::to_string(pending)
            .map_err(|e| AppError::Cache(format!("Failed to serialize verification: {}", e)))?;

        self.inner
            .put_with_ttl(
                &pending_key(token),
                &data,
                Duration::from_secs(VERIFICATION_TTL_SECS),
            )
            .await
    }

    pub async fn get(&self, token: &str) -> Result<Option<PendingVerification>, AppError> {
        match self.inner.get(&pending_key(token)).await? {
            Some(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|e| AppError::Cache(format!("Corrupt verification entry: {}", e))),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, token: &str) -> Result<(), AppError> {
        self.inner.delete(&pending_key(token)).await
    }
}
