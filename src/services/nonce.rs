//! Operator nonce tracking.
//!
//! The operator nonce is read once from the contract and then advanced
//! locally on every consumed use. Any failure of a call that carried a
//! consumed nonce must [`OperatorNonce::reset`] the cache: the call may have
//! consumed the nonce remotely, so the next use re-reads it instead of
//! guessing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::HarnessResult;

/// Where the authoritative operator nonce is read from.
#[async_trait]
pub trait NonceSource: Send + Sync {
    async fn fetch_operator_nonce(&self) -> HarnessResult<u64>;
}

/// Locally cached operator nonce.
///
/// Assumes a single task issues operator calls at a time.
#[derive(Debug, Default)]
pub struct OperatorNonce {
    cached: Mutex<Option<u64>>,
}

impl OperatorNonce {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next nonce the cache would hand out, if known.
    pub fn cached(&self) -> Option<u64> {
        *self.slot()
    }

    /// Read the remote nonce and overwrite the cache with it.
    pub async fn get_nonce(&self, source: &dyn NonceSource) -> HarnessResult<u64> {
        let nonce = source.fetch_operator_nonce().await?;
        let previous = self.slot().replace(nonce);
        if previous.is_some_and(|p| p != nonce) {
            tracing::debug!(
                "Operator nonce cache resynced from {:?} to {}",
                previous,
                nonce
            );
        }
        Ok(nonce)
    }

    /// Hand out the next nonce and advance the cache by one.
    pub async fn consume(&self, source: &dyn NonceSource) -> HarnessResult<u64> {
        if let Some(nonce) = self.take_cached() {
            return Ok(nonce);
        }

        let nonce = source.fetch_operator_nonce().await?;
        *self.slot() = Some(nonce + 1);
        tracing::debug!("Seeded operator nonce cache at {}", nonce);
        Ok(nonce)
    }

    fn take_cached(&self) -> Option<u64> {
        let mut slot = self.slot();
        let nonce = (*slot)?;
        *slot = Some(nonce + 1);
        Some(nonce)
    }

    /// Forget the cached nonce; the next consume re-reads it.
    pub fn reset(&self) {
        if self.slot().take().is_some() {
            tracing::debug!("Operator nonce cache reset");
        }
    }
}
