//! Admission-control semaphore built on the store's list operations.

use super::client::StoreClient;
use super::error::StoreError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A counting semaphore shared through the store.
///
/// The list named `key` is primed with `slots` tokens; acquiring pops one
/// (blocking until a token is available) and releasing pushes one back.
/// Because the tokens live in the store, the bound holds across every
/// process submitting against the same key, which is what throttles how
/// many remote jobs are outstanding at once regardless of batch size.
pub struct SlotSemaphore {
    client: Arc<StoreClient>,
    key: String,
    slots: usize,
    primed: Mutex<bool>,
}

impl SlotSemaphore {
    /// Creates a semaphore over `key` with `slots` tokens. The list is
    /// primed lazily on first acquire.
    pub fn new(client: Arc<StoreClient>, key: impl Into<String>, slots: usize) -> Self {
        Self {
            client,
            key: key.into(),
            slots,
            primed: Mutex::new(false),
        }
    }

    /// Name of the underlying list.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Deletes any stale list and fills it with `slots` tokens.
    pub async fn prime(&self) -> Result<(), StoreError> {
        self.client.delete(&self.key).await?;
        for _ in 0..self.slots {
            self.client.release_slot(&self.key).await?;
        }
        info!(key = %self.key, slots = self.slots, "primed admission semaphore");
        Ok(())
    }

    /// Blocks until a slot token is acquired. Primes the list on first use.
    pub async fn acquire(&self) -> Result<(), StoreError> {
        {
            let mut primed = self.primed.lock().await;
            if !*primed {
                self.prime().await?;
                *primed = true;
            }
        }
        debug!(key = %self.key, "waiting for admission slot");
        self.client.acquire_slot(&self.key).await?;
        debug!(key = %self.key, "admission slot acquired");
        Ok(())
    }

    /// Returns one slot token.
    pub async fn release(&self) -> Result<(), StoreError> {
        self.client.release_slot(&self.key).await
    }

    /// Removes the list entirely. Call once a batch is done with the
    /// throttle; the next acquire re-primes.
    pub async fn teardown(&self) -> Result<(), StoreError> {
        let mut primed = self.primed.lock().await;
        *primed = false;
        self.client.delete(&self.key).await
    }
}

impl std::fmt::Debug for SlotSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotSemaphore")
            .field("key", &self.key)
            .field("slots", &self.slots)
            .finish()
    }
}
