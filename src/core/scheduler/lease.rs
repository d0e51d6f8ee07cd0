//! Per-(kind, parameters) mutual exclusion
//!
//! Two invocations of the same operation with the same parameters must not
//! run at once: both would read the same inventory level and write two
//! movements for one change. A lease is a storage row with an expiry, so a
//! crashed holder blocks others for at most the TTL.

use crate::adapters::database::{LeaseStorage, SyncStorage};
use crate::core::sync::params::normalized_params;
use crate::domain::{OperationKind, OperationParams, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Lease key: the kind plus a digest of the normalized parameter JSON
///
/// Parameter sets the orchestrator reads the same way (`{}` and an empty
/// `store_id`, `42` and `"42"`) share a key. Normalized parameters are a
/// key-ordered map, so they always serialize identically.
pub fn lease_key(kind: OperationKind, parameters: &OperationParams) -> String {
    let normalized = normalized_params(kind, parameters).unwrap_or_else(|_| parameters.clone());
    let canonical = serde_json::to_string(&normalized).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{kind}:{digest:x}")
}

/// A held lease; release it explicitly when the invocation ends
pub struct LeaseGuard {
    storage: Arc<dyn SyncStorage>,
    key: String,
    holder: String,
    ttl: Duration,
    released: bool,
}

impl LeaseGuard {
    /// Tries to take the lease for `kind` and `parameters`
    ///
    /// # Returns
    ///
    /// `None` when another holder has a live lease on the same key.
    pub async fn acquire(
        storage: Arc<dyn SyncStorage>,
        kind: OperationKind,
        parameters: &OperationParams,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<Self>> {
        let key = lease_key(kind, parameters);
        if !storage
            .try_acquire_lease(&key, holder, ttl, Utc::now())
            .await?
        {
            tracing::debug!(key = %key, holder, "Lease held elsewhere");
            return Ok(None);
        }

        tracing::debug!(key = %key, holder, "Lease acquired");
        Ok(Some(Self {
            storage,
            key,
            holder: holder.to_string(),
            ttl,
            released: false,
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pushes the expiry to a full TTL from now
    ///
    /// # Returns
    ///
    /// `false` if the lease expired and another holder took it.
    pub async fn renew(&self) -> Result<bool> {
        self.storage
            .try_acquire_lease(&self.key, &self.holder, self.ttl, Utc::now())
            .await
    }

    /// Drives `work` to completion, renewing the lease every third of the TTL
    ///
    /// A batch may outlive the TTL; without renewal a second invocation with
    /// the same parameters could take the lease and repeat its writes.
    pub async fn hold_while<F: Future>(&self, work: F) -> F::Output {
        let period = (self.ttl / 3).max(Duration::from_millis(10));
        let mut renewals = interval_at(Instant::now() + period, period);
        renewals.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = renewals.tick() => match self.renew().await {
                    Ok(true) => tracing::trace!(key = %self.key, "Lease renewed"),
                    Ok(false) => tracing::warn!(
                        key = %self.key,
                        holder = %self.holder,
                        "Lease taken by another holder while the invocation was running"
                    ),
                    Err(e) => tracing::warn!(key = %self.key, error = %e, "Failed to renew lease"),
                },
            }
        }
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.storage.release_lease(&self.key, &self.holder).await?;
        tracing::debug!(key = %self.key, holder = %self.holder, "Lease released");
        Ok(())
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Dropped without release (panic or early return): release in the
        // background, or let the TTL expire it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let storage = self.storage.clone();
            let key = std::mem::take(&mut self.key);
            let holder = std::mem::take(&mut self.holder);
            handle.spawn(async move {
                if let Err(e) = storage.release_lease(&key, &holder).await {
                    tracing::warn!(key = %key, error = %e, "Failed to release dropped lease");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStorage;
    use serde_json::Value;

    fn storage() -> Arc<dyn SyncStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn test_lease_key_depends_on_parameters() {
        let mut a = OperationParams::new();
        a.insert("store_id".into(), Value::from("milano"));
        let mut b = OperationParams::new();
        b.insert("store_id".into(), Value::from("roma"));

        let key_a = lease_key(OperationKind::InventorySync, &a);
        assert!(key_a.starts_with("inventory_sync:"));
        assert_eq!(key_a, lease_key(OperationKind::InventorySync, &a.clone()));
        assert_ne!(key_a, lease_key(OperationKind::InventorySync, &b));
        assert_ne!(
            lease_key(OperationKind::ProductSync, &OperationParams::new()),
            lease_key(OperationKind::OrderExport, &OperationParams::new())
        );
    }

    #[tokio::test]
    async fn test_second_holder_is_refused_until_release() {
        let storage = storage();
        let params = OperationParams::new();
        let ttl = Duration::from_secs(60);

        let first = LeaseGuard::acquire(storage.clone(), OperationKind::ProductSync, &params, "w1", ttl)
            .await
            .unwrap()
            .unwrap();
        assert!(
            LeaseGuard::acquire(storage.clone(), OperationKind::ProductSync, &params, "w2", ttl)
                .await
                .unwrap()
                .is_none()
        );

        first.release().await.unwrap();
        assert!(
            LeaseGuard::acquire(storage.clone(), OperationKind::ProductSync, &params, "w2", ttl)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_lease_key_ignores_equivalent_spellings() {
        let all_stores = OperationParams::new();
        let mut blank_store = OperationParams::new();
        blank_store.insert("store_id".into(), Value::from(""));
        assert_eq!(
            lease_key(OperationKind::InventorySync, &all_stores),
            lease_key(OperationKind::InventorySync, &blank_store)
        );

        let mut numeric = OperationParams::new();
        numeric.insert("store_id".into(), Value::from(42));
        let mut text = OperationParams::new();
        text.insert("store_id".into(), Value::from("42"));
        assert_eq!(
            lease_key(OperationKind::InventorySync, &numeric),
            lease_key(OperationKind::InventorySync, &text)
        );
    }

    #[tokio::test]
    async fn test_all_stores_trigger_spellings_exclude_each_other() {
        let storage = storage();
        let ttl = Duration::from_secs(60);
        let mut blank_store = OperationParams::new();
        blank_store.insert("store_id".into(), Value::from(""));

        let _scheduled = LeaseGuard::acquire(
            storage.clone(),
            OperationKind::InventorySync,
            &OperationParams::new(),
            "w1",
            ttl,
        )
        .await
        .unwrap()
        .unwrap();
        assert!(
            LeaseGuard::acquire(storage.clone(), OperationKind::InventorySync, &blank_store, "w2", ttl)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_lease_is_held_past_ttl_while_work_runs() {
        let storage = storage();
        let params = OperationParams::new();
        let ttl = Duration::from_millis(150);

        let guard = LeaseGuard::acquire(storage.clone(), OperationKind::OrderExport, &params, "w1", ttl)
            .await
            .unwrap()
            .unwrap();

        let work = async {
            tokio::time::sleep(Duration::from_millis(600)).await;
            "exported"
        };
        let contender = async {
            // Well past the original expiry
            tokio::time::sleep(Duration::from_millis(400)).await;
            LeaseGuard::acquire(storage.clone(), OperationKind::OrderExport, &params, "w2", ttl)
                .await
                .unwrap()
        };
        let (output, second) = tokio::join!(guard.hold_while(work), contender);

        assert_eq!(output, "exported");
        assert!(second.is_none());
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_different_parameters_do_not_contend() {
        let storage = storage();
        let ttl = Duration::from_secs(60);
        let mut milano = OperationParams::new();
        milano.insert("store_id".into(), Value::from("milano"));

        let _a = LeaseGuard::acquire(storage.clone(), OperationKind::InventorySync, &milano, "w1", ttl)
            .await
            .unwrap()
            .unwrap();
        let b = LeaseGuard::acquire(
            storage.clone(),
            OperationKind::InventorySync,
            &OperationParams::new(),
            "w2",
            ttl,
        )
        .await
        .unwrap();
        assert!(b.is_some());
    }
}
