//! Tenant partition manager.
//!
//! Owns the collection of per-tenant stores behind a single mutex domain.
//! Tenant identity is caller-supplied and unbounded, so the collection is
//! bounded two ways: LRU eviction when the partition cap is exceeded, and a
//! periodic sweep that purges partitions idle longer than the freshness
//! window. The sweep is housekeeping, not correctness — request-driven LRU
//! alone keeps the cap.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::interval;

use crate::cache::store::TenantStore;
use crate::types::{CacheConfig, TenantId, TenantKey};

type PartitionMap = HashMap<TenantKey, TenantStore>;

/// Partition manager — the one mutable shared resource of the cache.
///
/// Mutations (create, evict, insert, clear) are serialized by the inner
/// mutex; backing-API fetches happen entirely outside it so slow network
/// calls never block unrelated cache reads.
#[derive(Debug)]
pub struct PartitionManager {
    partitions: Arc<Mutex<PartitionMap>>,
    config: CacheConfig,
    stop_tx: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl PartitionManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            partitions: Arc::new(Mutex::new(HashMap::new())),
            config,
            stop_tx: std::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Run a closure against one tenant's store under the partition lock.
    ///
    /// Creates the partition if absent (evicting the least-recently-used
    /// one first when at capacity) and refreshes its access timestamp.
    /// The closure must not block: it gets synchronous map access only.
    pub async fn with_store<R>(
        &self,
        key: &TenantKey,
        label: &TenantId,
        f: impl FnOnce(&mut TenantStore) -> R,
    ) -> R {
        let now = Utc::now();
        let mut partitions = self.partitions.lock().await;

        if !partitions.contains_key(key) {
            while partitions.len() >= self.config.max_tenants {
                evict_lru(&mut partitions);
            }
        }

        let store = partitions.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(tenant = %label, key = %key, "partition_created");
            TenantStore::new(label.clone(), now)
        });
        store.touch(now);
        f(store)
    }

    /// Run a closure against one tenant's store only if the partition
    /// already exists. Touches the access timestamp; never creates a
    /// partition, so observation alone cannot evict live tenants.
    pub async fn with_existing<R>(
        &self,
        key: &TenantKey,
        f: impl FnOnce(&mut TenantStore) -> R,
    ) -> Option<R> {
        let mut partitions = self.partitions.lock().await;
        let store = partitions.get_mut(key)?;
        store.touch(Utc::now());
        Some(f(store))
    }

    /// Remove every partition idle longer than the freshness window.
    /// Returns the number removed.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let window = self.config.refresh_interval;
        let mut partitions = self.partitions.lock().await;
        let before = partitions.len();
        partitions.retain(|key, store| {
            let idle = now
                .signed_duration_since(store.last_accessed())
                .to_std()
                .unwrap_or_default();
            let keep = idle < window;
            if !keep {
                tracing::debug!(tenant = %store.label(), key = %key, idle_secs = idle.as_secs(), "partition_idle_evicted");
            }
            keep
        });
        before - partitions.len()
    }

    /// Remove one tenant's partition. Returns whether it existed.
    pub async fn clear(&self, key: &TenantKey) -> bool {
        self.partitions.lock().await.remove(key).is_some()
    }

    /// Remove every partition. Returns the number removed.
    pub async fn clear_all(&self) -> usize {
        let mut partitions = self.partitions.lock().await;
        let count = partitions.len();
        partitions.clear();
        count
    }

    pub async fn partition_count(&self) -> usize {
        self.partitions.lock().await.len()
    }

    /// Start the periodic idle sweep in the background.
    /// Returns immediately; the sweep runs in a spawned task.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let partitions = self.partitions.clone();
        let window = self.config.refresh_interval;
        let sweep_interval = self.config.sweep_interval;
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        if let Ok(mut slot) = self.stop_tx.lock() {
            *slot = Some(stop_tx);
        }

        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            // The first tick fires immediately; skip it so a fresh manager
            // does not sweep before any partition has been touched.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = sweep(&partitions, Utc::now(), window).await;
                        if removed > 0 {
                            tracing::debug!(removed, "idle_sweep_completed");
                        }
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("partition_sweeper_stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the periodic sweep. Safe to call multiple times.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.stop_tx.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(());
            }
        }
    }
}

impl Drop for PartitionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Evict the single partition with the oldest access timestamp. Ties break
/// deterministically by partition key.
fn evict_lru(partitions: &mut PartitionMap) {
    let victim = partitions
        .iter()
        .min_by_key(|(key, store)| (store.last_accessed(), (*key).clone()))
        .map(|(key, _)| key.clone());

    if let Some(key) = victim {
        if let Some(store) = partitions.remove(&key) {
            tracing::debug!(tenant = %store.label(), key = %key, "partition_lru_evicted");
        }
    }
}

/// One sweep cycle over the shared partition map.
async fn sweep(
    partitions: &Arc<Mutex<PartitionMap>>,
    now: DateTime<Utc>,
    window: std::time::Duration,
) -> usize {
    let mut partitions = partitions.lock().await;
    let before = partitions.len();
    partitions.retain(|_, store| {
        now.signed_duration_since(store.last_accessed())
            .to_std()
            .map(|idle| idle < window)
            .unwrap_or(true)
    });
    before - partitions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_config(max_tenants: usize) -> CacheConfig {
        CacheConfig {
            max_tenants,
            ..Default::default()
        }
    }

    fn key(s: &str) -> TenantKey {
        TenantKey::new(s)
    }

    fn label(s: &str) -> TenantId {
        TenantId::new(s)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let manager = PartitionManager::new(small_config(10));
        manager
            .with_store(&key("t1"), &label("one"), |store| {
                store.companies.insert(7, "Acme Co".to_string());
            })
            .await;

        let name = manager
            .with_store(&key("t1"), &label("one"), |store| {
                store.companies.get(7).map(str::to_string)
            })
            .await;
        assert_eq!(name.as_deref(), Some("Acme Co"));
        assert_eq!(manager.partition_count().await, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_order() {
        let manager = PartitionManager::new(small_config(2));

        // Touch order: t1, t2, t1 — then creating t3 must evict t2.
        manager.with_store(&key("t1"), &label("one"), |_| ()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.with_store(&key("t2"), &label("two"), |_| ()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.with_store(&key("t1"), &label("one"), |_| ()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager
            .with_store(&key("t3"), &label("three"), |_| ())
            .await;

        assert_eq!(manager.partition_count().await, 2);
        // t1 and t3 survive: populating t2 again creates a fresh partition.
        let t1_seen = manager
            .with_store(&key("t1"), &label("one"), |store| store.companies.len())
            .await;
        assert_eq!(t1_seen, 0);

        let partitions = manager.partitions.lock().await;
        assert!(partitions.contains_key(&key("t1")));
        assert!(partitions.contains_key(&key("t3")));
        assert!(!partitions.contains_key(&key("t2")));
    }

    #[tokio::test]
    async fn test_with_existing_never_creates_or_evicts() {
        let manager = PartitionManager::new(small_config(1));
        assert!(manager.with_existing(&key("t1"), |_| ()).await.is_none());
        assert_eq!(manager.partition_count().await, 0);

        manager.with_store(&key("t1"), &label("one"), |_| ()).await;

        // At capacity: peeking at an unknown tenant must not evict t1.
        assert!(manager.with_existing(&key("t2"), |_| ()).await.is_none());
        assert_eq!(manager.partition_count().await, 1);
        assert!(manager.with_existing(&key("t1"), |_| ()).await.is_some());
    }

    #[tokio::test]
    async fn test_evict_idle_removes_only_stale_partitions() {
        let manager = PartitionManager::new(small_config(10));
        manager.with_store(&key("t1"), &label("one"), |_| ()).await;
        manager.with_store(&key("t2"), &label("two"), |_| ()).await;

        // Nothing is idle yet.
        assert_eq!(manager.evict_idle(Utc::now()).await, 0);

        // Everything is idle from the vantage of one hour in the future.
        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(manager.evict_idle(future).await, 2);
        assert_eq!(manager.partition_count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_and_clear_all() {
        let manager = PartitionManager::new(small_config(10));
        manager.with_store(&key("t1"), &label("one"), |_| ()).await;
        manager.with_store(&key("t2"), &label("two"), |_| ()).await;

        assert!(manager.clear(&key("t1")).await);
        assert!(!manager.clear(&key("t1")).await);
        assert_eq!(manager.clear_all().await, 1);
        assert_eq!(manager.partition_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_start_stop() {
        let config = CacheConfig {
            sweep_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let manager = PartitionManager::new(config);
        let handle = manager.start_sweeper();

        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.shutdown();
        // Idempotent.
        manager.shutdown();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper should stop")
            .expect("sweeper task should not panic");
    }

    #[tokio::test]
    async fn test_sweeper_purges_idle_partition() {
        let config = CacheConfig {
            refresh_interval: Duration::from_millis(20),
            sweep_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let manager = PartitionManager::new(config);
        manager.with_store(&key("t1"), &label("one"), |_| ()).await;
        let _handle = manager.start_sweeper();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.partition_count().await, 0);
        manager.shutdown();
    }
}
