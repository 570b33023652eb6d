//! Name resolver — ID-to-name resolution with per-tenant caching.
//!
//! Resolution order for a single id:
//! 1. lazily refresh the tenant's table when it is unpopulated or stale,
//! 2. serve from the table on a hit,
//! 3. on a miss, fetch the entity directly by id,
//! 4. if that fails or yields no usable name, fall back to a filtered
//!    search for exactly that id,
//! 5. degrade to `None` on any remaining failure.
//!
//! A name the resolver cannot produce is decoration the tool output lives
//! without — resolution failures never abort the enclosing tool call.

use chrono::Utc;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::api::{EntityApi, QueryFilter, TenantContext};
use crate::cache::accounting::{CallAccounting, LookupSource, NoopAccounting};
use crate::cache::key::{derive_tenant_key, tenant_label};
use crate::cache::manager::PartitionManager;
use crate::cache::store::{CacheStats, CachedKind};
use crate::types::{CacheConfig, Error, TenantId, TenantKey};

/// Outcome of a table probe under the partition lock.
enum Probe {
    Hit(String),
    /// Lookups of this kind are suppressed by an "unavailable" verdict.
    Suppressed,
    Miss,
}

/// Multi-tenant ID-to-name resolver.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the
/// partition manager's single mutex domain. Backing-API fetches run
/// outside that lock.
pub struct NameResolver {
    api: Arc<dyn EntityApi>,
    partitions: PartitionManager,
    accounting: Arc<dyn CallAccounting>,
}

impl std::fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("partitions", &self.partitions)
            .field("accounting", &self.accounting)
            .finish_non_exhaustive()
    }
}

impl NameResolver {
    /// Construct a resolver and start its background idle sweep.
    pub fn start(api: Arc<dyn EntityApi>, config: CacheConfig) -> Arc<Self> {
        Self::start_with_accounting(api, config, Arc::new(NoopAccounting))
    }

    /// Same as [`NameResolver::start`] with an explicit accounting observer.
    pub fn start_with_accounting(
        api: Arc<dyn EntityApi>,
        config: CacheConfig,
        accounting: Arc<dyn CallAccounting>,
    ) -> Arc<Self> {
        let partitions = PartitionManager::new(config);
        partitions.start_sweeper();
        Arc::new(Self {
            api,
            partitions,
            accounting,
        })
    }

    /// Resolve one id to a display name. `None` means "no usable name" —
    /// never an error.
    pub async fn resolve_name(
        &self,
        kind: CachedKind,
        id: i64,
        tenant: Option<&TenantContext>,
    ) -> Option<String> {
        let key = derive_tenant_key(tenant);
        let label = TenantId::new(tenant_label(tenant));

        self.refresh_if_stale(kind, &key, &label, tenant).await;

        match self.probe(kind, id, &key, &label).await {
            Probe::Hit(name) => {
                self.accounting.record_resolution(kind, LookupSource::Cache);
                Some(name)
            }
            Probe::Suppressed => {
                self.accounting.record_resolution(kind, LookupSource::Cache);
                None
            }
            Probe::Miss => {
                self.accounting.record_resolution(kind, LookupSource::Api);
                self.fetch_uncached(kind, id, &key, &label, tenant).await
            }
        }
    }

    /// Resolve a batch of ids, preserving input length and order.
    ///
    /// Distinct missing ids are fetched with bounded concurrency; duplicate
    /// input positions share one fetch. Backing-API calls are therefore
    /// bounded by the number of *distinct* missing ids.
    pub async fn resolve_names(
        &self,
        kind: CachedKind,
        ids: &[i64],
        tenant: Option<&TenantContext>,
    ) -> Vec<Option<String>> {
        if ids.is_empty() {
            return Vec::new();
        }

        let key = derive_tenant_key(tenant);
        let label = TenantId::new(tenant_label(tenant));

        self.refresh_if_stale(kind, &key, &label, tenant).await;

        let mut distinct: Vec<i64> = Vec::new();
        let mut seen = HashSet::new();
        for &id in ids {
            if seen.insert(id) {
                distinct.push(id);
            }
        }

        // One pass under the partition lock for every distinct id.
        let window = self.partitions.config().refresh_interval;
        let probes: Vec<(i64, Probe)> = self
            .partitions
            .with_store(&key, &label, |store| {
                let now = Utc::now();
                let table = store.table(kind);
                distinct
                    .iter()
                    .map(|&id| {
                        let probe = match table.get(id) {
                            Some(name) => Probe::Hit(name.to_string()),
                            None if table.is_suppressed(now, window) => Probe::Suppressed,
                            None => Probe::Miss,
                        };
                        (id, probe)
                    })
                    .collect()
            })
            .await;

        let mut resolved: HashMap<i64, Option<String>> = HashMap::new();
        let mut missing: Vec<i64> = Vec::new();
        for (id, probe) in probes {
            match probe {
                Probe::Hit(name) => {
                    self.accounting.record_resolution(kind, LookupSource::Cache);
                    resolved.insert(id, Some(name));
                }
                Probe::Suppressed => {
                    self.accounting.record_resolution(kind, LookupSource::Cache);
                    resolved.insert(id, None);
                }
                Probe::Miss => {
                    self.accounting.record_resolution(kind, LookupSource::Api);
                    missing.push(id);
                }
            }
        }

        let limit = self.partitions.config().max_concurrent_fetches;
        let fetched: Vec<(i64, Option<String>)> = futures::stream::iter(
            missing.into_iter().map(|id| {
                let key = &key;
                let label = &label;
                async move { (id, self.fetch_uncached(kind, id, key, label, tenant).await) }
            }),
        )
        .buffer_unordered(limit)
        .collect()
        .await;

        for (id, name) in fetched {
            resolved.insert(id, name);
        }

        // Reassemble in input order, duplicates included.
        ids.iter()
            .map(|id| resolved.get(id).cloned().flatten())
            .collect()
    }

    /// Proactively populate both name tables for a tenant. Best-effort:
    /// failure in one entity kind never aborts population of the other,
    /// and no failure escapes to the caller.
    pub async fn preload(&self, tenant: Option<&TenantContext>) {
        let key = derive_tenant_key(tenant);
        let label = TenantId::new(tenant_label(tenant));
        for kind in [CachedKind::Company, CachedKind::Resource] {
            self.refresh_table(kind, &key, &label, tenant).await;
        }
    }

    /// Snapshot one tenant's cache statistics. A tenant with no live
    /// partition reports empty stats; observation never creates (or, at
    /// capacity, evicts) a partition.
    pub async fn stats(&self, tenant: Option<&TenantContext>) -> CacheStats {
        let key = derive_tenant_key(tenant);
        let window = self.partitions.config().refresh_interval;
        self.partitions
            .with_existing(&key, |store| store.stats(Utc::now(), window))
            .await
            .unwrap_or_default()
    }

    /// Drop one tenant's partition.
    pub async fn clear(&self, tenant: Option<&TenantContext>) -> bool {
        let key = derive_tenant_key(tenant);
        self.partitions.clear(&key).await
    }

    /// Drop every tenant partition. Returns the number removed.
    pub async fn clear_all(&self) -> usize {
        self.partitions.clear_all().await
    }

    /// Number of live tenant partitions.
    pub async fn partition_count(&self) -> usize {
        self.partitions.partition_count().await
    }

    /// Stop the background sweep. Safe to call multiple times.
    pub fn shutdown(&self) {
        self.partitions.shutdown();
    }

    /// Probe the tenant's table for one id.
    async fn probe(&self, kind: CachedKind, id: i64, key: &TenantKey, label: &TenantId) -> Probe {
        let window = self.partitions.config().refresh_interval;
        self.partitions
            .with_store(key, label, |store| {
                let table = store.table(kind);
                match table.get(id) {
                    Some(name) => Probe::Hit(name.to_string()),
                    None if table.is_suppressed(Utc::now(), window) => Probe::Suppressed,
                    None => Probe::Miss,
                }
            })
            .await
    }

    /// Run a full table refresh if the table has never been populated or
    /// has gone stale. Suppressed tables count as fresh until the window
    /// lapses, which is exactly what stops retry storms.
    async fn refresh_if_stale(
        &self,
        kind: CachedKind,
        key: &TenantKey,
        label: &TenantId,
        tenant: Option<&TenantContext>,
    ) {
        let window = self.partitions.config().refresh_interval;
        let due = self
            .partitions
            .with_store(key, label, |store| {
                store.table(kind).needs_refresh(Utc::now(), window)
            })
            .await;
        if due {
            self.refresh_table(kind, key, label, tenant).await;
        }
    }

    /// Full listing fetch → bulk table replacement. Concurrent callers may
    /// both refresh the same cold table; the second replacement is an
    /// idempotent overwrite.
    async fn refresh_table(
        &self,
        kind: CachedKind,
        key: &TenantKey,
        label: &TenantId,
        tenant: Option<&TenantContext>,
    ) {
        match self.api.query_entities(kind.into(), &[], tenant).await {
            Ok(entities) => {
                let mut entries = HashMap::with_capacity(entities.len());
                for entity in &entities {
                    if let (Some(id), Some(name)) = (entity.id(), entity.display_name(kind.into()))
                    {
                        entries.insert(id, name);
                    }
                }
                let count = entries.len();
                self.partitions
                    .with_store(key, label, |store| {
                        store.table_mut(kind).replace_all(entries, Utc::now());
                    })
                    .await;
                tracing::info!(tenant = %label, kind = kind.label(), count, "name_table_refreshed");
            }
            Err(Error::Unavailable(msg)) => {
                self.mark_unavailable(kind, key, label, &msg).await;
            }
            Err(e) => {
                // Prior timestamp (and data) stay untouched; a later call
                // will retry.
                tracing::warn!(tenant = %label, kind = kind.label(), error = %e, "name_table_refresh_failed");
            }
        }
    }

    /// Fallback chain for one uncached id: direct fetch, then filtered
    /// search. Every failure path degrades to `None`.
    async fn fetch_uncached(
        &self,
        kind: CachedKind,
        id: i64,
        key: &TenantKey,
        label: &TenantId,
        tenant: Option<&TenantContext>,
    ) -> Option<String> {
        match self.api.get_entity(kind.into(), id, tenant).await {
            Ok(entity) => {
                if let Some(name) = entity.display_name(kind.into()) {
                    self.store_entry(kind, id, name.clone(), key, label).await;
                    return Some(name);
                }
                tracing::debug!(kind = kind.label(), id, "entity_has_no_usable_name");
            }
            Err(e) => {
                tracing::debug!(kind = kind.label(), id, error = %e, "direct_fetch_failed");
            }
        }

        let filter = [QueryFilter::eq("id", id)];
        match self.api.query_entities(kind.into(), &filter, tenant).await {
            Ok(entities) => {
                let found = entities
                    .iter()
                    .find_map(|entity| entity.display_name(kind.into()));
                match found {
                    Some(name) => {
                        self.store_entry(kind, id, name.clone(), key, label).await;
                        Some(name)
                    }
                    None => None,
                }
            }
            Err(Error::Unavailable(msg)) => {
                self.mark_unavailable(kind, key, label, &msg).await;
                None
            }
            Err(e) => {
                tracing::warn!(kind = kind.label(), id, error = %e, "search_fallback_failed");
                None
            }
        }
    }

    /// Single atomic map insert; a cancelled caller that never reaches this
    /// point simply forgoes population.
    async fn store_entry(
        &self,
        kind: CachedKind,
        id: i64,
        name: String,
        key: &TenantKey,
        label: &TenantId,
    ) {
        self.partitions
            .with_store(key, label, |store| {
                store.table_mut(kind).insert(id, name);
            })
            .await;
    }

    /// Stamp the table as unavailable so every lookup of this kind returns
    /// `None` without touching the API until the window lapses or the
    /// partition is cleared. Logged at warn once per verdict.
    async fn mark_unavailable(
        &self,
        kind: CachedKind,
        key: &TenantKey,
        label: &TenantId,
        msg: &str,
    ) {
        tracing::warn!(tenant = %label, kind = kind.label(), detail = msg, "entity_collection_unavailable");
        self.partitions
            .with_store(key, label, |store| {
                store.table_mut(kind).mark_unavailable(Utc::now());
            })
            .await;
    }
}
