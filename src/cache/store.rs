//! Per-tenant cache store.
//!
//! One `TenantStore` per active partition: an id→name table per cached
//! entity kind plus the access timestamp that drives LRU eviction and the
//! idle sweep. All operations here are synchronous map work; anything that
//! touches the network lives in the resolver.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::api::EntityKind;
use crate::types::TenantId;

/// Entity kinds the cache maintains name tables for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachedKind {
    Company,
    Resource,
}

impl CachedKind {
    pub fn label(&self) -> &'static str {
        match self {
            CachedKind::Company => "company",
            CachedKind::Resource => "resource",
        }
    }
}

impl From<CachedKind> for EntityKind {
    fn from(kind: CachedKind) -> Self {
        match kind {
            CachedKind::Company => EntityKind::Company,
            CachedKind::Resource => EntityKind::Resource,
        }
    }
}

/// One id→name table with freshness bookkeeping.
///
/// `refreshed_at` is stamped only by a completed full refresh — or by an
/// "unavailable" verdict, which additionally sets the `unavailable` flag so
/// suppression is distinguishable from real data (a tri-state rather than
/// overloading the timestamp alone).
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: HashMap<i64, String>,
    refreshed_at: Option<DateTime<Utc>>,
    unavailable: bool,
}

impl NameTable {
    pub fn get(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Insert or overwrite a single entry. Does not stamp `refreshed_at`:
    /// individual fallback fetches never make a table look fully refreshed.
    pub fn insert(&mut self, id: i64, name: String) {
        self.entries.insert(id, name);
    }

    /// Replace the whole table after a completed full refresh.
    pub fn replace_all(&mut self, entries: HashMap<i64, String>, now: DateTime<Utc>) {
        self.entries = entries;
        self.refreshed_at = Some(now);
        self.unavailable = false;
    }

    /// Record that the backing collection is structurally unsupported.
    /// Stamps the refresh timestamp so misses stop retrying for a full
    /// freshness window.
    pub fn mark_unavailable(&mut self, now: DateTime<Utc>) {
        self.entries.clear();
        self.refreshed_at = Some(now);
        self.unavailable = true;
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.refreshed_at {
            Some(at) => {
                let age = now.signed_duration_since(at);
                age.to_std().map(|age| age < window).unwrap_or(true)
            }
            None => false,
        }
    }

    /// A full refresh is due when the table has never been populated or its
    /// last refresh fell outside the freshness window.
    pub fn needs_refresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.is_fresh(now, window)
    }

    /// True while lookups of this kind are suppressed by a prior
    /// "unavailable" verdict. Suppression lapses with the freshness window,
    /// with eviction, or with an explicit clear.
    pub fn is_suppressed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.unavailable && self.is_fresh(now, window)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

/// Point-in-time view of one tenant partition, for the stats tool.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub company_count: usize,
    pub resource_count: usize,
    pub companies_fresh: bool,
    pub resources_fresh: bool,
    pub last_used: Option<DateTime<Utc>>,
}

/// One tenant's isolated cache partition.
#[derive(Debug, Clone)]
pub struct TenantStore {
    pub companies: NameTable,
    pub resources: NameTable,
    /// Updated on every read or write touching this partition.
    last_accessed: DateTime<Utc>,
    /// Human-readable label for logs, independent of the partition key.
    label: TenantId,
}

impl TenantStore {
    pub fn new(label: TenantId, now: DateTime<Utc>) -> Self {
        Self {
            companies: NameTable::default(),
            resources: NameTable::default(),
            last_accessed: now,
            label,
        }
    }

    pub fn table(&self, kind: CachedKind) -> &NameTable {
        match kind {
            CachedKind::Company => &self.companies,
            CachedKind::Resource => &self.resources,
        }
    }

    pub fn table_mut(&mut self, kind: CachedKind) -> &mut NameTable {
        match kind {
            CachedKind::Company => &mut self.companies,
            CachedKind::Resource => &mut self.resources,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        // Monotonic while the entry exists.
        if now > self.last_accessed {
            self.last_accessed = now;
        }
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        self.last_accessed
    }

    pub fn label(&self) -> &TenantId {
        &self.label
    }

    pub fn stats(&self, now: DateTime<Utc>, window: Duration) -> CacheStats {
        CacheStats {
            company_count: self.companies.len(),
            resource_count: self.resources.len(),
            companies_fresh: self.companies.is_fresh(now, window),
            resources_fresh: self.resources.is_fresh(now, window),
            last_used: Some(self.last_accessed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const WINDOW: Duration = Duration::from_secs(1800);

    #[test]
    fn test_unpopulated_table_needs_refresh() {
        let table = NameTable::default();
        assert!(table.needs_refresh(Utc::now(), WINDOW));
        assert!(!table.is_suppressed(Utc::now(), WINDOW));
    }

    #[test]
    fn test_replace_all_stamps_freshness() {
        let mut table = NameTable::default();
        let now = Utc::now();
        table.replace_all([(7, "Acme Co".to_string())].into(), now);

        assert_eq!(table.get(7), Some("Acme Co"));
        assert!(!table.needs_refresh(now, WINDOW));
        assert!(table.needs_refresh(now + ChronoDuration::minutes(31), WINDOW));
    }

    #[test]
    fn test_single_insert_does_not_stamp() {
        let mut table = NameTable::default();
        table.insert(9, "Globex".to_string());
        assert_eq!(table.get(9), Some("Globex"));
        assert!(table.needs_refresh(Utc::now(), WINDOW));
    }

    #[test]
    fn test_unavailable_suppression_lapses_with_window() {
        let mut table = NameTable::default();
        let now = Utc::now();
        table.insert(9, "stale".to_string());
        table.mark_unavailable(now);

        assert!(table.is_empty());
        assert!(table.is_suppressed(now, WINDOW));
        assert!(!table.needs_refresh(now, WINDOW));

        let later = now + ChronoDuration::minutes(31);
        assert!(!table.is_suppressed(later, WINDOW));
        assert!(table.needs_refresh(later, WINDOW));
    }

    #[test]
    fn test_refresh_clears_unavailable_flag() {
        let mut table = NameTable::default();
        let now = Utc::now();
        table.mark_unavailable(now);
        table.replace_all([(1, "Back".to_string())].into(), now);
        assert!(!table.is_suppressed(now, WINDOW));
        assert_eq!(table.get(1), Some("Back"));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = Utc::now();
        let mut store = TenantStore::new(TenantId::new("tenant-a"), now);
        let earlier = now - ChronoDuration::minutes(5);
        store.touch(earlier);
        assert_eq!(store.last_accessed(), now);

        let later = now + ChronoDuration::minutes(5);
        store.touch(later);
        assert_eq!(store.last_accessed(), later);
    }

    #[test]
    fn test_stats_snapshot() {
        let now = Utc::now();
        let mut store = TenantStore::new(TenantId::new("tenant-a"), now);
        store
            .companies
            .replace_all([(7, "Acme Co".to_string())].into(), now);
        store.resources.insert(3, "Ada Lovelace".to_string());

        let stats = store.stats(now, WINDOW);
        assert_eq!(stats.company_count, 1);
        assert_eq!(stats.resource_count, 1);
        assert!(stats.companies_fresh);
        assert!(!stats.resources_fresh);
        assert_eq!(stats.last_used, Some(now));
    }
}
