//! Multi-tenant ID-to-name resolution cache.
//!
//! The backing API speaks in opaque numeric ids; tool output speaks in
//! names. This module owns the mapping: per-tenant partitions with bounded
//! cardinality, lazy freshness-driven refresh, a direct-fetch → search
//! fallback chain, and a lazy once-per-process lifecycle for the shared
//! resolver.

mod accounting;
mod key;
mod lifecycle;
mod manager;
mod resolver;
mod store;

pub use accounting::{CallAccounting, CallCounter, LookupSource, NoopAccounting};
pub use key::{derive_tenant_key, tenant_label, SINGLE_TENANT_KEY};
pub use lifecycle::SharedCell;
pub use manager::PartitionManager;
pub use resolver::NameResolver;
pub use store::{CacheStats, CachedKind, NameTable, TenantStore};
