//! Optional resolution accounting.
//!
//! A side-channel observer recording whether each resolution was served
//! from cache or needed the backing API. Injected, with a no-op default —
//! nothing in the resolver depends on it for correctness.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cache::store::CachedKind;

/// Where a resolution was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Api,
}

/// Observer for name-resolution outcomes.
pub trait CallAccounting: Send + Sync + std::fmt::Debug {
    fn record_resolution(&self, kind: CachedKind, source: LookupSource);
}

/// Default observer: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAccounting;

impl CallAccounting for NoopAccounting {
    fn record_resolution(&self, _kind: CachedKind, _source: LookupSource) {}
}

/// Counting observer for diagnostics and tests.
#[derive(Debug, Default)]
pub struct CallCounter {
    cache_hits: AtomicUsize,
    api_calls: AtomicUsize,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }
}

impl CallAccounting for CallCounter {
    fn record_resolution(&self, kind: CachedKind, source: LookupSource) {
        match source {
            LookupSource::Cache => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(kind = kind.label(), "resolution_cache_hit");
            }
            LookupSource::Api => {
                self.api_calls.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(kind = kind.label(), "resolution_api_call");
            }
        }
    }
}
