//! Lazy shared-instance lifecycle.
//!
//! The resolver starts a background sweep on construction, so it must be
//! built exactly once per process even when first use arrives from many
//! concurrent tool calls. `SharedCell` is an explicit once-initialized
//! handle: the first caller runs the async constructor while every
//! concurrent caller parks on the cell's mutex; a failed construction
//! leaves the cell empty so a later call may retry — one failure never
//! poisons the cell.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::types::Result;

/// Once-initialized shared handle with cooperative async construction.
#[derive(Debug)]
pub struct SharedCell<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> SharedCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the shared instance, constructing it with `init` on first
    /// use.
    ///
    /// Callers that arrive during construction wait on the cell's mutex and
    /// then observe the published instance — or, after a failed attempt,
    /// run their own construction attempt. Exactly one instance is ever
    /// published.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        // Failure propagates with the slot still empty: eligible for retry.
        let built = init().await?;
        *slot = Some(built.clone());
        Ok(built)
    }

    /// Instance if already constructed, without triggering construction.
    pub async fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().await.clone()
    }

    /// Take the instance out of the cell, returning the cell to the
    /// uninitialized state. The caller owns any teardown of the returned
    /// instance.
    pub async fn reset(&self) -> Option<Arc<T>> {
        self.slot.lock().await.take()
    }
}

impl<T> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_constructs_once() {
        let cell = SharedCell::new();
        let built = Arc::new(AtomicUsize::new(0));

        let a = cell
            .get_or_init(|| {
                let built = built.clone();
                async move {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(42_u64))
                }
            })
            .await
            .unwrap();
        let b = cell
            .get_or_init(|| async { panic!("must not construct twice") })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_yields_one_instance() {
        let cell = Arc::new(SharedCell::new());
        let built = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cell = cell.clone();
            let built = built.clone();
            handles.push(tokio::spawn(async move {
                cell.get_or_init(|| {
                    let built = built.clone();
                    async move {
                        // Widen the construction window so contenders pile
                        // up on the lock.
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        built.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(7_u64))
                    }
                })
                .await
                .unwrap()
            }));
        }

        let mut instances = Vec::new();
        for handle in handles {
            instances.push(handle.await.unwrap());
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
    }

    #[tokio::test]
    async fn test_failed_construction_permits_retry() {
        let cell: SharedCell<u64> = SharedCell::new();

        let first = cell
            .get_or_init(|| async { Err(Error::internal("boom")) })
            .await;
        assert!(first.is_err());
        assert!(cell.get().await.is_none());

        let second = cell.get_or_init(|| async { Ok(Arc::new(9)) }).await;
        assert_eq!(*second.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_reset_returns_to_uninitialized() {
        let cell: SharedCell<u64> = SharedCell::new();
        cell.get_or_init(|| async { Ok(Arc::new(1)) })
            .await
            .unwrap();

        let taken = cell.reset().await;
        assert_eq!(taken.map(|v| *v), Some(1));
        assert!(cell.get().await.is_none());

        // Fresh construction is permitted after reset.
        let again = cell.get_or_init(|| async { Ok(Arc::new(2)) }).await.unwrap();
        assert_eq!(*again, 2);
    }
}
