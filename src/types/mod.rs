//! Core types for the PSA bridge.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (TenantKey, TenantId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the API client and cache

mod config;
mod errors;
mod ids;

pub use config::{ApiConfig, CacheConfig, Config, ObservabilityConfig};
pub use errors::{Error, Result};
pub use ids::{TenantId, TenantKey};
