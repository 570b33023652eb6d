//! # PSA Bridge - Tool-Calling Bridge for PSA Platforms
//!
//! Exposes a third-party business-management (PSA) API through a
//! tool-calling protocol, providing:
//! - Multi-tenant ID-to-name resolution cache with LRU bounding and
//!   freshness-driven refresh
//! - Typed tool catalog with argument validation and schema generation
//! - Backing-API client behind a narrow capability trait
//! - Stdio JSON-RPC transport
//!
//! ## Architecture
//!
//! ```text
//!   stdio requests →  ┌─────────────────────────────────┐
//!                     │          ToolRouter             │
//!                     │  ┌─────────┐ ┌──────────────┐   │
//!                     │  │ Catalog │ │ NameResolver │   │
//!                     │  └─────────┘ │  ┌─────────┐ │   │
//!                     │              │  │Partition│ │   │
//!                     │  ┌─────────┐ │  │ Manager │ │   │
//!                     │  │EntityApi│←┤  └─────────┘ │   │
//!                     │  └─────────┘ └──────────────┘   │
//!                     └─────────────────────────────────┘
//! ```
//!
//! The partition manager owns all per-tenant cache state behind a single
//! mutex domain; backing-API fetches always happen outside that lock.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod api;
pub mod cache;
pub mod mcp;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
