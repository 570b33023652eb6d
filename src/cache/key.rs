//! Tenant cache-partition key derivation.
//!
//! Tenant identity is caller-supplied and unbounded, so partition keys must
//! be short, stable, and collision-resistant for a realistic tenant
//! cardinality (tens, not billions). The key is derived from the stable
//! identity fields only — the secret never participates.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::api::TenantContext;
use crate::types::TenantKey;

/// Partition key used when no per-request credentials are supplied.
pub const SINGLE_TENANT_KEY: &str = "default";

/// Truncation length for derived keys. 16 base64 chars carry 96 bits of
/// the digest, far beyond what tens of tenants can collide on.
const KEY_LEN: usize = 16;

/// Derive a stable cache-partition key from optional tenant credentials.
///
/// Absent credentials map to the fixed single-tenant key. The derivation is
/// pure and infallible: SHA-256 over `username:integration_code`, URL-safe
/// base64, truncated.
pub fn derive_tenant_key(tenant: Option<&TenantContext>) -> TenantKey {
    match tenant {
        None => TenantKey::new(SINGLE_TENANT_KEY),
        Some(ctx) => {
            let mut hasher = Sha256::new();
            hasher.update(ctx.username.as_bytes());
            hasher.update(b":");
            hasher.update(ctx.integration_code.as_bytes());
            let digest = hasher.finalize();

            let mut encoded = URL_SAFE_NO_PAD.encode(digest);
            encoded.truncate(KEY_LEN);
            TenantKey::new(encoded)
        }
    }
}

/// Human-readable partition label for logs: the principal name, which is
/// meaningful to operators where the hashed key is not.
pub fn tenant_label(tenant: Option<&TenantContext>) -> String {
    match tenant {
        None => SINGLE_TENANT_KEY.to_string(),
        Some(ctx) => ctx.username.clone(),
    }
}
