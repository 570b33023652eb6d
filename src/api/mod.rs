//! Backing PSA API collaborator.
//!
//! The rest of the bridge consumes the API exclusively through the
//! `EntityApi` trait; `RestClient` is the HTTP implementation.

mod client;
mod types;

pub use client::{EntityApi, RestClient};
pub use types::{
    Entity, EntityKind, FilterOp, ItemResponse, QueryFilter, QueryRequest, QueryResponse,
    TenantContext,
};
