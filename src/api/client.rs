//! Backing-API client — the two capability contracts the cache consumes.
//!
//! `EntityApi` is the seam between the bridge and the PSA platform: a
//! single-entity fetch and a filtered query, both parameterized by an
//! optional tenant context. `RestClient` is the production implementation;
//! tests substitute in-memory doubles.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::types::{
    Entity, EntityKind, ItemResponse, QueryFilter, QueryRequest, QueryResponse, TenantContext,
};
use crate::types::{ApiConfig, Error, Result};

/// Capability contract over the backing PSA API.
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// Fetch a single entity by id.
    ///
    /// Fails with `Error::NotFound` when the entity does not exist and
    /// `Error::Unavailable` when the collection is unsupported for the
    /// account.
    async fn get_entity(
        &self,
        kind: EntityKind,
        id: i64,
        tenant: Option<&TenantContext>,
    ) -> Result<Entity>;

    /// Query a collection with filter clauses. An empty filter lists the
    /// collection (bounded by the configured page size).
    async fn query_entities(
        &self,
        kind: EntityKind,
        filter: &[QueryFilter],
        tenant: Option<&TenantContext>,
    ) -> Result<Vec<Entity>>;
}

/// Production `EntityApi` over HTTP.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl RestClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, kind: EntityKind, suffix: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if suffix.is_empty() {
            format!("{}/{}", base, kind.path())
        } else {
            format!("{}/{}/{}", base, kind.path(), suffix)
        }
    }

    /// Apply auth headers, preferring the per-request tenant context over
    /// the configured default identity.
    fn authed(
        &self,
        builder: reqwest::RequestBuilder,
        tenant: Option<&TenantContext>,
    ) -> reqwest::RequestBuilder {
        match tenant {
            Some(ctx) => builder
                .header("UserName", &ctx.username)
                .header("Secret", &ctx.secret)
                .header("ApiIntegrationCode", &ctx.integration_code),
            None => builder
                .header("UserName", &self.config.username)
                .header("Secret", &self.config.secret)
                .header("ApiIntegrationCode", &self.config.integration_code),
        }
    }
}

/// Map an HTTP status to the bridge error taxonomy.
fn status_to_error(kind: EntityKind, status: StatusCode, detail: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::not_found(format!("{} {}", kind, detail)),
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => Error::unavailable(
            format!("{} collection not supported for this account", kind),
        ),
        s => Error::api(format!("{} request failed: {} {}", kind, s, detail)),
    }
}

#[async_trait]
impl EntityApi for RestClient {
    async fn get_entity(
        &self,
        kind: EntityKind,
        id: i64,
        tenant: Option<&TenantContext>,
    ) -> Result<Entity> {
        let url = self.url(kind, &id.to_string());
        let response = self
            .authed(self.http.get(&url), tenant)
            .send()
            .await
            .map_err(|e| Error::api(format!("{} fetch failed: {}", kind, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_to_error(kind, status, &format!("id {}", id)));
        }

        let body: ItemResponse = response
            .json()
            .await
            .map_err(|e| Error::api(format!("{} fetch decode failed: {}", kind, e)))?;
        Ok(body.item)
    }

    async fn query_entities(
        &self,
        kind: EntityKind,
        filter: &[QueryFilter],
        tenant: Option<&TenantContext>,
    ) -> Result<Vec<Entity>> {
        let url = self.url(kind, "query");
        let body = QueryRequest {
            filter: filter.to_vec(),
            max_records: self.config.max_records,
        };

        let response = self
            .authed(self.http.post(&url), tenant)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::api(format!("{} query failed: {}", kind, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_to_error(kind, status, "query"));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::api(format!("{} query decode failed: {}", kind, e)))?;
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> RestClient {
        let config = ApiConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        };
        RestClient::new(config).unwrap()
    }

    #[test]
    fn test_url_building_strips_trailing_slash() {
        let client = test_client();
        assert_eq!(
            client.url(EntityKind::Company, "42"),
            "https://api.example.com/v1/Companies/42"
        );
        assert_eq!(
            client.url(EntityKind::Ticket, "query"),
            "https://api.example.com/v1/Tickets/query"
        );
        assert_eq!(
            client.url(EntityKind::Resource, ""),
            "https://api.example.com/v1/Resources"
        );
    }

    #[test]
    fn test_status_mapping() {
        let err = status_to_error(EntityKind::Company, StatusCode::NOT_FOUND, "id 9");
        assert!(matches!(err, Error::NotFound(_)));

        let err = status_to_error(EntityKind::Resource, StatusCode::METHOD_NOT_ALLOWED, "query");
        assert!(matches!(err, Error::Unavailable(_)));

        let err = status_to_error(EntityKind::Company, StatusCode::BAD_GATEWAY, "query");
        assert!(matches!(err, Error::Api(_)));
        assert!(err.is_transient());
    }
}
