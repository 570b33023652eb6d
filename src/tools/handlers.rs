//! Tool handlers — the bridge's built-in tool set.
//!
//! The router owns the catalog, validates arguments before dispatch, and
//! obtains the shared name resolver through its lazy lifecycle cell on
//! first use. Tenant credentials arrive as an explicit typed `tenant`
//! argument; absence selects the configured single-tenant identity.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{Entity, EntityApi, EntityKind, QueryFilter, TenantContext};
use crate::cache::{CachedKind, NameResolver, SharedCell};
use crate::tools::catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry};
use crate::types::{CacheConfig, Error, Result};

/// Dispatches tool calls to their implementations.
pub struct ToolRouter {
    api: Arc<dyn EntityApi>,
    resolver_cell: SharedCell<NameResolver>,
    cache_config: CacheConfig,
    catalog: ToolCatalog,
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl ToolRouter {
    pub fn new(api: Arc<dyn EntityApi>, cache_config: CacheConfig) -> Result<Self> {
        Ok(Self {
            api,
            resolver_cell: SharedCell::new(),
            cache_config,
            catalog: builtin_catalog()?,
        })
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Shared resolver, constructed on first use. Concurrent first calls
    /// all receive the same instance.
    pub async fn resolver(&self) -> Result<Arc<NameResolver>> {
        let api = self.api.clone();
        let config = self.cache_config.clone();
        self.resolver_cell
            .get_or_init(|| async move { Ok(NameResolver::start(api, config)) })
            .await
    }

    /// Stop the resolver's background work, if it was ever constructed.
    pub async fn shutdown(&self) {
        if let Some(resolver) = self.resolver_cell.reset().await {
            resolver.shutdown();
        }
    }

    /// Validate arguments and dispatch one tool call.
    pub async fn call(&self, name: &str, mut args: Value) -> Result<Value> {
        if args.is_null() {
            args = json!({});
        }
        let errors = self.catalog.validate_args(name, &args)?;
        if !errors.is_empty() {
            return Err(Error::validation(errors.join("; ")));
        }
        self.catalog.fill_defaults(name, &mut args)?;

        let tenant = extract_tenant(&mut args)?;
        let tenant_ref = tenant.as_ref();

        match name {
            "test_connection" => self.test_connection(tenant_ref).await,
            "search_companies" => self.search_companies(&args, tenant_ref).await,
            "get_company" => self.get_company(&args, tenant_ref).await,
            "search_resources" => self.search_resources(&args, tenant_ref).await,
            "search_tickets" => self.search_tickets(&args, tenant_ref).await,
            "get_ticket" => self.get_ticket(&args, tenant_ref).await,
            "resolve_names" => self.resolve_entity_names(&args, tenant_ref).await,
            "cache_stats" => self.cache_stats(tenant_ref).await,
            "cache_preload" => self.cache_preload(tenant_ref).await,
            "cache_clear" => self.cache_clear(&args, tenant_ref).await,
            other => Err(Error::not_found(format!("Unknown tool: {}", other))),
        }
    }

    async fn test_connection(&self, tenant: Option<&TenantContext>) -> Result<Value> {
        match self
            .api
            .query_entities(EntityKind::Company, &[QueryFilter::eq("id", 0)], tenant)
            .await
        {
            Ok(_) => Ok(json!({"ok": true})),
            Err(e) => Ok(json!({"ok": false, "error": e.to_string()})),
        }
    }

    async fn search_companies(
        &self,
        args: &Value,
        tenant: Option<&TenantContext>,
    ) -> Result<Value> {
        let mut filter = Vec::new();
        if let Some(search) = args.get("search").and_then(Value::as_str) {
            filter.push(QueryFilter::contains("companyName", search));
        }
        let limit = arg_limit(args);

        let entities = self
            .api
            .query_entities(EntityKind::Company, &filter, tenant)
            .await?;
        let companies: Vec<Value> = entities
            .iter()
            .take(limit)
            .map(|e| {
                json!({
                    "id": e.id(),
                    "name": e.display_name(EntityKind::Company),
                })
            })
            .collect();

        Ok(json!({"count": companies.len(), "companies": companies}))
    }

    async fn get_company(&self, args: &Value, tenant: Option<&TenantContext>) -> Result<Value> {
        let id = arg_id(args)?;
        let entity = self.api.get_entity(EntityKind::Company, id, tenant).await?;
        Ok(json!({
            "id": entity.id(),
            "name": entity.display_name(EntityKind::Company),
            "fields": entity.fields,
        }))
    }

    async fn search_resources(
        &self,
        args: &Value,
        tenant: Option<&TenantContext>,
    ) -> Result<Value> {
        let mut filter = Vec::new();
        if let Some(search) = args.get("search").and_then(Value::as_str) {
            filter.push(QueryFilter::contains("lastName", search));
        }
        let limit = arg_limit(args);

        let entities = self
            .api
            .query_entities(EntityKind::Resource, &filter, tenant)
            .await?;
        let resources: Vec<Value> = entities
            .iter()
            .take(limit)
            .map(|e| {
                json!({
                    "id": e.id(),
                    "name": e.display_name(EntityKind::Resource),
                })
            })
            .collect();

        Ok(json!({"count": resources.len(), "resources": resources}))
    }

    async fn search_tickets(&self, args: &Value, tenant: Option<&TenantContext>) -> Result<Value> {
        let mut filter = Vec::new();
        if let Some(company_id) = args.get("company_id").and_then(Value::as_i64) {
            filter.push(QueryFilter::eq("companyID", company_id));
        }
        if let Some(search) = args.get("search").and_then(Value::as_str) {
            filter.push(QueryFilter::contains("title", search));
        }
        let limit = arg_limit(args);

        let entities = self
            .api
            .query_entities(EntityKind::Ticket, &filter, tenant)
            .await?;
        let tickets: Vec<&Entity> = entities.iter().take(limit).collect();

        let decorated = self.decorate_tickets(&tickets, tenant).await?;
        Ok(json!({"count": decorated.len(), "tickets": decorated}))
    }

    async fn get_ticket(&self, args: &Value, tenant: Option<&TenantContext>) -> Result<Value> {
        let id = arg_id(args)?;
        let entity = self.api.get_entity(EntityKind::Ticket, id, tenant).await?;
        let decorated = self.decorate_tickets(&[&entity], tenant).await?;
        decorated
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("ticket decoration produced no output"))
    }

    /// Enrich ticket JSON with company and resource names. Batched through
    /// the resolver so repeated ids cost one lookup, and name failures
    /// degrade to null fields rather than failing the tool call. Tickets
    /// without a linked company or assigned resource get null names
    /// directly; absent ids never reach the resolver.
    async fn decorate_tickets(
        &self,
        tickets: &[&Entity],
        tenant: Option<&TenantContext>,
    ) -> Result<Vec<Value>> {
        let resolver = self.resolver().await?;

        let company_ids: Vec<Option<i64>> =
            tickets.iter().map(|t| entity_ref(t, "companyID")).collect();
        let resource_ids: Vec<Option<i64>> = tickets
            .iter()
            .map(|t| entity_ref(t, "assignedResourceID"))
            .collect();

        let company_names =
            resolve_present(&resolver, CachedKind::Company, &company_ids, tenant).await;
        let resource_names =
            resolve_present(&resolver, CachedKind::Resource, &resource_ids, tenant).await;

        Ok(tickets
            .iter()
            .enumerate()
            .map(|(i, ticket)| {
                json!({
                    "id": ticket.id(),
                    "title": ticket.display_name(EntityKind::Ticket),
                    "company_id": company_ids[i],
                    "company_name": company_names[i].clone(),
                    "assigned_resource_id": resource_ids[i],
                    "assigned_resource_name": resource_names[i].clone(),
                    "fields": ticket.fields,
                })
            })
            .collect())
    }

    /// Direct batch resolution: the cache core exposed as a tool.
    async fn resolve_entity_names(
        &self,
        args: &Value,
        tenant: Option<&TenantContext>,
    ) -> Result<Value> {
        let kind = match args.get("kind").and_then(Value::as_str) {
            Some("company") => CachedKind::Company,
            Some("resource") => CachedKind::Resource,
            _ => return Err(Error::validation("missing enum argument: kind")),
        };
        let ids: Vec<i64> = args
            .get("ids")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        let resolver = self.resolver().await?;
        let names = resolver.resolve_names(kind, &ids, tenant).await;
        let entries: Vec<Value> = ids
            .iter()
            .zip(names)
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        Ok(json!({"count": entries.len(), "names": entries}))
    }

    async fn cache_stats(&self, tenant: Option<&TenantContext>) -> Result<Value> {
        let resolver = self.resolver().await?;
        let stats = resolver.stats(tenant).await;
        Ok(serde_json::to_value(stats)?)
    }

    async fn cache_preload(&self, tenant: Option<&TenantContext>) -> Result<Value> {
        let resolver = self.resolver().await?;
        resolver.preload(tenant).await;
        let stats = resolver.stats(tenant).await;
        Ok(json!({"ok": true, "stats": serde_json::to_value(stats)?}))
    }

    async fn cache_clear(&self, args: &Value, tenant: Option<&TenantContext>) -> Result<Value> {
        let resolver = self.resolver().await?;
        if args.get("all").and_then(Value::as_bool).unwrap_or(false) {
            let removed = resolver.clear_all().await;
            Ok(json!({"cleared_partitions": removed}))
        } else {
            let existed = resolver.clear(tenant).await;
            Ok(json!({"cleared": existed}))
        }
    }
}

/// Entity reference from a ticket field. Zero and absent both mean
/// "no linked entity" on the wire.
fn entity_ref(ticket: &Entity, field: &str) -> Option<i64> {
    ticket
        .fields
        .get(field)
        .and_then(Value::as_i64)
        .filter(|id| *id > 0)
}

/// Resolve the ids that are present, keeping positions aligned with the
/// input. Absent ids yield `None` without touching the resolver.
async fn resolve_present(
    resolver: &NameResolver,
    kind: CachedKind,
    ids: &[Option<i64>],
    tenant: Option<&TenantContext>,
) -> Vec<Option<String>> {
    let present: Vec<i64> = ids.iter().copied().flatten().collect();
    let mut names = resolver
        .resolve_names(kind, &present, tenant)
        .await
        .into_iter();
    ids.iter()
        .map(|id| id.and_then(|_| names.next().flatten()))
        .collect()
}

/// Pull the optional typed tenant context out of the argument object.
fn extract_tenant(args: &mut Value) -> Result<Option<TenantContext>> {
    let Some(map) = args.as_object_mut() else {
        return Ok(None);
    };
    match map.remove("tenant") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => {
            let ctx: TenantContext = serde_json::from_value(raw)
                .map_err(|e| Error::validation(format!("invalid tenant credentials: {}", e)))?;
            Ok(Some(ctx))
        }
    }
}

fn arg_id(args: &Value) -> Result<i64> {
    args.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::validation("missing integer argument: id"))
}

fn arg_limit(args: &Value) -> usize {
    args.get("limit")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(25)
}

/// Shared `tenant` parameter carried by every tool.
fn tenant_param() -> ParamDef {
    ParamDef::optional(
        "tenant",
        ParamType::Object,
        "Per-request tenant credentials: username, integration_code, secret",
    )
}

fn limit_param() -> ParamDef {
    ParamDef::optional("limit", ParamType::Int, "Maximum results to return")
        .with_default(json!(25))
}

/// Build the catalog of built-in tools.
pub fn builtin_catalog() -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog::new();

    catalog.register(ToolEntry {
        name: "test_connection".to_string(),
        description: "Verify connectivity and credentials against the PSA API".to_string(),
        parameters: vec![tenant_param()],
    })?;

    catalog.register(ToolEntry {
        name: "search_companies".to_string(),
        description: "Search companies by name substring".to_string(),
        parameters: vec![
            ParamDef::optional("search", ParamType::String, "Name substring to match"),
            limit_param(),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "get_company".to_string(),
        description: "Fetch one company by id".to_string(),
        parameters: vec![
            ParamDef::required("id", ParamType::Int, "Company id"),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "search_resources".to_string(),
        description: "Search resources (technicians) by last name".to_string(),
        parameters: vec![
            ParamDef::optional("search", ParamType::String, "Last-name substring to match"),
            limit_param(),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "search_tickets".to_string(),
        description: "Search tickets, with company and resource names resolved".to_string(),
        parameters: vec![
            ParamDef::optional("company_id", ParamType::Int, "Restrict to one company"),
            ParamDef::optional("search", ParamType::String, "Title substring to match"),
            limit_param(),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "get_ticket".to_string(),
        description: "Fetch one ticket by id, with names resolved".to_string(),
        parameters: vec![
            ParamDef::required("id", ParamType::Int, "Ticket id"),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "resolve_names".to_string(),
        description: "Resolve company or resource ids to display names".to_string(),
        parameters: vec![
            ParamDef::required(
                "kind",
                ParamType::Enum(vec!["company".to_string(), "resource".to_string()]),
                "Entity kind to resolve",
            ),
            ParamDef::required("ids", ParamType::IntList, "Entity ids to resolve"),
            tenant_param(),
        ],
    })?;

    catalog.register(ToolEntry {
        name: "cache_stats".to_string(),
        description: "Inspect the name cache for one tenant".to_string(),
        parameters: vec![tenant_param()],
    })?;

    catalog.register(ToolEntry {
        name: "cache_preload".to_string(),
        description: "Warm the name cache for one tenant".to_string(),
        parameters: vec![tenant_param()],
    })?;

    catalog.register(ToolEntry {
        name: "cache_clear".to_string(),
        description: "Clear cached names for one tenant, or all tenants".to_string(),
        parameters: vec![
            ParamDef::optional("all", ParamType::Bool, "Clear every tenant partition"),
            tenant_param(),
        ],
    })?;

    Ok(catalog)
}
