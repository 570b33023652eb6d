//! Wire types for the backing PSA API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Entity collections the bridge talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Resource,
    Ticket,
}

impl EntityKind {
    /// REST collection path segment.
    pub fn path(&self) -> &'static str {
        match self {
            EntityKind::Company => "Companies",
            EntityKind::Resource => "Resources",
            EntityKind::Ticket => "Tickets",
        }
    }

    /// Lowercase label for logs and tool output.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Resource => "resource",
            EntityKind::Ticket => "ticket",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-request tenant credentials.
///
/// Identity for cache partitioning is `(username, integration_code)`; the
/// secret authenticates but never participates in partitioning and is
/// redacted from debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub username: String,
    pub integration_code: String,
    pub secret: String,
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("username", &self.username)
            .field("integration_code", &self.integration_code)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Comparison operators accepted by the query endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    Eq,
    Contains,
    BeginsWith,
}

/// One clause of a query filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }
}

/// Body of a `POST {collection}/query` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub filter: Vec<QueryFilter>,
    pub max_records: usize,
}

/// Response envelope for query calls.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub items: Vec<Entity>,
}

/// Response envelope for single-entity GETs.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    pub item: Entity,
}

/// A backing-API entity: raw JSON plus typed accessors for the handful of
/// fields the bridge reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    pub fields: Value,
}

impl Entity {
    pub fn new(fields: Value) -> Self {
        Self { fields }
    }

    /// Numeric entity id, if present.
    pub fn id(&self) -> Option<i64> {
        self.fields.get("id").and_then(Value::as_i64)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Usable display name for an entity of the given kind, if any.
    ///
    /// Companies carry `companyName`; resources are shown as
    /// "first last" with `userName` as the fallback; tickets use `title`.
    pub fn display_name(&self, kind: EntityKind) -> Option<String> {
        match kind {
            EntityKind::Company => self.str_field("companyName").map(str::to_string),
            EntityKind::Resource => {
                let first = self.str_field("firstName");
                let last = self.str_field("lastName");
                match (first, last) {
                    (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
                    (Some(f), None) => Some(f.to_string()),
                    (None, Some(l)) => Some(l.to_string()),
                    (None, None) => self.str_field("userName").map(str::to_string),
                }
            }
            EntityKind::Ticket => self.str_field("title").map(str::to_string),
        }
    }
}
