//! Read-path task payloads: read, query, aggregate, and cursor teardown.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityError, EntityKey};
use crate::refs::{ReferenceDescriptor, ReferencesResult};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Sort direction for order-by-key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Aggregation kind. Only `count` is executable; the remaining kinds are
/// accepted on the wire and fail with `notImplemented`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Read entities by key, optionally expanding references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEntities {
    pub container: String,
    pub ids: Vec<EntityKey>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferenceDescriptor>,
}

/// Query entities with an opaque filter expression.
///
/// `max_count` together with `cursor` selects cursor-paged mode; resumption
/// state is owned by the server's cursor registry, keyed by token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEntities {
    pub container: String,
    /// Filter expression, compiled by an external filter engine.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_by_key: Option<SortOrder>,
    /// Truncate the result set after this many entities.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u32>,
    /// Page size for cursor-paged iteration.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_count: Option<u32>,
    /// Cursor token continuing a previous paged query.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferenceDescriptor>,
}

/// Aggregate entities matching an optional filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateEntities {
    pub container: String,
    #[serde(rename = "type")]
    pub aggregate: AggregateType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<String>,
}

/// Close cursors owned by the caller. An absent token list closes every
/// cursor the caller owns in the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseCursors {
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursors: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of a `read` task. Missing ids are simply absent from `entities`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferencesResult>,
}

/// Result of a `query` task. `cursor` is present while a paged iteration
/// can be continued.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entities: Vec<Entity>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferencesResult>,
}

/// Result of an `aggregate` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub value: f64,
}

/// Result of a `closeCursors` task: how many cursors were closed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseCursorsResult {
    pub count: u32,
}
