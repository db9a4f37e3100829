//! Write-path task payloads: create, upsert, merge, delete.
//!
//! Task and result structs live side by side per domain. All structs use
//! camelCase field names for wire compatibility.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityError, EntityKey};

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Create new entities in a container. Fails per entity if a key already
/// exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntities {
    pub container: String,
    pub entities: Vec<Entity>,
}

/// Create or replace entities in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEntities {
    pub container: String,
    pub entities: Vec<Entity>,
}

/// Patch existing entities. Each entity value is an RFC 7386 style merge
/// patch applied to the stored payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeEntities {
    pub container: String,
    pub entities: Vec<Entity>,
}

/// Delete entities by key, or the whole container with `all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntities {
    pub container: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ids: Vec<EntityKey>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub all: Option<bool>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of a `create` task. Per-entity failures are listed in `errors`;
/// they do not fail the task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
}

/// Result of an `upsert` task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
}

/// Result of a `merge` task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
}

/// Result of a `delete` task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntitiesResult {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
}
