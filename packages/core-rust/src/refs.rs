//! Reference descriptors: foreign-key style expansion of entity fields.
//!
//! A [`ReferenceDescriptor`] names a payload field whose value keys entities
//! in another container; descriptors nest, forming an explicit tree.
//! [`ReferencesResult`] mirrors that tree so callers can correlate multiple
//! reference paths resolved from the same source set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{Entity, EntityError, EntityKey};

// ---------------------------------------------------------------------------
// ReferenceDescriptor
// ---------------------------------------------------------------------------

/// Describes how to expand one payload field into a fetch of another
/// container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDescriptor {
    /// Dot-path into the source payload, e.g. `"author"` or `".author.id"`.
    pub selector: String,
    /// Target container holding the referenced entities.
    pub container: String,
    /// Nested expansions resolved against the entities this descriptor fetches.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferenceDescriptor>,
}

impl ReferenceDescriptor {
    /// A leaf descriptor without nested expansions.
    pub fn new(selector: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            container: container.into(),
            references: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReferencesResult
// ---------------------------------------------------------------------------

/// Resolved output for one descriptor, mirroring the descriptor tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencesResult {
    pub container: String,
    /// Keys extracted from the source entities, deduplicated, source order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ids: Vec<EntityKey>,
    /// Referenced entities found in the target container.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entities: Vec<Entity>,
    /// Descriptor-scoped errors; missing references do not abort siblings.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<EntityError>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub references: Vec<ReferencesResult>,
}

// ---------------------------------------------------------------------------
// Selector extraction
// ---------------------------------------------------------------------------

/// Extract referenced keys from `payload` at the selector path.
///
/// A scalar (string or integer) yields one key, an array of scalars yields
/// one key per element, an absent field or `null` yields none. Any other
/// shape is a selector mismatch reported as `Err` with a description.
///
/// # Errors
///
/// Returns the human-readable mismatch description when the selected value
/// cannot be interpreted as entity keys.
pub fn select_keys(payload: &Value, selector: &str) -> Result<Vec<EntityKey>, String> {
    let mut current = payload;
    for segment in selector.trim_start_matches('.').split('.') {
        if segment.is_empty() {
            return Err(format!("invalid selector: '{selector}'"));
        }
        match current.get(segment) {
            Some(next) => current = next,
            None => return Ok(Vec::new()),
        }
    }
    match current {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![EntityKey::new(s.clone())]),
        Value::Number(n) if !n.is_f64() => Ok(vec![EntityKey::new(n.to_string())]),
        Value::Array(items) => {
            let mut keys = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => keys.push(EntityKey::new(s.clone())),
                    Value::Number(n) if !n.is_f64() => keys.push(EntityKey::new(n.to_string())),
                    other => {
                        return Err(format!(
                            "selector '{selector}' matched a non-key array element: {other}"
                        ))
                    }
                }
            }
            Ok(keys)
        }
        other => Err(format!("selector '{selector}' matched a non-key value: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
