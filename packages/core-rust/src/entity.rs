//! Entity model: opaque keys, keyed JSON payloads, and per-entity errors.
//!
//! Entities are the unit of storage inside a container. The engine never
//! interprets an [`EntityKey`] beyond equality and ordering; payloads are
//! JSON documents carried as [`serde_json::Value`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// Opaque, comparable entity key.
///
/// Keys are compared and ordered as strings. Numeric keys taken from a
/// payload field are canonicalized to their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Wrap a string as an entity key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A keyed JSON document.
///
/// On the wire the key may be absent for write tasks; the server derives it
/// from the database's configured key field. Results and stored entities
/// always carry a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<EntityKey>,
    pub value: Value,
}

impl Entity {
    /// An entity with an explicit key.
    pub fn new(key: impl Into<EntityKey>, value: Value) -> Self {
        Self {
            key: Some(key.into()),
            value,
        }
    }

    /// An entity whose key must be derived from its payload.
    #[must_use]
    pub fn unkeyed(value: Value) -> Self {
        Self { key: None, value }
    }
}

/// Read an entity key from the named payload field.
///
/// Accepts string and integer scalars; integers canonicalize to their
/// decimal string form. Any other shape (or an absent field) yields `None`.
#[must_use]
pub fn key_from_payload(payload: &Value, key_name: &str) -> Option<EntityKey> {
    match payload.get(key_name)? {
        Value::String(s) => Some(EntityKey::new(s.clone())),
        Value::Number(n) => {
            if n.is_f64() {
                None
            } else {
                Some(EntityKey::new(n.to_string()))
            }
        }
        _ => None,
    }
}

/// Write the entity key into the named payload field.
///
/// Part of the canonical formatting pass: after key derivation the key
/// field and the entity key always agree. Non-object payloads are left
/// untouched (they are rejected by validation anyway).
pub fn inject_key(payload: &mut Value, key_name: &str, key: &EntityKey) {
    if let Value::Object(map) = payload {
        map.insert(key_name.to_string(), Value::String(key.as_str().to_string()));
    }
}

// ---------------------------------------------------------------------------
// EntityError
// ---------------------------------------------------------------------------

/// Classification of a per-entity failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityErrorKind {
    ParseError,
    ReadError,
    WriteError,
    DeleteError,
    ValidationError,
}

/// A failure scoped to a single entity within a task.
///
/// Entity errors are attached to the owning result's error list without
/// failing sibling entities of the same task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityError {
    pub container: String,
    /// Key of the failing entity, when one could be determined.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<EntityKey>,
    #[serde(rename = "type")]
    pub kind: EntityErrorKind,
    pub message: String,
}

impl EntityError {
    /// Build an entity error for a known key.
    pub fn new(
        container: impl Into<String>,
        key: EntityKey,
        kind: EntityErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            key: Some(key),
            kind,
            message: message.into(),
        }
    }

    /// Build an entity error for an entity whose key is unknown.
    pub fn unkeyed(
        container: impl Into<String>,
        kind: EntityErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            key: None,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{:?} [{}] '{key}': {}", self.kind, self.container, self.message),
            None => write!(f, "{:?} [{}]: {}", self.kind, self.container, self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
