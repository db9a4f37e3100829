//! Entity validation and key derivation for write tasks.
//!
//! Validation problems are entity-scoped and non-fatal: an invalid entity
//! is recorded and EXCLUDED from the write while its valid siblings
//! proceed. The task-level result is never failed by entity validation.

use synchub_core::entity::{inject_key, key_from_payload};
use synchub_core::{Entity, EntityError, EntityErrorKind, EntityKey};

use crate::database::Database;

/// Outcome of preparing a write batch: the entities that may be written and
/// the errors for those that may not.
#[derive(Debug, Default)]
pub struct PreparedEntities {
    pub entities: Vec<Entity>,
    pub errors: Vec<EntityError>,
}

/// Derive keys, validate, and (when configured) canonically format a write
/// batch.
///
/// Per entity, in order: the payload must be a JSON object; a key must be
/// present on the wire or derivable from the database's configured key
/// field; the schema validator (when configured) must accept the payload.
/// With `format_entities` the key field is injected back into the payload
/// so the stored document and its key always agree.
#[must_use]
pub fn prepare_entities(
    database: &Database,
    container: &str,
    entities: Vec<Entity>,
) -> PreparedEntities {
    let key_name = &database.config().key_name;
    let format = database.config().format_entities;
    let mut prepared = PreparedEntities::default();

    for entity in entities {
        if !entity.value.is_object() {
            prepared.errors.push(match entity.key {
                Some(key) => EntityError::new(
                    container,
                    key,
                    EntityErrorKind::ValidationError,
                    "payload is not a JSON object",
                ),
                None => EntityError::unkeyed(
                    container,
                    EntityErrorKind::ValidationError,
                    "payload is not a JSON object",
                ),
            });
            continue;
        }

        let key: Option<EntityKey> = entity
            .key
            .clone()
            .or_else(|| key_from_payload(&entity.value, key_name));
        let Some(key) = key else {
            prepared.errors.push(EntityError::unkeyed(
                container,
                EntityErrorKind::ValidationError,
                format!("entity key missing and payload has no '{key_name}' field"),
            ));
            continue;
        };

        if let Some(schema) = database.schema() {
            if let Err(violation) = schema.validate(container, &key, &entity.value) {
                prepared.errors.push(EntityError::new(
                    container,
                    key,
                    EntityErrorKind::ValidationError,
                    violation,
                ));
                continue;
            }
        }

        let mut value = entity.value;
        if format {
            inject_key(&mut value, key_name, &key);
        }
        prepared.entities.push(Entity {
            key: Some(key),
            value,
        });
    }
    prepared
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
