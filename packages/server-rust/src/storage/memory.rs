//! In-memory [`Container`] implementation backed by an ordered map.
//!
//! Entities live in a `BTreeMap` so key order is deterministic, which makes
//! order-by-key and cursor resumption stable without extra sorting. All
//! operations complete without suspending; the container reports every
//! operation as sync-capable.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use synchub_core::tasks::query::{QueryEntities, SortOrder};
use synchub_core::{Entity, EntityError, EntityErrorKind, EntityKey, TaskError, TaskErrorKind, TaskKind};

use crate::service::context::ExecutionContext;
use crate::storage::container::{Container, QueryOutcome};
use crate::storage::filter::{CompiledFilter, FilterEngine};

use crate::cursors::CursorState;

/// Ordered in-memory container.
pub struct MemoryContainer {
    name: String,
    entries: RwLock<std::collections::BTreeMap<String, Value>>,
    filter_engine: Option<Arc<dyn FilterEngine>>,
}

impl MemoryContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(std::collections::BTreeMap::new()),
            filter_engine: None,
        }
    }

    /// Attach the external filter compiler.
    #[must_use]
    pub fn with_filter_engine(mut self, engine: Arc<dyn FilterEngine>) -> Self {
        self.filter_engine = Some(engine);
        self
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the container holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn compile_filter(&self, filter: Option<&str>) -> Result<Option<CompiledFilter>, TaskError> {
        match filter {
            None => Ok(None),
            Some(expr) => match &self.filter_engine {
                Some(engine) => engine
                    .compile(expr)
                    .map(Some)
                    .map_err(|message| TaskError::new(TaskErrorKind::FilterError, message)),
                None => Err(TaskError::new(
                    TaskErrorKind::FilterError,
                    format!("container '{}' has no filter engine", self.name),
                )),
            },
        }
    }

    /// Snapshot of matching entities in ascending key order.
    fn matching(&self, filter: Option<&CompiledFilter>) -> Vec<(String, Value)> {
        self.entries
            .read()
            .iter()
            .filter(|(_, value)| filter.map_or(true, |f| f(value)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn unkeyed_error(&self) -> EntityError {
        EntityError::unkeyed(
            self.name.clone(),
            EntityErrorKind::WriteError,
            "entity key missing",
        )
    }
}

/// Apply an RFC 7386 style merge patch: objects merge recursively, `null`
/// removes a member, anything else replaces the target.
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(members) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(existing) = target {
                for (name, value) in members {
                    if value.is_null() {
                        existing.remove(name);
                    } else {
                        merge_patch(existing.entry(name.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl Container for MemoryContainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_sync(&self, _op: TaskKind) -> bool {
        true
    }

    async fn create_entities(
        &self,
        entities: Vec<Entity>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError> {
        let mut errors = Vec::new();
        let mut store = self.entries.write();
        for entity in entities {
            let Some(key) = entity.key else {
                errors.push(self.unkeyed_error());
                continue;
            };
            if store.contains_key(key.as_str()) {
                errors.push(EntityError::new(
                    self.name.clone(),
                    key.clone(),
                    EntityErrorKind::WriteError,
                    format!("entity '{key}' already exists"),
                ));
                continue;
            }
            store.insert(key.as_str().to_string(), entity.value);
        }
        Ok(errors)
    }

    async fn upsert_entities(
        &self,
        entities: Vec<Entity>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError> {
        let mut errors = Vec::new();
        let mut store = self.entries.write();
        for entity in entities {
            let Some(key) = entity.key else {
                errors.push(self.unkeyed_error());
                continue;
            };
            store.insert(key.as_str().to_string(), entity.value);
        }
        Ok(errors)
    }

    async fn read_entities(
        &self,
        ids: &[EntityKey],
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Entity>, TaskError> {
        let store = self.entries.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                store
                    .get(id.as_str())
                    .map(|value| Entity::new(id.clone(), value.clone()))
            })
            .collect())
    }

    #[allow(clippy::too_many_lines)]
    async fn query_entities(
        &self,
        task: &QueryEntities,
        ctx: &ExecutionContext,
    ) -> Result<QueryOutcome, TaskError> {
        let filter = self.compile_filter(task.filter.as_deref())?;
        let mut items = self.matching(filter.as_ref());

        // Resume state decides the iteration order of a continued cursor;
        // a fresh query takes it from the task.
        let resumed = match &task.cursor {
            Some(token) => {
                let state = ctx
                    .cursors
                    .resume(&self.name, token, &ctx.user)
                    .ok_or_else(|| {
                        TaskError::new(
                            TaskErrorKind::InvalidTask,
                            format!("cursor '{token}' not found"),
                        )
                    })?;
                Some(state)
            }
            None => None,
        };
        let descending = resumed.as_ref().map_or(
            matches!(task.order_by_key, Some(SortOrder::Desc)),
            |state| state.descending,
        );
        if descending {
            items.reverse();
        }
        if let Some(limit) = task.limit {
            items.truncate(limit as usize);
        }

        let Some(max_count) = task.max_count else {
            let entities = items
                .into_iter()
                .map(|(key, value)| Entity::new(key, value))
                .collect();
            return Ok(QueryOutcome {
                entities,
                cursor: None,
            });
        };
        let page_size = (max_count as usize).max(1);

        // Skip everything at or before the resume key in iteration order.
        let start = match resumed.as_ref().and_then(|s| s.after_key.as_deref()) {
            None => 0,
            Some(after) => {
                if descending {
                    items.partition_point(|(key, _)| key.as_str() >= after)
                } else {
                    items.partition_point(|(key, _)| key.as_str() <= after)
                }
            }
        };
        let total = items.len();
        let page: Vec<(String, Value)> =
            items.into_iter().skip(start).take(page_size).collect();
        let exhausted = start + page.len() >= total;

        let cursor = if exhausted {
            if let Some(token) = &task.cursor {
                ctx.cursors.remove(&self.name, token, &ctx.user);
            }
            None
        } else {
            let state = CursorState {
                after_key: page.last().map(|(key, _)| key.clone()),
                descending,
            };
            match &task.cursor {
                Some(token) => {
                    ctx.cursors.update(&self.name, token, &ctx.user, state);
                    Some(token.clone())
                }
                None => Some(ctx.cursors.open(&self.name, &ctx.user, state)),
            }
        };

        Ok(QueryOutcome {
            entities: page
                .into_iter()
                .map(|(key, value)| Entity::new(key, value))
                .collect(),
            cursor,
        })
    }

    async fn count_entities(
        &self,
        filter: Option<&str>,
        _ctx: &ExecutionContext,
    ) -> Result<f64, TaskError> {
        let filter = self.compile_filter(filter)?;
        let count = match filter {
            None => self.entries.read().len(),
            Some(f) => self.entries.read().values().filter(|v| f(v)).count(),
        };
        // Entity counts fit f64 exactly far beyond practical store sizes.
        #[allow(clippy::cast_precision_loss)]
        let value = count as f64;
        Ok(value)
    }

    async fn merge_entities(
        &self,
        patches: Vec<Entity>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError> {
        let mut errors = Vec::new();
        let mut store = self.entries.write();
        for patch in patches {
            let Some(key) = patch.key else {
                errors.push(self.unkeyed_error());
                continue;
            };
            match store.get_mut(key.as_str()) {
                Some(target) => merge_patch(target, &patch.value),
                None => errors.push(EntityError::new(
                    self.name.clone(),
                    key.clone(),
                    EntityErrorKind::WriteError,
                    format!("patch target '{key}' not found"),
                )),
            }
        }
        Ok(errors)
    }

    async fn delete_entities(
        &self,
        ids: &[EntityKey],
        all: bool,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError> {
        let mut store = self.entries.write();
        if all {
            store.clear();
            return Ok(Vec::new());
        }
        for id in ids {
            // Deleting a missing entity is idempotent, not an error.
            store.remove(id.as_str());
        }
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
