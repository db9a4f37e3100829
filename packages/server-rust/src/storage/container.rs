//! Container capability: the per-collection storage contract.
//!
//! A container exposes the seven entity operations the CRUD/aggregate
//! pipeline drives. Implementations are shared as `Arc<dyn Container>`.
//! Per-entity business failures (key conflict, missing patch target) are
//! reported as entity errors; only backend faults fail the whole call.

use async_trait::async_trait;

use synchub_core::tasks::query::QueryEntities;
use synchub_core::{Entity, EntityError, EntityKey, TaskError, TaskKind};

use crate::service::context::ExecutionContext;

/// Result of a query capability call.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    pub entities: Vec<Entity>,
    /// Token to continue a paged iteration, when more entities remain.
    pub cursor: Option<String>,
}

/// A named collection of entities.
///
/// All methods are async; whether a specific operation actually suspends is
/// declared through [`Container::supports_sync`], which the executor's
/// classification queries before any task runs. `supports_sync` must be
/// side-effect free.
#[async_trait]
pub trait Container: Send + Sync + 'static {
    /// The container's name within its database.
    fn name(&self) -> &str;

    /// Whether the given operation completes without suspending here.
    fn supports_sync(&self, op: TaskKind) -> bool {
        let _ = op;
        false
    }

    /// Insert entities that do not exist yet. A key conflict is a
    /// per-entity error; the remaining entities are still written.
    async fn create_entities(
        &self,
        entities: Vec<Entity>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError>;

    /// Insert or replace entities.
    async fn upsert_entities(
        &self,
        entities: Vec<Entity>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError>;

    /// Read entities by key. Missing keys are absent from the result and
    /// are not errors.
    async fn read_entities(
        &self,
        ids: &[EntityKey],
        ctx: &ExecutionContext,
    ) -> Result<Vec<Entity>, TaskError>;

    /// Query entities, honoring filter, order-by-key, limit, and
    /// cursor-paged iteration (resumption state lives in the execution
    /// context's cursor registry, keyed by token).
    async fn query_entities(
        &self,
        task: &QueryEntities,
        ctx: &ExecutionContext,
    ) -> Result<QueryOutcome, TaskError>;

    /// Count entities matching an optional filter.
    async fn count_entities(
        &self,
        filter: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Result<f64, TaskError>;

    /// Apply merge patches to stored entities. A missing target is a
    /// per-entity error.
    async fn merge_entities(
        &self,
        patches: Vec<Entity>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError>;

    /// Delete entities by key, or everything with `all`. Missing keys are
    /// ignored.
    async fn delete_entities(
        &self,
        ids: &[EntityKey],
        all: bool,
        ctx: &ExecutionContext,
    ) -> Result<Vec<EntityError>, TaskError>;
}
