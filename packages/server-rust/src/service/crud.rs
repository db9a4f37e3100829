//! The shared CRUD/aggregate execution pipeline.
//!
//! Every container-directed task walks the same steps: field pre-check,
//! container resolution, customization hooks, key derivation, per-entity
//! validation (invalid entities are excluded, not fatal), the optional
//! canonical formatting pass, a no-op short-circuit when nothing effective
//! remains, the container call, error merging, and reference expansion for
//! the read paths.

use std::sync::Arc;

use synchub_core::tasks::crud::{
    CreateEntities, CreateEntitiesResult, DeleteEntities, DeleteEntitiesResult, MergeEntities,
    MergeEntitiesResult, UpsertEntities, UpsertEntitiesResult,
};
use synchub_core::tasks::query::{
    AggregateEntities, AggregateResult, AggregateType, QueryEntities, QueryEntitiesResult,
    ReadEntities, ReadEntitiesResult,
};
use synchub_core::{TaskError, TaskResult};

use crate::database::Database;
use crate::service::context::ExecutionContext;
use crate::service::refs::resolve_references;
use crate::storage::container::Container;
use crate::validate::prepare_entities;

/// Resolve the target container, or the error result for the failed step.
fn resolve(database: &Database, container: &str) -> Result<Arc<dyn Container>, TaskResult> {
    if container.is_empty() {
        return Err(TaskResult::Error(TaskError::missing_field("container")));
    }
    database.get_or_create_container(container).ok_or_else(|| {
        TaskResult::Error(TaskError::database(format!(
            "container not found: '{container}'"
        )))
    })
}

pub(crate) async fn execute_create(
    database: &Database,
    ctx: &ExecutionContext,
    mut task: CreateEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    if let Err(err) = database.service().customize_create(&mut task, ctx).await {
        return TaskResult::Error(err);
    }

    let prepared = prepare_entities(database, &task.container, task.entities);
    let mut errors = prepared.errors;
    if prepared.entities.is_empty() {
        // Nothing effective left: skip the container call entirely.
        return TaskResult::Create(CreateEntitiesResult { errors });
    }
    match container.create_entities(prepared.entities, ctx).await {
        Ok(write_errors) => {
            errors.extend(write_errors);
            TaskResult::Create(CreateEntitiesResult { errors })
        }
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_upsert(
    database: &Database,
    ctx: &ExecutionContext,
    mut task: UpsertEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    if let Err(err) = database.service().customize_upsert(&mut task, ctx).await {
        return TaskResult::Error(err);
    }

    let prepared = prepare_entities(database, &task.container, task.entities);
    let mut errors = prepared.errors;
    if prepared.entities.is_empty() {
        return TaskResult::Upsert(UpsertEntitiesResult { errors });
    }
    match container.upsert_entities(prepared.entities, ctx).await {
        Ok(write_errors) => {
            errors.extend(write_errors);
            TaskResult::Upsert(UpsertEntitiesResult { errors })
        }
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_merge(
    database: &Database,
    ctx: &ExecutionContext,
    mut task: MergeEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    if let Err(err) = database.service().customize_merge(&mut task, ctx).await {
        return TaskResult::Error(err);
    }

    let prepared = prepare_entities(database, &task.container, task.entities);
    let mut errors = prepared.errors;
    if prepared.entities.is_empty() {
        return TaskResult::Merge(MergeEntitiesResult { errors });
    }
    match container.merge_entities(prepared.entities, ctx).await {
        Ok(write_errors) => {
            errors.extend(write_errors);
            TaskResult::Merge(MergeEntitiesResult { errors })
        }
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_delete(
    database: &Database,
    ctx: &ExecutionContext,
    mut task: DeleteEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    if let Err(err) = database.service().customize_delete(&mut task, ctx).await {
        return TaskResult::Error(err);
    }

    let all = task.all.unwrap_or(false);
    if !all && task.ids.is_empty() {
        return TaskResult::Delete(DeleteEntitiesResult::default());
    }
    match container.delete_entities(&task.ids, all, ctx).await {
        Ok(errors) => TaskResult::Delete(DeleteEntitiesResult { errors }),
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_read(
    database: &Database,
    ctx: &ExecutionContext,
    task: ReadEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    if task.ids.is_empty() {
        return TaskResult::Read(ReadEntitiesResult::default());
    }
    match container.read_entities(&task.ids, ctx).await {
        Ok(entities) => {
            let references = if task.references.is_empty() {
                Vec::new()
            } else {
                resolve_references(database, ctx, &entities, &task.references).await
            };
            TaskResult::Read(ReadEntitiesResult {
                entities,
                errors: Vec::new(),
                references,
            })
        }
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_query(
    database: &Database,
    ctx: &ExecutionContext,
    task: QueryEntities,
) -> TaskResult {
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    match container.query_entities(&task, ctx).await {
        Ok(outcome) => {
            let references = if task.references.is_empty() {
                Vec::new()
            } else {
                resolve_references(database, ctx, &outcome.entities, &task.references).await
            };
            TaskResult::Query(QueryEntitiesResult {
                entities: outcome.entities,
                cursor: outcome.cursor,
                errors: Vec::new(),
                references,
            })
        }
        Err(err) => TaskResult::Error(err),
    }
}

pub(crate) async fn execute_aggregate(
    database: &Database,
    ctx: &ExecutionContext,
    task: AggregateEntities,
) -> TaskResult {
    if !matches!(task.aggregate, AggregateType::Count) {
        // Never silently return zero for an unsupported aggregation.
        return TaskResult::Error(TaskError::not_implemented(format!(
            "aggregate type '{}' not implemented",
            aggregate_name(task.aggregate)
        )));
    }
    let container = match resolve(database, &task.container) {
        Ok(container) => container,
        Err(result) => return result,
    };
    match container.count_entities(task.filter.as_deref(), ctx).await {
        Ok(value) => TaskResult::Aggregate(AggregateResult { value }),
        Err(err) => TaskResult::Error(err),
    }
}

fn aggregate_name(aggregate: AggregateType) -> &'static str {
    match aggregate {
        AggregateType::Count => "count",
        AggregateType::Min => "min",
        AggregateType::Max => "max",
        AggregateType::Sum => "sum",
        AggregateType::Avg => "avg",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
