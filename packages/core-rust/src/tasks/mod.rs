//! Task and result protocol for batch synchronization.
//!
//! A client submits one [`SyncRequest`] carrying an ordered batch of
//! [`SyncTask`]s and receives one [`SyncResponse`] carrying exactly one
//! [`TaskResult`] per task, in submission order. Both enums are
//! internally tagged with the stable `task` discriminator strings; the
//! result side adds the `error` tag.

pub mod crud;
pub mod keys;
pub mod messaging;
pub mod query;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

pub use crud::{
    CreateEntities, CreateEntitiesResult, DeleteEntities, DeleteEntitiesResult, MergeEntities,
    MergeEntitiesResult, UpsertEntities, UpsertEntitiesResult,
};
pub use keys::{ReserveKeys, ReserveKeysResult};
pub use messaging::{
    ChangeType, SendCommandResult, SendMessage, SendMessageResult, SubscribeChanges,
    SubscribeChangesResult, SubscribeMessage, SubscribeMessageResult,
};
pub use query::{
    AggregateEntities, AggregateResult, AggregateType, CloseCursors, CloseCursorsResult,
    QueryEntities, QueryEntitiesResult, ReadEntities, ReadEntitiesResult, SortOrder,
};

// ---------------------------------------------------------------------------
// TaskKind
// ---------------------------------------------------------------------------

/// Variant discriminant used for capability queries and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Create,
    Upsert,
    Read,
    Query,
    Aggregate,
    Merge,
    Delete,
    Message,
    Command,
    CloseCursors,
    SubscribeChanges,
    SubscribeMessage,
    ReserveKeys,
}

// ---------------------------------------------------------------------------
// SyncTask
// ---------------------------------------------------------------------------

/// One requested operation within a submitted batch.
///
/// A task references its target container by name only; it never owns the
/// container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task")]
pub enum SyncTask {
    #[serde(rename = "create")]
    Create(CreateEntities),
    #[serde(rename = "upsert")]
    Upsert(UpsertEntities),
    #[serde(rename = "read")]
    Read(ReadEntities),
    #[serde(rename = "query")]
    Query(QueryEntities),
    #[serde(rename = "aggregate")]
    Aggregate(AggregateEntities),
    #[serde(rename = "merge")]
    Merge(MergeEntities),
    #[serde(rename = "delete")]
    Delete(DeleteEntities),
    #[serde(rename = "msg")]
    Message(SendMessage),
    #[serde(rename = "cmd")]
    Command(SendMessage),
    #[serde(rename = "closeCursors")]
    CloseCursors(CloseCursors),
    #[serde(rename = "subscribeChanges")]
    SubscribeChanges(SubscribeChanges),
    #[serde(rename = "subscribeMessage")]
    SubscribeMessage(SubscribeMessage),
    #[serde(rename = "reserveKeys")]
    ReserveKeys(ReserveKeys),
}

impl SyncTask {
    /// The variant discriminant.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Create(_) => TaskKind::Create,
            Self::Upsert(_) => TaskKind::Upsert,
            Self::Read(_) => TaskKind::Read,
            Self::Query(_) => TaskKind::Query,
            Self::Aggregate(_) => TaskKind::Aggregate,
            Self::Merge(_) => TaskKind::Merge,
            Self::Delete(_) => TaskKind::Delete,
            Self::Message(_) => TaskKind::Message,
            Self::Command(_) => TaskKind::Command,
            Self::CloseCursors(_) => TaskKind::CloseCursors,
            Self::SubscribeChanges(_) => TaskKind::SubscribeChanges,
            Self::SubscribeMessage(_) => TaskKind::SubscribeMessage,
            Self::ReserveKeys(_) => TaskKind::ReserveKeys,
        }
    }

    /// The stable wire discriminator of this variant.
    #[must_use]
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Upsert(_) => "upsert",
            Self::Read(_) => "read",
            Self::Query(_) => "query",
            Self::Aggregate(_) => "aggregate",
            Self::Merge(_) => "merge",
            Self::Delete(_) => "delete",
            Self::Message(_) => "msg",
            Self::Command(_) => "cmd",
            Self::CloseCursors(_) => "closeCursors",
            Self::SubscribeChanges(_) => "subscribeChanges",
            Self::SubscribeMessage(_) => "subscribeMessage",
            Self::ReserveKeys(_) => "reserveKeys",
        }
    }

    /// The target container name, for container-directed tasks.
    #[must_use]
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Create(t) => Some(&t.container),
            Self::Upsert(t) => Some(&t.container),
            Self::Read(t) => Some(&t.container),
            Self::Query(t) => Some(&t.container),
            Self::Aggregate(t) => Some(&t.container),
            Self::Merge(t) => Some(&t.container),
            Self::Delete(t) => Some(&t.container),
            Self::CloseCursors(t) => Some(&t.container),
            Self::SubscribeChanges(t) => Some(&t.container),
            Self::ReserveKeys(t) => Some(&t.container),
            Self::Message(_) | Self::Command(_) | Self::SubscribeMessage(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// The outcome of one task, mirroring the task tags plus `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task")]
pub enum TaskResult {
    #[serde(rename = "create")]
    Create(CreateEntitiesResult),
    #[serde(rename = "upsert")]
    Upsert(UpsertEntitiesResult),
    #[serde(rename = "read")]
    Read(ReadEntitiesResult),
    #[serde(rename = "query")]
    Query(QueryEntitiesResult),
    #[serde(rename = "aggregate")]
    Aggregate(AggregateResult),
    #[serde(rename = "merge")]
    Merge(MergeEntitiesResult),
    #[serde(rename = "delete")]
    Delete(DeleteEntitiesResult),
    #[serde(rename = "msg")]
    Message(SendMessageResult),
    #[serde(rename = "cmd")]
    Command(SendCommandResult),
    #[serde(rename = "closeCursors")]
    CloseCursors(CloseCursorsResult),
    #[serde(rename = "subscribeChanges")]
    SubscribeChanges(SubscribeChangesResult),
    #[serde(rename = "subscribeMessage")]
    SubscribeMessage(SubscribeMessageResult),
    #[serde(rename = "reserveKeys")]
    ReserveKeys(ReserveKeysResult),
    #[serde(rename = "error")]
    Error(TaskError),
}

impl TaskResult {
    /// Whether this result represents a failure.
    ///
    /// Derived from BOTH failure channels: a top-level `error` result, or a
    /// non-empty per-entity error list. Neither alone is authoritative;
    /// consumers must go through this accessor rather than checking one
    /// channel.
    #[must_use]
    pub fn failed(&self) -> bool {
        match self {
            Self::Error(_) => true,
            Self::Create(r) => !r.errors.is_empty(),
            Self::Upsert(r) => !r.errors.is_empty(),
            Self::Merge(r) => !r.errors.is_empty(),
            Self::Delete(r) => !r.errors.is_empty(),
            Self::Read(r) => !r.errors.is_empty(),
            Self::Query(r) => !r.errors.is_empty(),
            Self::Aggregate(_)
            | Self::Message(_)
            | Self::Command(_)
            | Self::CloseCursors(_)
            | Self::SubscribeChanges(_)
            | Self::SubscribeMessage(_)
            | Self::ReserveKeys(_) => false,
        }
    }

    /// The task-level error, if this is an `error` result.
    #[must_use]
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch envelopes
// ---------------------------------------------------------------------------

/// One submitted batch of tasks with the caller's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub tasks: Vec<SyncTask>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
}

impl SyncRequest {
    /// A request without identity, carrying only tasks.
    #[must_use]
    pub fn new(tasks: Vec<SyncTask>) -> Self {
        Self {
            tasks,
            user: None,
            client_id: None,
            token: None,
        }
    }
}

/// The ordered batch response: exactly one result per submitted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub results: Vec<TaskResult>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::entity::{Entity, EntityError, EntityErrorKind, EntityKey};
    use crate::error::{TaskError, TaskErrorKind};

    fn all_task_variants() -> Vec<SyncTask> {
        vec![
            SyncTask::Create(CreateEntities {
                container: "c".into(),
                entities: vec![Entity::new("k", json!({"id": "k"}))],
            }),
            SyncTask::Upsert(UpsertEntities {
                container: "c".into(),
                entities: vec![],
            }),
            SyncTask::Read(ReadEntities {
                container: "c".into(),
                ids: vec![EntityKey::new("k")],
                references: vec![],
            }),
            SyncTask::Query(QueryEntities {
                container: "c".into(),
                filter: None,
                order_by_key: Some(SortOrder::Asc),
                limit: Some(10),
                max_count: None,
                cursor: None,
                references: vec![],
            }),
            SyncTask::Aggregate(AggregateEntities {
                container: "c".into(),
                aggregate: AggregateType::Count,
                filter: None,
            }),
            SyncTask::Merge(MergeEntities {
                container: "c".into(),
                entities: vec![],
            }),
            SyncTask::Delete(DeleteEntities {
                container: "c".into(),
                ids: vec![EntityKey::new("k")],
                all: None,
            }),
            SyncTask::Message(SendMessage {
                name: "notify".into(),
                param: Some(json!({"level": 2})),
                users: vec![],
                clients: vec![],
                groups: vec![],
            }),
            SyncTask::Command(SendMessage {
                name: "std.Echo".into(),
                param: None,
                users: vec![],
                clients: vec![],
                groups: vec![],
            }),
            SyncTask::CloseCursors(CloseCursors {
                container: "c".into(),
                cursors: None,
            }),
            SyncTask::SubscribeChanges(SubscribeChanges {
                container: "c".into(),
                changes: vec![ChangeType::Create, ChangeType::Delete],
                filter: None,
            }),
            SyncTask::SubscribeMessage(SubscribeMessage {
                name: "notify".into(),
                remove: None,
            }),
            SyncTask::ReserveKeys(ReserveKeys {
                container: "c".into(),
                count: 5,
            }),
        ]
    }

    #[test]
    fn task_discriminators_are_bit_exact() {
        let expected = [
            "create",
            "upsert",
            "read",
            "query",
            "aggregate",
            "merge",
            "delete",
            "msg",
            "cmd",
            "closeCursors",
            "subscribeChanges",
            "subscribeMessage",
            "reserveKeys",
        ];
        for (task, expected) in all_task_variants().iter().zip(expected) {
            let value = serde_json::to_value(task).unwrap();
            assert_eq!(value["task"], json!(expected));
            assert_eq!(task.discriminator(), expected);
        }
    }

    #[test]
    fn every_task_variant_round_trips() {
        for task in all_task_variants() {
            let encoded = serde_json::to_string(&task).unwrap();
            let decoded: SyncTask = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded.kind(), task.kind());
            assert_eq!(decoded, task);
        }
    }

    #[test]
    fn error_result_wire_shape() {
        let result = TaskResult::Error(TaskError {
            kind: TaskErrorKind::NotImplemented,
            message: "no handler".to_string(),
            stacktrace: None,
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({"task": "error", "type": "notImplemented", "message": "no handler"})
        );
        let decoded: TaskResult = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn result_discriminators_mirror_task_tags() {
        let results = vec![
            (TaskResult::Create(CreateEntitiesResult::default()), "create"),
            (TaskResult::Upsert(UpsertEntitiesResult::default()), "upsert"),
            (TaskResult::Read(ReadEntitiesResult::default()), "read"),
            (TaskResult::Query(QueryEntitiesResult::default()), "query"),
            (TaskResult::Aggregate(AggregateResult { value: 3.0 }), "aggregate"),
            (TaskResult::Merge(MergeEntitiesResult::default()), "merge"),
            (TaskResult::Delete(DeleteEntitiesResult::default()), "delete"),
            (TaskResult::Message(SendMessageResult::default()), "msg"),
            (TaskResult::Command(SendCommandResult::default()), "cmd"),
            (
                TaskResult::CloseCursors(CloseCursorsResult { count: 1 }),
                "closeCursors",
            ),
            (
                TaskResult::SubscribeChanges(SubscribeChangesResult::default()),
                "subscribeChanges",
            ),
            (
                TaskResult::SubscribeMessage(SubscribeMessageResult::default()),
                "subscribeMessage",
            ),
            (
                TaskResult::ReserveKeys(ReserveKeysResult {
                    start: 1,
                    count: 5,
                    token: "t".into(),
                }),
                "reserveKeys",
            ),
        ];
        for (result, expected) in results {
            let value = serde_json::to_value(&result).unwrap();
            assert_eq!(value["task"], json!(expected), "{result:?}");
            let decoded: TaskResult = serde_json::from_value(value).unwrap();
            assert_eq!(decoded, result);
        }
    }

    #[test]
    fn failed_requires_checking_both_channels() {
        // Top-level error.
        let err = TaskResult::Error(TaskError::database("down"));
        assert!(err.failed());

        // Entity-level errors on an otherwise successful write.
        let partial = TaskResult::Create(CreateEntitiesResult {
            errors: vec![EntityError::new(
                "c",
                EntityKey::new("k3"),
                EntityErrorKind::ValidationError,
                "payload is not an object",
            )],
        });
        assert!(partial.failed());
        assert!(partial.error().is_none());

        // Clean result.
        let ok = TaskResult::Create(CreateEntitiesResult::default());
        assert!(!ok.failed());
    }

    #[test]
    fn request_envelope_round_trips_with_identity() {
        let request = SyncRequest {
            tasks: vec![SyncTask::CloseCursors(CloseCursors {
                container: "c".into(),
                cursors: Some(vec!["tok".into()]),
            })],
            user: Some("alice".into()),
            client_id: Some("client-9".into()),
            token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["clientId"], json!("client-9"));
        let decoded: SyncRequest = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn aggregate_type_wire_values() {
        for (ty, expected) in [
            (AggregateType::Count, "count"),
            (AggregateType::Min, "min"),
            (AggregateType::Max, "max"),
            (AggregateType::Sum, "sum"),
            (AggregateType::Avg, "avg"),
        ] {
            assert_eq!(serde_json::to_value(ty).unwrap(), json!(expected));
        }
    }
}
