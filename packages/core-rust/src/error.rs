//! Task error taxonomy shared across the client/server boundary.
//!
//! The kind values are stable wire strings; consumers branch on
//! [`TaskErrorKind`], never on message text.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskErrorKind
// ---------------------------------------------------------------------------

/// Stable, cross-boundary error classification for a failed task.
///
/// `EntityErrors` and `InvalidResponse` exist for client-side use only and
/// are never produced by the server engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskErrorKind {
    /// A fault escaped a task's pipeline and was caught at the task boundary.
    UnhandledException,
    /// The container or its backend failed the operation.
    DatabaseError,
    /// The query filter could not be compiled.
    FilterError,
    /// Schema validation rejected the request as a whole.
    ValidationError,
    /// A message/command handler reported a failure.
    CommandError,
    /// The task is missing required fields or malformed.
    InvalidTask,
    /// The requested operation or handler is not available.
    NotImplemented,
    /// The caller is not permitted to perform the task.
    PermissionDenied,
    /// Failure of the synchronous execution path itself.
    SyncError,
    /// Client-only: a result carried per-entity errors.
    EntityErrors,
    /// Client-only: the response could not be interpreted.
    InvalidResponse,
}

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

/// A task-level execution error.
///
/// Serialized as the body of the `error` result variant:
/// `{"task":"error","type":...,"message":...,"stacktrace"?:...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?}: {message}")]
pub struct TaskError {
    #[serde(rename = "type")]
    pub kind: TaskErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stacktrace: Option<String>,
}

impl TaskError {
    /// Build a task error without stack detail.
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stacktrace: None,
        }
    }

    /// A `databaseError` with the given message.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::DatabaseError, message)
    }

    /// An `invalidTask` error for a missing required field.
    pub fn missing_field(field: &str) -> Self {
        Self::new(TaskErrorKind::InvalidTask, format!("missing field: {field}"))
    }

    /// A `notImplemented` error with the given message.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::NotImplemented, message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
