//! Per-batch execution context threaded through every operation.

use std::sync::Arc;

use crate::cursors::CursorRegistry;

/// Identity and shared state one batch executes under.
///
/// Built once per submitted batch from the request envelope; every task of
/// the batch runs with the same context.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Caller identity; owns cursors created by this batch.
    pub user: String,
    /// Client connection id, required for subscription tasks.
    pub client_id: Option<String>,
    /// The engine's cursor registry, consulted by paged queries.
    pub cursors: Arc<CursorRegistry>,
}

impl ExecutionContext {
    /// A context for the given identity.
    pub fn new(user: impl Into<String>, cursors: Arc<CursorRegistry>) -> Self {
        Self {
            user: user.into(),
            client_id: None,
            cursors,
        }
    }

    /// Attach a client connection id.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}
