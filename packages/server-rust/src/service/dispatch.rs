//! Message/command dispatch: named handler registry and push-event fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use synchub_core::tasks::messaging::{SendCommandResult, SendMessage, SendMessageResult};
use synchub_core::{TaskError, TaskResult};

use crate::service::context::ExecutionContext;
use crate::service::events::{EventDispatcher, EventTargets};

// ---------------------------------------------------------------------------
// MessageHandler trait
// ---------------------------------------------------------------------------

/// Handler for a named message or command.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Whether invocation completes without suspending. Feeds the
    /// executor's sync/async classification; must be side-effect free.
    fn is_synchronous(&self) -> bool {
        true
    }

    /// Handle the message and produce a result value (commands return it to
    /// the caller; plain messages discard it).
    ///
    /// # Errors
    ///
    /// Returns a task error, typically of kind `commandError`.
    async fn invoke(
        &self,
        name: &str,
        param: Option<&Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, TaskError>;
}

/// Built-in echo handler: returns the parameter it was invoked with.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn invoke(
        &self,
        _name: &str,
        param: Option<&Value>,
        _ctx: &ExecutionContext,
    ) -> Result<Value, TaskError> {
        Ok(param.cloned().unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Registry of message/command handlers keyed by message name.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: DashMap<String, Arc<dyn MessageHandler>>,
}

impl MessageDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a message name. A later registration under
    /// the same name replaces the earlier one.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Look up the handler for a message name.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    /// Execute a `msg` or `cmd` task.
    ///
    /// An absent handler fails fast with `notImplemented`. On success, a
    /// task naming target users/clients/groups additionally hands the
    /// message to the event dispatcher for push delivery to exactly that
    /// audience.
    pub async fn dispatch(
        &self,
        task: &SendMessage,
        command: bool,
        ctx: &ExecutionContext,
        events: Option<&dyn EventDispatcher>,
    ) -> TaskResult {
        if task.name.is_empty() {
            return TaskResult::Error(TaskError::missing_field("name"));
        }
        let Some(handler) = self.handler(&task.name) else {
            return TaskResult::Error(TaskError::not_implemented(format!(
                "no handler for message '{}'",
                task.name
            )));
        };

        let value = match handler.invoke(&task.name, task.param.as_ref(), ctx).await {
            Ok(value) => value,
            Err(err) => return TaskResult::Error(err),
        };

        if task.has_targets() {
            if let Some(events) = events {
                let targets = EventTargets {
                    users: task.users.clone(),
                    clients: task.clients.clone(),
                    groups: task.groups.clone(),
                };
                events.enqueue_message_event(&task.name, task.param.as_ref(), &targets);
            }
        }

        if command {
            TaskResult::Command(SendCommandResult {
                result: Some(value),
            })
        } else {
            TaskResult::Message(SendMessageResult {})
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
