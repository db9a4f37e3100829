//! Event dispatch seam: subscriptions and targeted push events.
//!
//! The engine decides WHO receives an event; delivery itself belongs to an
//! external collaborator behind [`EventDispatcher`]. When no dispatcher is
//! configured, subscription tasks fail with `notImplemented`.

use serde_json::Value;

use synchub_core::tasks::{SubscribeChanges, SubscribeMessage};
use synchub_core::TaskError;

/// The audience of a targeted message event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTargets {
    pub users: Vec<String>,
    pub clients: Vec<String>,
    pub groups: Vec<String>,
}

impl EventTargets {
    /// Whether any audience member is named.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.clients.is_empty() && self.groups.is_empty()
    }
}

/// External push-event collaborator.
///
/// Registration and fan-out are in-memory bookkeeping on the dispatcher
/// side, so the methods are synchronous; actual delivery happens outside
/// this engine.
pub trait EventDispatcher: Send + Sync + 'static {
    /// Register a change subscription for `user`/`client` on a container.
    ///
    /// # Errors
    ///
    /// Returns a task error when the subscription cannot be registered.
    fn subscribe_changes(
        &self,
        container: &str,
        subscribe: &SubscribeChanges,
        user: &str,
        client: &str,
    ) -> Result<(), TaskError>;

    /// Register or remove a message subscription for `user`/`client`.
    ///
    /// # Errors
    ///
    /// Returns a task error when the subscription cannot be registered.
    fn subscribe_message(
        &self,
        subscribe: &SubscribeMessage,
        user: &str,
        client: &str,
    ) -> Result<(), TaskError>;

    /// Queue a message as a push event for exactly the named audience.
    fn enqueue_message_event(&self, name: &str, param: Option<&Value>, targets: &EventTargets);
}
