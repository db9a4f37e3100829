//! Messaging task payloads: messages, commands, and event subscriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages and commands
// ---------------------------------------------------------------------------

/// Payload shared by the `msg` and `cmd` tasks: a named message with an
/// optional parameter and an optional push-event audience.
///
/// A command expects a handler result value; a message is fire-and-forget
/// toward its handler. When any of `users`/`clients`/`groups` are named the
/// server also delivers the message as a push event to exactly that
/// audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub param: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub users: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub clients: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub groups: Vec<String>,
}

impl SendMessage {
    /// Whether the task names a push-event audience.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        !self.users.is_empty() || !self.clients.is_empty() || !self.groups.is_empty()
    }
}

/// Result of a `msg` task: acknowledgement only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {}

/// Result of a `cmd` task: the handler's result value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCommandResult {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<Value>,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Change kinds a change subscription can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Upsert,
    Merge,
    Delete,
}

/// Subscribe the calling client to container change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeChanges {
    pub container: String,
    pub changes: Vec<ChangeType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<String>,
}

/// Result of a `subscribeChanges` task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeChangesResult {}

/// Subscribe (or, with `remove`, unsubscribe) the calling client to a
/// message name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeMessage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remove: Option<bool>,
}

/// Result of a `subscribeMessage` task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeMessageResult {}
