//! Cursor registry: per-container resumable paged-query state.
//!
//! A cursor is created by the first paged query, continued by token, and
//! closed explicitly or swept when its owner's connection ends. Cursors are
//! owned by the requesting identity: continuing or closing a cursor owned
//! by someone else behaves exactly as if the cursor did not exist, so one
//! identity can never probe for another identity's cursors.

use std::collections::HashMap;

use dashmap::DashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Cursor state
// ---------------------------------------------------------------------------

/// Resumption state of a paged query.
///
/// `after_key` is the last key handed out; the next page starts strictly
/// after it in the query's key order.
#[derive(Debug, Clone, Default)]
pub struct CursorState {
    pub after_key: Option<String>,
    /// Whether the iteration runs in descending key order.
    pub descending: bool,
}

/// One registered cursor.
#[derive(Debug, Clone)]
struct Cursor {
    owner: String,
    state: CursorState,
}

// ---------------------------------------------------------------------------
// CursorRegistry
// ---------------------------------------------------------------------------

/// Registry of active cursors, keyed by container name and cursor token.
///
/// Mutations on one container's cursor set are mutually exclusive through
/// the concurrent map's per-entry locking; unrelated containers do not
/// share a lock.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    containers: DashMap<String, HashMap<String, Cursor>>,
}

impl CursorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
        }
    }

    /// Register a new cursor for `owner` and return its token.
    pub fn open(&self, container: &str, owner: &str, state: CursorState) -> String {
        let token = Uuid::new_v4().to_string();
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(
                token.clone(),
                Cursor {
                    owner: owner.to_string(),
                    state,
                },
            );
        token
    }

    /// Look up the resumption state of a cursor owned by `owner`.
    ///
    /// Returns `None` both when the token is unknown and when the cursor is
    /// owned by a different identity.
    #[must_use]
    pub fn resume(&self, container: &str, token: &str, owner: &str) -> Option<CursorState> {
        let set = self.containers.get(container)?;
        let cursor = set.get(token)?;
        if cursor.owner == owner {
            Some(cursor.state.clone())
        } else {
            None
        }
    }

    /// Store the next resumption state of an active cursor.
    ///
    /// A foreign or unknown token is ignored, matching [`Self::resume`].
    pub fn update(&self, container: &str, token: &str, owner: &str, state: CursorState) {
        if let Some(mut set) = self.containers.get_mut(container) {
            if let Some(cursor) = set.get_mut(token) {
                if cursor.owner == owner {
                    cursor.state = state;
                }
            }
        }
    }

    /// Remove a single finished cursor.
    pub fn remove(&self, container: &str, token: &str, owner: &str) {
        if let Some(mut set) = self.containers.get_mut(container) {
            if set.get(token).is_some_and(|c| c.owner == owner) {
                set.remove(token);
            }
        }
    }

    /// Close cursors in a container on behalf of `owner`.
    ///
    /// With an explicit token list only those cursors are closed; foreign
    /// and unknown tokens count as not found. Without a list every cursor
    /// the owner has in this container is closed. Returns the number of
    /// cursors actually closed.
    pub fn close(&self, container: &str, tokens: Option<&[String]>, owner: &str) -> u32 {
        let Some(mut set) = self.containers.get_mut(container) else {
            return 0;
        };
        let mut closed = 0;
        match tokens {
            Some(tokens) => {
                for token in tokens {
                    if set.get(token).is_some_and(|c| c.owner == owner) {
                        set.remove(token);
                        closed += 1;
                    }
                }
            }
            None => {
                let before = set.len();
                set.retain(|_, cursor| cursor.owner != owner);
                closed = u32::try_from(before - set.len()).unwrap_or(u32::MAX);
            }
        }
        closed
    }

    /// Drop every cursor `owner` holds, across all containers.
    ///
    /// Called when the owner's connection ends.
    pub fn sweep_owner(&self, owner: &str) -> u32 {
        let mut swept = 0usize;
        for mut entry in self.containers.iter_mut() {
            let before = entry.len();
            entry.retain(|_, cursor| cursor.owner != owner);
            swept += before - entry.len();
        }
        u32::try_from(swept).unwrap_or(u32::MAX)
    }

    /// Number of active cursors in a container, across all owners.
    #[must_use]
    pub fn active(&self, container: &str) -> usize {
        self.containers.get(container).map_or(0, |set| set.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
