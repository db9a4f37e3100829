//! Key reservation task payloads.

use serde::{Deserialize, Serialize};

/// Atomically reserve a range of `count` sequential keys in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveKeys {
    pub container: String,
    pub count: u32,
}

/// Result of a `reserveKeys` task: the reserved range `[start,
/// start + count)` and the ledger token recording the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveKeysResult {
    pub start: u64,
    pub count: u32,
    pub token: String,
}
