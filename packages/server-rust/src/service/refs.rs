//! Reference resolution: expands entity fields into fetches of other
//! containers.
//!
//! Descriptor trees are resolved with an explicit work queue over an arena
//! of result nodes, so nesting depth never grows the call stack. Errors are
//! descriptor-scoped: a partly-missing reference set neither aborts sibling
//! descriptors nor the outer task.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;

use synchub_core::refs::select_keys;
use synchub_core::{Entity, EntityError, EntityErrorKind, EntityKey, ReferenceDescriptor, ReferencesResult};

use crate::database::Database;
use crate::service::context::ExecutionContext;

struct Pending<'a> {
    descriptor: &'a ReferenceDescriptor,
    /// Payloads of the source entities keys are extracted from.
    sources: Vec<Value>,
    /// Arena index of the parent node, `None` for roots.
    parent: Option<usize>,
}

/// Resolve a descriptor list against a fetched source entity set.
///
/// The output is keyed by descriptor: element `i` corresponds to
/// `descriptors[i]`, recursively.
pub(crate) async fn resolve_references(
    database: &Database,
    ctx: &ExecutionContext,
    source: &[Entity],
    descriptors: &[ReferenceDescriptor],
) -> Vec<ReferencesResult> {
    let source_payloads: Vec<Value> = source.iter().map(|e| e.value.clone()).collect();
    let mut queue: VecDeque<Pending<'_>> = descriptors
        .iter()
        .map(|descriptor| Pending {
            descriptor,
            sources: source_payloads.clone(),
            parent: None,
        })
        .collect();

    let mut arena: Vec<Option<ReferencesResult>> = Vec::new();
    let mut parents: Vec<Option<usize>> = Vec::new();

    while let Some(pending) = queue.pop_front() {
        let node = resolve_one(database, ctx, pending.descriptor, &pending.sources).await;

        let index = arena.len();
        let child_sources: Vec<Value> = node.entities.iter().map(|e| e.value.clone()).collect();
        arena.push(Some(node));
        parents.push(pending.parent);

        for nested in &pending.descriptor.references {
            queue.push_back(Pending {
                descriptor: nested,
                sources: child_sources.clone(),
                parent: Some(index),
            });
        }
    }

    // Children always sit behind their parent in the arena; walking
    // backwards finalizes every node before it is attached.
    let mut roots = Vec::new();
    for index in (0..arena.len()).rev() {
        let Some(mut node) = arena[index].take() else {
            continue;
        };
        node.references.reverse();
        match parents[index] {
            Some(parent) => {
                if let Some(parent) = arena[parent].as_mut() {
                    parent.references.push(node);
                }
            }
            None => roots.push(node),
        }
    }
    roots.reverse();
    roots
}

/// Resolve a single descriptor: extract keys, batch-read the target
/// container, and record descriptor-scoped errors.
async fn resolve_one(
    database: &Database,
    ctx: &ExecutionContext,
    descriptor: &ReferenceDescriptor,
    sources: &[Value],
) -> ReferencesResult {
    let mut node = ReferencesResult {
        container: descriptor.container.clone(),
        ..ReferencesResult::default()
    };

    let mut seen: HashSet<EntityKey> = HashSet::new();
    for payload in sources {
        match select_keys(payload, &descriptor.selector) {
            Ok(keys) => {
                for key in keys {
                    if seen.insert(key.clone()) {
                        node.ids.push(key);
                    }
                }
            }
            Err(message) => node.errors.push(EntityError::unkeyed(
                descriptor.container.clone(),
                EntityErrorKind::ParseError,
                message,
            )),
        }
    }
    if node.ids.is_empty() {
        return node;
    }

    let Some(container) = database.get_or_create_container(&descriptor.container) else {
        node.errors.push(EntityError::unkeyed(
            descriptor.container.clone(),
            EntityErrorKind::ReadError,
            format!("container not found: '{}'", descriptor.container),
        ));
        return node;
    };
    match container.read_entities(&node.ids, ctx).await {
        Ok(entities) => {
            let found: HashSet<&EntityKey> =
                entities.iter().filter_map(|e| e.key.as_ref()).collect();
            for id in &node.ids {
                if !found.contains(id) {
                    node.errors.push(EntityError::new(
                        descriptor.container.clone(),
                        id.clone(),
                        EntityErrorKind::ReadError,
                        format!("referenced entity '{id}' not found"),
                    ));
                }
            }
            node.entities = entities;
        }
        Err(err) => node.errors.push(EntityError::unkeyed(
            descriptor.container.clone(),
            EntityErrorKind::ReadError,
            err.message,
        )),
    }
    node
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
