//! Task classification: decides the synchronous/asynchronous schedule of
//! every task before any task of the batch runs.
//!
//! Classification is a pure capability query: it inspects static task
//! fields and asks the target container/handler/store whether the specific
//! operation completes without suspending. It performs no writes beyond
//! idempotent container materialization through the factory and can be
//! re-evaluated freely. A task with a missing or invalid target classifies
//! `Sync` so its error result is produced without scheduling overhead.

use synchub_core::{SyncTask, TaskKind};

use crate::database::Database;
use crate::sequence::KeySequencer;
use crate::service::dispatch::MessageDispatcher;

/// Scheduling decision for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSchedule {
    /// The task completes without suspending.
    Sync,
    /// The task may suspend on container/handler I/O.
    Async,
}

/// Classify one task against the engine's capabilities.
#[must_use]
pub fn classify(
    task: &SyncTask,
    database: &Database,
    dispatcher: &MessageDispatcher,
    sequencer: &KeySequencer,
) -> TaskSchedule {
    match task {
        SyncTask::Create(t) => container_schedule(database, &t.container, TaskKind::Create),
        SyncTask::Upsert(t) => container_schedule(database, &t.container, TaskKind::Upsert),
        SyncTask::Read(t) => container_schedule(database, &t.container, TaskKind::Read),
        SyncTask::Query(t) => container_schedule(database, &t.container, TaskKind::Query),
        SyncTask::Aggregate(t) => {
            container_schedule(database, &t.container, TaskKind::Aggregate)
        }
        SyncTask::Merge(t) => container_schedule(database, &t.container, TaskKind::Merge),
        SyncTask::Delete(t) => container_schedule(database, &t.container, TaskKind::Delete),

        SyncTask::Message(t) | SyncTask::Command(t) => match dispatcher.handler(&t.name) {
            // Missing handler: fail fast on the synchronous path.
            None => TaskSchedule::Sync,
            Some(handler) if handler.is_synchronous() => TaskSchedule::Sync,
            Some(_) => TaskSchedule::Async,
        },

        // Cursor teardown and subscription registration are in-memory
        // bookkeeping and never suspend.
        SyncTask::CloseCursors(_)
        | SyncTask::SubscribeChanges(_)
        | SyncTask::SubscribeMessage(_) => TaskSchedule::Sync,

        SyncTask::ReserveKeys(t) => {
            if t.container.is_empty() || sequencer.is_synchronous() {
                TaskSchedule::Sync
            } else {
                TaskSchedule::Async
            }
        }
    }
}

fn container_schedule(database: &Database, container: &str, op: TaskKind) -> TaskSchedule {
    if container.is_empty() {
        return TaskSchedule::Sync;
    }
    match database.get_or_create_container(container) {
        None => TaskSchedule::Sync,
        Some(c) if c.supports_sync(op) => TaskSchedule::Sync,
        Some(_) => TaskSchedule::Async,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
