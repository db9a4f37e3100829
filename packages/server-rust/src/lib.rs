//! `SyncHub` Server — batch task execution engine over container-oriented
//! storage: scheduling, CRUD pipelines, reference expansion, cursors, key
//! sequences, and message dispatch.

pub mod cursors;
pub mod database;
pub mod sequence;
pub mod service;
pub mod storage;
pub mod validate;

pub use cursors::{CursorRegistry, CursorState};
pub use database::{
    ContainerFactory, Database, DatabaseConfig, DatabaseService, MemoryContainerFactory,
    SchemaValidator,
};
pub use sequence::{KeySequencer, MemorySequenceStore, Reservation, SequenceStore};
pub use service::{
    EchoHandler, EventDispatcher, EventTargets, ExecutionContext, MessageDispatcher,
    MessageHandler, TaskExecutor, TaskSchedule,
};
pub use storage::{Container, FilterEngine, MemoryContainer, QueryOutcome};
