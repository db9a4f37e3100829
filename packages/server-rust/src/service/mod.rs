//! Task execution framework.
//!
//! One batch flows through this module as:
//!
//! 1. **Classification** (`classify`): every task -> `Sync` or `Async`,
//!    decided before any task runs
//! 2. **Execution** (`executor`): the ordered per-task pipeline with
//!    fault containment at the task boundary
//! 3. **CRUD pipeline** (`crud`): the shared container-task steps
//! 4. **Reference resolution** (`refs`): foreign-key style expansion
//! 5. **Message dispatch** (`dispatch`): named handlers and push fan-out
//! 6. **Collaborator seams** (`context`, `events`): per-batch identity and
//!    the external event dispatcher

pub mod classify;
pub mod context;
pub mod dispatch;
pub mod events;
pub mod executor;

pub(crate) mod crud;
pub(crate) mod refs;

// Re-export key types for convenient access.
pub use classify::{classify, TaskSchedule};
pub use context::ExecutionContext;
pub use dispatch::{EchoHandler, MessageDispatcher, MessageHandler};
pub use events::{EventDispatcher, EventTargets};
pub use executor::TaskExecutor;
