//! Storage abstractions for the execution engine.
//!
//! - [`Container`]: the per-collection capability the CRUD pipeline drives
//! - [`FilterEngine`]: seam for the external filter compiler
//! - [`MemoryContainer`]: ordered in-memory container implementation

pub mod container;
pub mod filter;
pub mod memory;

pub use container::{Container, QueryOutcome};
pub use filter::{CompiledFilter, FilterEngine, MatchAll};
pub use memory::MemoryContainer;
