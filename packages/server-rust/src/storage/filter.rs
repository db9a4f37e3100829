//! Filter engine seam.
//!
//! The filter-expression language, its parser, and its compiler live
//! outside this engine; containers only need a compiled predicate. A
//! container configured without an engine rejects filtered queries with a
//! `filterError`.

use serde_json::Value;

/// A compiled filter predicate over entity payloads.
pub type CompiledFilter = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// External filter compiler.
pub trait FilterEngine: Send + Sync + 'static {
    /// Compile a filter expression into a payload predicate.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description when the expression cannot be
    /// compiled; the pipeline surfaces it as a `filterError`.
    fn compile(&self, filter: &str) -> Result<CompiledFilter, String>;
}

/// Engine that accepts any expression and matches every payload. Useful in
/// tests and for backends that apply filtering themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl FilterEngine for MatchAll {
    fn compile(&self, _filter: &str) -> Result<CompiledFilter, String> {
        Ok(Box::new(|_| true))
    }
}
