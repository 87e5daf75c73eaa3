//! Errors raised by module resolution, independent of any particular call
//! site. The registry has no natural AST span of its own — a module name
//! can be looked up from several different `use` statements, from the CLI,
//! or from a REPL submission — so these stay plain [`thiserror::Error`]
//! values. Callers that do have a span (the emitter resolving an import)
//! attach it when wrapping one of these into their own `VesperError`.

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("module '{name}' could not be found on any search path")]
    ModuleNotFound { name: String },

    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("module '{name}' is malformed: {reason}")]
    MalformedModule { name: String, reason: String },

    #[error("module name '{name}' is ambiguous between {}", .candidates.join(", "))]
    AmbiguousModule { name: String, candidates: Vec<String> },
}
