//! Incremental REPL sessions.
//!
//! A REPL submission behaves like compiling a new file statement into a
//! growing program rather than a one-shot compile: each call to
//! [`ReplSession::submit`] appends the new source to everything accepted so
//! far, re-derives the allowed-functions registry over the whole thing, and
//! re-emits it in [`crate::emitter::EmitMode::Repl`] so a reference to a name
//! not yet defined in this session doesn't abort the submission — it passes
//! through verbatim, the same way a REPL lets you reference a variable you
//! are about to define on the next line.
//!
//! Every session owns its own [`ContextId`], activated for the duration of
//! `submit` and nothing else: a REPL submission must not see capabilities
//! granted to some other session or to the process's main context, and must
//! not leave its context active once `submit` returns (the next submission,
//! possibly on a different thread in an async host, reactivates it itself).

use std::sync::Arc;

use vesper_runtime::capability::{CapabilityManager, CapabilityToken, ContextId, ExecutionKind};

use crate::allowed_functions::AllowedFunctionsRegistry;
use crate::ast::FileStatementAst;
use crate::emitter::{self, EmitArtifact, EmitMode, EmitOptions};
use crate::file::SourceFile;
use crate::nom_tools::State;
use crate::registry::ModuleRegistry;
use crate::process_code;
use crate::tir::TirError;
use crate::transformer;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplError {
    #[error("this session has already been closed")]
    SessionClosed,
    #[error("failed to parse submission: {0}")]
    Parse(String),
    #[error(transparent)]
    Emit(#[from] emitter::EmitError),
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
}

impl From<TirError> for ReplError {
    fn from(error: TirError) -> Self {
        ReplError::Parse(error.to_string())
    }
}

/// One incremental transpilation session: the statements accepted so far,
/// plus the capability context every submission runs under.
pub struct ReplSession {
    /// Every top-level statement accepted into the session, in submission
    /// order, reconstructed as source text (the simplest representation
    /// that survives being fed back through the parser on the next
    /// submission without pinning a lifetime to borrowed source text).
    accepted_source: Vec<String>,
    module_registry: Arc<ModuleRegistry>,
    capability_context: ContextId,
    closed: bool,
}

impl ReplSession {
    pub fn new(module_registry: Arc<ModuleRegistry>, tokens: Vec<CapabilityToken>) -> Self {
        let capability_context = CapabilityManager::create_context(ExecutionKind::Repl, None, tokens);
        Self { accepted_source: Vec::new(), module_registry, capability_context, closed: false }
    }

    pub fn capability_context(&self) -> ContextId {
        self.capability_context
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Accepts one more chunk of source, re-emitting the whole accumulated
    /// session. On success, `source` becomes part of the session's history;
    /// on a parse or emit error, the session is left exactly as it was
    /// before the call so a bad line can be retried.
    pub fn submit(&mut self, source: &str) -> Result<EmitArtifact, ReplError> {
        if self.closed {
            return Err(ReplError::SessionClosed);
        }

        let mut candidate = self.accepted_source.clone();
        candidate.push(source.to_string());
        let combined = candidate.join("\n");

        let file = SourceFile::new(vec!["<repl>".to_string()], combined);
        let state = State::new(file);
        let ast = process_code(&state)?;
        let transformed = transformer::transform(ast);
        let allowed = AllowedFunctionsRegistry::build(&transformed.file, &self.module_registry)?;

        let options = EmitOptions { output_mode: crate::config::OutputMode::SingleFile, mode: EmitMode::Repl };
        let artifact = emitter::emit(&transformed, &allowed, "<repl>", "repl_session", options)?;

        self.accepted_source = candidate;
        Ok(artifact)
    }

    /// Every function/class name the session has accepted so far, for a
    /// host-side completion or `:env`-style listing command.
    pub fn defined_names(&self) -> Vec<String> {
        if self.accepted_source.is_empty() {
            return Vec::new();
        }
        let combined = self.accepted_source.join("\n");
        let file = SourceFile::new(vec!["<repl>".to_string()], combined);
        let state = State::new(file);
        let Ok(ast) = process_code(&state) else { return Vec::new() };
        ast.statements
            .iter()
            .filter_map(|statement| match statement {
                FileStatementAst::Function(function) => Some(function.name.text.to_string()),
                FileStatementAst::Class(class) => Some(class.name.text.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Ends the session: the capability context stays registered (another
    /// thread may still hold a clone of it mid-call) but this handle refuses
    /// any further submission.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_session() -> ReplSession {
        let registry = Arc::new(ModuleRegistry::new(vec![], false));
        ReplSession::new(registry, vec![])
    }

    #[test]
    fn first_submission_defines_a_function() {
        let mut session = fresh_session();
        let artifact = session.submit("func add(a: i32, b: i32): i32 { return a + b; }").unwrap();
        assert!(artifact.code.contains("pub fn add"));
        assert_eq!(session.defined_names(), vec!["add".to_string()]);
    }

    #[test]
    fn later_submission_sees_earlier_definitions() {
        let mut session = fresh_session();
        session.submit("func one(): i32 { return 1; }").unwrap();
        let artifact = session.submit("func two(): i32 { return one(); }").unwrap();
        assert!(artifact.code.contains("pub fn two"));
        assert!(artifact.code.contains("one()"));
    }

    #[test]
    fn undefined_reference_does_not_abort_in_repl_mode() {
        let mut session = fresh_session();
        let artifact = session.submit("func test(): void { not_yet_defined(); }").unwrap();
        assert!(artifact.code.contains("not_yet_defined"));
    }

    #[test]
    fn closed_session_rejects_further_submissions() {
        let mut session = fresh_session();
        session.close();
        assert!(matches!(session.submit("func x(): void {}"), Err(ReplError::SessionClosed)));
    }

    #[test]
    fn failed_submission_does_not_pollute_session_history() {
        let mut session = fresh_session();
        session.submit("func ok(): i32 { return 1; }").unwrap();
        assert!(session.submit("func broken( :::: ").is_err());
        // the broken line must not have joined accepted_source, or this would fail to parse
        assert!(session.submit("func also_ok(): i32 { return ok(); }").is_ok());
    }
}
