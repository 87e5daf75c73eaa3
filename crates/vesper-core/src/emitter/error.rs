//! Errors the emitter can raise while lowering a validated, type-checked,
//! security-cleared AST into Rust source. Every variant here corresponds to
//! one of the emitter's own checks (call admission, module resolution); a
//! bug that reaches an "exhausted match arm" is reported as
//! [`EmitError::CodeGenInternal`] rather than silently miscompiling.

use std::ops::Range;

use vesper_core_macros::VesperError;
use vesper_core_macros_core::SourceCode;
use strum_macros::{EnumDiscriminants, EnumProperty};

#[derive(Clone, Debug, VesperError, thiserror::Error)]
pub enum EmitError {
    #[error("call to unknown function '{name}'")]
    #[diagnostic(code("vesper::emitter::unknown_function"))]
    UnknownFunction {
        name: String,
        #[help]
        help: String,
        #[label("no builtin, user-defined, or imported function with this name is visible here")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("module '{module}' has no function '{function}'")]
    #[diagnostic(code("vesper::emitter::unknown_module_function"))]
    UnknownModuleFunction {
        module: String,
        function: String,
        #[help]
        help: String,
        #[label("not exported by this module")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("import target '{name}' could not be resolved: {reason}")]
    #[diagnostic(code("vesper::emitter::unknown_module"), help("Check the import path, or confirm the native bridge module is registered before compilation"))]
    UnknownModule {
        name: String,
        reason: String,
        #[label("module import could not be resolved")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("security analysis rejected this program: {message}")]
    #[diagnostic(code("vesper::emitter::security_rejected"), help("Resolve the underlying security diagnostic before emitting"))]
    SecurityRejected {
        message: String,
        #[label("flagged by the security analyzer")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("internal code generation error: {message}")]
    #[diagnostic(code("vesper::emitter::internal"), help("This indicates a compiler bug; please report it with the input that triggered it"))]
    CodeGenInternal { message: String },
}

impl EmitError {
    pub fn unknown_function(name: impl Into<String>, suggestions: &[String], position: Range<usize>, code: SourceCode) -> Self {
        let name = name.into();
        let help = if suggestions.is_empty() {
            format!("'{name}' is not a builtin, user-defined, or imported function")
        } else {
            format!("did you mean one of: {}?", suggestions.join(", "))
        };
        EmitError::UnknownFunction { name, help, position, code }
    }

    pub fn unknown_module_function(module: impl Into<String>, function: impl Into<String>, suggestions: &[String], position: Range<usize>, code: SourceCode) -> Self {
        let module = module.into();
        let function = function.into();
        let help = if suggestions.is_empty() {
            format!("module '{module}' exports no function named '{function}'")
        } else {
            format!("did you mean one of: {}?", suggestions.join(", "))
        };
        EmitError::UnknownModuleFunction { module, function, help, position, code }
    }
}
