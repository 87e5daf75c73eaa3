//! Vesper Language Compiler Library
//!
//! This is the core library for the Vesper programming language compiler. It provides
//! a complete compilation pipeline from source code to a type-checked intermediate
//! representation (TIR).
//!
//! # Overview
//!
//! The Vesper compiler follows a multi-stage compilation process:
//!
//! 1. **Parsing**: Convert source code into an Abstract Syntax Tree (AST)
//! 2. **Type Resolution**: Build Type Intermediate Representation (TIR) with full type information
//! 3. **Error Reporting**: Collect and report compilation errors with source location information
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`parser`]: Converts source code text into structured AST nodes
//! - [`ast`]: Abstract Syntax Tree definitions for all language constructs
//! - [`tir`]: Type Intermediate Representation and type checking system
//! - [`error`]: Error handling and reporting infrastructure
//! - [`file`]: Source file management and location tracking
//! - [`nom_tools`]: Parser combinator utilities built on nom
//! - [`map`]: Specialized data structures for compiler use
//!
//! # Usage
//!
//! The main entry points are [`process_code`] for parsing and [`process_ast`] for type checking:
//!
//! ```ignore
//! use vesper_core::{process_code, process_ast, nom_tools::State, file::SourceFile};
//!
//! // Parse source code
//! let source = SourceFile::new(vec!["main".into()], "class Test {}".to_string());
//! let state = State::new(source);
//! let ast = process_code(&state)?;
//!
//! // Type check and build TIR
//! let tir_context = process_ast(vec![ast.into()])?;
//! ```
//!
//! # Error Handling
//!
//! All compilation errors are represented as [`TirError`] which provides rich
//! diagnostic information including source locations and suggested fixes.

use std::rc::Rc;

use ast::FileAst;
use error::handle_parser;
use nom::Finish;
use nom_tools::State;
use tir::{TirContext, TirError};

// Public modules that form the compiler's public API
pub mod ast;
pub mod file;

#[rustfmt::skip]
pub mod parser;
pub mod error;
pub mod nom_tools;
pub mod tir;
pub mod map;

// Pipeline stages added alongside parsing/TIR: structural validation and
// AST normalization run first, then type checking and security analysis
// run independently of (and in parallel in spirit with) TIR's own
// declaration-level resolution, then the module registry, allowed-functions
// registry, and code emitter turn a validated program into Rust source.
pub mod validator;
pub mod transformer;
pub mod config;
pub mod type_checker;
pub mod security;
pub mod registry;
pub mod allowed_functions;
pub mod emitter;
pub mod repl;

#[cfg(test)]
mod tests;

/// Parses Vesper source code into an Abstract Syntax Tree (AST).
///
/// This is the first stage of the compilation pipeline. It takes a parser state
/// containing source code and produces a structured AST representation.
///
/// # Arguments
///
/// * `state` - Parser state containing the source code and file information
///
/// # Returns
///
/// * `Ok(FileAst)` - The parsed AST representing the entire source file
/// * `Err(TirError)` - Parsing error with location information
///
/// # Examples
///
/// ```ignore
/// use vesper_core::{process_code, nom_tools::State, file::SourceFile};
///
/// let source = SourceFile::new(vec!["example".into()], "class Hello {}".to_string());
/// let state = State::new(source);
/// let ast = process_code(&state)?;
/// ```
///
/// # Errors
///
/// Returns a [`TirError`] if the source code contains syntax errors, including:
/// - Invalid token sequences
/// - Malformed declarations
/// - Unmatched delimiters
/// - Invalid expressions
#[allow(clippy::result_unit_err)]
pub fn process_code<'base>(state: &'base State) -> Result<FileAst<'base>, TirError> {
    let response = parser::parse(state).finish();
    handle_parser(response)
}

/// Performs type checking and builds the Type Intermediate Representation (TIR).
///
/// This is the second stage of the compilation pipeline. It takes one or more
/// ASTs and performs type resolution, building a complete type-checked
/// representation of the program.
///
/// # Arguments
///
/// * `files` - Vector of parsed ASTs to process together
///
/// # Returns
///
/// * `Ok(TirContext)` - Complete TIR context with all type information
/// * `Err(TirError)` - Type checking error with diagnostic information
///
/// # Examples
///
/// ```ignore
/// use vesper_core::{process_code, process_ast, nom_tools::State, file::SourceFile};
/// use std::rc::Rc;
///
/// // Parse multiple files
/// let ast1 = process_code(&state1)?;
/// let ast2 = process_code(&state2)?;
///
/// // Type check together
/// let tir_context = process_ast(vec![ast1.into(), ast2.into()])?;
/// ```
///
/// # Type Checking Process
///
/// 1. **Module Registration**: Register all modules and their relationships
/// 2. **Signature Building**: Create type signatures for all declarations
/// 3. **Scope Construction**: Build hierarchical scope tree
/// 4. **Type Resolution**: Resolve all type references and expressions
/// 5. **Error Collection**: Gather any type checking errors
///
/// # Errors
///
/// Returns a [`TirError`] if type checking fails, including:
/// - Type mismatches
/// - Undefined variables or types
/// - Circular dependencies
/// - Import errors
/// - Scope resolution failures
#[allow(clippy::result_unit_err)]
pub fn process_ast(files: Vec<Rc<FileAst<'_>>>) -> Result<TirContext<'_>, TirError> {
    crate::tir::build(files)
}

/// Why a whole-pipeline [`compile`] call stopped short of emitting code.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("parse error: {0}")]
    Parse(#[from] TirError),
    #[error("validation failed: {0:?}")]
    Validation(Vec<validator::ValidationDiagnostic>),
    #[error("security analysis rejected this program: {0:?}")]
    Security(Vec<security::SecurityDiagnostic>),
    #[error(transparent)]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Emit(#[from] emitter::EmitError),
}

/// Runs the full compile pipeline over one source file: parse, validate,
/// desugar, type-check (non-fatal), security-analyze, resolve imports
/// against `registry`, build the allowed-functions whitelist, and emit Rust.
///
/// Type-checker warnings never abort this call (by design, see
/// [`type_checker`]); a fatal [`validator::ValidationReport`] or
/// [`security::SecurityReport`] does.
pub fn compile<'base>(
    state: &'base nom_tools::State,
    registry: &registry::ModuleRegistry,
    config: &config::ProjectConfig,
    source_file_name: impl Into<String>,
    module_qualified_name: impl Into<String>,
) -> Result<(emitter::EmitArtifact, type_checker::TypeCheckReport), CompileError> {
    let ast = process_code(state)?;

    let validation = validator::validate(&ast);
    if validation.is_fatal() {
        return Err(CompileError::Validation(validation.diagnostics));
    }

    let transformed = transformer::transform(ast);

    let type_report = type_checker::check(&transformed.file);

    let security_report = security::analyze(&transformed.file, &config.security_denylist, registry);
    if security_report.is_fatal() {
        return Err(CompileError::Security(security_report.diagnostics));
    }

    let allowed = allowed_functions::AllowedFunctionsRegistry::build(&transformed.file, registry)?;

    let options = emitter::EmitOptions { output_mode: config.output_mode, mode: emitter::EmitMode::Compile };
    let artifact = emitter::emit(&transformed, &allowed, source_file_name, module_qualified_name, options)?;

    Ok((artifact, type_report))
}
