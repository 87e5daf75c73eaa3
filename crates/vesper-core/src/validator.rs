//! Post-parse structural validation.
//!
//! Runs once over a freshly parsed [`FileAst`] before the transformer or TIR
//! ever see it. Unlike the TIR (which only resolves declarations) this is a
//! plain syntactic walk: it never looks anything up, it only checks that
//! statements appear where the language allows them — `break`/`continue`
//! inside a loop, `return` inside a function, `nonlocal` inside a nested
//! function, no two parameters sharing a name. Diagnostics are collected
//! rather than failing on the first one, so a single pass reports everything
//! wrong with a file at once; only a fatal diagnostic turns into an `Err`.

use std::ops::Range;

use vesper_core_macros::VesperError;
use vesper_core_macros_core::SourceCode;
use strum_macros::{EnumDiscriminants, EnumProperty};

use crate::ast::{BodyAst, BodyStatementAst, ClassDefinitionFieldAst, FileAst, FileStatementAst, FunctionArgumentAst, FunctionDefinitionAst};
use crate::nom_tools::{SpanInfo, ToRange};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

/// One finding produced by a validation pass.
#[derive(Clone, Debug, VesperError, thiserror::Error)]
pub enum ValidationDiagnostic {
    #[error("`break` outside of a loop")]
    #[diagnostic(code("vesper::validator::break_outside_loop"), help("Move this `break` inside a `while` or `for` body"))]
    BreakOutsideLoop {
        #[label("not inside a loop")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("`continue` outside of a loop")]
    #[diagnostic(code("vesper::validator::continue_outside_loop"), help("Move this `continue` inside a `while` or `for` body"))]
    ContinueOutsideLoop {
        #[label("not inside a loop")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("`return` outside of a function")]
    #[diagnostic(code("vesper::validator::return_outside_function"), help("`return` is only valid inside a function body"))]
    ReturnOutsideFunction {
        #[label("not inside a function")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("`nonlocal` outside of a nested function")]
    #[diagnostic(code("vesper::validator::nonlocal_outside_nested_function"), help("`nonlocal` only makes sense inside a function nested within another"))]
    NonLocalOutsideNestedFunction {
        #[label("no enclosing function scope to bind to")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("duplicate parameter name '{name}'")]
    #[diagnostic(code("vesper::validator::duplicate_parameter"), help("Rename one of the parameters so each has a unique name"))]
    DuplicateParameter {
        name: String,
        #[label("this parameter name is already used earlier in the same list")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },
}

impl ValidationDiagnostic {
    pub fn severity(&self) -> Severity {
        // Every diagnostic this pass currently produces names a structurally
        // invalid program, so all are fatal; non-fatal findings (unused
        // variables, shadowing, style nits) would extend this match without
        // touching the error variants above.
        match self {
            ValidationDiagnostic::BreakOutsideLoop { .. }
            | ValidationDiagnostic::ContinueOutsideLoop { .. }
            | ValidationDiagnostic::ReturnOutsideFunction { .. }
            | ValidationDiagnostic::NonLocalOutsideNestedFunction { .. }
            | ValidationDiagnostic::DuplicateParameter { .. } => Severity::Fatal,
        }
    }
}

/// Accumulated result of a validation pass: every diagnostic found, in
/// source order, regardless of severity.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(|diagnostic| diagnostic.severity() == Severity::Fatal)
    }
}

#[derive(Clone, Copy, Default)]
struct Frame {
    in_loop: bool,
    in_function: bool,
    function_depth: u32,
}

/// Validates an entire parsed file, returning every diagnostic found.
pub fn validate(file: &FileAst<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();
    for statement in file.statements.iter() {
        validate_file_statement(statement, &mut report);
    }
    report
}

fn validate_file_statement(statement: &FileStatementAst<'_>, report: &mut ValidationReport) {
    match statement {
        FileStatementAst::Class(class) => {
            for field in class.fields.iter() {
                if let ClassDefinitionFieldAst::Function(function) = field {
                    validate_function(function, report);
                }
            }
        }
        FileStatementAst::Function(function) => validate_function(function, report),
        FileStatementAst::Extend(extend) => {
            for field in extend.fields.iter() {
                if let crate::ast::ExtendDefinitionFieldAst::Function(function) = field {
                    validate_function(function, report);
                }
            }
        }
        FileStatementAst::Interface(_) | FileStatementAst::Use(_) => {}
    }
}

fn validate_function(function: &FunctionDefinitionAst<'_>, report: &mut ValidationReport) {
    let mut seen_names: Vec<&str> = Vec::new();
    for argument in function.arguments.iter() {
        if let FunctionArgumentAst::Argument { name, .. } = argument {
            if seen_names.contains(&name.text) {
                report.diagnostics.push(ValidationDiagnostic::DuplicateParameter {
                    name: name.text.to_string(),
                    position: name.to_range(),
                    code: SpanInfo::from(name).file.into(),
                });
            } else {
                seen_names.push(name.text);
            }
        }
    }

    let frame = Frame { in_loop: false, in_function: true, function_depth: 1 };
    validate_body(&function.body, frame, report);
}

fn validate_body(body: &BodyAst<'_>, frame: Frame, report: &mut ValidationReport) {
    for statement in body.statements.iter() {
        validate_statement(statement, frame, report);
    }
}

fn validate_statement(statement: &BodyStatementAst<'_>, frame: Frame, report: &mut ValidationReport) {
    match statement {
        BodyStatementAst::Break(span) => {
            if !frame.in_loop {
                report.diagnostics.push(ValidationDiagnostic::BreakOutsideLoop { position: span.to_range(), code: SpanInfo::from(span).file.into() });
            }
        }
        BodyStatementAst::Continue(span) => {
            if !frame.in_loop {
                report.diagnostics.push(ValidationDiagnostic::ContinueOutsideLoop { position: span.to_range(), code: SpanInfo::from(span).file.into() });
            }
        }
        BodyStatementAst::Return(statement) => {
            if !frame.in_function {
                report.diagnostics.push(ValidationDiagnostic::ReturnOutsideFunction { position: statement.keyword_span.to_range(), code: SpanInfo::from(&statement.keyword_span).file.into() });
            }
        }
        BodyStatementAst::NonLocal(nonlocal) => {
            if frame.function_depth < 2 {
                if let Some(first) = nonlocal.names.first() {
                    report.diagnostics.push(ValidationDiagnostic::NonLocalOutsideNestedFunction { position: first.to_range(), code: SpanInfo::from(first).file.into() });
                }
            }
        }
        BodyStatementAst::IfCondition(if_condition) => {
            validate_body(&if_condition.true_body, frame, report);
            for (_, body) in if_condition.else_ifs.iter() {
                validate_body(body, frame, report);
            }
            if let Some(false_body) = &if_condition.false_body {
                validate_body(false_body, frame, report);
            }
        }
        BodyStatementAst::While(statement) => {
            validate_body(&statement.body, Frame { in_loop: true, ..frame }, report);
        }
        BodyStatementAst::For(statement) => {
            validate_body(&statement.body, Frame { in_loop: true, ..frame }, report);
        }
        BodyStatementAst::TryExceptFinally(statement) => {
            validate_body(&statement.try_body, frame, report);
            for handler in statement.handlers.iter() {
                validate_body(&handler.body, frame, report);
            }
            if let Some(finally_body) = &statement.finally_body {
                validate_body(finally_body, frame, report);
            }
        }
        BodyStatementAst::VariableDefinition(_)
        | BodyStatementAst::VariableAssign(_)
        | BodyStatementAst::FunctionCall(_)
        | BodyStatementAst::Throw(_)
        | BodyStatementAst::CapabilityDeclaration(_)
        | BodyStatementAst::DestructuringAssign(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, nom_tools::State, process_code};

    #[test]
    fn flags_break_outside_loop() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { break; }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = validate(&ast);
        assert!(report.is_fatal());
        assert!(matches!(report.diagnostics[0], ValidationDiagnostic::BreakOutsideLoop { .. }));
    }

    #[test]
    fn accepts_break_inside_loop() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { while (true) { break; } }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = validate(&ast);
        assert!(!report.is_fatal());
    }

    #[test]
    fn flags_duplicate_parameter() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(a: string, a: string): void { }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = validate(&ast);
        assert!(report.is_fatal());
        assert!(matches!(report.diagnostics[0], ValidationDiagnostic::DuplicateParameter { .. }));
    }

    #[test]
    fn flags_nonlocal_at_top_level_function() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { nonlocal a; }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = validate(&ast);
        assert!(report.is_fatal());
    }
}
