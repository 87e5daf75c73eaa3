//! Pattern-based security analysis over a parsed AST.
//!
//! Runs alongside the type checker, after validation and before the code
//! emitter ever sees the tree. Unlike the validator this pass never looks at
//! control-flow structure; it only looks at identifiers and string literals
//! and asks three questions: is this name denylisted, is this string literal
//! handed to a sensitive sink, and does this import target actually exist in
//! the module registry. A single `error`-severity finding is fatal; `warning`
//! and `info` findings are collected and returned alongside a successful
//! analysis so the caller can still decide to proceed.

use std::ops::Range;

use vesper_core_macros::VesperError;
use vesper_core_macros_core::SourceCode;
use strum_macros::{EnumDiscriminants, EnumProperty};

use crate::ast::{
    BodyAst, BodyStatementAst, ClassDefinitionFieldAst, ExpressionAst, ExtendDefinitionFieldAst,
    FileAst, FileStatementAst, FunctionCallAst, FunctionCallType, FunctionDefinitionAst, UseAst,
};
use crate::nom_tools::{SpanInfo, ToRange};

/// Function names treated as sensitive sinks: string-literal arguments
/// passed to one of these are flagged regardless of denylist membership.
const SENSITIVE_SINKS: &[&str] = &["eval", "exec", "system", "spawn_process"];

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One finding produced by the security analyzer.
#[derive(Clone, Debug, VesperError, thiserror::Error)]
pub enum SecurityDiagnostic {
    #[error("identifier '{name}' matches a denylisted pattern")]
    #[diagnostic(code("vesper::security::denylisted_identifier"), help("Rename the identifier or remove it from `security_denylist` if this use is intentional"))]
    DenylistedIdentifier {
        name: String,
        #[label("denylisted by pattern '{pattern}'")]
        position: Range<usize>,
        pattern: String,
        #[source_code]
        code: SourceCode,
    },

    #[error("string literal passed to sensitive sink '{sink}'")]
    #[diagnostic(code("vesper::security::sensitive_sink"), help("Sinks like `eval`/`exec`/`system` should never receive a literal constructed from untrusted input"))]
    SensitiveSinkLiteral {
        sink: String,
        #[label("argument to a sensitive sink")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },

    #[error("import target '{name}' is not present in the module registry")]
    #[diagnostic(code("vesper::security::unregistered_import"), help("Check the import path, or confirm the native bridge module is loaded before compilation"))]
    UnregisteredImport {
        name: String,
        #[label("no module registered under this name")]
        position: Range<usize>,
        #[source_code]
        code: SourceCode,
    },
}

impl SecurityDiagnostic {
    /// Severity unchanged across findings of the same kind: denylisted
    /// identifiers and sensitive-sink literals are always fatal; an
    /// unregistered import is reported here as a warning because the
    /// registry resolver itself already raises a fatal `ModuleNotFound` —
    /// this is defense in depth, not the primary enforcement point.
    pub fn severity(&self) -> Severity {
        match self {
            SecurityDiagnostic::DenylistedIdentifier { .. } => Severity::Error,
            SecurityDiagnostic::SensitiveSinkLiteral { .. } => Severity::Error,
            SecurityDiagnostic::UnregisteredImport { .. } => Severity::Warning,
        }
    }
}

/// Accumulated result of a security pass, in source order.
#[derive(Debug, Default)]
pub struct SecurityReport {
    pub diagnostics: Vec<SecurityDiagnostic>,
}

impl SecurityReport {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(|diagnostic| diagnostic.severity() == Severity::Error)
    }
}

/// Callback the analyzer consults to decide whether an import target is
/// known. Kept as a trait object rather than a hard dependency on
/// `crate::registry` so the security pass can run standalone (e.g. in a
/// unit test) without constructing a full registry.
pub trait ImportKnowledge {
    fn is_known_module(&self, name: &str) -> bool;
}

/// An [`ImportKnowledge`] that treats every import as known; used when no
/// registry is available yet (e.g. before the first module scan).
pub struct AssumeAllImportsKnown;

impl ImportKnowledge for AssumeAllImportsKnown {
    fn is_known_module(&self, _name: &str) -> bool {
        true
    }
}

fn matches_denylist(name: &str, denylist: &[String]) -> Option<String> {
    denylist.iter().find(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            name.starts_with(prefix)
        } else {
            name == pattern.as_str()
        }
    }).cloned()
}

/// Runs the security analyzer over an entire parsed file.
pub fn analyze(file: &FileAst<'_>, denylist: &[String], imports: &dyn ImportKnowledge) -> SecurityReport {
    let mut report = SecurityReport::default();
    for statement in file.statements.iter() {
        analyze_file_statement(statement, denylist, imports, &mut report);
    }
    report
}

fn analyze_file_statement(statement: &FileStatementAst<'_>, denylist: &[String], imports: &dyn ImportKnowledge, report: &mut SecurityReport) {
    match statement {
        FileStatementAst::Class(class) => {
            for field in class.fields.iter() {
                if let ClassDefinitionFieldAst::Function(function) = field {
                    analyze_function(function, denylist, imports, report);
                }
            }
        }
        FileStatementAst::Function(function) => analyze_function(function, denylist, imports, report),
        FileStatementAst::Extend(extend) => {
            for field in extend.fields.iter() {
                if let ExtendDefinitionFieldAst::Function(function) = field {
                    analyze_function(function, denylist, imports, report);
                }
            }
        }
        FileStatementAst::Interface(_) => {}
        FileStatementAst::Use(use_statement) => analyze_use(use_statement, imports, report),
    }
}

fn analyze_use(use_statement: &UseAst<'_>, imports: &dyn ImportKnowledge, report: &mut SecurityReport) {
    let name = use_statement.import.text.as_ref();
    if !imports.is_known_module(name) {
        let effective_name = use_statement.ast_name();
        report.diagnostics.push(SecurityDiagnostic::UnregisteredImport {
            name: name.to_string(),
            position: effective_name.to_range(),
            code: SpanInfo::from(&effective_name).file.into(),
        });
    }
}

fn analyze_function(function: &FunctionDefinitionAst<'_>, denylist: &[String], imports: &dyn ImportKnowledge, report: &mut SecurityReport) {
    if let Some(pattern) = matches_denylist(function.name.text, denylist) {
        report.diagnostics.push(SecurityDiagnostic::DenylistedIdentifier {
            name: function.name.text.to_string(),
            position: function.name.to_range(),
            pattern,
            code: SpanInfo::from(&function.name).file.into(),
        });
    }
    analyze_body(&function.body, denylist, imports, report);
}

fn analyze_body(body: &BodyAst<'_>, denylist: &[String], imports: &dyn ImportKnowledge, report: &mut SecurityReport) {
    for statement in body.statements.iter() {
        analyze_statement(statement, denylist, imports, report);
    }
}

fn analyze_statement(statement: &BodyStatementAst<'_>, denylist: &[String], imports: &dyn ImportKnowledge, report: &mut SecurityReport) {
    match statement {
        BodyStatementAst::VariableDefinition(definition) => {
            if let Some(pattern) = matches_denylist(definition.name.text, denylist) {
                report.diagnostics.push(SecurityDiagnostic::DenylistedIdentifier {
                    name: definition.name.text.to_string(),
                    position: definition.name.to_range(),
                    pattern,
                    code: SpanInfo::from(&definition.name).file.into(),
                });
            }
            if let Some(expression) = &definition.expression {
                analyze_expression(expression, denylist, report);
            }
        }
        BodyStatementAst::VariableAssign(assign) => analyze_expression(&assign.expression, denylist, report),
        BodyStatementAst::FunctionCall(call) => analyze_call(call, denylist, report),
        BodyStatementAst::Throw(throw) => analyze_expression(&throw.expression, denylist, report),
        BodyStatementAst::IfCondition(if_condition) => {
            analyze_expression(&if_condition.expression, denylist, report);
            analyze_body(&if_condition.true_body, denylist, imports, report);
            for (condition, body) in if_condition.else_ifs.iter() {
                analyze_expression(condition, denylist, report);
                analyze_body(body, denylist, imports, report);
            }
            if let Some(false_body) = &if_condition.false_body {
                analyze_body(false_body, denylist, imports, report);
            }
        }
        BodyStatementAst::While(statement) => {
            analyze_expression(&statement.condition, denylist, report);
            analyze_body(&statement.body, denylist, imports, report);
        }
        BodyStatementAst::For(statement) => {
            analyze_body(&statement.body, denylist, imports, report);
        }
        BodyStatementAst::TryExceptFinally(statement) => {
            analyze_body(&statement.try_body, denylist, imports, report);
            for handler in statement.handlers.iter() {
                analyze_body(&handler.body, denylist, imports, report);
            }
            if let Some(finally_body) = &statement.finally_body {
                analyze_body(finally_body, denylist, imports, report);
            }
        }
        BodyStatementAst::Return(statement) => {
            if let Some(expression) = &statement.expression {
                analyze_expression(expression, denylist, report);
            }
        }
        BodyStatementAst::Break(_)
        | BodyStatementAst::Continue(_)
        | BodyStatementAst::NonLocal(_)
        | BodyStatementAst::CapabilityDeclaration(_)
        | BodyStatementAst::DestructuringAssign(_) => {}
    }
}

fn analyze_call(call: &FunctionCallAst<'_>, denylist: &[String], report: &mut SecurityReport) {
    let paths = match &call.path {
        FunctionCallType::This(paths) => paths,
        FunctionCallType::Direct(paths) => paths,
    };

    if let Some(last) = paths.last() {
        if SENSITIVE_SINKS.contains(&last.text) {
            for argument in call.arguments.iter() {
                if let ExpressionAst::Primitive { span, value: crate::ast::PrimitiveValue::String(_) } = argument {
                    report.diagnostics.push(SecurityDiagnostic::SensitiveSinkLiteral {
                        sink: last.text.to_string(),
                        position: span.to_range(),
                        code: SpanInfo::from(span).file.into(),
                    });
                }
            }
        }
        if let Some(pattern) = matches_denylist(last.text, denylist) {
            report.diagnostics.push(SecurityDiagnostic::DenylistedIdentifier {
                name: last.text.to_string(),
                position: last.to_range(),
                pattern,
                code: SpanInfo::from(last).file.into(),
            });
        }
    }

    for argument in call.arguments.iter() {
        analyze_expression(argument, denylist, report);
    }
}

fn analyze_expression(expression: &ExpressionAst<'_>, denylist: &[String], report: &mut SecurityReport) {
    match expression {
        ExpressionAst::FunctionCall(call) => analyze_call(call, denylist, report),
        ExpressionAst::Operation { left, right, .. } => {
            analyze_expression(left, denylist, report);
            analyze_expression(right, denylist, report);
        }
        ExpressionAst::Not(inner) | ExpressionAst::Spread(inner) => analyze_expression(inner, denylist, report),
        ExpressionAst::Ternary { condition, if_true, if_false } => {
            analyze_expression(condition, denylist, report);
            analyze_expression(if_true, denylist, report);
            analyze_expression(if_false, denylist, report);
        }
        ExpressionAst::ArrayLiteral(items) => {
            for item in items.iter() {
                analyze_expression(item, denylist, report);
            }
        }
        ExpressionAst::ObjectLiteral(fields) => {
            for (_, value) in fields.iter() {
                analyze_expression(value, denylist, report);
            }
        }
        ExpressionAst::ArrayAccess { target, index } => {
            analyze_expression(target, denylist, report);
            analyze_expression(index, denylist, report);
        }
        ExpressionAst::Pipeline { left, right } => {
            analyze_expression(left, denylist, report);
            analyze_expression(right, denylist, report);
        }
        ExpressionAst::Match { subject, arms } => {
            analyze_expression(subject, denylist, report);
            for arm in arms.iter() {
                if let Some(guard) = &arm.guard {
                    analyze_expression(guard, denylist, report);
                }
                match &arm.body {
                    crate::ast::ArrowFunctionBodyAst::Expression(expression) => analyze_expression(expression, denylist, report),
                    crate::ast::ArrowFunctionBodyAst::Block(body) => analyze_body(body, denylist, &AssumeAllImportsKnown, report),
                }
            }
        }
        ExpressionAst::Primitive { .. }
        | ExpressionAst::Ref(_)
        | ExpressionAst::Ident(_)
        | ExpressionAst::ArrowFunction(_)
        | ExpressionAst::Destructuring(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, nom_tools::State, process_code};

    #[test]
    fn flags_denylisted_identifier() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func __internal_helper(): void { }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = analyze(&ast, &["__internal*".to_string()], &AssumeAllImportsKnown);
        assert!(report.is_fatal());
    }

    #[test]
    fn flags_literal_passed_to_sensitive_sink() {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"func test(): void { eval("danger"); }"#.to_string()));
        let ast = process_code(&state).unwrap();
        let report = analyze(&ast, &[], &AssumeAllImportsKnown);
        assert!(report.is_fatal());
        assert!(matches!(report.diagnostics[0], SecurityDiagnostic::SensitiveSinkLiteral { .. }));
    }

    #[test]
    fn accepts_clean_function() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func add(a: i32, b: i32): i32 { return a + b; }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = analyze(&ast, &["__internal".to_string()], &AssumeAllImportsKnown);
        assert!(!report.is_fatal());
        assert!(report.diagnostics.is_empty());
    }

    struct NothingKnown;
    impl ImportKnowledge for NothingKnown {
        fn is_known_module(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn flags_unregistered_import_as_non_fatal() {
        let state = State::new(SourceFile::new(vec!["source".into()], "use some.missing.module;".to_string()));
        let ast = process_code(&state).unwrap();
        let report = analyze(&ast, &[], &NothingKnown);
        assert!(!report.is_fatal());
        assert!(matches!(report.diagnostics[0], SecurityDiagnostic::UnregisteredImport { .. }));
    }
}
