//! Best-effort type inference over a parsed AST, independent of the TIR.
//!
//! This pass never aborts compilation — it has no fatal diagnostic of its
//! own. It walks each function body tracking a coarse [`InferredType`] per
//! local binding and flags arithmetic between literal/inferred types that
//! can't possibly agree, or indexing into something that clearly isn't an
//! array or object, as a [`TypeWarning`]. Anything it can't pin down
//! collapses to `Unknown` rather than guessing, since a false positive here
//! would block code the TIR's own declaration-level resolution is perfectly
//! happy with.

use std::collections::HashMap;
use std::ops::Range;

use crate::ast::{
    BodyAst, BodyStatementAst, ClassDefinitionFieldAst, ExpressionAst, ExpressionOperatorType,
    ExtendDefinitionFieldAst, FileAst, FileStatementAst, FunctionArgumentAst, FunctionDefinitionAst,
    PrimitiveValue,
};
use crate::nom_tools::{SpanInfo, ToRange};

/// Coarse type lattice used for best-effort inference. `Unknown` is the
/// bottom element: nothing is ever inferred to conflict with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferredType {
    Unknown,
    Number,
    Str,
    Bool,
    Array,
    Object,
    Function,
}

impl InferredType {
    fn of_primitive(value: &PrimitiveValue<'_>) -> Self {
        match value {
            PrimitiveValue::String(_) => InferredType::Str,
            PrimitiveValue::Bool(_) => InferredType::Bool,
            PrimitiveValue::I8(_)
            | PrimitiveValue::U8(_)
            | PrimitiveValue::I16(_)
            | PrimitiveValue::U16(_)
            | PrimitiveValue::I32(_)
            | PrimitiveValue::U32(_)
            | PrimitiveValue::I64(_)
            | PrimitiveValue::U64(_)
            | PrimitiveValue::Float(_, _)
            | PrimitiveValue::Double(_, _) => InferredType::Number,
        }
    }

    fn compatible_with_arithmetic(self, other: Self) -> bool {
        matches!(self, InferredType::Unknown)
            || matches!(other, InferredType::Unknown)
            || self == other
            || (self == InferredType::Number && other == InferredType::Number)
    }
}

/// A non-fatal finding from the type checker. Severity is always `warning`
/// by contract; there is no `TypeWarning` variant that aborts compilation.
#[derive(Clone, Debug)]
pub struct TypeWarning {
    pub message: String,
    pub position: Range<usize>,
    pub code: crate::file::SourceFile,
}

#[derive(Debug, Default)]
pub struct TypeCheckReport {
    pub warnings: Vec<TypeWarning>,
}

struct Locals {
    bindings: HashMap<String, InferredType>,
}

impl Locals {
    fn new() -> Self {
        Self { bindings: HashMap::new() }
    }

    fn infer(&self, expression: &ExpressionAst<'_>) -> InferredType {
        match expression {
            ExpressionAst::Primitive { value, .. } => InferredType::of_primitive(value),
            ExpressionAst::Ident(span) => self.bindings.get(span.text).copied().unwrap_or(InferredType::Unknown),
            ExpressionAst::ArrayLiteral(_) => InferredType::Array,
            ExpressionAst::ObjectLiteral(_) => InferredType::Object,
            ExpressionAst::ArrowFunction(_) => InferredType::Function,
            ExpressionAst::Not(_) => InferredType::Bool,
            ExpressionAst::Operation { operator, .. } if is_comparison(*operator) => InferredType::Bool,
            ExpressionAst::Operation { left, .. } => self.infer(left),
            _ => InferredType::Unknown,
        }
    }
}

fn is_comparison(operator: ExpressionOperatorType) -> bool {
    matches!(
        operator,
        ExpressionOperatorType::Equal
            | ExpressionOperatorType::NotEqual
            | ExpressionOperatorType::GreaterThan
            | ExpressionOperatorType::GreaterEqualThan
            | ExpressionOperatorType::LessThan
            | ExpressionOperatorType::LessEqualThan
            | ExpressionOperatorType::And
            | ExpressionOperatorType::Or
    )
}

/// Runs the type checker over an entire parsed file, returning every
/// warning found. There is no failure mode: the returned report is always
/// `Ok`-shaped data, never a `Result`.
pub fn check(file: &FileAst<'_>) -> TypeCheckReport {
    let mut report = TypeCheckReport::default();
    for statement in file.statements.iter() {
        check_file_statement(statement, &mut report);
    }
    report
}

fn check_file_statement(statement: &FileStatementAst<'_>, report: &mut TypeCheckReport) {
    match statement {
        FileStatementAst::Class(class) => {
            for field in class.fields.iter() {
                if let ClassDefinitionFieldAst::Function(function) = field {
                    check_function(function, report);
                }
            }
        }
        FileStatementAst::Function(function) => check_function(function, report),
        FileStatementAst::Extend(extend) => {
            for field in extend.fields.iter() {
                if let ExtendDefinitionFieldAst::Function(function) = field {
                    check_function(function, report);
                }
            }
        }
        FileStatementAst::Interface(_) | FileStatementAst::Use(_) => {}
    }
}

fn check_function(function: &FunctionDefinitionAst<'_>, report: &mut TypeCheckReport) {
    let mut locals = Locals::new();
    for argument in function.arguments.iter() {
        if let FunctionArgumentAst::Argument { name, .. } = argument {
            locals.bindings.insert(name.text.to_string(), InferredType::Unknown);
        }
    }
    check_body(&function.body, &mut locals, report);
}

fn check_body(body: &BodyAst<'_>, locals: &mut Locals, report: &mut TypeCheckReport) {
    for statement in body.statements.iter() {
        check_statement(statement, locals, report);
    }
}

fn check_statement(statement: &BodyStatementAst<'_>, locals: &mut Locals, report: &mut TypeCheckReport) {
    match statement {
        BodyStatementAst::VariableDefinition(definition) => {
            let inferred = definition.expression.as_ref().map(|e| locals.infer(e)).unwrap_or(InferredType::Unknown);
            locals.bindings.insert(definition.name.text.to_string(), inferred);
            if let Some(expression) = &definition.expression {
                check_expression(expression, locals, report);
            }
        }
        BodyStatementAst::VariableAssign(assign) => {
            check_expression(&assign.expression, locals, report);
        }
        BodyStatementAst::IfCondition(if_condition) => {
            check_expression(&if_condition.expression, locals, report);
            check_body(&if_condition.true_body, locals, report);
            for (condition, body) in if_condition.else_ifs.iter() {
                check_expression(condition, locals, report);
                check_body(body, locals, report);
            }
            if let Some(false_body) = &if_condition.false_body {
                check_body(false_body, locals, report);
            }
        }
        BodyStatementAst::While(statement) => {
            check_expression(&statement.condition, locals, report);
            check_body(&statement.body, locals, report);
        }
        BodyStatementAst::For(statement) => {
            locals.bindings.insert(statement.variable.text.to_string(), InferredType::Unknown);
            check_body(&statement.body, locals, report);
        }
        BodyStatementAst::TryExceptFinally(statement) => {
            check_body(&statement.try_body, locals, report);
            for handler in statement.handlers.iter() {
                check_body(&handler.body, locals, report);
            }
            if let Some(finally_body) = &statement.finally_body {
                check_body(finally_body, locals, report);
            }
        }
        BodyStatementAst::Return(statement) => {
            if let Some(expression) = &statement.expression {
                check_expression(expression, locals, report);
            }
        }
        BodyStatementAst::Throw(throw) => check_expression(&throw.expression, locals, report),
        BodyStatementAst::FunctionCall(call) => {
            for argument in call.arguments.iter() {
                check_expression(argument, locals, report);
            }
        }
        BodyStatementAst::Break(_)
        | BodyStatementAst::Continue(_)
        | BodyStatementAst::NonLocal(_)
        | BodyStatementAst::CapabilityDeclaration(_)
        | BodyStatementAst::DestructuringAssign(_) => {}
    }
}

fn check_expression(expression: &ExpressionAst<'_>, locals: &Locals, report: &mut TypeCheckReport) {
    match expression {
        ExpressionAst::Operation { left, operator, right } if is_arithmetic(*operator) => {
            let left_type = locals.infer(left);
            let right_type = locals.infer(right);
            if !left_type.compatible_with_arithmetic(right_type) {
                let span = expression_span(left).or_else(|| expression_span(right));
                if let Some(span) = span {
                    report.warnings.push(TypeWarning {
                        message: format!("arithmetic between incompatible inferred types {left_type:?} and {right_type:?}"),
                        position: span.to_range(),
                        code: SpanInfo::from(&span).file,
                    });
                }
            }
            check_expression(left, locals, report);
            check_expression(right, locals, report);
        }
        ExpressionAst::Operation { left, right, .. } => {
            check_expression(left, locals, report);
            check_expression(right, locals, report);
        }
        ExpressionAst::ArrayAccess { target, index } => {
            let target_type = locals.infer(target);
            if !matches!(target_type, InferredType::Unknown | InferredType::Array | InferredType::Object) {
                if let Some(span) = expression_span(target) {
                    report.warnings.push(TypeWarning {
                        message: format!("indexing into inferred type {target_type:?}, which is not an array or object"),
                        position: span.to_range(),
                        code: SpanInfo::from(&span).file,
                    });
                }
            }
            check_expression(target, locals, report);
            check_expression(index, locals, report);
        }
        ExpressionAst::Not(inner) | ExpressionAst::Spread(inner) => check_expression(inner, locals, report),
        ExpressionAst::Ternary { condition, if_true, if_false } => {
            check_expression(condition, locals, report);
            check_expression(if_true, locals, report);
            check_expression(if_false, locals, report);
        }
        ExpressionAst::ArrayLiteral(items) => {
            for item in items.iter() {
                check_expression(item, locals, report);
            }
        }
        ExpressionAst::ObjectLiteral(fields) => {
            for (_, value) in fields.iter() {
                check_expression(value, locals, report);
            }
        }
        ExpressionAst::Pipeline { left, right } => {
            check_expression(left, locals, report);
            check_expression(right, locals, report);
        }
        ExpressionAst::FunctionCall(call) => {
            for argument in call.arguments.iter() {
                check_expression(argument, locals, report);
            }
        }
        ExpressionAst::Match { subject, arms } => {
            check_expression(subject, locals, report);
            for arm in arms.iter() {
                if let Some(guard) = &arm.guard {
                    check_expression(guard, locals, report);
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

fn is_arithmetic(operator: ExpressionOperatorType) -> bool {
    matches!(
        operator,
        ExpressionOperatorType::Add
            | ExpressionOperatorType::Sub
            | ExpressionOperatorType::Mul
            | ExpressionOperatorType::Div
            | ExpressionOperatorType::Mod
    )
}

fn expression_span<'base>(expression: &ExpressionAst<'base>) -> Option<crate::nom_tools::Span<'base>> {
    match expression {
        ExpressionAst::Primitive { span, .. } | ExpressionAst::Ident(span) => Some(span.clone()),
        ExpressionAst::FunctionCall(call) => Some(call.call_span.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, nom_tools::State, process_code};

    #[test]
    fn never_fails_on_well_typed_function() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func add(a: i32, b: i32): i32 { var c = a + b; return c; }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = check(&ast);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn flags_arithmetic_between_literal_string_and_number() {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"func test(): void { var c = "a" + 1; }"#.to_string()));
        let ast = process_code(&state).unwrap();
        let report = check(&ast);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn flags_indexing_a_number_literal() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { var c = 5; var d = c[0]; }".to_string()));
        let ast = process_code(&state).unwrap();
        let report = check(&ast);
        assert_eq!(report.warnings.len(), 1);
    }
}
