//! Statement resolution and validation for the Vesper TIR system.
//!
//! This module provides the core infrastructure for resolving and validating
//! statements within function bodies during semantic analysis. It implements
//! the `ResolveAst` trait for body statements and provides utilities for
//! primitive type resolution and function signature management.
//!
//! # Statement Types
//!
//! The module handles resolution of every statement kind a function body can
//! contain: function calls, variable definitions/assignments/destructuring,
//! control flow (`if`/`while`/`for`/`try`), `return`/`throw`/`break`/`continue`,
//! `nonlocal` and `capability` declarations. TIR's job here is limited to what
//! forward-declaration resolution requires: registering locally-declared
//! variables so later statements and nested scopes can see them, and
//! resolving call targets against known signatures. It is deliberately *not*
//! a full type checker — argument-count/type compatibility and other
//! best-effort diagnostics live in a separate, later pass over the same AST.
//!
//! # Resolution Process
//!
//! Statement resolution follows a two-phase approach:
//!
//! ## Phase 1: Resolve
//! - **Type determination**: Determine the result type of the statement
//! - **Scope validation**: Ensure all referenced identifiers are in scope
//! - **Signature matching**: For function calls, validate against signatures
//!
//! ## Phase 2: Finish
//! - **Finalization**: Complete any deferred resolution tasks
//!
//! # Function Signature Support
//!
//! The module provides data structures for managing function signatures:
//! - **`FunctionArgument`**: Represents function parameters with names and types
//! - **`ClassFunctionSignature`**: Complete signature information for class methods
//!
//! # Primitive Type Resolution
//!
//! The `try_resolve_primitive` function handles resolution of primitive values
//! (strings, numbers, booleans) to their corresponding type representations
//! in the type system.

use std::borrow::Cow;

use crate::{
    ast::{BodyAst, BodyStatementAst, ExpressionAst, PrimitiveValue}, nom_tools::{Span, ToRange}, tir::{context::TirContext, object_signature::TypeValue, scope::ScopeLocation, signature::SignaturePath, TirError}
};

use super::{ResolveAst, TypeLocation};
mod function_call;

pub use function_call::FunctionCallError;

/// Represents a function parameter with its name and type information
///
/// This structure stores the essential information about a function parameter
/// including its identifier name and resolved type location within the type system.
#[derive(Debug)]
#[allow(dead_code)]
pub struct FunctionArgument<'base> {
    pub name: Span<'base>,
    pub field_type: TypeLocation,
}

/// Complete signature information for class method functions
///
/// This structure contains all the metadata necessary to represent a class method
/// including visibility, parameters, return type, and signature path for resolution.
#[derive(Debug)]
#[allow(dead_code)]
pub struct ClassFunctionSignature<'base> {
    pub is_public: bool,
    pub name: Span<'base>,
    pub arguments: Vec<FunctionArgument<'base>>,
    pub return_type: TypeLocation,
    pub signature_path: SignaturePath<'base>,
}

impl<'base> ResolveAst<'base> for BodyStatementAst<'base> {
    fn resolve(&self, context: &mut TirContext<'base>, scope_location: ScopeLocation) -> Result<TypeLocation, TirError> {
        match self {
            BodyStatementAst::FunctionCall(function_call) => Self::resolve_function_call(context, scope_location, function_call),
            BodyStatementAst::VariableDefinition(definition) => {
                let location = match &definition.expression {
                    Some(expression) => resolve_expression(context, scope_location, expression)?,
                    None => TypeLocation::UNDEFINED,
                };

                let scope = context.get_mut_scope(scope_location).expect("Scope not found, it is a bug");
                scope.add_variable(crate::tir::scope::TypeVariableInformation::basic(definition.name.clone(), location))?;
                Ok(location)
            }
            BodyStatementAst::VariableAssign(assign) => resolve_expression(context, scope_location, &assign.expression),
            BodyStatementAst::IfCondition(if_condition) => {
                resolve_expression(context, scope_location, &if_condition.expression)?;
                resolve_body(context, scope_location, &if_condition.true_body)?;
                for (condition, body) in if_condition.else_ifs.iter() {
                    resolve_expression(context, scope_location, condition)?;
                    resolve_body(context, scope_location, body)?;
                }
                if let Some(false_body) = &if_condition.false_body {
                    resolve_body(context, scope_location, false_body)?;
                }
                Ok(TypeLocation::UNDEFINED)
            }
            BodyStatementAst::Return(statement) => match &statement.expression {
                Some(expression) => resolve_expression(context, scope_location, expression),
                None => Ok(TypeLocation::UNDEFINED),
            },
            BodyStatementAst::Break(_) | BodyStatementAst::Continue(_) | BodyStatementAst::NonLocal(_) | BodyStatementAst::CapabilityDeclaration(_) => Ok(TypeLocation::UNDEFINED),
            BodyStatementAst::Throw(statement) => resolve_expression(context, scope_location, &statement.expression),
            BodyStatementAst::While(statement) => {
                resolve_expression(context, scope_location, &statement.condition)?;
                resolve_body(context, scope_location, &statement.body)?;
                Ok(TypeLocation::UNDEFINED)
            }
            BodyStatementAst::For(statement) => {
                resolve_expression(context, scope_location, &statement.iterable)?;
                let scope = context.get_mut_scope(scope_location).expect("Scope not found, it is a bug");
                scope.add_variable(crate::tir::scope::TypeVariableInformation::basic(statement.variable.clone(), TypeLocation::UNDEFINED))?;
                resolve_body(context, scope_location, &statement.body)?;
                Ok(TypeLocation::UNDEFINED)
            }
            BodyStatementAst::TryExceptFinally(statement) => {
                resolve_body(context, scope_location, &statement.try_body)?;
                for handler in statement.handlers.iter() {
                    if let Some(binding) = &handler.binding {
                        let scope = context.get_mut_scope(scope_location).expect("Scope not found, it is a bug");
                        scope.add_variable(crate::tir::scope::TypeVariableInformation::basic(binding.clone(), TypeLocation::UNDEFINED))?;
                    }
                    resolve_body(context, scope_location, &handler.body)?;
                }
                if let Some(finally_body) = &statement.finally_body {
                    resolve_body(context, scope_location, finally_body)?;
                }
                Ok(TypeLocation::UNDEFINED)
            }
            BodyStatementAst::DestructuringAssign(statement) => {
                resolve_expression(context, scope_location, &statement.expression)?;
                let scope = context.get_mut_scope(scope_location).expect("Scope not found, it is a bug");
                for target in statement.pattern.targets.iter() {
                    scope.add_variable(crate::tir::scope::TypeVariableInformation::basic(target.clone(), TypeLocation::UNDEFINED))?;
                }
                Ok(TypeLocation::UNDEFINED)
            }
        }
    }

    fn finish(&self, _: &mut TirContext<'base>, _: ScopeLocation) -> Result<(), TirError> {
        Ok(())
    }

    fn name(&self) -> Cow<'base, str> {
        Cow::Borrowed("")
    }
}

/// Resolves (and finishes) every statement of a nested block in place, used
/// for `if`/`while`/`for`/`try` bodies which share their enclosing function's
/// scope rather than introducing a scope of their own.
fn resolve_body<'base>(context: &mut TirContext<'base>, scope_location: ScopeLocation, body: &BodyAst<'base>) -> Result<(), TirError> {
    for statement in body.statements.iter() {
        statement.resolve(context, scope_location)?;
        statement.finish(context, scope_location)?;
    }
    Ok(())
}

/// Resolves an expression against the current scope, surfacing any unresolvable
/// call targets while otherwise behaving permissively: identifiers, literals,
/// and compound expressions whose precise type cannot yet be determined
/// resolve to [`TypeLocation::UNDEFINED`] rather than erroring, leaving deeper
/// type compatibility checks to the dedicated type-checking pass.
pub(crate) fn resolve_expression<'base>(context: &mut TirContext<'base>, scope_location: ScopeLocation, expression: &ExpressionAst<'base>) -> Result<TypeLocation, TirError> {
    match expression {
        ExpressionAst::Primitive { span, value } => try_resolve_primitive(context, value, span),
        ExpressionAst::Ident(span) => {
            let scope = context.get_scope(scope_location).expect("Scope not found, it is a bug");
            Ok(scope.get_variable(context, span).map(|variable| variable.location).unwrap_or(TypeLocation::UNDEFINED))
        }
        ExpressionAst::Ref(reference) => {
            let scope = context.get_scope(scope_location).expect("Scope not found, it is a bug");
            match reference.names.first() {
                Some(first) => Ok(scope.get_variable(context, first).map(|variable| variable.location).unwrap_or(TypeLocation::UNDEFINED)),
                None => Ok(TypeLocation::UNDEFINED),
            }
        }
        ExpressionAst::FunctionCall(function_call) => BodyStatementAst::resolve_function_call(context, scope_location, function_call),
        ExpressionAst::Not(inner) | ExpressionAst::Spread(inner) => resolve_expression(context, scope_location, inner),
        ExpressionAst::Operation { left, right, .. } => {
            resolve_expression(context, scope_location, left)?;
            resolve_expression(context, scope_location, right)?;
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::Ternary { condition, if_true, if_false } => {
            resolve_expression(context, scope_location, condition)?;
            resolve_expression(context, scope_location, if_true)?;
            resolve_expression(context, scope_location, if_false)?;
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::Pipeline { left, right } => {
            resolve_expression(context, scope_location, left)?;
            resolve_expression(context, scope_location, right)?;
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::ArrayAccess { target, index } => {
            resolve_expression(context, scope_location, target)?;
            resolve_expression(context, scope_location, index)?;
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::ArrayLiteral(items) => {
            for item in items.iter() {
                resolve_expression(context, scope_location, item)?;
            }
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::ObjectLiteral(fields) => {
            for (_, value) in fields.iter() {
                resolve_expression(context, scope_location, value)?;
            }
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::Destructuring(_) => Ok(TypeLocation::UNDEFINED),
        ExpressionAst::ArrowFunction(arrow) => {
            match &arrow.body {
                crate::ast::ArrowFunctionBodyAst::Expression(expression) => resolve_expression(context, scope_location, expression)?,
                crate::ast::ArrowFunctionBodyAst::Block(body) => {
                    resolve_body(context, scope_location, body)?;
                    TypeLocation::UNDEFINED
                }
            };
            Ok(TypeLocation::UNDEFINED)
        }
        ExpressionAst::Match { subject, arms } => {
            resolve_expression(context, scope_location, subject)?;
            for arm in arms.iter() {
                resolve_expression(context, scope_location, &arm.pattern)?;
                if let Some(guard) = &arm.guard {
                    resolve_expression(context, scope_location, guard)?;
                }
                match &arm.body {
                    crate::ast::ArrowFunctionBodyAst::Expression(expression) => {
                        resolve_expression(context, scope_location, expression)?;
                    }
                    crate::ast::ArrowFunctionBodyAst::Block(body) => resolve_body(context, scope_location, body)?,
                }
            }
            Ok(TypeLocation::UNDEFINED)
        }
    }
}

/// Resolves a primitive value to its corresponding type location in the type system
///
/// This function takes a primitive value (string, number, boolean) and finds its
/// corresponding type representation in the TIR type system. It's used during
/// expression resolution to determine the types of literal values.
///
/// # Arguments
/// * `context` - Mutable TIR context for type system access
/// * `primitive` - The primitive value to resolve
/// * `span` - Source location information for error reporting
///
/// # Returns
/// * `Ok(TypeLocation)` - Location of the primitive's type in the type system
/// * `Err(TirError)` - Error if the primitive type is not found
///
/// # Errors
/// Returns `TirError::type_not_found` if the primitive type is not registered
/// in the type system, which typically indicates a compiler setup issue.
pub fn try_resolve_primitive<'base>(context: &mut TirContext<'base>, primitive: &PrimitiveValue<'base>, span: &Span<'base>) -> Result<TypeLocation, TirError> {
    let location = context.types.find_by_value(&TypeValue::PrimitiveType(primitive.to_type()));
    match location {
        Some(location) => Ok(location),
        None => Err(TirError::type_not_found(context, span.to_string(), span.to_range(), span.state.file.clone())),
    }
}

#[cfg(test)]
mod tests {
    use crate::{file::SourceFile, nom_tools::State, process_ast, process_code, tir::TirError};

    #[test]
    fn missing_type_1() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(): a {} ".to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()]).unwrap_err();
        Ok(())
    }

    #[test]
    fn duplicated_function_argument() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], "class a {} func test(a: a, a: a): a {} ".to_string()));
        let ast = process_code(&state)?;
        let error = crate::tir::build(vec![ast.into()]).unwrap_err();

        if let TirError::AlreadyDefined(error) = error {
            assert_eq!(error.new_position, 27..28);
        } else {
            panic!("Expected TirError::AlreadyDefined but got {error:?}");
        }

        Ok(())
    }

    #[test]
    fn valid_types() -> Result<(), TirError> {

        let state_1 = State::new(SourceFile::new(vec!["lib".into()], " class testclass1 {} ".to_string()));
        let state_2 = State::new(SourceFile::new(vec!["main".into()],
            r#"use lib.testclass1 as test;
    func main(a: test): test {}"#.to_string()));

        let source_1 = process_code(&state_1)?;
        let source_2 = process_code(&state_2)?;

        let context = process_ast(vec![source_2.into(), source_1.into()])?;
        assert_eq!(context.modules.len(), 2);

        let main_module = context.modules.iter().find(|(name, _)| *name == "main").unwrap();
        let lib_module = context.modules.iter().find(|(name, _)| *name == "lib").unwrap();

        main_module.1.types.get("main").unwrap();

        assert!(main_module.1.ast_imported_modules.get("testclass1").is_none());
        assert!(main_module.1.ast_imported_modules.get("test").is_some());
        assert!(main_module.1.types.get("testclass1").is_none());

        lib_module.1.types.get("testclass1").unwrap();

        Ok(())
    }

    #[test]
    fn missing_type_2() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(a: a): test {}".to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()]).unwrap_err();
        Ok(())
    }

    #[test]
    fn not_in_class() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], "func test(this): test {}".to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()]).unwrap_err();
        Ok(())
    }

    #[test]
    fn if_while_for_do_not_panic() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"
func test(): void {
    var a = 1;
    if (a) {
        var b = 2;
    } else if (a) {
        var c = 3;
    } else {
        var d = 4;
    }
    while (a) {
        a;
    }
    for (item in a) {
        item;
    }
    try {
        a;
    } except (e) {
        e;
    } finally {
        a;
    }
}
"#.to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()])?;
        Ok(())
    }
}
