//! Call-target resolution for direct calls, method calls (`this.method()`),
//! and module-qualified calls (`module.function()`).
//!
//! Resolution walks the call's path one segment at a time: the first segment
//! is looked up as a variable/type in the enclosing scope (or, for `this.`
//! calls, as the scope's current class type), and every following segment is
//! looked up as a member of whatever type the previous segment resolved to,
//! via [`GetItem::get_item_location`]. Argument expressions are resolved too,
//! so a function call nested inside an argument list still has its own
//! callee validated, but argument count/type compatibility is left to the
//! type-checking pass.

use std::ops::Range;

use vesper_core_macros::VesperError;
use vesper_core_macros_core::SourceCode;
use strum_macros::{EnumDiscriminants, EnumProperty};

use crate::{
    ast::{BodyStatementAst, FunctionCallAst, FunctionCallType}, nom_tools::{Span, SpanInfo, ToRange}, tir::{context::TirContext, object_signature::GetItem, scope::ScopeLocation, TirError}
};

use super::resolve_expression;
use crate::tir::resolver::{ResolverError, TypeLocation};

#[derive(Clone, Debug, VesperError, thiserror::Error)]
#[error("Unresolved call target")]
pub struct UnresolvedCallTarget {
    #[label("No variable, type or member with this name is in scope")]
    pub position: Range<usize>,

    #[source_code]
    pub code: SourceCode,
}

#[derive(Clone, Debug, VesperError, thiserror::Error, EnumDiscriminants, EnumProperty)]
pub enum FunctionCallError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnresolvedCallTarget(Box<UnresolvedCallTarget>),
}

impl From<FunctionCallError> for TirError {
    fn from(value: FunctionCallError) -> Self {
        ResolverError::FunctionCall(Box::new(value)).into()
    }
}

impl FunctionCallError {
    pub fn unresolved_call_target(span: SpanInfo) -> TirError {
        FunctionCallError::UnresolvedCallTarget(
            UnresolvedCallTarget {
                position: span.position.clone(),
                code: span.file.clone().into(),
            }
            .into(),
        )
        .into()
    }
}

impl<'base> BodyStatementAst<'base> {
    pub(crate) fn resolve_function_call(context: &mut TirContext<'base>, scope_location: ScopeLocation, function_call: &FunctionCallAst<'base>) -> Result<TypeLocation, TirError> {
        let paths: &[Span<'base>] = match &function_call.path {
            FunctionCallType::This(paths) => paths,
            FunctionCallType::Direct(paths) => paths,
        };

        let mut callee_location: Option<TypeLocation> = None;

        for path in paths.iter() {
            callee_location = Some(match (callee_location, path.text) {
                (None, "this") => {
                    let scope = context.get_scope(scope_location).expect("Scope not found, it is a bug");
                    scope.current_type
                }
                (None, _) => {
                    let scope = context.get_scope(scope_location).expect("Scope not found, it is a bug");
                    match scope.get_variable(context, path) {
                        Some(variable) => variable.location,
                        None => return Err(FunctionCallError::unresolved_call_target(path.into())),
                    }
                }
                (Some(parent), member) => {
                    let parent_signature = context
                        .types
                        .get_from_location(parent)
                        .ok_or_else(|| FunctionCallError::unresolved_call_target(path.into()))?;
                    parent_signature
                        .value
                        .get_item_location(context, member)
                        .ok_or_else(|| FunctionCallError::unresolved_call_target(path.into()))?
                }
            });
        }

        let callee_location = callee_location.unwrap_or(TypeLocation::UNDEFINED);

        for argument in function_call.arguments.iter() {
            resolve_expression(context, scope_location, argument)?;
        }

        let return_type = match context.types.get_from_location(callee_location) {
            Some(signature) => match signature.value.as_ref() {
                crate::tir::object_signature::TypeValue::Function(function) => function.return_type,
                crate::tir::object_signature::TypeValue::InterfaceFunction(function) => function.return_type,
                _ => TypeLocation::UNDEFINED,
            },
            None => TypeLocation::UNDEFINED,
        };

        Ok(return_type)
    }
}

#[cfg(test)]
mod tests {
    use crate::{file::SourceFile, nom_tools::State, process_code, tir::TirError};

    #[test]
    fn direct_call_to_sibling_function() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"
func abc(): string {
}

func test(): string {
    abc();
}
"#.to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()])?;
        Ok(())
    }

    #[test]
    fn method_call_via_this() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"
class TestClass {
    func init(this): string {
        this.abc();
    }

    func abc(this): string {
    }
}
"#.to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()])?;
        Ok(())
    }

    #[test]
    fn call_with_arguments() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"
class TestClass {
    func init(this): string {
        this.abc("hello");
    }

    func abc(this, a: string): string {
    }
}
"#.to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()])?;
        Ok(())
    }

    #[test]
    fn unresolved_call_target_is_reported() -> Result<(), TirError> {
        let state = State::new(SourceFile::new(vec!["source".into()], r#"
func test(): string {
    does_not_exist();
}
"#.to_string()));
        let ast = process_code(&state)?;
        crate::tir::build(vec![ast.into()]).unwrap_err();
        Ok(())
    }
}
