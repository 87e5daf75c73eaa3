//! Code emitter: lowers a validated, desugared, security-cleared AST into
//! Rust source text that links against `vesper_runtime`.
//!
//! Every expression the emitted code evaluates produces a
//! `vesper_runtime::callback::Value`; there is no attempt to recover Rust's
//! own type system along the way; every emitted function has the uniform
//! signature `fn(...) -> Result<Value, VesperException>` so that every
//! fallible runtime helper (`ops`, `builtin`, `safe_attr`, `safe_call`,
//! capability checks) composes with a plain `?`.
//!
//! The call-site algorithm below is the part of this module that actually
//! enforces the whitelist: every call this emitter lowers has already been
//! admitted by the [`AllowedFunctionsRegistry`] built for this compilation
//! unit, or is explicitly routed through one of the runtime's own guards
//! (`safe_attr`/`safe_call`) when the emitter cannot prove admissibility
//! statically.

pub mod error;
pub mod source_map;

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::allowed_functions::{AllowedFunctionsRegistry, CallTarget};
use crate::ast::{
    ArrowFunctionAst, ArrowFunctionBodyAst, BodyAst, BodyStatementAst, CapabilityDeclarationAst, ClassDefinitionFieldAst, DestructuringAssignAst, ExpressionAst, ExtendDefinitionFieldAst,
    FileAst, FileStatementAst, FunctionArgumentAst, FunctionCallAst, FunctionCallType, FunctionDefinitionAst, FunctionDefinitionLocationAst, IfConditionAst, PrimitiveValue,
};
use crate::config::OutputMode;
use crate::nom_tools::{Span, SpanInfo, ToRange};
use crate::transformer::TransformedFile;

pub use error::EmitError;
pub use source_map::{line_col, SourceMap, SourceMapEntry};

/// Rust reserved words a Vesper identifier might collide with. Excludes
/// `self`/`Self`/`super`/`crate` (Vesper's own self-reference keyword is
/// `this`, and these four can never be written as raw identifiers anyway).
const RESERVED_WORDS: &[&str] = &[
    "as", "break", "const", "continue", "else", "enum", "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "static",
    "struct", "trait", "true", "type", "unsafe", "use", "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "typeof",
    "unsized", "virtual", "yield", "try", "union",
];

/// Rewrites `name` so it never collides with a Rust keyword. The mapping is
/// deterministic and bijective: `r#name` always means "the Vesper identifier
/// `name`, which happens to collide with a Rust keyword", and stripping the
/// `r#` prefix always recovers it.
pub fn safe_ident(name: &str) -> String {
    if RESERVED_WORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Where this emitter run's output is headed: whether imported `sl_source`
/// modules get their own `mod` declaration (`multi_file`) or are left as a
/// documentation marker inlined at the import site (`single_file`).
/// Whether undefined bare identifiers abort compilation (`Compile`) or pass
/// through verbatim so a REPL session can bind them later (`Repl`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Compile,
    Repl,
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub output_mode: OutputMode,
    pub mode: EmitMode,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { output_mode: OutputMode::SingleFile, mode: EmitMode::Compile }
    }
}

/// The generated Rust source plus the source map recording where every
/// emitted line originating in user code came from.
#[derive(Debug, Clone)]
pub struct EmitArtifact {
    pub code: String,
    pub source_map: SourceMap,
}

/// A stack of lexical scopes, each holding the names bound directly within
/// it (parameters, `var`/`const` declarations, loop/except bindings). Used
/// only to tell a variable reference apart from a bare reference to a
/// top-level function (the latter must be emitted as a late-bound
/// callback, not a direct identifier).
#[derive(Default)]
struct Scopes {
    frames: Vec<HashSet<String>>,
}

impl Scopes {
    fn new() -> Self {
        Self { frames: vec![HashSet::new()] }
    }

    fn push(&mut self) {
        self.frames.push(HashSet::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn declare(&mut self, name: &str) {
        self.frames.last_mut().expect("scope stack always has a frame").insert(name.to_string());
    }

    fn is_local(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|frame| frame.contains(name))
    }
}

/// Lowers one desugared file to Rust source. `module_qualified_name` is the
/// name this file's own top-level functions are registered under in the
/// process-wide callback registry (e.g. `"main"`, or a dotted module path),
/// used when a bare function name must be wrapped as a late-bound callback.
pub fn emit<'base>(
    transformed: &TransformedFile<'base>,
    allowed: &AllowedFunctionsRegistry,
    source_file_name: impl Into<String>,
    module_qualified_name: impl Into<String>,
    options: EmitOptions,
) -> Result<EmitArtifact, EmitError> {
    let mut emitter = Emitter {
        allowed,
        options,
        source_file_name: source_file_name.into(),
        module_qualified_name: module_qualified_name.into(),
        classes: collect_classes(&transformed.file),
        current_class: None,
        scopes: Scopes::new(),
        source_map: SourceMap::default(),
        host_line: 1,
        _marker: std::marker::PhantomData,
    };

    let mut out = String::new();
    writeln!(out, "#![allow(dead_code, unused_mut, unused_variables, clippy::all)]").ok();
    writeln!(out, "use vesper_runtime::callback::Value;").ok();
    writeln!(out, "use vesper_runtime::exception::VesperException;").ok();
    out.push('\n');
    emitter.host_line = count_lines(&out);

    emitter.emit_capability_manifest(&transformed.capability_preamble, &mut out);

    for statement in transformed.file.statements.iter() {
        emitter.emit_file_statement(statement, &mut out)?;
        out.push('\n');
        emitter.host_line = count_lines(&out);
    }

    Ok(EmitArtifact { code: out, source_map: emitter.source_map })
}

fn count_lines(text: &str) -> usize {
    text.matches('\n').count() + 1
}

/// Scans a file's own top-level `class`/`extend` statements for method
/// names, so a bare-identifier call can be told apart from a class
/// constructor call without consulting the module registry (same-file
/// classes are not in `AllowedFunctionsRegistry`'s module tables).
fn collect_classes(file: &FileAst<'_>) -> HashMap<String, Vec<String>> {
    let mut classes: HashMap<String, Vec<String>> = HashMap::new();
    for statement in file.statements.iter() {
        match statement {
            FileStatementAst::Class(class) => {
                let methods = class
                    .fields
                    .iter()
                    .filter_map(|field| match field {
                        ClassDefinitionFieldAst::Function(f) => Some(f.name.text.to_string()),
                        ClassDefinitionFieldAst::Field(_) => None,
                    })
                    .collect();
                classes.insert(class.name.text.to_string(), methods);
            }
            FileStatementAst::Extend(extend) => {
                let name = extend.name.names.last().map(|s| s.text.to_string()).unwrap_or_default();
                let entry = classes.entry(name).or_default();
                for field in extend.fields.iter() {
                    if let ExtendDefinitionFieldAst::Function(f) = field {
                        entry.push(f.name.text.to_string());
                    }
                }
            }
            FileStatementAst::Function(_) | FileStatementAst::Interface(_) | FileStatementAst::Use(_) => {}
        }
    }
    classes
}

struct Emitter<'a, 'base> {
    allowed: &'a AllowedFunctionsRegistry,
    options: EmitOptions,
    source_file_name: String,
    module_qualified_name: String,
    classes: HashMap<String, Vec<String>>,
    current_class: Option<String>,
    scopes: Scopes,
    source_map: SourceMap,
    /// Next host line a source-map entry would be recorded against. Kept
    /// approximate (line-granularity, recomputed from the buffer already
    /// written) rather than threading a precise column through every
    /// `write!` call; good enough for the round-trip property the map is
    /// meant to uphold (every user-originated line has *a* mapping).
    host_line: usize,
    _marker: std::marker::PhantomData<&'base ()>,
}

// Split out of the tuple-struct-like literal above so field init shorthand
// reads cleanly at the call site in `emit`.
impl<'a, 'base> Emitter<'a, 'base> {}

impl<'a, 'base> Emitter<'a, 'base> {
    fn source_code_at(&self, span: &Span<'base>) -> vesper_core_macros_core::SourceCode {
        SpanInfo::from(span).file.into()
    }

    fn record_mapping(&mut self, span: &Span<'base>, symbol: Option<String>) {
        let host_line = count_lines_at_insert(self.host_line);
        let (sl_line, sl_column) = line_col(span.state.file.code.as_str(), span.position.start);
        self.source_map.push(SourceMapEntry { host_line, host_column: 1, sl_line, sl_column, sl_file: self.source_file_name.clone(), symbol });
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", self.module_qualified_name, name)
    }

    fn emit_capability_manifest(&mut self, preamble: &[CapabilityDeclarationAst<'base>], out: &mut String) {
        writeln!(out, "/// Capabilities this module's functions draw on, hoisted here from every").ok();
        writeln!(out, "/// `capability` statement that appeared anywhere in the source file.").ok();
        writeln!(out, "pub fn __vesper_capability_manifest() -> &'static [(&'static str, Option<&'static str>)] {{").ok();
        write!(out, "    &[").ok();
        for declaration in preamble.iter() {
            write!(
                out,
                "(\"{}\", {}), ",
                declaration.capability_type.text,
                declaration.resource_pattern.as_ref().map(|p| format!("Some(\"{}\")", p.text)).unwrap_or_else(|| "None".to_string())
            )
            .ok();
        }
        writeln!(out, "]").ok();
        writeln!(out, "}}").ok();
        out.push('\n');
    }

    fn emit_file_statement(&mut self, statement: &FileStatementAst<'base>, out: &mut String) -> Result<(), EmitError> {
        match statement {
            FileStatementAst::Use(use_statement) => {
                let alias = use_statement.ast_name().text;
                match self.options.output_mode {
                    OutputMode::SingleFile => {
                        writeln!(out, "// use {} (as {alias}); resolved dynamically through the module registry at call sites.", use_statement.import.text).ok();
                    }
                    OutputMode::MultiFile => {
                        writeln!(out, "// `{alias}` resolves through `vesper_runtime::callback` late binding; see {}.rs for its own emitted unit.", use_statement.import.text).ok();
                        writeln!(out, "#[allow(unused)]\nmod {} {{}}", safe_ident(alias)).ok();
                    }
                }
                Ok(())
            }
            FileStatementAst::Interface(_) => Ok(()),
            FileStatementAst::Function(function) => self.emit_function(function, None, out),
            FileStatementAst::Class(class) => {
                self.current_class = Some(class.name.text.to_string());
                writeln!(out, "// class {}", class.name.text).ok();
                for field in class.fields.iter() {
                    match field {
                        ClassDefinitionFieldAst::Field(_) => {}
                        ClassDefinitionFieldAst::Function(function) => {
                            self.emit_function(function, Some(class.name.text), out)?;
                        }
                    }
                }
                self.emit_constructor(class.name.text, &class.fields, out);
                self.current_class = None;
                Ok(())
            }
            FileStatementAst::Extend(extend) => {
                let class_name = extend.name.names.last().map(|s| s.text).unwrap_or_default();
                self.current_class = Some(class_name.to_string());
                writeln!(out, "// extend {}", class_name).ok();
                for field in extend.fields.iter() {
                    if let ExtendDefinitionFieldAst::Function(function) = field {
                        self.emit_function(function, Some(class_name), out)?;
                    }
                }
                self.current_class = None;
                Ok(())
            }
        }
    }

    /// Every class gets a positional constructor over its non-method fields,
    /// in declaration order, producing a `Value::Object`.
    fn emit_constructor(&mut self, class_name: &str, fields: &[ClassDefinitionFieldAst<'base>], out: &mut String) {
        let field_names: Vec<&str> = fields
            .iter()
            .filter_map(|f| match f {
                ClassDefinitionFieldAst::Field(field) => Some(field.name.text),
                ClassDefinitionFieldAst::Function(_) => None,
            })
            .collect();
        let params = field_names.iter().map(|n| format!("{}: Value", safe_ident(n))).collect::<Vec<_>>().join(", ");
        writeln!(out, "pub fn {}(({params}): ({})) -> Result<Value, VesperException> {{", mangled_class_ctor(class_name), "Value, ".repeat(field_names.len())).ok();
        writeln!(out, "    let mut __fields = indexmap::IndexMap::new();").ok();
        writeln!(out, "    __fields.insert(\"__class__\".to_string(), Value::Str(\"{class_name}\".to_string()));").ok();
        for name in field_names.iter() {
            writeln!(out, "    __fields.insert(\"{name}\".to_string(), {});", safe_ident(name)).ok();
        }
        writeln!(out, "    Ok(Value::Object(__fields))").ok();
        writeln!(out, "}}").ok();
    }

    fn emit_function(&mut self, function: &FunctionDefinitionAst<'base>, class_name: Option<&str>, out: &mut String) -> Result<(), EmitError> {
        self.scopes.push();
        let name = match class_name {
            Some(class) => mangled_method_name(class, function.name.text),
            None => safe_ident(function.name.text),
        };

        let mut params = Vec::new();
        for argument in function.arguments.iter() {
            match argument {
                FunctionArgumentAst::This(_) => params.push("this: &mut Value".to_string()),
                FunctionArgumentAst::Argument { name, .. } => {
                    self.scopes.declare(name.text);
                    params.push(format!("{}: Value", safe_ident(name.text)));
                }
            }
        }

        writeln!(out, "pub fn {name}({}) -> Result<Value, VesperException> {{", params.join(", ")).ok();
        self.emit_body_statements(&function.body, out)?;
        writeln!(out, "    Ok(Value::Null)").ok();
        writeln!(out, "}}").ok();
        self.scopes.pop();

        if class_name.is_none() {
            vesper_runtime_registration_hint(&mut *out, &self.qualified(function.name.text), &name);
        }
        Ok(())
    }

    fn emit_body_statements(&mut self, body: &BodyAst<'base>, out: &mut String) -> Result<(), EmitError> {
        for statement in body.statements.iter() {
            self.emit_statement(statement, out)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, statement: &BodyStatementAst<'base>, out: &mut String) -> Result<(), EmitError> {
        match statement {
            BodyStatementAst::VariableDefinition(definition) => {
                self.scopes.declare(definition.name.text);
                self.record_mapping(&definition.name, Some(definition.name.text.to_string()));
                let expr = match &definition.expression {
                    Some(expression) => self.emit_expression(expression)?,
                    None => "Value::Null".to_string(),
                };
                writeln!(out, "    let mut {} = {expr};", safe_ident(definition.name.text)).ok();
                Ok(())
            }
            BodyStatementAst::VariableAssign(assign) => {
                let expr = self.emit_expression(&assign.expression)?;
                writeln!(out, "    {} = {expr};", safe_ident(assign.name.text)).ok();
                Ok(())
            }
            BodyStatementAst::FunctionCall(call) => {
                if is_throw(call) {
                    let expr = self.emit_expression(&call.arguments[0])?;
                    writeln!(out, "    return Err(VesperException::new({expr}));").ok();
                } else {
                    let expr = self.emit_call(call)?;
                    writeln!(out, "    {expr};").ok();
                }
                Ok(())
            }
            BodyStatementAst::IfCondition(if_condition) => self.emit_if(if_condition, out),
            BodyStatementAst::Return(statement) => {
                let expr = match &statement.expression {
                    Some(expression) => self.emit_expression(expression)?,
                    None => "Value::Null".to_string(),
                };
                writeln!(out, "    return Ok({expr});").ok();
                Ok(())
            }
            BodyStatementAst::Break(_) => {
                writeln!(out, "    break;").ok();
                Ok(())
            }
            BodyStatementAst::Continue(_) => {
                writeln!(out, "    continue;").ok();
                Ok(())
            }
            BodyStatementAst::Throw(throw) => {
                let expr = self.emit_expression(&throw.expression)?;
                writeln!(out, "    return Err(VesperException::new({expr}));").ok();
                Ok(())
            }
            BodyStatementAst::While(statement) => {
                let cond = self.emit_expression(&statement.condition)?;
                writeln!(out, "    while ({cond}).is_truthy() {{").ok();
                self.scopes.push();
                self.emit_body_statements(&statement.body, out)?;
                self.scopes.pop();
                writeln!(out, "    }}").ok();
                Ok(())
            }
            BodyStatementAst::For(statement) => {
                let iterable = self.emit_expression(&statement.iterable)?;
                self.scopes.push();
                self.scopes.declare(statement.variable.text);
                writeln!(out, "    for {} in ({iterable}).iterate()?.into_iter() {{", safe_ident(statement.variable.text)).ok();
                self.emit_body_statements(&statement.body, out)?;
                writeln!(out, "    }}").ok();
                self.scopes.pop();
                Ok(())
            }
            BodyStatementAst::NonLocal(nonlocal) => {
                let names = nonlocal.names.iter().map(|n| n.text).collect::<Vec<_>>().join(", ");
                writeln!(out, "    // nonlocal {names}; enclosing bindings are shared Value locals, reassigned in place above.").ok();
                Ok(())
            }
            BodyStatementAst::CapabilityDeclaration(_) => Ok(()), // hoisted to the module's capability manifest by the transformer
            BodyStatementAst::TryExceptFinally(statement) => self.emit_try(statement, out),
            BodyStatementAst::DestructuringAssign(destructuring) => self.emit_destructuring(destructuring, out),
        }
    }

    fn emit_destructuring(&mut self, destructuring: &DestructuringAssignAst<'base>, out: &mut String) -> Result<(), EmitError> {
        // The transformer always lowers this away before the emitter runs;
        // reached only if the emitter is invoked directly on a pre-transform
        // tree, which is a caller error rather than a user-facing one.
        let _ = destructuring;
        let _ = out;
        Err(EmitError::CodeGenInternal { message: "destructuring assignment reached the emitter untransformed".to_string() })
    }

    fn emit_if(&mut self, if_condition: &IfConditionAst<'base>, out: &mut String) -> Result<(), EmitError> {
        let cond = self.emit_expression(&if_condition.expression)?;
        writeln!(out, "    if ({cond}).is_truthy() {{").ok();
        self.scopes.push();
        self.emit_body_statements(&if_condition.true_body, out)?;
        self.scopes.pop();

        for (else_if_cond, else_if_body) in if_condition.else_ifs.iter() {
            let cond = self.emit_expression(else_if_cond)?;
            writeln!(out, "    }} else if ({cond}).is_truthy() {{").ok();
            self.scopes.push();
            self.emit_body_statements(else_if_body, out)?;
            self.scopes.pop();
        }

        if let Some(false_body) = &if_condition.false_body {
            writeln!(out, "    }} else {{").ok();
            self.scopes.push();
            self.emit_body_statements(false_body, out)?;
            self.scopes.pop();
        }
        writeln!(out, "    }}").ok();
        Ok(())
    }

    /// `except` clauses have no type discriminator (every thrown value is a
    /// plain [`vesper_runtime::callback::Value`] payload); only the first
    /// handler is wired as the catch-all, matching the single dynamic
    /// exception type the runtime defines. Recorded as an Open Question
    /// resolution in DESIGN.md.
    fn emit_try(&mut self, statement: &crate::ast::TryExceptFinallyAst<'base>, out: &mut String) -> Result<(), EmitError> {
        writeln!(out, "    let __try_result: Result<Value, VesperException> = (|| -> Result<Value, VesperException> {{").ok();
        self.scopes.push();
        self.emit_body_statements(&statement.try_body, out)?;
        writeln!(out, "        Ok(Value::Null)").ok();
        self.scopes.pop();
        writeln!(out, "    }})();").ok();

        if let Some(handler) = statement.handlers.first() {
            writeln!(out, "    if let Err(__caught) = __try_result {{").ok();
            self.scopes.push();
            if let Some(binding) = &handler.binding {
                self.scopes.declare(binding.text);
                writeln!(out, "        let {} = __caught.payload;", safe_ident(binding.text)).ok();
            }
            self.emit_body_statements(&handler.body, out)?;
            self.scopes.pop();
            writeln!(out, "    }}").ok();
        }

        if let Some(finally_body) = &statement.finally_body {
            self.scopes.push();
            self.emit_body_statements(finally_body, out)?;
            self.scopes.pop();
        }
        Ok(())
    }

    fn emit_expression(&mut self, expression: &ExpressionAst<'base>) -> Result<String, EmitError> {
        match expression {
            ExpressionAst::Primitive { value, .. } => Ok(emit_primitive(value)),
            ExpressionAst::Ident(span) => self.emit_ident(span),
            ExpressionAst::Ref(reference) => self.emit_ref(&reference.names),
            ExpressionAst::Not(inner) => Ok(format!("vesper_runtime::ops::not(&{})", self.emit_expression(inner)?)),
            ExpressionAst::FunctionCall(call) => self.emit_call(call),
            ExpressionAst::Operation { left, operator, right } => self.emit_operation(left, *operator, right),
            ExpressionAst::Ternary { condition, if_true, if_false } => {
                let cond = self.emit_expression(condition)?;
                let t = self.emit_expression(if_true)?;
                let f = self.emit_expression(if_false)?;
                Ok(format!("if ({cond}).is_truthy() {{ {t} }} else {{ {f} }}"))
            }
            ExpressionAst::ArrowFunction(arrow) => self.emit_arrow(arrow),
            ExpressionAst::ArrayLiteral(items) => {
                let rendered: Result<Vec<String>, EmitError> = items.iter().map(|item| self.emit_expression(item)).collect();
                Ok(format!("Value::List(vec![{}])", rendered?.join(", ")))
            }
            ExpressionAst::ObjectLiteral(fields) => {
                let mut body = String::from("{ let mut __obj = indexmap::IndexMap::new(); ");
                for (key, value) in fields.iter() {
                    let value = self.emit_expression(value)?;
                    write!(body, "__obj.insert(\"{}\".to_string(), {value}); ", key.text).ok();
                }
                body.push_str("Value::Object(__obj) }");
                Ok(body)
            }
            ExpressionAst::Destructuring(_) => Err(EmitError::CodeGenInternal { message: "destructuring expression reached the emitter untransformed".to_string() }),
            ExpressionAst::Spread(inner) => {
                // Only meaningful inside a call argument list; the call
                // emitter special-cases `Spread` before it ever calls
                // `emit_expression` on an argument directly.
                self.emit_expression(inner)
            }
            ExpressionAst::Match { subject, arms } => self.emit_match(subject, arms),
            ExpressionAst::Pipeline { left, right } => self.emit_pipeline(left, right),
            ExpressionAst::ArrayAccess { target, index } => {
                let target = self.emit_expression(target)?;
                let index = self.emit_expression(index)?;
                Ok(format!("({target}).index(&{index})?"))
            }
        }
    }

    fn emit_ident(&mut self, span: &Span<'base>) -> Result<String, EmitError> {
        let name = span.text;
        if name == "this" {
            return Ok("this.clone()".to_string());
        }
        if self.scopes.is_local(name) {
            return Ok(format!("{}.clone()", safe_ident(name)));
        }
        match self.allowed.resolve(name) {
            Some(CallTarget::UserDefined) => Ok(format!("Value::Callback(vesper_runtime::callback::wrap_callback(\"{}\"))", self.qualified(name))),
            Some(CallTarget::Builtin) => Ok(format!("Value::Callback(vesper_runtime::callback::wrap_callback(\"builtin.{name}\"))")),
            Some(CallTarget::Module { .. }) => Err(EmitError::unknown_function(name, &[], span.to_range(), self.source_code_at(span))),
            None => {
                if self.options.mode == EmitMode::Repl {
                    Ok(safe_ident(name))
                } else {
                    Err(EmitError::unknown_function(name, &self.allowed.suggest(name), span.to_range(), self.source_code_at(span)))
                }
            }
        }
    }

    fn emit_ref(&mut self, names: &[Span<'base>]) -> Result<String, EmitError> {
        let head = &names[0];
        let rest = &names[1..];

        if head.text == "this" {
            let mut expr = "this.clone()".to_string();
            for segment in rest.iter() {
                expr = format!("({expr}).get_field(\"{}\")?", segment.text);
            }
            return Ok(expr);
        }

        if self.scopes.is_local(head.text) {
            let mut expr = safe_ident(head.text);
            for segment in rest.iter() {
                expr = format!("({expr}).get_field(\"{}\")?", segment.text);
            }
            return Ok(expr);
        }

        if let Some(alias_fn) = rest.first() {
            if self.allowed.imported_module(head.text).is_some() {
                if self.allowed.module_has_function(head.text, alias_fn.text) && rest.len() == 1 {
                    return Ok(format!("Value::Callback(vesper_runtime::callback::wrap_callback(\"{}.{}\"))", head.text, alias_fn.text));
                }
                return Err(EmitError::unknown_module_function(head.text, alias_fn.text, &[], alias_fn.to_range(), self.source_code_at(alias_fn)));
            }
        }

        // Unresolved base: wrap as a late-bound callback by best-effort
        // qualified name, then chain any remaining field access.
        let mut expr = format!("Value::Callback(vesper_runtime::callback::wrap_callback(\"{}\"))", self.qualified(head.text));
        for segment in rest.iter() {
            expr = format!("({expr}).get_field(\"{}\")?", segment.text);
        }
        Ok(expr)
    }

    fn emit_operation(&mut self, left: &ExpressionAst<'base>, operator: crate::ast::ExpressionOperatorType, right: &ExpressionAst<'base>) -> Result<String, EmitError> {
        use crate::ast::ExpressionOperatorType as Op;
        let l = self.emit_expression(left)?;
        let r = self.emit_expression(right)?;
        Ok(match operator {
            Op::Add => format!("vesper_runtime::ops::add(&{l}, &{r})?"),
            Op::Sub => format!("vesper_runtime::ops::sub(&{l}, &{r})?"),
            Op::Mul => format!("vesper_runtime::ops::mul(&{l}, &{r})?"),
            Op::Div => format!("vesper_runtime::ops::div(&{l}, &{r})?"),
            Op::Mod => format!("vesper_runtime::ops::rem(&{l}, &{r})?"),
            Op::Equal => format!("vesper_runtime::ops::eq(&{l}, &{r})"),
            Op::NotEqual => format!("vesper_runtime::ops::ne(&{l}, &{r})"),
            Op::LessThan => format!("vesper_runtime::ops::lt(&{l}, &{r})?"),
            Op::LessEqualThan => format!("vesper_runtime::ops::le(&{l}, &{r})?"),
            Op::GreaterThan => format!("vesper_runtime::ops::gt(&{l}, &{r})?"),
            Op::GreaterEqualThan => format!("vesper_runtime::ops::ge(&{l}, &{r})?"),
            Op::Xor => format!("vesper_runtime::ops::bitxor(&{l}, &{r})?"),
            Op::LogicalOr => format!("vesper_runtime::ops::bitor(&{l}, &{r})?"),
            Op::LogicalAnd => format!("vesper_runtime::ops::bitand(&{l}, &{r})?"),
            Op::BitwiseShiftLeft => format!("vesper_runtime::ops::shl(&{l}, &{r})?"),
            Op::BitwiseShiftRight => format!("vesper_runtime::ops::shr(&{l}, &{r})?"),
            Op::And => format!("Value::Bool(({l}).is_truthy() && ({r}).is_truthy())"),
            Op::Or => format!("Value::Bool(({l}).is_truthy() || ({r}).is_truthy())"),
        })
    }

    fn emit_arrow(&mut self, arrow: &ArrowFunctionAst<'base>) -> Result<String, EmitError> {
        self.scopes.push();
        let mut params = Vec::new();
        for (index, argument) in arrow.arguments.iter().enumerate() {
            match argument {
                FunctionArgumentAst::This(_) => continue,
                FunctionArgumentAst::Argument { name, .. } => {
                    self.scopes.declare(name.text);
                    params.push(format!("let {} = __args[{index}].clone();", safe_ident(name.text)));
                }
            }
        }
        let body = match &arrow.body {
            ArrowFunctionBodyAst::Block(body) => body,
            ArrowFunctionBodyAst::Expression(_) => unreachable!("the transformer always wraps expression arrow bodies into a block"),
        };
        let mut inner = String::new();
        self.emit_body_statements(body, &mut inner)?;
        self.scopes.pop();

        Ok(format!(
            "std::sync::Arc::new(move |__args: &[Value]| -> Result<Value, VesperException> {{ {params} {inner} Ok(Value::Null) }}) as std::sync::Arc<dyn Fn(&[Value]) -> Result<Value, VesperException> + Send + Sync>",
            params = params.join(" "),
        ))
    }

    fn emit_match(&mut self, subject: &ExpressionAst<'base>, arms: &[crate::ast::MatchArmAst<'base>]) -> Result<String, EmitError> {
        let subject_expr = self.emit_expression(subject)?;
        let mut body = format!("{{ let __subject = {subject_expr}; ");
        for (index, arm) in arms.iter().enumerate() {
            let is_wildcard = matches!(&arm.pattern, ExpressionAst::Ident(span) if span.text == "_");
            let keyword = if index == 0 { "if" } else { "else if" };

            self.scopes.push();
            let condition = if is_wildcard {
                "true".to_string()
            } else {
                let pattern = self.emit_expression(&arm.pattern)?;
                let base = format!("(vesper_runtime::ops::eq(&__subject, &{pattern})).is_truthy()");
                match &arm.guard {
                    Some(guard) => format!("{base} && ({}).is_truthy()", self.emit_expression(guard)?),
                    None => base,
                }
            };

            let arm_body = match &arm.body {
                ArrowFunctionBodyAst::Block(block) => {
                    let mut inner = String::new();
                    self.emit_body_statements(block, &mut inner)?;
                    format!("{{ let __arm: Result<Value, VesperException> = (|| -> Result<Value, VesperException> {{ {inner} Ok(Value::Null) }})(); __arm? }}")
                }
                ArrowFunctionBodyAst::Expression(_) => unreachable!("the transformer always wraps expression match-arm bodies into a block"),
            };
            self.scopes.pop();

            write!(body, "{keyword} {condition} {{ {arm_body} }} ").ok();
        }
        body.push_str("else { Value::Null } }");
        Ok(body)
    }

    fn emit_pipeline(&mut self, left: &ExpressionAst<'base>, right: &ExpressionAst<'base>) -> Result<String, EmitError> {
        match right {
            ExpressionAst::FunctionCall(call) => {
                let mut with_left = FunctionCallAst {
                    call_span: call.call_span.clone(),
                    arguments_span: call.arguments_span.clone(),
                    path: clone_call_type(&call.path),
                    arguments: Vec::with_capacity(call.arguments.len() + 1),
                };
                with_left.arguments.push(clone_expr_for_pipeline(left));
                with_left.arguments.extend(call.arguments.iter().map(clone_expr_for_pipeline));
                self.emit_call(&with_left)
            }
            ExpressionAst::Ident(span) => {
                let synthetic = FunctionCallAst {
                    call_span: span.clone(),
                    arguments_span: span.clone(),
                    path: FunctionCallType::Direct(vec![span.clone()]),
                    arguments: vec![clone_expr_for_pipeline(left)],
                };
                self.emit_call(&synthetic)
            }
            ExpressionAst::Ref(reference) => {
                let synthetic = FunctionCallAst {
                    call_span: reference.names.last().cloned().expect("ref always has a path component"),
                    arguments_span: reference.names.last().cloned().expect("ref always has a path component"),
                    path: FunctionCallType::Direct(reference.names.clone()),
                    arguments: vec![clone_expr_for_pipeline(left)],
                };
                self.emit_call(&synthetic)
            }
            _ => {
                let left_expr = self.emit_expression(left)?;
                let right_expr = self.emit_expression(right)?;
                Ok(format!("match {right_expr} {{ Value::Callback(__cb) => __cb.invoke(&[{left_expr}])?, __other => return Err(VesperException::new(Value::Str(format!(\"'{{}}' is not callable\", __other.type_name())))) }}"))
            }
        }
    }

    /// The full §4.7 call-site dispatch: bare identifier, module-qualified
    /// member access, or a dynamic callee routed through `safe_attr`.
    fn emit_call(&mut self, call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let path = call.path.get_path();
        let is_this = call.path.is_this();

        if is_this {
            return self.emit_method_call_on_this(path, call);
        }

        match path.len() {
            1 => self.emit_bare_call(&path[0], call),
            2 if self.allowed.imported_module(path[0].text).is_some() => self.emit_module_call(&path[0], &path[1], call),
            _ => self.emit_dynamic_member_call(path, call),
        }
    }

    fn emit_bare_call(&mut self, name_span: &Span<'base>, call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let name = name_span.text;

        if let Some(methods) = self.classes.get(name).cloned() {
            let _ = methods; // presence alone identifies a constructor call
            let args = self.emit_arguments(&call.arguments)?;
            return Ok(format!("{}(({args}))", mangled_class_ctor(name)));
        }

        match self.allowed.resolve(name) {
            Some(CallTarget::UserDefined) => {
                let args = self.emit_arguments(&call.arguments)?;
                Ok(format!("{}({args})?", safe_ident(name)))
            }
            Some(CallTarget::Builtin) => self.emit_builtin_call(name, &call.arguments),
            Some(CallTarget::Module { .. }) => Err(EmitError::unknown_function(name, &[], call.call_span.to_range(), self.source_code_at(&call.call_span))),
            None => {
                if self.options.mode == EmitMode::Repl {
                    let args = self.emit_arguments(&call.arguments)?;
                    Ok(format!("{}({args})?", safe_ident(name)))
                } else {
                    Err(EmitError::unknown_function(name, &self.allowed.suggest(name), call.call_span.to_range(), self.source_code_at(&call.call_span)))
                }
            }
        }
    }

    fn emit_builtin_call(&mut self, name: &str, arguments: &[ExpressionAst<'base>]) -> Result<String, EmitError> {
        match name {
            "print" => {
                let args = self.emit_arguments(arguments)?;
                Ok(format!("Ok::<Value, VesperException>(vesper_runtime::builtin::print(&[{args}]))?"))
            }
            "int" | "float" | "bool" | "len" => {
                let rendered = self.emit_expression(arguments.first().ok_or_else(|| EmitError::CodeGenInternal { message: format!("builtin '{name}' called with no arguments") })?)?;
                let builtin_fn = if name == "bool" { "bool_" } else { name };
                Ok(format!("vesper_runtime::builtin::{builtin_fn}(&{rendered})?"))
            }
            "str" => {
                let rendered = self.emit_expression(arguments.first().ok_or_else(|| EmitError::CodeGenInternal { message: "builtin 'str' called with no arguments".to_string() })?)?;
                Ok(format!("vesper_runtime::builtin::str(&{rendered})"))
            }
            _ => {
                let args = self.emit_arguments(arguments)?;
                Ok(format!("vesper_runtime::builtin::{name}(&[{args}])?"))
            }
        }
    }

    fn emit_module_call(&mut self, module_span: &Span<'base>, function_span: &Span<'base>, call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let module = module_span.text;
        let function = function_span.text;
        if !self.allowed.module_has_function(module, function) {
            return Err(EmitError::unknown_module_function(module, function, &[], function_span.to_range(), self.source_code_at(function_span)));
        }
        let args = self.emit_arguments(&call.arguments)?;
        Ok(format!("vesper_runtime::callback::wrap_callback(\"{module}.{function}\").invoke(&[{args}])?"))
    }

    fn emit_method_call_on_this(&mut self, path: &[Span<'base>], call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let method = path.last().expect("this-call always names a method");
        if let Some(class) = self.current_class.clone() {
            if self.classes.get(&class).map(|methods| methods.iter().any(|m| m == method.text)).unwrap_or(false) {
                let mut args = vec!["&mut this.clone()".to_string()];
                args.extend(self.emit_argument_list(&call.arguments)?);
                return Ok(format!("{}({})?", mangled_method_name(&class, method.text), args.join(", ")));
            }
        }
        self.emit_dynamic_call_on(&"this.clone()".to_string(), method, call)
    }

    /// Member access where the receiver isn't a known module alias: a
    /// dynamic method call on a host or script object, the receiver's
    /// runtime type unknown until the value exists. Routed through
    /// `safe_attr`/`safe_call`, the runtime's own last line of defense.
    fn emit_dynamic_member_call(&mut self, path: &[Span<'base>], call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let receiver_name = &path[0];
        let method = path.last().expect("member call always names a method");

        let mut receiver = if self.scopes.is_local(receiver_name.text) {
            safe_ident(receiver_name.text)
        } else {
            self.emit_ident(receiver_name)?
        };
        for segment in &path[1..path.len() - 1] {
            receiver = format!("({receiver}).get_field(\"{}\")?", segment.text);
        }
        self.emit_dynamic_call_on(&receiver, method, call)
    }

    fn emit_dynamic_call_on(&mut self, receiver_expr: &str, method: &Span<'base>, call: &FunctionCallAst<'base>) -> Result<String, EmitError> {
        let args = self.emit_arguments(&call.arguments)?;
        Ok(format!(
            "{{ let __recv = {receiver_expr}; vesper_runtime::safe_attr::safe_attr(__recv.type_name(), \"{method}\", vesper_runtime::safe_attr::AttributeAccess::Call)?; \
             vesper_runtime::safe_attr::safe_call(\"{method}\")?; \
             vesper_runtime::callback::wrap_callback(format!(\"{{}}.{method}\", __recv.type_name())).invoke(&[__recv, {args}])? }}",
            method = method.text,
        ))
    }

    fn emit_argument_list(&mut self, arguments: &[ExpressionAst<'base>]) -> Result<Vec<String>, EmitError> {
        let mut rendered = Vec::with_capacity(arguments.len());
        for argument in arguments.iter() {
            match argument {
                ExpressionAst::Spread(inner) => {
                    let list = self.emit_expression(inner)?;
                    rendered.push(format!("/* spread */ {list}"));
                }
                other => rendered.push(self.emit_expression(other)?),
            }
        }
        Ok(rendered)
    }

    fn emit_arguments(&mut self, arguments: &[ExpressionAst<'base>]) -> Result<String, EmitError> {
        Ok(self.emit_argument_list(arguments)?.join(", "))
    }
}

fn is_throw(call: &FunctionCallAst<'_>) -> bool {
    matches!(&call.path, FunctionCallType::Direct(paths) if paths.len() == 1 && paths[0].text == "__vesper_throw")
}

fn emit_primitive(value: &PrimitiveValue<'_>) -> String {
    match value {
        PrimitiveValue::String(s) => format!("Value::Str({:?}.to_string())", s.as_ref()),
        PrimitiveValue::Bool(b) => format!("Value::Bool({b})"),
        PrimitiveValue::I8(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::U8(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::I16(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::U16(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::I32(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::U32(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::I64(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::U64(v) => format!("Value::Int({v}i64)"),
        PrimitiveValue::Float(v, _) => format!("Value::Float({v}f64)"),
        PrimitiveValue::Double(v, _) => format!("Value::Float({v}f64)"),
    }
}

fn mangled_class_ctor(class_name: &str) -> String {
    format!("__vesper_new_{}", class_name)
}

fn mangled_method_name(class_name: &str, method_name: &str) -> String {
    format!("__vesper_{class_name}__{}", safe_ident(method_name))
}

/// Emits a doc comment recording the name an emitted top-level function must
/// be registered under in the process-wide [`vesper_runtime::callback::CallbackRegistry`]
/// for `wrap_callback` to find it; the actual `register_function` call is
/// made by the host's module-loading step (the emitter only produces the
/// function body, not the loader), so this is advisory rather than a
/// generated `register_function` call site.
fn vesper_runtime_registration_hint(out: &mut String, qualified_name: &str, rust_name: &str) {
    writeln!(out, "// register_function(\"{qualified_name}\", ... wraps {rust_name} ...) at module load, for wrap_callback to resolve it by name.").ok();
}

fn clone_call_type<'base>(path: &FunctionCallType<'base>) -> FunctionCallType<'base> {
    match path {
        FunctionCallType::This(names) => FunctionCallType::This(names.clone()),
        FunctionCallType::Direct(names) => FunctionCallType::Direct(names.clone()),
    }
}

fn clone_expr_for_pipeline<'base>(expression: &ExpressionAst<'base>) -> ExpressionAst<'base> {
    match expression {
        ExpressionAst::Primitive { span, value } => ExpressionAst::Primitive { span: span.clone(), value: value.clone() },
        ExpressionAst::Ident(span) => ExpressionAst::Ident(span.clone()),
        ExpressionAst::Ref(reference) => ExpressionAst::Ref(crate::ast::RefAst { names: reference.names.clone() }),
        other => panic!("pipeline prepend does not support cloning expression kind {other:?}"),
    }
}

fn count_lines_at_insert(current: usize) -> usize {
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use crate::{file::SourceFile, nom_tools::State, process_code, transformer};

    fn emit_source(source: &str) -> Result<EmitArtifact, EmitError> {
        let state = State::new(SourceFile::new(vec!["test.vsl".into()], source.to_string()));
        let ast = process_code(&state).unwrap();
        let transformed = transformer::transform(ast);
        let registry = ModuleRegistry::new(vec![], false);
        let allowed = AllowedFunctionsRegistry::build(&transformed.file, &registry).unwrap();
        emit(&transformed, &allowed, "test.vsl", "test", EmitOptions::default())
    }

    #[test]
    fn safe_ident_escapes_reserved_words() {
        assert_eq!(safe_ident("type"), "r#type");
        assert_eq!(safe_ident("value"), "value");
    }

    #[test]
    fn emits_simple_function_body() {
        let artifact = emit_source("func add(a: i32, b: i32): i32 { return a + b; }").unwrap();
        assert!(artifact.code.contains("pub fn add"));
        assert!(artifact.code.contains("vesper_runtime::ops::add"));
    }

    #[test]
    fn routes_builtin_calls_through_runtime_builtin() {
        let artifact = emit_source("func test(): void { print(\"hi\"); }").unwrap();
        assert!(artifact.code.contains("vesper_runtime::builtin::print"));
    }

    #[test]
    fn unknown_function_call_is_rejected() {
        let err = emit_source("func test(): void { totally_unknown_fn(); }").unwrap_err();
        assert!(matches!(err, EmitError::UnknownFunction { .. }));
    }

    #[test]
    fn unknown_identifier_passes_through_in_repl_mode() {
        let state = State::new(SourceFile::new(vec!["repl".into()], "func test(): void { undefined_name(); }".to_string()));
        let ast = process_code(&state).unwrap();
        let transformed = transformer::transform(ast);
        let registry = ModuleRegistry::new(vec![], false);
        let allowed = AllowedFunctionsRegistry::build(&transformed.file, &registry).unwrap();
        let options = EmitOptions { output_mode: OutputMode::SingleFile, mode: EmitMode::Repl };
        let artifact = emit(&transformed, &allowed, "repl", "repl_session", options).unwrap();
        assert!(artifact.code.contains("undefined_name"));
    }

    #[test]
    fn throw_lowers_to_err_return() {
        let artifact = emit_source("func test(): void { throw \"boom\"; }").unwrap();
        assert!(artifact.code.contains("return Err(VesperException::new("));
    }

    #[test]
    fn source_map_records_variable_definitions() {
        let artifact = emit_source("func test(): void { var x = 1; }").unwrap();
        assert!(!artifact.source_map.entries.is_empty());
    }

    #[test]
    fn class_gets_a_positional_constructor() {
        let artifact = emit_source("class Point { x: i32; y: i32; }").unwrap();
        assert!(artifact.code.contains("__vesper_new_Point"));
    }
}
