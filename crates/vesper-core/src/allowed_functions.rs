//! Per-compilation-unit whitelist consulted at every call site.
//!
//! This is the sole compile-time gate the code emitter trusts when
//! deciding whether a call is admissible: not the TIR (which resolves
//! declarations for type purposes but doesn't know about the module
//! registry), not the security analyzer (which flags suspicious patterns
//! but doesn't enumerate what's callable). An [`AllowedFunctionsRegistry`]
//! is built empty, populated while visiting a unit's imports and top-level
//! function/class declarations, consulted by the emitter, and dropped at
//! the end of that unit's compilation — it is never process-global, and
//! that's a tested invariant, not an implementation detail: reusing one
//! across units would let a name imported by unit A silently resolve in
//! unit B.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::{ClassDefinitionFieldAst, ExtendDefinitionFieldAst, FileAst, FileStatementAst};
use crate::registry::{ModuleRecord, ModuleRegistry, RegistryError};

/// A name this compilation unit can call, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Builtin,
    UserDefined,
    /// Resolves through an imported module; `module` is the local alias.
    Module { module: String },
}

/// Per-compilation-unit whitelist: three independent sets, queried in a
/// fixed shadowing order (user-defined wins over an imported/builtin name
/// of the same spelling).
#[derive(Debug, Default)]
pub struct AllowedFunctionsRegistry {
    builtins: HashSet<String>,
    user_defined: HashSet<String>,
    /// Local alias -> the module record it resolves to.
    imported_modules: IndexMap<String, std::sync::Arc<ModuleRecord>>,
}

impl AllowedFunctionsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh registry for one compilation unit: seeds `builtin`,
    /// walks every top-level `use` to populate `imported_modules` (failing
    /// the whole build on the first unresolved import, per the registry's
    /// own `ModuleNotFound`/`CircularDependency`/... errors), and records
    /// every top-level function/class name as user-defined.
    pub fn build(file: &FileAst<'_>, registry: &ModuleRegistry) -> Result<Self, RegistryError> {
        let mut allowed = Self::new();
        if let Ok(builtin) = registry.resolve("builtin") {
            allowed.seed_builtins(&builtin);
        }

        for statement in file.statements.iter() {
            match statement {
                FileStatementAst::Use(use_statement) => {
                    let module = registry.resolve(use_statement.import.text.as_ref())?;
                    let alias = use_statement.ast_name().text.to_string();
                    allowed.import_module(alias, module);
                }
                FileStatementAst::Function(function) => {
                    allowed.declare_user_function(function.name.text.to_string());
                }
                FileStatementAst::Class(class) => {
                    allowed.declare_user_function(class.name.text.to_string());
                    for field in class.fields.iter() {
                        if let ClassDefinitionFieldAst::Function(f) = field {
                            allowed.declare_user_function(f.name.text.to_string());
                        }
                    }
                }
                FileStatementAst::Extend(extend) => {
                    for field in extend.fields.iter() {
                        if let ExtendDefinitionFieldAst::Function(f) = field {
                            allowed.declare_user_function(f.name.text.to_string());
                        }
                    }
                }
                FileStatementAst::Interface(_) => {}
            }
        }

        Ok(allowed)
    }

    /// Seeds the `builtin` module's exported functions as bare names
    /// (`len`, `print`, ...), callable without qualification.
    pub fn seed_builtins(&mut self, builtin_module: &ModuleRecord) {
        self.builtins.extend(builtin_module.functions.keys().cloned());
    }

    pub fn declare_user_function(&mut self, name: impl Into<String>) {
        self.user_defined.insert(name.into());
    }

    /// Records that `alias` now refers to `module` (normally the import's
    /// local name, or the module's own name when no `as` alias is given).
    pub fn import_module(&mut self, alias: impl Into<String>, module: std::sync::Arc<ModuleRecord>) {
        self.imported_modules.insert(alias.into(), module);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn is_user_defined(&self, name: &str) -> bool {
        self.user_defined.contains(name)
    }

    pub fn imported_module(&self, alias: &str) -> Option<&std::sync::Arc<ModuleRecord>> {
        self.imported_modules.get(alias)
    }

    pub fn module_has_function(&self, alias: &str, function: &str) -> bool {
        self.imported_module(alias).is_some_and(|module| module.has_function(function))
    }

    /// Resolves a bare name to how it would be called, applying the
    /// shadowing rule: a user-defined function of the same name as a
    /// builtin always wins.
    pub fn resolve(&self, name: &str) -> Option<CallTarget> {
        if self.is_user_defined(name) {
            Some(CallTarget::UserDefined)
        } else if self.is_builtin(name) {
            Some(CallTarget::Builtin)
        } else if self.imported_modules.contains_key(name) {
            Some(CallTarget::Module { module: name.to_string() })
        } else {
            None
        }
    }

    /// Suggests up to 3 known names close to `name` by edit distance, for
    /// an "unknown function, did you mean..." diagnostic.
    pub fn suggest(&self, name: &str) -> Vec<String> {
        let mut candidates: Vec<(usize, &str)> = self
            .builtins
            .iter()
            .chain(self.user_defined.iter())
            .chain(self.imported_modules.keys())
            .map(|candidate| (edit_distance(name, candidate), candidate.as_str()))
            .filter(|(distance, _)| *distance <= 3)
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        candidates.into_iter().take(3).map(|(_, name)| name.to_string()).collect()
    }
}

/// Classic Levenshtein distance, used only for the small "did you mean"
/// candidate lists above.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FunctionRecord, ModuleRecord};

    #[test]
    fn user_defined_shadows_builtin_of_same_name() {
        let mut registry = AllowedFunctionsRegistry::new();
        registry.builtins.insert("len".to_string());
        registry.declare_user_function("len");
        assert_eq!(registry.resolve("len"), Some(CallTarget::UserDefined));
    }

    #[test]
    fn imported_module_function_is_reachable() {
        let mut registry = AllowedFunctionsRegistry::new();
        let module = std::sync::Arc::new(ModuleRecord::native("math").with_function(FunctionRecord::new("sqrt", Some(1))));
        registry.import_module("math", module);
        assert!(registry.module_has_function("math", "sqrt"));
        assert!(!registry.module_has_function("math", "bogus"));
    }

    #[test]
    fn suggest_finds_close_typo() {
        let mut registry = AllowedFunctionsRegistry::new();
        registry.declare_user_function("calculate_total");
        let suggestions = registry.suggest("calculat_total");
        assert_eq!(suggestions, vec!["calculate_total".to_string()]);
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let registry = AllowedFunctionsRegistry::new();
        assert_eq!(registry.resolve("does_not_exist"), None);
    }

    #[test]
    fn registries_are_independent_per_instance() {
        let mut a = AllowedFunctionsRegistry::new();
        a.declare_user_function("only_in_a");
        let b = AllowedFunctionsRegistry::new();
        assert!(a.is_user_defined("only_in_a"));
        assert!(!b.is_user_defined("only_in_a"));
    }

    #[test]
    fn build_populates_builtins_and_user_functions() {
        use crate::{file::SourceFile, nom_tools::State, process_code};
        use crate::registry::ModuleRegistry;

        let state = State::new(SourceFile::new(vec!["source".into()], "func greet(): void { }".to_string()));
        let ast = process_code(&state).unwrap();
        let module_registry = ModuleRegistry::new(vec![], false);
        let allowed = AllowedFunctionsRegistry::build(&ast, &module_registry).unwrap();

        assert!(allowed.is_builtin("len"));
        assert!(allowed.is_user_defined("greet"));
    }
}
