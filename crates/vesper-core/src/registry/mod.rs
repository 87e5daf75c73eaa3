//! Module registry and resolver.
//!
//! Unifies two kinds of module: `native_bridge` modules registered process-
//! globally by Rust extensions (see [`native`]), and `sl_source` modules
//! backed by `.vsl` files discovered on disk. Resolution order for a given
//! name is: already-cached and fresh → native-bridge table → each of
//! `sl_module_paths` in declaration order → the importing file's own
//! directory, if `allow_current_dir` is set. The first hit wins; nothing
//! past it is consulted.
//!
//! A `ModuleRegistry` is the thing compilation actually holds: it owns the
//! cache and the search-path configuration. The native-bridge table itself
//! lives in [`native`] at process scope, same as every other
//! `vesper_runtime` whitelist.

pub mod cache;
pub mod error;
pub mod native;
pub mod record;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::ast::FileStatementAst;
use crate::file::SourceFile;
use crate::nom_tools::State;

pub use cache::{CacheEntry, CacheKey};
pub use error::RegistryError;
pub use native::{register_native_class, register_native_functions, register_native_module};
pub use record::{ClassRecord, FunctionRecord, ModuleKind, ModuleRecord};

/// Owns the per-compilation module cache and search-path configuration.
/// Cheap to construct; expensive state (parsed `sl_source` records) lives
/// behind the cache and is reused across [`ModuleRegistry`] instances only
/// if they're the same instance — there is deliberately no process-global
/// `sl_source` cache, since two compilations may use different search
/// paths.
pub struct ModuleRegistry {
    sl_module_paths: Vec<String>,
    allow_current_dir: bool,
    cache: RwLock<IndexMap<CacheKey, CacheEntry>>,
}

impl ModuleRegistry {
    pub fn new(sl_module_paths: Vec<String>, allow_current_dir: bool) -> Self {
        Self { sl_module_paths, allow_current_dir, cache: RwLock::new(IndexMap::new()) }
    }

    fn cache_key(&self, name: &str) -> CacheKey {
        CacheKey::new(name, &self.sl_module_paths)
    }

    /// Resolves `name` to a [`ModuleRecord`], consulting the cache, then
    /// the native-bridge table, then the filesystem.
    pub fn resolve(&self, name: &str) -> Result<Arc<ModuleRecord>, RegistryError> {
        self.resolve_relative(name, None)
    }

    /// As [`Self::resolve`], but additionally tries `importing_dir` as a
    /// final fallback when `allow_current_dir` is set (the directory of the
    /// file containing the `use` statement being resolved).
    pub fn resolve_relative(&self, name: &str, importing_dir: Option<&Path>) -> Result<Arc<ModuleRecord>, RegistryError> {
        let mut stack = HashSet::new();
        self.resolve_inner(name, importing_dir, &mut stack)
    }

    fn resolve_inner(&self, name: &str, importing_dir: Option<&Path>, stack: &mut HashSet<String>) -> Result<Arc<ModuleRecord>, RegistryError> {
        if let Some(record) = self.cached_if_fresh(name) {
            return Ok(record);
        }

        if let Some(record) = native::lookup(name) {
            return Ok(record);
        }

        if !stack.insert(name.to_string()) {
            let mut cycle: Vec<String> = stack.iter().cloned().collect();
            cycle.sort();
            cycle.push(name.to_string());
            return Err(RegistryError::CircularDependency { cycle });
        }

        let path = self.locate_source_file(name, importing_dir).ok_or_else(|| RegistryError::ModuleNotFound { name: name.to_string() })?;
        let record = self.parse_sl_source(name, &path)?;

        for dependency in record.dependencies.iter() {
            if native::lookup(dependency).is_some() {
                continue;
            }
            self.resolve_inner(dependency, importing_dir, stack)?;
        }

        stack.remove(name);

        let record = Arc::new(record);
        self.cache.write().unwrap_or_else(|e| e.into_inner()).insert(self.cache_key(name), CacheEntry::new(Arc::clone(&record)));
        Ok(record)
    }

    fn cached_if_fresh(&self, name: &str) -> Option<Arc<ModuleRecord>> {
        let key = self.cache_key(name);
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        let entry = cache.get(&key)?;
        let current_mtime = entry.record.source_path.as_deref().and_then(mtime_of);
        if entry.is_fresh(current_mtime) {
            Some(Arc::clone(&entry.record))
        } else {
            None
        }
    }

    /// Re-parses `name` unconditionally and recursively invalidates every
    /// cached module whose dependency list mentions it, so a stale
    /// transitive dependent is never served after its dependency reloads.
    pub fn reload(&self, name: &str) -> Result<(), RegistryError> {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).shift_remove(&self.cache_key(name));
        let mut stack = HashSet::new();
        self.resolve_inner(name, None, &mut stack)?;
        self.invalidate_dependents(name);
        Ok(())
    }

    fn invalidate_dependents(&self, name: &str) {
        let dependents: Vec<String> = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            cache
                .iter()
                .filter(|(_, entry)| entry.record.dependencies.iter().any(|d| d == name))
                .map(|(_, entry)| entry.record.name.clone())
                .collect()
        };
        for dependent in dependents {
            self.cache.write().unwrap_or_else(|e| e.into_inner()).shift_remove(&self.cache_key(&dependent));
            self.invalidate_dependents(&dependent);
        }
    }

    fn locate_source_file(&self, name: &str, importing_dir: Option<&Path>) -> Option<PathBuf> {
        let relative = name.replace('.', "/");
        for search_path in self.sl_module_paths.iter() {
            let base = Path::new(search_path);
            let direct = base.join(format!("{relative}.vsl"));
            if direct.is_file() {
                return Some(direct);
            }
            let package = base.join(&relative).join("mod.vsl");
            if package.is_file() {
                return Some(package);
            }
        }
        if self.allow_current_dir {
            if let Some(dir) = importing_dir {
                let direct = dir.join(format!("{relative}.vsl"));
                if direct.is_file() {
                    return Some(direct);
                }
            }
        }
        None
    }

    fn parse_sl_source(&self, name: &str, path: &Path) -> Result<ModuleRecord, RegistryError> {
        let source = fs::read_to_string(path).map_err(|e| RegistryError::MalformedModule { name: name.to_string(), reason: e.to_string() })?;
        let mtime = mtime_of(path);

        let source_file = SourceFile::new(path.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect(), source);
        let state = State::new(source_file);
        let ast = crate::process_code(&state).map_err(|e| RegistryError::MalformedModule { name: name.to_string(), reason: e.to_string() })?;

        let mut record = ModuleRecord {
            name: name.to_string(),
            kind: ModuleKind::SlSource,
            functions: IndexMap::new(),
            classes: IndexMap::new(),
            dependencies: Vec::new(),
            source_path: Some(path.to_path_buf()),
            mtime,
            capabilities_required: HashSet::new(),
            description: String::new(),
            version: "0.1.0".to_string(),
        };

        for statement in ast.statements.iter() {
            match statement {
                FileStatementAst::Function(function) => {
                    record.functions.insert(
                        function.name.text.to_string(),
                        FunctionRecord::new(function.name.text, Some(function.arguments.len())),
                    );
                }
                FileStatementAst::Class(class) => {
                    let methods = class
                        .fields
                        .iter()
                        .filter_map(|field| match field {
                            crate::ast::ClassDefinitionFieldAst::Function(f) => Some(f.name.text.to_string()),
                            crate::ast::ClassDefinitionFieldAst::Field(_) => None,
                        })
                        .collect();
                    record.classes.insert(class.name.text.to_string(), ClassRecord { name: class.name.text.to_string(), methods });
                }
                FileStatementAst::Use(use_statement) => {
                    record.dependencies.push(use_statement.import.text.to_string());
                }
                FileStatementAst::Extend(_) | FileStatementAst::Interface(_) => {}
            }
        }

        Ok(record)
    }
}

fn mtime_of(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Helper used by [`crate::security`] to check import targets without
/// handing it a whole `ModuleRegistry`.
impl crate::security::ImportKnowledge for ModuleRegistry {
    fn is_known_module(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_builtin_from_native_table() {
        let registry = ModuleRegistry::new(vec![], false);
        let record = registry.resolve("builtin").expect("builtin always registered");
        assert!(record.has_function("len"));
    }

    #[test]
    fn unknown_module_is_not_found() {
        let registry = ModuleRegistry::new(vec!["/nonexistent/path".into()], false);
        assert!(matches!(registry.resolve("nope"), Err(RegistryError::ModuleNotFound { .. })));
    }

    #[test]
    fn resolves_sl_source_module_from_search_path() {
        let dir = std::env::temp_dir().join(format!("vesper_registry_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("greet.vsl");
        let mut file = fs::File::create(&file_path).unwrap();
        writeln!(file, "func hello(): void {{ }}").unwrap();

        let registry = ModuleRegistry::new(vec![dir.to_string_lossy().to_string()], false);
        let record = registry.resolve("greet").expect("module should resolve");
        assert!(record.has_function("hello"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn detects_circular_dependency() {
        let dir = std::env::temp_dir().join(format!("vesper_registry_cycle_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.vsl"), "use b;\nfunc from_a(): void { }").unwrap();
        fs::write(dir.join("b.vsl"), "use a;\nfunc from_b(): void { }").unwrap();

        let registry = ModuleRegistry::new(vec![dir.to_string_lossy().to_string()], false);
        assert!(matches!(registry.resolve("a"), Err(RegistryError::CircularDependency { .. })));

        let _ = fs::remove_dir_all(&dir);
    }
}
