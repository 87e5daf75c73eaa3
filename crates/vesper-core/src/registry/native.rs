//! Process-global table of native-bridge modules.
//!
//! Mirrors `vesper_runtime::safe_attr::register` and
//! `vesper_runtime::callback::register_function`: a native extension calls
//! [`register_native_module`] once, typically from a `ctor`-style
//! initializer or explicitly at host startup, and every [`super::ModuleRegistry`]
//! created afterwards sees it. This table is never per-compilation and is
//! never cleared — unlike the allowed-functions registry, which is rebuilt
//! fresh for every compilation unit from whatever is visible here at that
//! moment.

use std::sync::{Arc, OnceLock, RwLock};

use indexmap::IndexMap;

use super::record::{ClassRecord, FunctionRecord, ModuleRecord};

fn table() -> &'static RwLock<IndexMap<String, Arc<ModuleRecord>>> {
    static TABLE: OnceLock<RwLock<IndexMap<String, Arc<ModuleRecord>>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(seed_builtin()))
}

/// The always-present `builtin` module: the handful of conversion and
/// introspection functions every Vesper program can call without an
/// explicit `use`.
fn seed_builtin() -> IndexMap<String, Arc<ModuleRecord>> {
    let builtin = ModuleRecord::native("builtin")
        .with_description("always-available conversions and introspection, callable unqualified")
        .with_function(FunctionRecord::new("int", Some(1)).with_description("coerce a value to an integer"))
        .with_function(FunctionRecord::new("float", Some(1)).with_description("coerce a value to a float"))
        .with_function(FunctionRecord::new("str", Some(1)).with_description("coerce a value to a string"))
        .with_function(FunctionRecord::new("bool", Some(1)).with_description("coerce a value to a boolean"))
        .with_function(FunctionRecord::new("len", Some(1)).with_description("length of a string, array, or object"))
        .with_function(FunctionRecord::new("print", None).with_description("write arguments to stdout"));
    let mut table = IndexMap::new();
    table.insert("builtin".to_string(), Arc::new(builtin));
    table
}

/// Registers (or replaces) a native-bridge module under `record.name`.
pub fn register_native_module(record: ModuleRecord) {
    table().write().unwrap_or_else(|e| e.into_inner()).insert(record.name.clone(), Arc::new(record));
}

/// Convenience for extensions that only export free functions, no classes.
pub fn register_native_functions(name: impl Into<String>, functions: impl IntoIterator<Item = FunctionRecord>) {
    let mut record = ModuleRecord::native(name);
    for function in functions {
        record = record.with_function(function);
    }
    register_native_module(record);
}

pub fn register_native_class(module: &str, class: ClassRecord) {
    let mut table = table().write().unwrap_or_else(|e| e.into_inner());
    let entry = table.entry(module.to_string()).or_insert_with(|| Arc::new(ModuleRecord::native(module)));
    let mut record = (**entry).clone();
    record.classes.insert(class.name.clone(), class);
    *entry = Arc::new(record);
}

pub fn lookup(name: &str) -> Option<Arc<ModuleRecord>> {
    table().read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
}

pub fn all_names() -> Vec<String> {
    table().read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_module_is_preregistered() {
        let builtin = lookup("builtin").expect("builtin module always registered");
        assert!(builtin.has_function("len"));
        assert!(builtin.has_function("print"));
    }

    #[test]
    fn registering_a_module_makes_it_visible() {
        register_native_functions("test_native_mod", [FunctionRecord::new("ping", Some(0))]);
        let record = lookup("test_native_mod").expect("just registered");
        assert!(record.has_function("ping"));
    }
}
