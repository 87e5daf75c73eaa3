//! Metadata records describing a single registered module.
//!
//! A [`ModuleRecord`] is deliberately thin: it carries just enough to let
//! the allowed-functions registry and the emitter answer "does this module
//! export a function/class called X", not a full copy of the module's AST.
//! `sl_source` records additionally carry the filesystem state needed to
//! decide whether the record is still fresh (see [`crate::registry::cache`]).

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::SystemTime;

use indexmap::IndexMap;

/// Where a module's implementation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Registered at process startup by a native (Rust) extension, the way
    /// `vesper_runtime::safe_attr::register` and
    /// `vesper_runtime::callback::register_function` register their own
    /// tables. Never reloaded; never has a filesystem path.
    NativeBridge,
    /// Backed by a `.vsl` file (or a `mod.vsl` package directory) found on
    /// one of `ProjectConfig::sl_module_paths`. Subject to mtime-based hot
    /// reload.
    SlSource,
}

/// A function exported by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    /// Declared argument count, when known. Native-bridge functions that
    /// accept a variable number of arguments leave this `None`.
    pub arity: Option<usize>,
    /// Capability identifiers (`"file.read"`) this function requires to be
    /// held on the caller's active context before it runs. Always a subset
    /// of the owning module's own `capabilities_required` (spec.md §3
    /// invariant ii) or explicitly listed alongside it.
    pub capabilities_required: Vec<String>,
    pub description: String,
    /// Whether this is exposed as a property (no explicit call syntax) on
    /// its owning class rather than an ordinary method.
    pub is_property: bool,
    /// Set for methods on a registered class; `None` for free functions.
    pub owning_class: Option<String>,
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>, arity: Option<usize>) -> Self {
        Self {
            name: name.into(),
            arity,
            capabilities_required: Vec::new(),
            description: String::new(),
            is_property: false,
            owning_class: None,
        }
    }

    #[must_use]
    pub fn requiring(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.capabilities_required = capabilities.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn as_property(mut self) -> Self {
        self.is_property = true;
        self
    }

    #[must_use]
    pub fn owned_by_class(mut self, class: impl Into<String>) -> Self {
        self.owning_class = Some(class.into());
        self
    }
}

/// A class exported by a module, with the names of its methods (used by
/// the emitter's member-access dispatch; field names are not tracked here
/// since field access goes through `safe_attr` rather than the allowed-
/// functions registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub methods: Vec<String>,
}

/// Everything the rest of the pipeline needs to know about one module.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub name: String,
    pub kind: ModuleKind,
    pub functions: IndexMap<String, FunctionRecord>,
    pub classes: IndexMap<String, ClassRecord>,
    /// Names of other `sl_source` modules this one imports, used for
    /// circular-dependency detection and downstream cache invalidation.
    /// Always empty for `NativeBridge` modules.
    pub dependencies: Vec<String>,
    /// Filesystem path and last-observed modification time, for
    /// `sl_source` modules only.
    pub source_path: Option<PathBuf>,
    pub mtime: Option<SystemTime>,
    /// Capability identifiers this module's functions may draw on. A
    /// function's own `capabilities_required` must be a subset of this set
    /// or be explicitly listed here too (spec.md §3 invariant ii); the
    /// registry does not itself enforce the subset relationship — that is
    /// the security analyzer's and the capability manager's job — it is
    /// only recorded here for introspection.
    pub capabilities_required: HashSet<String>,
    pub description: String,
    pub version: String,
}

impl ModuleRecord {
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ModuleKind::NativeBridge,
            functions: IndexMap::new(),
            classes: IndexMap::new(),
            dependencies: Vec::new(),
            source_path: None,
            mtime: None,
            capabilities_required: HashSet::new(),
            description: String::new(),
            version: "0.1.0".to_string(),
        }
    }

    pub fn with_function(mut self, function: FunctionRecord) -> Self {
        self.capabilities_required.extend(function.capabilities_required.iter().cloned());
        self.functions.insert(function.name.clone(), function);
        self
    }

    pub fn with_class(mut self, class: ClassRecord) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}
