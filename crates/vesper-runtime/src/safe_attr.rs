//! Runtime whitelist for attribute and method access on host objects exposed
//! to scripts.
//!
//! The security analyzer and code emitter already reject attribute access on
//! identifiers they can prove are unsafe at compile time, but any host
//! object reached through a dynamic value (an object returned from a native
//! bridge function, say) can't be checked until the access actually happens.
//! [`SafeAttributeRegistry`] is that last line of defense: every generated
//! `obj.attr` or `obj.method(...)` access the emitter cannot prove safe at
//! compile time is routed through [`safe_attr`] first.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// The kind of access being attempted on an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeAccess {
    Read,
    Write,
    Call,
}

impl std::fmt::Display for AttributeAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Call => write!(f, "call"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SafeAttrError {
    #[error("type '{type_name}' is not registered with the safe attribute registry")]
    UnknownType { type_name: String },
    #[error("'{type_name}.{attribute}' does not permit {access} access")]
    Denied {
        type_name: String,
        attribute: String,
        access: AttributeAccess,
    },
    #[error("'{name}' is not in the dynamic-call whitelist")]
    NotCallable { name: String },
}

#[derive(Default)]
struct TypeRules {
    allowed: HashMap<String, HashSet<AttributeAccess>>,
}

/// Process-wide whitelist of `(type_name, attribute) -> allowed accesses`.
///
/// Registration happens once, typically when a native bridge module is
/// loaded by the module registry; checks happen on every dynamic attribute
/// touch in emitted code.
#[derive(Default)]
pub struct SafeAttributeRegistry {
    types: RwLock<HashMap<String, TypeRules>>,
}

impl SafeAttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `accesses` on `attribute` for `type_name`. Calling this again
    /// for the same `(type_name, attribute)` pair widens the allowed set; it
    /// never narrows a previous registration.
    pub fn allow(
        &self,
        type_name: impl Into<String>,
        attribute: impl Into<String>,
        accesses: &[AttributeAccess],
    ) {
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        let rules = types.entry(type_name.into()).or_default();
        rules
            .allowed
            .entry(attribute.into())
            .or_default()
            .extend(accesses.iter().copied());
    }

    /// Checks whether `access` on `type_name.attribute` is permitted.
    pub fn check(
        &self,
        type_name: &str,
        attribute: &str,
        access: AttributeAccess,
    ) -> Result<(), SafeAttrError> {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        let rules = types.get(type_name).ok_or_else(|| SafeAttrError::UnknownType {
            type_name: type_name.to_string(),
        })?;
        let allowed = rules
            .allowed
            .get(attribute)
            .is_some_and(|accesses| accesses.contains(&access));
        if allowed {
            Ok(())
        } else {
            Err(SafeAttrError::Denied {
                type_name: type_name.to_string(),
                attribute: attribute.to_string(),
                access,
            })
        }
    }
}

static REGISTRY: std::sync::OnceLock<SafeAttributeRegistry> = std::sync::OnceLock::new();

fn global() -> &'static SafeAttributeRegistry {
    REGISTRY.get_or_init(SafeAttributeRegistry::new)
}

/// Registers allowed accesses on the process-wide registry. Called by
/// native bridge module loading during module registry setup.
pub fn register(type_name: impl Into<String>, attribute: impl Into<String>, accesses: &[AttributeAccess]) {
    global().allow(type_name, attribute, accesses);
}

/// The guard emitted code calls before touching a dynamically-typed host
/// attribute or method.
pub fn safe_attr(type_name: &str, attribute: &str, access: AttributeAccess) -> Result<(), SafeAttrError> {
    global().check(type_name, attribute, access)
}

static CALLABLE_REGISTRY: std::sync::OnceLock<RwLock<HashSet<String>>> = std::sync::OnceLock::new();

fn callable_table() -> &'static RwLock<HashSet<String>> {
    CALLABLE_REGISTRY.get_or_init(|| RwLock::new(HashSet::new()))
}

/// Whitelists `name` as a function that may be called through a dynamic
/// (non-module-qualified, non-user-defined) callee expression.
pub fn register_callable(name: impl Into<String>) {
    callable_table().write().unwrap_or_else(|e| e.into_inner()).insert(name.into());
}

/// The guard emitted code calls before invoking a call whose callee the
/// emitter could not prove statically resolves to a builtin, user-defined,
/// or imported-module function. This is the only place dynamic call
/// dispatch is permitted to reach a host function: there is no unguarded
/// path.
pub fn safe_call(name: &str) -> Result<(), SafeAttrError> {
    if callable_table().read().unwrap_or_else(|e| e.into_inner()).contains(name) {
        Ok(())
    } else {
        Err(SafeAttrError::NotCallable { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_type_is_denied() {
        let registry = SafeAttributeRegistry::new();
        assert!(matches!(
            registry.check("Widget", "value", AttributeAccess::Read),
            Err(SafeAttrError::UnknownType { .. })
        ));
    }

    #[test]
    fn registered_attribute_respects_access_kind() {
        let registry = SafeAttributeRegistry::new();
        registry.allow("Widget", "value", &[AttributeAccess::Read]);
        assert!(registry.check("Widget", "value", AttributeAccess::Read).is_ok());
        assert!(matches!(
            registry.check("Widget", "value", AttributeAccess::Write),
            Err(SafeAttrError::Denied { .. })
        ));
    }

    #[test]
    fn dynamic_call_requires_whitelisting() {
        assert!(matches!(safe_call("never_registered_fn"), Err(SafeAttrError::NotCallable { .. })));
        register_callable("on_tick");
        assert!(safe_call("on_tick").is_ok());
    }
}
