//! Name-based late binding for callbacks handed to the host.
//!
//! When emitted code passes a script function to a host API as a callback
//! (an event handler, a sort comparator, a promise continuation), the naive
//! translation captures a compiled closure pointing at the function that
//! existed when the callback was created. After a module registry hot
//! reload swaps that function's body, the host would go on calling the
//! stale one. `wrap_callback` instead captures the function's *name* and
//! re-resolves it against the global [`CallbackRegistry`] on every
//! invocation, so a reload is picked up on the next call with no action
//! needed from the host.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use indexmap::IndexMap;

/// A dynamically-typed value passed across the script/host boundary.
///
/// Every expression emitted code evaluates produces one of these; there is
/// no Rust-native type for a Vesper value, matching the dynamically typed
/// nature of the source language (spec.md §1) rather than threading gradual
/// `TypeNameAst` annotations through to Rust's own type system.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// An arrow function, hoisted by the emitter to a top-level named
    /// function and referenced here by its registry name (see
    /// `vesper_core::emitter`).
    Callback(Callback),
}

impl Value {
    /// Truthiness used by `if`/`while`/ternary emission: `null`, `false`,
    /// `0`, `0.0`, an empty string, and an empty list/object are falsy;
    /// everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            Value::Callback(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "array",
            Value::Object(_) => "object",
            Value::Callback(_) => "callback",
        }
    }

    /// Field access for `.`-chains over an [`Value::Object`]. Any other
    /// receiver type, or a missing key, is an error: emitted field access
    /// is always guarded by [`crate::safe_attr::safe_attr`] first, so
    /// reaching here with a bad receiver indicates that guard was bypassed.
    pub fn get_field(&self, name: &str) -> Result<Value, crate::ops::OpError> {
        match self {
            Value::Object(fields) => fields.get(name).cloned().ok_or_else(|| crate::ops::OpError::NoSuchField {
                type_name: self.type_name(),
                field: name.to_string(),
            }),
            _ => Err(crate::ops::OpError::NoSuchField { type_name: self.type_name(), field: name.to_string() }),
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), crate::ops::OpError> {
        match self {
            Value::Object(fields) => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(crate::ops::OpError::NoSuchField { type_name: self.type_name(), field: name.to_string() }),
        }
    }

    /// Indexing for `[]` expressions: integer index into a list or string
    /// (by Unicode scalar), or string key into an object.
    pub fn index(&self, idx: &Value) -> Result<Value, crate::ops::OpError> {
        match (self, idx) {
            (Value::List(items), Value::Int(i)) => items
                .get(usize::try_from(*i).map_err(|_| crate::ops::OpError::IndexOutOfBounds)?)
                .cloned()
                .ok_or(crate::ops::OpError::IndexOutOfBounds),
            (Value::Str(s), Value::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or(crate::ops::OpError::IndexOutOfBounds),
            (Value::Object(fields), Value::Str(key)) => fields
                .get(key)
                .cloned()
                .ok_or_else(|| crate::ops::OpError::NoSuchField { type_name: "object", field: key.clone() }),
            _ => Err(crate::ops::OpError::NotIndexable { type_name: self.type_name() }),
        }
    }

    /// Expands a `for` target to the values iterated over: list elements,
    /// object values in insertion order, or a string's characters.
    pub fn iterate(&self) -> Result<Vec<Value>, crate::ops::OpError> {
        match self {
            Value::List(items) => Ok(items.clone()),
            Value::Object(fields) => Ok(fields.values().cloned().collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            _ => Err(crate::ops::OpError::NotIterable { type_name: self.type_name() }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Callback(callback) => write!(f, "<function {}>", callback.name()),
        }
    }
}

pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CallbackError {
    #[error("callback '{name}' is not registered (module may not be loaded yet)")]
    NotFound { name: String },
    #[error("callback '{name}' raised: {message}")]
    Raised { name: String, message: String },
}

/// Process-wide table of callable script functions, keyed by their fully
/// qualified name (`module.function`). The module registry replaces the
/// entry for a name whenever it reloads the module that defines it.
#[derive(Default)]
pub struct CallbackRegistry {
    functions: RwLock<HashMap<String, NativeFn>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, f: NativeFn) {
        self.functions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), f);
    }

    pub fn unregister(&self, name: &str) {
        self.functions.write().unwrap_or_else(|e| e.into_inner()).remove(name);
    }

    fn resolve(&self, name: &str) -> Option<NativeFn> {
        self.functions.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }
}

fn global() -> &'static CallbackRegistry {
    static REGISTRY: OnceLock<CallbackRegistry> = OnceLock::new();
    REGISTRY.get_or_init(CallbackRegistry::new)
}

pub fn register_function(name: impl Into<String>, f: NativeFn) {
    global().register(name, f);
}

pub fn unregister_function(name: &str) {
    global().unregister(name);
}

/// A callback bound by name rather than by compiled closure.
///
/// Clone is cheap (an `Arc<str>` name); every clone re-resolves against the
/// same global registry.
#[derive(Clone, PartialEq)]
pub struct Callback {
    name: Arc<str>,
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Callback").field(&self.name).finish()
    }
}

impl Callback {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-resolves the callback's function by name and invokes it with
    /// `args`. Returns [`CallbackError::NotFound`] if no module currently
    /// defines a function under this name.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, CallbackError> {
        let f = global()
            .resolve(&self.name)
            .ok_or_else(|| CallbackError::NotFound { name: self.name.to_string() })?;
        f(args)
    }
}

/// Wraps a fully qualified script function name as a [`Callback`] the
/// emitter can pass to host APIs expecting a function value.
pub fn wrap_callback(name: impl Into<String>) -> Callback {
    Callback { name: Arc::from(name.into()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_picks_up_reloaded_function() {
        register_function("mod.on_tick", Arc::new(|_| Ok(Value::Int(1))));
        let callback = wrap_callback("mod.on_tick");
        assert_eq!(callback.invoke(&[]).unwrap(), Value::Int(1));

        register_function("mod.on_tick", Arc::new(|_| Ok(Value::Int(2))));
        assert_eq!(callback.invoke(&[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn invoke_missing_function_errors() {
        let callback = wrap_callback("mod.does_not_exist_yet");
        assert!(matches!(callback.invoke(&[]), Err(CallbackError::NotFound { .. })));
    }
}
