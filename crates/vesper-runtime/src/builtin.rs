//! Implementations backing the always-available `builtin` module
//! (`vesper_core::registry::native::seed_builtin`): `int`, `float`, `str`,
//! `bool`, `len`, `print`. Emitted code calls these directly by their
//! `builtin::` qualified path; they never go through [`crate::safe_call`]
//! since they are already whitelisted at the allowed-functions stage.

use crate::callback::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BuiltinError {
    #[error("cannot convert {type_name} to {target}")]
    Unconvertible { type_name: &'static str, target: &'static str },
    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity { function: &'static str, expected: &'static str, got: usize },
}

/// Coerces `value` to an integer. Strings are parsed; floats truncate
/// towards zero; booleans become 0/1; `null` becomes 0.
pub fn int(value: &Value) -> Result<Value, BuiltinError> {
    let result = match value {
        Value::Null => 0,
        Value::Bool(b) => *b as i64,
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| BuiltinError::Unconvertible { type_name: "str", target: "int" })?,
        Value::List(_) | Value::Object(_) | Value::Callback(_) => {
            return Err(BuiltinError::Unconvertible { type_name: value.type_name(), target: "int" })
        }
    };
    Ok(Value::Int(result))
}

/// Coerces `value` to a float, by the same rules as [`int`].
pub fn float(value: &Value) -> Result<Value, BuiltinError> {
    let result = match value {
        Value::Null => 0.0,
        Value::Bool(b) => if *b { 1.0 } else { 0.0 },
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| BuiltinError::Unconvertible { type_name: "str", target: "float" })?,
        Value::List(_) | Value::Object(_) | Value::Callback(_) => {
            return Err(BuiltinError::Unconvertible { type_name: value.type_name(), target: "float" })
        }
    };
    Ok(Value::Float(result))
}

/// Renders `value` as a string using its [`std::fmt::Display`] impl. Always
/// succeeds.
pub fn str(value: &Value) -> Value {
    Value::Str(value.to_string())
}

/// Coerces `value` to a boolean via [`Value::is_truthy`]. Always succeeds.
pub fn bool_(value: &Value) -> Value {
    Value::Bool(value.is_truthy())
}

/// Length of a string (in Unicode scalar values), array, or object. Any
/// other type is an error.
pub fn len(value: &Value) -> Result<Value, BuiltinError> {
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Object(fields) => fields.len(),
        _ => return Err(BuiltinError::Unconvertible { type_name: value.type_name(), target: "len" }),
    };
    Ok(Value::Int(n as i64))
}

/// Writes `values` space-separated to stdout followed by a newline, mirroring
/// Python-style `print`. Returns `null`.
pub fn print(values: &[Value]) -> Value {
    let rendered: Vec<std::string::String> = values.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join(" "));
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_parses_strings_and_truncates_floats() {
        assert_eq!(int(&Value::Str("42".to_string())).unwrap(), Value::Int(42));
        assert_eq!(int(&Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(int(&Value::Bool(true)).unwrap(), Value::Int(1));
    }

    #[test]
    fn int_rejects_unparsable_string() {
        assert!(int(&Value::Str("not a number".to_string())).is_err());
    }

    #[test]
    fn len_counts_unicode_scalars_not_bytes() {
        assert_eq!(len(&Value::Str("caf\u{e9}".to_string())).unwrap(), Value::Int(4));
    }

    #[test]
    fn len_rejects_scalars() {
        assert!(len(&Value::Int(5)).is_err());
    }

    #[test]
    fn bool_uses_truthiness_rules() {
        assert_eq!(bool_(&Value::Int(0)), Value::Bool(false));
        assert_eq!(bool_(&Value::Str("x".to_string())), Value::Bool(true));
    }

    #[test]
    fn str_renders_list_with_brackets() {
        let value = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(str(&value), Value::Str("[1, 2]".to_string()));
    }
}
