//! Binary/unary operators over the dynamic [`crate::callback::Value`].
//!
//! Emitted code never inlines its own numeric-coercion rules at every `+`,
//! `<`, `^`... call site; it calls here instead, the same way it routes
//! attribute access through [`crate::safe_attr`] rather than matching on a
//! host type itself. Keeping the rules in one place means widening them
//! (e.g. letting `list + list` concatenate) only has to happen once.

use crate::callback::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    #[error("unsupported operand types for '{op}': {left} and {right}")]
    TypeMismatch { op: &'static str, left: &'static str, right: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("'{type_name}' has no field '{field}'")]
    NoSuchField { type_name: &'static str, field: String },
    #[error("'{type_name}' cannot be indexed")]
    NotIndexable { type_name: &'static str },
    #[error("index out of bounds")]
    IndexOutOfBounds,
    #[error("'{type_name}' cannot be iterated")]
    NotIterable { type_name: &'static str },
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    let l = match left {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => return None,
    };
    let r = match right {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => return None,
    };
    Some((l, r))
}

fn both_int(left: &Value, right: &Value) -> Option<(i64, i64)> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some((*l, *r)),
        _ => None,
    }
}

fn is_float(left: &Value, right: &Value) -> bool {
    matches!(left, Value::Float(_)) || matches!(right, Value::Float(_))
}

pub fn add(left: &Value, right: &Value) -> Result<Value, OpError> {
    match (left, right) {
        (Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{l}{r}"))),
        (Value::List(l), Value::List(r)) => {
            let mut items = l.clone();
            items.extend(r.iter().cloned());
            Ok(Value::List(items))
        }
        _ if numeric_pair(left, right).is_some() => {
            if is_float(left, right) {
                let (l, r) = numeric_pair(left, right).unwrap();
                Ok(Value::Float(l + r))
            } else {
                let (l, r) = both_int(left, right).unwrap();
                Ok(Value::Int(l + r))
            }
        }
        _ => Err(OpError::TypeMismatch { op: "+", left: left.type_name(), right: right.type_name() }),
    }
}

macro_rules! numeric_op {
    ($name:ident, $op:literal, $int_expr:expr, $float_expr:expr) => {
        pub fn $name(left: &Value, right: &Value) -> Result<Value, OpError> {
            if let Some((l, r)) = both_int(left, right) {
                if !is_float(left, right) {
                    let f: fn(i64, i64) -> i64 = $int_expr;
                    return Ok(Value::Int(f(l, r)));
                }
            }
            match numeric_pair(left, right) {
                Some((l, r)) => {
                    let f: fn(f64, f64) -> f64 = $float_expr;
                    Ok(Value::Float(f(l, r)))
                }
                None => Err(OpError::TypeMismatch { op: $op, left: left.type_name(), right: right.type_name() }),
            }
        }
    };
}

numeric_op!(sub, "-", |l, r| l - r, |l, r| l - r);
numeric_op!(mul, "*", |l, r| l * r, |l, r| l * r);

pub fn div(left: &Value, right: &Value) -> Result<Value, OpError> {
    if let Some((l, r)) = both_int(left, right) {
        if r == 0 {
            return Err(OpError::DivisionByZero);
        }
        return Ok(Value::Int(l / r));
    }
    match numeric_pair(left, right) {
        Some((l, r)) => {
            if r == 0.0 {
                return Err(OpError::DivisionByZero);
            }
            Ok(Value::Float(l / r))
        }
        None => Err(OpError::TypeMismatch { op: "/", left: left.type_name(), right: right.type_name() }),
    }
}

pub fn rem(left: &Value, right: &Value) -> Result<Value, OpError> {
    if let Some((l, r)) = both_int(left, right) {
        if r == 0 {
            return Err(OpError::DivisionByZero);
        }
        return Ok(Value::Int(l % r));
    }
    match numeric_pair(left, right) {
        Some((l, r)) => {
            if r == 0.0 {
                return Err(OpError::DivisionByZero);
            }
            Ok(Value::Float(l % r))
        }
        None => Err(OpError::TypeMismatch { op: "%", left: left.type_name(), right: right.type_name() }),
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let Some((l, r)) = numeric_pair(left, right) {
        return l.partial_cmp(&r);
    }
    if let (Value::Str(l), Value::Str(r)) = (left, right) {
        return Some(l.cmp(r));
    }
    None
}

pub fn lt(left: &Value, right: &Value) -> Result<Value, OpError> {
    compare(left, right).map(|o| Value::Bool(o.is_lt())).ok_or(OpError::TypeMismatch { op: "<", left: left.type_name(), right: right.type_name() })
}

pub fn le(left: &Value, right: &Value) -> Result<Value, OpError> {
    compare(left, right).map(|o| Value::Bool(o.is_le())).ok_or(OpError::TypeMismatch { op: "<=", left: left.type_name(), right: right.type_name() })
}

pub fn gt(left: &Value, right: &Value) -> Result<Value, OpError> {
    compare(left, right).map(|o| Value::Bool(o.is_gt())).ok_or(OpError::TypeMismatch { op: ">", left: left.type_name(), right: right.type_name() })
}

pub fn ge(left: &Value, right: &Value) -> Result<Value, OpError> {
    compare(left, right).map(|o| Value::Bool(o.is_ge())).ok_or(OpError::TypeMismatch { op: ">=", left: left.type_name(), right: right.type_name() })
}

/// Structural equality always succeeds; there is no type pair `==` refuses
/// to compare, it just returns `false` across kinds.
pub fn eq(left: &Value, right: &Value) -> Value {
    Value::Bool(left == right)
}

pub fn ne(left: &Value, right: &Value) -> Value {
    Value::Bool(left != right)
}

pub fn not(value: &Value) -> Value {
    Value::Bool(!value.is_truthy())
}

fn both_bits(left: &Value, right: &Value, op: &'static str) -> Result<(i64, i64), OpError> {
    both_int(left, right).ok_or(OpError::TypeMismatch { op, left: left.type_name(), right: right.type_name() })
}

pub fn bitand(left: &Value, right: &Value) -> Result<Value, OpError> {
    both_bits(left, right, "&").map(|(l, r)| Value::Int(l & r))
}

pub fn bitor(left: &Value, right: &Value) -> Result<Value, OpError> {
    both_bits(left, right, "|").map(|(l, r)| Value::Int(l | r))
}

pub fn bitxor(left: &Value, right: &Value) -> Result<Value, OpError> {
    both_bits(left, right, "^").map(|(l, r)| Value::Int(l ^ r))
}

pub fn shl(left: &Value, right: &Value) -> Result<Value, OpError> {
    both_bits(left, right, "<<").map(|(l, r)| Value::Int(l << r))
}

pub fn shr(left: &Value, right: &Value) -> Result<Value, OpError> {
    both_bits(left, right, ">>").map(|(l, r)| Value::Int(l >> r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_strings() {
        let result = add(&Value::Str("foo".into()), &Value::Str("bar".into())).unwrap();
        assert_eq!(result, Value::Str("foobar".into()));
    }

    #[test]
    fn add_widens_int_and_float() {
        let result = add(&Value::Int(1), &Value::Float(2.5)).unwrap();
        assert_eq!(result, Value::Float(3.5));
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert!(matches!(div(&Value::Int(1), &Value::Int(0)), Err(OpError::DivisionByZero)));
    }

    #[test]
    fn mismatched_types_error_on_arithmetic() {
        let err = sub(&Value::Str("x".into()), &Value::Int(1));
        assert!(matches!(err, Err(OpError::TypeMismatch { .. })));
    }

    #[test]
    fn eq_never_errors_across_kinds() {
        assert_eq!(eq(&Value::Int(1), &Value::Str("1".into())), Value::Bool(false));
    }
}
