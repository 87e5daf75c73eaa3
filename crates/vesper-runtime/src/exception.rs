//! The runtime exception type `throw` lowers to.
//!
//! The transformer rewrites `throw <expr>;` into a call of a synthetic
//! `__vesper_throw` function (see `vesper_core::transformer`); the emitter
//! recognizes that call specially and emits a construction of
//! [`VesperException`] wrapped in `Err(...)`, rather than routing it through
//! the allowed-functions whitelist like an ordinary call.

use crate::callback::{CallbackError, Value};
use crate::ops::OpError;
use crate::safe_attr::SafeAttrError;
use crate::builtin::BuiltinError;

/// A raised SL exception, carrying the thrown value as its payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("uncaught exception: {payload}")]
pub struct VesperException {
    pub payload: Value,
}

impl VesperException {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

/// Every fallible runtime helper converts into a [`VesperException`] so
/// emitted function bodies can propagate any of them with a single `?`,
/// regardless of which helper raised it.
impl From<CallbackError> for VesperException {
    fn from(error: CallbackError) -> Self {
        Self::new(Value::Str(error.to_string()))
    }
}

impl From<SafeAttrError> for VesperException {
    fn from(error: SafeAttrError) -> Self {
        Self::new(Value::Str(error.to_string()))
    }
}

impl From<OpError> for VesperException {
    fn from(error: OpError) -> Self {
        Self::new(Value::Str(error.to_string()))
    }
}

impl From<BuiltinError> for VesperException {
    fn from(error: BuiltinError) -> Self {
        Self::new(Value::Str(error.to_string()))
    }
}

impl From<crate::capability::CapabilityError> for VesperException {
    fn from(error: crate::capability::CapabilityError) -> Self {
        Self::new(Value::Str(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_payload() {
        let exception = VesperException::new(Value::Str("boom".to_string()));
        assert_eq!(exception.to_string(), "uncaught exception: boom");
    }
}
