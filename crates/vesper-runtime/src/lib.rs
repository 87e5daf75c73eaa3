//! Runtime support linked into every artifact the Vesper code emitter produces.
//!
//! Emitted host code never touches files, sockets, or process handles directly;
//! every such operation is routed through [`capability`] so the capability
//! granted to the running script can be checked before the call reaches the
//! host runtime. [`safe_attr`] mirrors that enforcement for attribute and
//! method access on host objects exposed to scripts, [`async_exec`] gives the
//! emitted `async`/`await` surface a small worker pool to run on, and
//! [`callback`] lets host callbacks re-resolve script-side functions by name
//! so a hot-reloaded module is picked up on the next invocation instead of
//! calling into a stale compiled closure.

pub mod async_exec;
pub use async_exec::Timeout;
pub mod builtin;
pub mod callback;
pub mod capability;
pub mod exception;
pub mod ops;
pub mod safe_attr;

pub use capability::{
    CapabilityContext, CapabilityError, CapabilityManager, CapabilityToken, CaveatPredicate,
    ContextId, ExecutionKind,
};
pub use exception::VesperException;
pub use safe_attr::{safe_attr, safe_call, register_callable, AttributeAccess, SafeAttrError, SafeAttributeRegistry};
