//! Capability tokens and the per-thread capability stack.
//!
//! A script never asks the host "am I allowed to do X"; instead every
//! runtime entry point that performs a privileged operation (`safe_call`,
//! `safe_attr`, `async_execute`, ...) asks [`CapabilityManager::current`] for
//! the active [`CapabilityContext`] and checks [`CapabilityContext::has_capability`]
//! before doing anything. Contexts form a tree: a task spawned by
//! [`crate::async_exec::async_execute`] or a callback invoked through
//! [`crate::callback::wrap_callback`] gets a *child* context that can only
//! narrow the capabilities of its parent, never widen them.
//!
//! This is a deliberately smaller cousin of a full attenuated-bearer-token
//! design (no HMAC chaining, no serialized wire format): tokens live only in
//! process memory for the lifetime of a single compile-and-run, so there is
//! nothing to forge and nothing to verify against a root key.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glob::Pattern;

/// Opaque identifier for a [`CapabilityContext`] in the manager's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// What kind of execution a [`CapabilityContext`] was created for.
///
/// Only `Main` contexts may be created without a parent; every other kind
/// is always a child of the context that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    /// The top-level program or module being compiled and run.
    Main,
    /// A task spawned through [`crate::async_exec::async_execute`].
    Task,
    /// A host callback invoked through [`crate::callback::wrap_callback`].
    Callback,
    /// An incremental REPL submission.
    Repl,
}

/// A narrowing predicate attached to a [`CapabilityToken`].
///
/// Caveats are a conjunction: every predicate attached to a token must hold
/// for a check against that token to succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaveatPredicate {
    /// The token may only be used this many more times in total.
    MaxUses(u32),
    /// The token expires after this many milliseconds from creation.
    ExpiresAfterMs(u64),
    /// Free-form key/value constraint interpreted by the host binding that
    /// owns the capability type (e.g. `("method", "GET")` for an http token).
    Custom(String, String),
}

impl fmt::Display for CaveatPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxUses(n) => write!(f, "uses <= {n}"),
            Self::ExpiresAfterMs(ms) => write!(f, "age < {ms}ms"),
            Self::Custom(k, v) => write!(f, "{k} = {v}"),
        }
    }
}

/// A capability granted to a [`CapabilityContext`]: the right to perform
/// `capability_type` operations against resources matching one of
/// `resource_patterns`, subject to `caveats`.
#[derive(Debug, Clone)]
pub struct CapabilityToken {
    pub capability_type: String,
    resource_patterns: Vec<Pattern>,
    raw_patterns: Vec<String>,
    caveats: Vec<CaveatPredicate>,
    created_at: Instant,
    usage_count: Arc<AtomicU64>,
}

impl CapabilityToken {
    /// Builds a token for `capability_type` (e.g. `"fs.read"`, `"net.connect"`)
    /// scoped to the given glob resource patterns (e.g. `["/tmp/**"]`).
    ///
    /// Malformed glob patterns are dropped; a token with no usable pattern
    /// matches nothing, which is the safe failure mode.
    pub fn new(capability_type: impl Into<String>, resource_patterns: &[&str]) -> Self {
        let raw_patterns: Vec<String> = resource_patterns.iter().map(|s| s.to_string()).collect();
        let resource_patterns = raw_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self {
            capability_type: capability_type.into(),
            resource_patterns,
            raw_patterns,
            caveats: Vec::new(),
            created_at: Instant::now(),
            usage_count: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn with_caveat(mut self, predicate: CaveatPredicate) -> Self {
        self.caveats.push(predicate);
        self
    }

    pub fn resource_patterns(&self) -> &[String] {
        &self.raw_patterns
    }

    fn matches_resource(&self, resource: &str) -> bool {
        self.resource_patterns.is_empty() || self.resource_patterns.iter().any(|p| p.matches(resource))
    }

    fn check_caveats(&self) -> Result<(), CapabilityError> {
        for caveat in &self.caveats {
            match caveat {
                CaveatPredicate::MaxUses(limit) => {
                    if self.usage_count.load(Ordering::SeqCst) >= u64::from(*limit) {
                        return Err(CapabilityError::UsageExhausted {
                            capability_type: self.capability_type.clone(),
                            max_uses: *limit,
                        });
                    }
                }
                CaveatPredicate::ExpiresAfterMs(ms) => {
                    if self.created_at.elapsed() > Duration::from_millis(*ms) {
                        return Err(CapabilityError::Expired {
                            capability_type: self.capability_type.clone(),
                        });
                    }
                }
                CaveatPredicate::Custom(_, _) => {}
            }
        }
        Ok(())
    }

    /// Checks the token against `resource` and, if it grants access,
    /// increments its usage counter.
    pub fn check_and_use(&self, resource: &str) -> Result<(), CapabilityError> {
        self.check_caveats()?;
        if !self.matches_resource(resource) {
            return Err(CapabilityError::ResourceNotAllowed {
                capability_type: self.capability_type.clone(),
                resource: resource.to_string(),
            });
        }
        self.usage_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Errors raised when a capability check fails.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability '{capability_type}' not granted in this context")]
    NotGranted { capability_type: String },
    #[error("capability '{capability_type}' does not permit resource '{resource}'")]
    ResourceNotAllowed {
        capability_type: String,
        resource: String,
    },
    #[error("capability '{capability_type}' has exceeded its usage limit of {max_uses}")]
    UsageExhausted {
        capability_type: String,
        max_uses: u32,
    },
    #[error("capability '{capability_type}' has expired")]
    Expired { capability_type: String },
    #[error("no active capability context on this thread")]
    NoActiveContext,
}

/// A node in the capability context tree.
///
/// A child context can only ever see a subset of its parent's granted
/// capability types: [`CapabilityContext::has_capability`] walks up the
/// chain and a denial at any level denies the whole check, but a context
/// never inherits a capability its ancestors did not also hold.
#[derive(Debug)]
pub struct CapabilityContext {
    id: ContextId,
    parent: Option<ContextId>,
    execution_kind: ExecutionKind,
    tokens: Vec<CapabilityToken>,
}

impl CapabilityContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    pub fn execution_kind(&self) -> ExecutionKind {
        self.execution_kind
    }

    /// True if some token directly attached to this context (not an
    /// ancestor) grants `capability_type` for `resource`.
    pub fn has_capability(&self, capability_type: &str, resource: &str) -> bool {
        self.tokens
            .iter()
            .filter(|t| t.capability_type == capability_type)
            .any(|t| t.check_and_use(resource).is_ok())
    }

    pub fn tokens(&self) -> &[CapabilityToken] {
        &self.tokens
    }
}

struct Registry {
    contexts: Mutex<HashMap<ContextId, Arc<CapabilityContext>>>,
    next_id: AtomicU64,
}

static REGISTRY: Registry = Registry {
    contexts: Mutex::new(HashMap::new()),
    next_id: AtomicU64::new(1),
};

thread_local! {
    static STACK: RefCell<Vec<ContextId>> = const { RefCell::new(Vec::new()) };
}

/// Entry point for creating, activating, and looking up capability contexts.
///
/// `CapabilityManager` itself holds no state; all state lives in a process-wide
/// registry plus a per-thread activation stack, mirroring the teacher's
/// thread-local scope-stack pattern used elsewhere for structured nesting.
pub struct CapabilityManager;

impl CapabilityManager {
    /// Registers a new context and returns its id. The context is not yet
    /// active on any thread; call [`CapabilityManager::activate`] to push it.
    pub fn create_context(
        execution_kind: ExecutionKind,
        parent: Option<ContextId>,
        tokens: Vec<CapabilityToken>,
    ) -> ContextId {
        let id = ContextId(REGISTRY.next_id.fetch_add(1, Ordering::SeqCst));
        let context = Arc::new(CapabilityContext {
            id,
            parent,
            execution_kind,
            tokens,
        });
        REGISTRY
            .contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, context);
        id
    }

    /// Pushes `id` onto this thread's activation stack for the lifetime of
    /// the returned guard. Nested `activate` calls are allowed; the
    /// innermost active context is what [`CapabilityManager::current`] sees.
    pub fn activate(id: ContextId) -> ActivationGuard {
        STACK.with(|stack| stack.borrow_mut().push(id));
        ActivationGuard { _private: () }
    }

    /// Returns the context active on the calling thread, if any.
    pub fn current() -> Option<Arc<CapabilityContext>> {
        let id = STACK.with(|stack| stack.borrow().last().copied())?;
        REGISTRY
            .contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Checks `capability_type`/`resource` against the currently active
    /// context, walking up through ancestors until one grants it or the
    /// chain is exhausted.
    pub fn use_capability(capability_type: &str, resource: &str) -> Result<(), CapabilityError> {
        let mut current = Self::current().ok_or(CapabilityError::NoActiveContext)?;
        loop {
            if current.has_capability(capability_type, resource) {
                return Ok(());
            }
            match current.parent() {
                Some(parent_id) => {
                    current = REGISTRY
                        .contexts
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .get(&parent_id)
                        .cloned()
                        .ok_or(CapabilityError::NoActiveContext)?;
                }
                None => {
                    return Err(CapabilityError::NotGranted {
                        capability_type: capability_type.to_string(),
                    })
                }
            }
        }
    }

    /// Looks up an already-registered context by id, for propagating it to
    /// a different thread (a worker picked by [`crate::async_exec::async_execute`]).
    pub fn lookup(id: ContextId) -> Option<Arc<CapabilityContext>> {
        REGISTRY
            .contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Creates a `Task` child of `parent` carrying the same tokens, for a
    /// unit of work about to run on a worker thread. The worker calls
    /// [`CapabilityManager::activate`] with the returned id once it starts.
    pub fn propagate_to_task(parent: ContextId) -> Option<ContextId> {
        let parent_ctx = Self::lookup(parent)?;
        Some(Self::create_context(
            ExecutionKind::Task,
            Some(parent),
            parent_ctx
                .tokens()
                .iter()
                .map(|t| {
                    let mut clone = CapabilityToken::new(
                        t.capability_type.clone(),
                        &t.resource_patterns().iter().map(String::as_str).collect::<Vec<_>>(),
                    );
                    clone.caveats = t.caveats.clone();
                    clone
                })
                .collect(),
        ))
    }
}

/// RAII guard popping its context off the thread's activation stack on drop.
pub struct ActivationGuard {
    _private: (),
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_matching_resource() {
        let token = CapabilityToken::new("fs.read", &["/tmp/**"]);
        assert!(token.check_and_use("/tmp/a.txt").is_ok());
        assert!(token.check_and_use("/etc/passwd").is_err());
    }

    #[test]
    fn usage_limit_is_enforced() {
        let token = CapabilityToken::new("net.connect", &["*"]).with_caveat(CaveatPredicate::MaxUses(1));
        assert!(token.check_and_use("example.com").is_ok());
        assert!(matches!(
            token.check_and_use("example.com"),
            Err(CapabilityError::UsageExhausted { .. })
        ));
    }

    #[test]
    fn child_context_denied_without_token() {
        let root = CapabilityManager::create_context(
            ExecutionKind::Main,
            None,
            vec![CapabilityToken::new("fs.read", &["/data/**"])],
        );
        let _guard = CapabilityManager::activate(root);
        assert!(CapabilityManager::use_capability("fs.read", "/data/x").is_ok());
        assert!(CapabilityManager::use_capability("fs.write", "/data/x").is_err());
    }

    #[test]
    fn task_inherits_parent_tokens() {
        let root = CapabilityManager::create_context(
            ExecutionKind::Main,
            None,
            vec![CapabilityToken::new("fs.read", &["/data/**"])],
        );
        let task = CapabilityManager::propagate_to_task(root).expect("parent exists");
        let _guard = CapabilityManager::activate(task);
        assert!(CapabilityManager::use_capability("fs.read", "/data/x").is_ok());
    }
}
