//! Request-scoped context and the per-request rule cache.
//!
//! A `RequestContext` is created by the caller once per request and handed
//! to the host engine, which passes it to every resolver. Its `ShieldCache`
//! is dropped with the last clone of the context, so cached rule results
//! never outlive the request.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::debug;

use palisade_contracts::{execution::ResolveInfo, result::RuleResult};

use crate::rule::RuleFault;

/// What a rule evaluation settles to: a result, or a predicate fault.
pub type RuleOutcome = Result<RuleResult, RuleFault>;

/// An in-flight or settled rule evaluation shared by every waiter.
pub type SharedOutcome = Shared<BoxFuture<'static, RuleOutcome>>;

// ── ShieldCache ───────────────────────────────────────────────────────────────

/// Memoized rule evaluations for one request, keyed by cache key.
///
/// The map stores the evaluation future itself, inserted before anyone
/// awaits it, so concurrent evaluations of the same key run the predicate
/// once. Entries are never invalidated.
#[derive(Default)]
pub struct ShieldCache {
    entries: Mutex<HashMap<String, SharedOutcome>>,
}

impl ShieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the evaluation stored under `key`, or store and return the one
    /// built by `evaluate`.
    ///
    /// `evaluate` runs only on a miss, while the map lock is held; it must
    /// only construct the future, not poll it.
    pub fn memoize<F>(&self, key: String, evaluate: F) -> SharedOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RuleOutcome>,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&key) {
            debug!(cache_key = %key, "rule cache hit");
            return existing.clone();
        }
        debug!(cache_key = %key, "rule cache miss");
        let shared = evaluate().shared();
        entries.insert(key, shared.clone());
        shared
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ShieldCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShieldCache").field("entries", &self.len()).finish()
    }
}

// ── RequestContext ────────────────────────────────────────────────────────────

/// How a context reaches the request cache.
///
/// Evaluations stored in the cache hold a `Weak` handle; otherwise the cache
/// would own a future that owns the cache, and a pending entry would keep
/// the whole request alive.
#[derive(Clone)]
enum CacheHandle {
    Owned(Arc<ShieldCache>),
    Detached(Weak<ShieldCache>),
}

/// The context value threaded through one request.
///
/// Cloning is cheap and every clone shares the same cache. The cache is
/// dropped with the last clone created by the caller or the host engine.
#[derive(Clone)]
pub struct RequestContext {
    data: Arc<Value>,
    cache: CacheHandle,
}

impl RequestContext {
    /// A fresh context carrying caller data (identity, tenant, ...).
    pub fn new(data: Value) -> Self {
        Self {
            data: Arc::new(data),
            cache: CacheHandle::Owned(Arc::new(ShieldCache::new())),
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The request's rule cache.
    ///
    /// `None` only for a context handed to a cached evaluation that is still
    /// running after its request has ended.
    pub fn shield(&self) -> Option<Arc<ShieldCache>> {
        match &self.cache {
            CacheHandle::Owned(cache) => Some(Arc::clone(cache)),
            CacheHandle::Detached(cache) => cache.upgrade(),
        }
    }

    /// A handle on the same request that does not keep its cache alive.
    pub(crate) fn detached(&self) -> Self {
        let cache = match &self.cache {
            CacheHandle::Owned(cache) => CacheHandle::Detached(Arc::downgrade(cache)),
            detached => detached.clone(),
        };
        Self {
            data: Arc::clone(&self.data),
            cache,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("data", &self.data)
            .field("shield", &self.shield())
            .finish()
    }
}

// ── FieldInvocation ───────────────────────────────────────────────────────────

static NULL: Value = Value::Null;

/// Everything a resolver or rule predicate receives for one field access.
///
/// Held by value so predicate futures can outlive the borrow of the caller.
#[derive(Debug, Clone)]
pub struct FieldInvocation {
    pub parent: Value,
    pub args: Value,
    pub context: RequestContext,
    pub info: ResolveInfo,
}

impl FieldInvocation {
    /// Argument `name`, or `Value::Null` when absent.
    pub fn arg(&self, name: &str) -> &Value {
        self.args.get(name).unwrap_or(&NULL)
    }
}
