//! Leaf rules: a named, cached predicate with an optional data dependency.
//!
//! Construct rules through [`rule()`]:
//!
//! ```rust,ignore
//! use palisade_core::{rule, CachePolicy};
//!
//! let is_admin = rule()
//!     .name("isAdmin")
//!     .cache(CachePolicy::Contextual)
//!     .check(|inv| inv.context.data()["role"] == "admin");
//! ```

use std::{fmt, future::Future, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use palisade_contracts::result::{RuleResult, SharedError};

use crate::{
    cache::{CachePolicy, HashFunction},
    context::{FieldInvocation, RuleOutcome},
    logic::ShieldRule,
};

// ── RuleFault ─────────────────────────────────────────────────────────────────

/// A predicate raised instead of producing a result.
///
/// Faults are not denials: the wrapped resolver applies the configured
/// error policy to them (debug / external errors / fallback error).
#[derive(Clone)]
pub struct RuleFault {
    message: String,
    source: Option<SharedError>,
}

impl RuleFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Arc::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for RuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleFault")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for RuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RuleFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<String> for RuleFault {
    fn from(message: String) -> Self {
        RuleFault::new(message)
    }
}

impl From<&str> for RuleFault {
    fn from(message: &str) -> Self {
        RuleFault::new(message)
    }
}

impl From<RuleFault> for palisade_contracts::execution::FieldError {
    fn from(fault: RuleFault) -> Self {
        Self {
            message: fault.message,
            path: None,
            source: fault.source,
        }
    }
}

// ── Rule ──────────────────────────────────────────────────────────────────────

type Predicate = Arc<dyn Fn(FieldInvocation) -> BoxFuture<'static, RuleOutcome> + Send + Sync>;

/// A leaf authorization unit.
///
/// Cloning a `Rule` keeps its predicate, so a clone is `equals` to the
/// original even though it is a distinct instance.
#[derive(Clone)]
pub struct Rule {
    name: String,
    cache: CachePolicy,
    fragment: Option<String>,
    predicate: Predicate,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.cache
    }

    /// The declared fragment source, if the rule needs extra data.
    pub fn extract_fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// True iff both rules wrap the same predicate.
    pub fn equals(&self, other: &Rule) -> bool {
        Arc::ptr_eq(&self.predicate, &other.predicate)
    }

    /// A copy of this rule under a different cache policy.
    pub fn with_cache(&self, cache: impl Into<CachePolicy>) -> Rule {
        Rule {
            cache: cache.into(),
            ..self.clone()
        }
    }

    /// Evaluate the rule through the request cache.
    ///
    /// On a cache miss the predicate future is stored before it is polled,
    /// so concurrent evaluations under the same key share one invocation.
    /// The stored future sees a detached context, which does not keep the
    /// cache alive.
    pub fn resolve<'a>(
        &'a self,
        invocation: &'a FieldInvocation,
        hash: &'a HashFunction,
    ) -> BoxFuture<'a, RuleOutcome> {
        let cached = self
            .cache
            .key(&self.name, invocation, hash)
            .and_then(|key| Some((key, invocation.context.shield()?)));
        match cached {
            None => {
                debug!(rule = %self.name, field = %invocation.info.coordinate(), "evaluating uncached rule");
                (self.predicate)(invocation.clone())
            }
            Some((key, cache)) => {
                let shared = cache.memoize(key, || {
                    (self.predicate)(FieldInvocation {
                        context: invocation.context.detached(),
                        ..invocation.clone()
                    })
                });
                shared.boxed()
            }
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .field("fragment", &self.fragment)
            .finish()
    }
}

// ── RuleBuilder ───────────────────────────────────────────────────────────────

/// Start building a rule.
pub fn rule() -> RuleBuilder {
    RuleBuilder::default()
}

/// Builder for [`Rule`]. Finish with `resolve` (async) or `check` (sync).
#[derive(Debug, Default)]
pub struct RuleBuilder {
    name: Option<String>,
    cache: CachePolicy,
    fragment: Option<String>,
}

impl RuleBuilder {
    /// Name the rule. Unnamed rules get a process-unique random name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn cache(mut self, cache: impl Into<CachePolicy>) -> Self {
        self.cache = cache.into();
        self
    }

    /// Declare extra data the rule needs, e.g. `... on User { ownerId }`.
    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Finish with an async, fallible predicate.
    ///
    /// `Ok` values normalize through `Into<RuleResult>` (`bool`, `String`,
    /// `&str`, `RuleResult`); `Err` is a predicate fault.
    pub fn resolve<F, Fut, T, E>(self, predicate: F) -> ShieldRule
    where
        F: Fn(FieldInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<RuleResult> + 'static,
        E: Into<RuleFault> + 'static,
    {
        let predicate: Predicate = Arc::new(move |invocation: FieldInvocation| {
            predicate(invocation)
                .map(|outcome: Result<T, E>| -> RuleOutcome {
                    outcome.map(Into::into).map_err(Into::into)
                })
                .boxed()
        });
        self.finish(predicate)
    }

    /// Finish with a synchronous, infallible predicate.
    pub fn check<F, T>(self, predicate: F) -> ShieldRule
    where
        F: Fn(&FieldInvocation) -> T + Send + Sync + 'static,
        T: Into<RuleResult> + 'static,
    {
        let predicate = Arc::new(predicate);
        let predicate: Predicate = Arc::new(move |invocation: FieldInvocation| {
            let predicate = predicate.clone();
            async move { Ok::<RuleResult, RuleFault>(predicate(&invocation).into()) }.boxed()
        });
        self.finish(predicate)
    }

    fn finish(self, predicate: Predicate) -> ShieldRule {
        let name = self
            .name
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        ShieldRule::Rule(Arc::new(Rule {
            name,
            cache: self.cache,
            fragment: self.fragment,
            predicate,
        }))
    }
}
