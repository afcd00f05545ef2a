//! Cache policies and cache-key generation.
//!
//! A rule's cache policy decides which evaluations within one request share
//! a result:
//!
//! | policy       | key                                  |
//! |--------------|--------------------------------------|
//! | `NoCache`    | none, every call evaluates           |
//! | `Contextual` | rule name                            |
//! | `Strict`     | rule name + hash of `(parent, args)` |
//! | `CustomKey`  | rule name + caller-computed string   |

use std::{fmt, str::FromStr, sync::Arc};

use serde_json::Value;
use sha2::{Digest, Sha256};

use palisade_contracts::error::PalisadeError;

use crate::context::FieldInvocation;

/// Computes the strict-cache digest of `(parent, args)`.
pub type HashFunction = Arc<dyn Fn(&Value, &Value) -> String + Send + Sync>;

/// Computes the caller-defined part of a custom cache key.
pub type KeyFunction = Arc<dyn Fn(&FieldInvocation) -> String + Send + Sync>;

/// How a rule's result is memoized within one request.
#[derive(Clone, Default)]
pub enum CachePolicy {
    /// Evaluate on every access.
    NoCache,
    /// One evaluation per rule per request.
    #[default]
    Contextual,
    /// One evaluation per distinct `(parent, args)`.
    Strict,
    /// One evaluation per distinct caller-computed key.
    CustomKey(KeyFunction),
}

impl CachePolicy {
    pub fn custom<F>(key: F) -> Self
    where
        F: Fn(&FieldInvocation) -> String + Send + Sync + 'static,
    {
        CachePolicy::CustomKey(Arc::new(key))
    }

    /// The cache key for `rule_name` on this access, or `None` for `NoCache`.
    pub fn key(
        &self,
        rule_name: &str,
        invocation: &FieldInvocation,
        hash: &HashFunction,
    ) -> Option<String> {
        match self {
            CachePolicy::NoCache => None,
            CachePolicy::Contextual => Some(rule_name.to_string()),
            CachePolicy::Strict => Some(format!(
                "{}-{}",
                rule_name,
                hash(&invocation.parent, &invocation.args)
            )),
            CachePolicy::CustomKey(key) => Some(format!("{}-{}", rule_name, key(invocation))),
        }
    }
}

/// Legacy boolean cache flags: `true` is strict, `false` disables caching.
impl From<bool> for CachePolicy {
    fn from(cache: bool) -> Self {
        if cache {
            CachePolicy::Strict
        } else {
            CachePolicy::NoCache
        }
    }
}

impl FromStr for CachePolicy {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_cache" | "no-cache" => Ok(CachePolicy::NoCache),
            "contextual" => Ok(CachePolicy::Contextual),
            "strict" => Ok(CachePolicy::Strict),
            other => Err(PalisadeError::ConfigError {
                reason: format!("unknown cache policy '{}'", other),
            }),
        }
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::NoCache => f.write_str("NoCache"),
            CachePolicy::Contextual => f.write_str("Contextual"),
            CachePolicy::Strict => f.write_str("Strict"),
            CachePolicy::CustomKey(_) => f.write_str("CustomKey(..)"),
        }
    }
}

// ── Structural hash ───────────────────────────────────────────────────────────

/// The default strict-cache hash function.
pub fn default_hash_function() -> HashFunction {
    Arc::new(structural_hash)
}

/// SHA-256 over a canonical encoding of `{parent, args}`, as lowercase hex.
///
/// Object keys are visited in sorted order, so structurally equal values
/// hash equally regardless of insertion order.
pub fn structural_hash(parent: &Value, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"parent");
    feed(&mut hasher, parent);
    hasher.update(b"args");
    feed(&mut hasher, args);
    hex::encode(hasher.finalize())
}

fn feed(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Bool(b) => hasher.update([1u8, *b as u8]),
        Value::Number(n) => {
            hasher.update([2u8]);
            feed_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update([3u8]);
            feed_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update([4u8]);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([5u8]);
            hasher.update((map.len() as u64).to_le_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                feed_str(hasher, key);
                feed(hasher, &map[key.as_str()]);
            }
        }
    }
}

fn feed_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
