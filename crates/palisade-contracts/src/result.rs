//! The tri-state rule result.
//!
//! Every evaluation path collapses to exactly one `RuleResult`. Only
//! `Authorized` lets the wrapped field resolver run.

use std::{fmt, sync::Arc};

/// A shareable error value, kept so pass-through policies can surface the
/// error a rule returned instead of a copy of its message.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// The reason attached to a `RuleResult::DeniedWithReason`.
#[derive(Clone)]
pub struct Denial {
    message: String,
    source: Option<SharedError>,
}

impl Denial {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Build a denial from an error value, keeping the error itself.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(error))
    }

    pub fn from_shared(error: SharedError) -> Self {
        Self {
            message: error.to_string(),
            source: Some(error),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original error, when the denial was built from one.
    pub fn source(&self) -> Option<&SharedError> {
        self.source.as_ref()
    }
}

impl fmt::Debug for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Denial")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Denials compare by message only.
impl PartialEq for Denial {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for Denial {}

/// The outcome of evaluating a rule for one field access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    /// The caller may read the field.
    Authorized,
    /// Access denied with no specific reason; the fallback error is surfaced.
    Denied,
    /// Access denied; the reason is surfaced to the caller.
    DeniedWithReason(Denial),
}

impl RuleResult {
    pub fn is_authorized(&self) -> bool {
        matches!(self, RuleResult::Authorized)
    }

    pub fn has_reason(&self) -> bool {
        matches!(self, RuleResult::DeniedWithReason(_))
    }

    /// Shorthand for `DeniedWithReason(Denial::new(message))`.
    pub fn reason(message: impl Into<String>) -> Self {
        RuleResult::DeniedWithReason(Denial::new(message))
    }

    /// Normalize a returned error value into a denial that keeps the error.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RuleResult::DeniedWithReason(Denial::from_error(error))
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            RuleResult::DeniedWithReason(denial) => Some(denial),
            _ => None,
        }
    }
}

// ── Predicate output normalization ────────────────────────────────────────────

impl From<bool> for RuleResult {
    fn from(allowed: bool) -> Self {
        if allowed {
            RuleResult::Authorized
        } else {
            RuleResult::Denied
        }
    }
}

impl From<String> for RuleResult {
    fn from(message: String) -> Self {
        RuleResult::DeniedWithReason(Denial::new(message))
    }
}

impl From<&str> for RuleResult {
    fn from(message: &str) -> Self {
        RuleResult::DeniedWithReason(Denial::new(message))
    }
}

impl From<Denial> for RuleResult {
    fn from(denial: Denial) -> Self {
        RuleResult::DeniedWithReason(denial)
    }
}
