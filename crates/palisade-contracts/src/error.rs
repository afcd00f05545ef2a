//! Build-time error types for the palisade engine.
//!
//! Everything that can go wrong while a rule tree is being attached to a
//! schema surfaces as a `PalisadeError`. Request-time outcomes (denials,
//! predicate faults, resolver faults) are values carried in
//! `ExecutionResult::errors`, never `PalisadeError`.

use thiserror::Error;

/// The unified error type for the palisade crates.
#[derive(Debug, Error)]
pub enum PalisadeError {
    /// The rule tree names types or fields the schema does not define.
    ///
    /// Every offending coordinate is listed, not only the first one found.
    #[error("rule tree references unknown schema coordinates: {}", coordinates.join(", "))]
    UnknownCoordinates { coordinates: Vec<String> },

    /// Two distinct rules share a name but wrap different predicates.
    #[error("rule name '{name}' is used by rules with different predicates")]
    RuleNameCollision { name: String },

    /// A rule declared a fragment that cannot be parsed or applied.
    #[error("invalid fragment '{fragment}': {reason}")]
    InvalidFragment { fragment: String, reason: String },

    /// A request document could not be parsed.
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// A settings value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl PalisadeError {
    /// True for errors raised while validating a rule tree against a schema.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PalisadeError::UnknownCoordinates { .. }
                | PalisadeError::RuleNameCollision { .. }
                | PalisadeError::InvalidFragment { .. }
                | PalisadeError::ConfigError { .. }
        )
    }
}

/// Convenience alias used throughout the palisade crates.
pub type PalisadeResult<T> = Result<T, PalisadeError>;
