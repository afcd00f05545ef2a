//! Options controlling how a rule tree is attached and how failures surface.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use palisade_contracts::{
    error::{PalisadeError, PalisadeResult},
    execution::FieldError,
};
use palisade_core::{allow, default_hash_function, deny, FieldInvocation, HashFunction, ShieldRule};

/// Message of the default fallback error.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Not Authorised!";

/// Maps the underlying fault (if any) and the field access to the error the
/// caller sees.
pub type ErrorMapper = Arc<dyn Fn(Option<&FieldError>, &FieldInvocation) -> FieldError + Send + Sync>;

/// The error returned for plain denials and hidden faults.
#[derive(Clone)]
pub enum FallbackError {
    Error(FieldError),
    Mapper(ErrorMapper),
}

impl FallbackError {
    /// `cause` is `None` for a plain denial.
    pub fn resolve(&self, cause: Option<&FieldError>, invocation: &FieldInvocation) -> FieldError {
        match self {
            FallbackError::Error(error) => error.clone(),
            FallbackError::Mapper(mapper) => mapper(cause, invocation),
        }
    }
}

impl Default for FallbackError {
    fn default() -> Self {
        FallbackError::Error(FieldError::new(DEFAULT_FALLBACK_MESSAGE))
    }
}

impl fmt::Debug for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackError::Error(error) => f.debug_tuple("Error").field(&error.message).finish(),
            FallbackError::Mapper(_) => f.write_str("Mapper(<fn>)"),
        }
    }
}

/// Shield configuration.
#[derive(Clone)]
pub struct ShieldOptions {
    /// Return faults verbatim.
    pub debug: bool,
    /// Return resolver and predicate faults verbatim without full debug.
    pub allow_external_errors: bool,
    /// Rule for coordinates the tree does not cover.
    pub fallback_rule: ShieldRule,
    pub fallback_error: FallbackError,
    /// Hash of `(parent, args)` used by strict caching.
    pub hash_function: HashFunction,
}

impl Default for ShieldOptions {
    fn default() -> Self {
        Self {
            debug: false,
            allow_external_errors: false,
            fallback_rule: allow(),
            fallback_error: FallbackError::default(),
            hash_function: default_hash_function(),
        }
    }
}

impl ShieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn allow_external_errors(mut self, allow: bool) -> Self {
        self.allow_external_errors = allow;
        self
    }

    pub fn fallback_rule(mut self, rule: ShieldRule) -> Self {
        self.fallback_rule = rule;
        self
    }

    pub fn fallback_error(mut self, message: impl Into<String>) -> Self {
        self.fallback_error = FallbackError::Error(FieldError::new(message));
        self
    }

    pub fn fallback_error_with<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Option<&FieldError>, &FieldInvocation) -> FieldError + Send + Sync + 'static,
    {
        self.fallback_error = FallbackError::Mapper(Arc::new(mapper));
        self
    }

    pub fn hash_function<F>(mut self, hash: F) -> Self
    where
        F: Fn(&Value, &Value) -> String + Send + Sync + 'static,
    {
        self.hash_function = Arc::new(hash);
        self
    }

    /// True when faults reach the caller unchanged.
    pub fn exposes_faults(&self) -> bool {
        self.debug || self.allow_external_errors
    }
}

impl fmt::Debug for ShieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShieldOptions")
            .field("debug", &self.debug)
            .field("allow_external_errors", &self.allow_external_errors)
            .field("fallback_rule", &self.fallback_rule)
            .field("fallback_error", &self.fallback_error)
            .finish_non_exhaustive()
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Built-in rule used as the fallback in [`ShieldSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackSetting {
    #[default]
    Allow,
    Deny,
}

/// The serializable subset of [`ShieldOptions`].
///
/// ```toml
/// debug = false
/// allow_external_errors = true
/// fallback = "deny"
/// fallback_error = "Forbidden"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShieldSettings {
    pub debug: bool,
    pub allow_external_errors: bool,
    pub fallback: FallbackSetting,
    pub fallback_error: String,
}

impl Default for ShieldSettings {
    fn default() -> Self {
        Self {
            debug: false,
            allow_external_errors: false,
            fallback: FallbackSetting::Allow,
            fallback_error: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl ShieldSettings {
    /// Parse settings from a TOML string. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> PalisadeResult<Self> {
        toml::from_str(s).map_err(|e| PalisadeError::ConfigError {
            reason: format!("failed to parse shield settings TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as TOML shield settings.
    pub fn from_file(path: &Path) -> PalisadeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PalisadeError::ConfigError {
            reason: format!("failed to read settings file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn into_options(self) -> ShieldOptions {
        let fallback_rule = match self.fallback {
            FallbackSetting::Allow => allow(),
            FallbackSetting::Deny => deny(),
        };
        ShieldOptions::new()
            .debug(self.debug)
            .allow_external_errors(self.allow_external_errors)
            .fallback_rule(fallback_rule)
            .fallback_error(self.fallback_error)
    }
}

impl From<ShieldSettings> for ShieldOptions {
    fn from(settings: ShieldSettings) -> Self {
        settings.into_options()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use palisade_contracts::execution::ResolveInfo;
    use palisade_core::{LogicRule, RequestContext};
    use serde_json::json;

    use super::*;

    fn invocation() -> FieldInvocation {
        FieldInvocation {
            parent: json!({}),
            args: json!({}),
            context: RequestContext::default(),
            info: ResolveInfo::new("Query", "secret", "String"),
        }
    }

    #[test]
    fn defaults() {
        let options = ShieldOptions::default();
        assert!(!options.debug);
        assert!(!options.allow_external_errors);
        assert!(!options.exposes_faults());
        assert!(matches!(
            &options.fallback_rule,
            ShieldRule::Logic(logic) if matches!(**logic, LogicRule::Allow)
        ));
        assert_eq!(
            options.fallback_error.resolve(None, &invocation()).message,
            "Not Authorised!"
        );
    }

    #[test]
    fn mapper_sees_the_cause() {
        let options = ShieldOptions::new().fallback_error_with(|cause, inv| {
            FieldError::new(format!(
                "{}: {}",
                inv.info.field_name,
                cause.map(|c| c.message.as_str()).unwrap_or("denied")
            ))
        });
        let cause = FieldError::new("db down");
        assert_eq!(
            options.fallback_error.resolve(Some(&cause), &invocation()).message,
            "secret: db down"
        );
        assert_eq!(
            options.fallback_error.resolve(None, &invocation()).message,
            "secret: denied"
        );
    }

    #[test]
    fn settings_from_toml() {
        let settings = ShieldSettings::from_toml_str(
            "allow_external_errors = true\nfallback = \"deny\"\nfallback_error = \"Forbidden\"\n",
        )
        .unwrap();
        assert!(!settings.debug);
        assert!(settings.allow_external_errors);
        assert_eq!(settings.fallback, FallbackSetting::Deny);

        let options = settings.into_options();
        assert!(options.exposes_faults());
        assert!(matches!(
            &options.fallback_rule,
            ShieldRule::Logic(logic) if matches!(**logic, LogicRule::Deny)
        ));
        assert_eq!(options.fallback_error.resolve(None, &invocation()).message, "Forbidden");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(ShieldSettings::from_toml_str("").unwrap(), ShieldSettings::default());
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = ShieldSettings::from_toml_str("fallback = \"maybe\"").unwrap_err();
        assert!(matches!(err, PalisadeError::ConfigError { .. }));
        let err = ShieldSettings::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn settings_from_file() {
        let path = std::env::temp_dir().join(format!("palisade-settings-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "debug = true").unwrap();
        drop(file);
        let settings = ShieldSettings::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(settings.debug);

        let missing = ShieldSettings::from_file(Path::new("/nonexistent/palisade.toml"));
        assert!(matches!(missing, Err(PalisadeError::ConfigError { .. })));
    }
}
