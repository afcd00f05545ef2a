//! Field resolution metadata, field errors, and execution results.
//!
//! These are the values exchanged with the host execution engine: the
//! `ResolveInfo` it passes to every resolver, the `FieldError` a resolver
//! may fail with, and the `ExecutionResult` it returns for a whole request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    coordinate::FieldCoordinate,
    result::{Denial, SharedError},
};

/// One step of a response path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// What the host engine knows about the field being resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveInfo {
    /// The object type that owns the field.
    pub parent_type: String,
    pub field_name: String,
    /// Alias if one was given, otherwise the field name.
    pub response_key: String,
    /// Named output type of the field, with list wrappers removed.
    pub return_type: String,
    /// Path from the response root to this field.
    pub path: Vec<PathSegment>,
}

impl ResolveInfo {
    /// Info for an unaliased field directly under the response root.
    pub fn new(
        parent_type: impl Into<String>,
        field_name: impl Into<String>,
        return_type: impl Into<String>,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            parent_type: parent_type.into(),
            response_key: field_name.clone(),
            path: vec![PathSegment::Key(field_name.clone())],
            field_name,
            return_type: return_type.into(),
        }
    }

    pub fn coordinate(&self) -> FieldCoordinate {
        FieldCoordinate::new(self.parent_type.clone(), self.field_name.clone())
    }
}

/// An error surfaced for one field of a response.
///
/// `source` carries the originating error when there was one; it is not
/// serialized.
#[derive(Clone, Serialize)]
pub struct FieldError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(skip)]
    pub source: Option<SharedError>,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            path: None,
            source: Some(std::sync::Arc::new(error)),
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Dot-joined path, e.g. `users.0.email`.
    pub fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|p| {
            p.iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(".")
        })
    }
}

impl fmt::Debug for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldError")
            .field("message", &self.message)
            .field("path", &self.path)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path_string() {
            Some(path) => write!(f, "{} (at {})", self.message, path),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for FieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl PartialEq for FieldError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.path == other.path
    }
}

impl From<Denial> for FieldError {
    fn from(denial: Denial) -> Self {
        Self {
            message: denial.message().to_string(),
            path: None,
            source: denial.source().cloned(),
        }
    }
}

/// The result of executing one request document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ExecutionResult {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Look up a value in `data` by a dot-separated response path.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut current = self.data.as_ref()?;
        for segment in path.split('.') {
            current = match current {
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                other => other.get(segment)?,
            };
        }
        Some(current)
    }
}
