//! Selection-set document model.
//!
//! A deliberately small subset of a graph query document: one anonymous
//! query operation made of nested field selections with literal arguments.
//! Rule fragments use the same model, scoped to a named type.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered list of field selections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionSet {
    pub fields: Vec<FieldSelection>,
}

impl SelectionSet {
    pub fn new(fields: Vec<FieldSelection>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find the selection producing `response_key` in the result object.
    pub fn find(&self, response_key: &str) -> Option<&FieldSelection> {
        self.fields.iter().find(|f| f.response_key() == response_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSelection> {
        self.fields.iter()
    }

    /// Fields sharing a response key collapsed into the first of them, with
    /// their sub-selections merged, at every depth.
    pub fn merged(&self) -> SelectionSet {
        let mut fields: Vec<FieldSelection> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match fields
                .iter_mut()
                .find(|existing| existing.response_key() == field.response_key())
            {
                Some(existing) => existing
                    .selection_set
                    .fields
                    .extend(field.selection_set.fields.iter().cloned()),
                None => fields.push(field.clone()),
            }
        }
        for field in &mut fields {
            if !field.selection_set.is_empty() {
                field.selection_set = field.selection_set.merged();
            }
        }
        SelectionSet { fields }
    }
}

/// One field in a selection set: `alias: name(arg: value) { ... }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSelection {
    pub alias: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub selection_set: SelectionSet,
}

impl FieldSelection {
    /// A bare field with no alias, arguments or sub-selection.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The key under which this field's value appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A request document: a single query operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub selection_set: SelectionSet,
}

/// A rule's declared data dependency: `... on Type { selections }`.
///
/// `source` keeps the text the rule was declared with. Fragments are
/// deduplicated by comparing `source` literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub type_condition: String,
    pub selection_set: SelectionSet,
    pub source: String,
}

// ── Printing ──────────────────────────────────────────────────────────────────

impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for field in &self.fields {
            write!(f, " {}", field)?;
        }
        f.write_str(" }")
    }
}

impl fmt::Display for FieldSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}: ", alias)?;
        }
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: ", name)?;
                write_literal(f, value)?;
            }
            f.write_str(")")?;
        }
        if !self.selection_set.is_empty() {
            write!(f, " {}", self.selection_set)?;
        }
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selection_set)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "... on {} {}", self.type_condition, self.selection_set)
    }
}

/// Write a JSON value as a query literal (object keys are unquoted).
fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Object(map) => {
            f.write_str("{")?;
            for (i, (key, v)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: ", key)?;
                write_literal(f, v)?;
            }
            f.write_str("}")
        }
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_literal(f, v)?;
            }
            f.write_str("]")
        }
        other => write!(f, "{}", other),
    }
}
