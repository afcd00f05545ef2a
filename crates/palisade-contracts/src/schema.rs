//! The read-only type/field map a host schema exposes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::FieldCoordinate;

/// Description of one field of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Named output type with list and non-null wrappers removed.
    pub output_type: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output_type: output_type.into(),
            is_list: false,
            arguments: Vec::new(),
        }
    }

    pub fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub fn argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(name.into());
        self
    }
}

/// `{ type: { field: FieldDescriptor } }` for every object type of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFieldMap {
    query_type: String,
    types: BTreeMap<String, BTreeMap<String, FieldDescriptor>>,
}

impl TypeFieldMap {
    /// An empty map whose root operation type is `query_type`.
    pub fn new(query_type: impl Into<String>) -> Self {
        let query_type = query_type.into();
        let mut types = BTreeMap::new();
        types.insert(query_type.clone(), BTreeMap::new());
        Self { query_type, types }
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    /// Declare an object type. Declaring an existing type is a no-op.
    pub fn insert_type(&mut self, type_name: impl Into<String>) {
        self.types.entry(type_name.into()).or_default();
    }

    /// Add a field to `type_name`, declaring the type if needed.
    pub fn insert_field(&mut self, type_name: impl Into<String>, field: FieldDescriptor) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field.name.clone(), field);
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDescriptor> {
        self.types.get(type_name)?.get(field_name)
    }

    pub fn fields(&self, type_name: &str) -> impl Iterator<Item = &FieldDescriptor> {
        self.types.get(type_name).into_iter().flat_map(|f| f.values())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Every `(type, field)` pair, ordered by type then field name.
    pub fn coordinates(&self) -> Vec<FieldCoordinate> {
        self.types
            .iter()
            .flat_map(|(type_name, fields)| {
                fields
                    .keys()
                    .map(move |field| FieldCoordinate::new(type_name.clone(), field.clone()))
            })
            .collect()
    }
}
