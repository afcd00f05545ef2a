//! Field coordinates and the fragment requirements attached to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::selection::Fragment;

/// A `(type, field)` pair identifying one schema field.
///
/// This is the unit rules attach to and the unit the middleware generator
/// wraps. Displays as `Type.field`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldCoordinate {
    pub type_name: String,
    pub field_name: String,
}

impl FieldCoordinate {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for FieldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// Extra data a field's rule needs before it can be evaluated.
///
/// Produced by static extraction over a rule tree. The fragment's selections
/// are merged into every selection set of `fragment.type_condition` that
/// selects `coordinate.field_name` before the first execution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRequirement {
    pub coordinate: FieldCoordinate,
    pub fragment: Fragment,
}
