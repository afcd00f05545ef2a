//! Rule trees for palisade.
//!
//! A [`RuleTree`] maps schema coordinates to rules. Before a tree is
//! attached to a schema it is validated ([`validate_rule_tree`]) and its
//! fragment requirements are collected ([`extract_requirements`]).
//! [`ShieldOptions`] controls fallbacks and how faults reach the caller;
//! its serializable subset loads from TOML as [`ShieldSettings`].

pub mod extract;
pub mod options;
pub mod tree;
pub mod validate;

pub use extract::{extract_requirements, requirements_for};
pub use options::{
    ErrorMapper, FallbackError, FallbackSetting, ShieldOptions, ShieldSettings,
    DEFAULT_FALLBACK_MESSAGE,
};
pub use tree::{FieldMap, RuleTree, RuleTreeBuilder, TypeMap, TypeRules, WILDCARD};
pub use validate::{check_rule_names, unknown_coordinates, validate_rule_tree};
