//! The rule tree: which rule guards which field coordinate.
//!
//! Resolution order for `(Type, field)`, most specific first:
//!
//! 1. `tree[Type][field]`
//! 2. `tree[Type]["*"]`, or `tree[Type]` when the type entry is a single rule
//! 3. `tree["*"]`
//! 4. the fallback rule
//!
//! A tree that is a single rule behaves as `tree["*"]`.

use std::collections::BTreeMap;

use palisade_contracts::coordinate::FieldCoordinate;
use palisade_core::ShieldRule;

/// The wildcard key for types and fields.
pub const WILDCARD: &str = "*";

/// Rules attached to schema coordinates.
#[derive(Debug, Clone)]
pub enum RuleTree {
    /// One rule for every field of every type.
    Global(ShieldRule),
    /// Rules per type, with an optional global wildcard.
    Types(TypeMap),
}

/// `{ Type: TypeRules, "*": rule }`
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    pub types: BTreeMap<String, TypeRules>,
    pub wildcard: Option<ShieldRule>,
}

/// The entry for one type.
#[derive(Debug, Clone)]
pub enum TypeRules {
    /// One rule for every field of the type.
    Rule(ShieldRule),
    /// Rules per field, with an optional type wildcard.
    Fields(FieldMap),
}

/// `{ field: rule, "*": rule }`
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    pub fields: BTreeMap<String, ShieldRule>,
    pub wildcard: Option<ShieldRule>,
}

impl Default for RuleTree {
    fn default() -> Self {
        RuleTree::Types(TypeMap::default())
    }
}

impl From<ShieldRule> for RuleTree {
    fn from(rule: ShieldRule) -> Self {
        RuleTree::Global(rule)
    }
}

impl RuleTree {
    pub fn builder() -> RuleTreeBuilder {
        RuleTreeBuilder::default()
    }

    /// The rule guarding `coordinate`, falling back to `fallback`.
    pub fn rule_for(&self, coordinate: &FieldCoordinate, fallback: &ShieldRule) -> ShieldRule {
        self.lookup(coordinate).unwrap_or(fallback).clone()
    }

    fn lookup(&self, coordinate: &FieldCoordinate) -> Option<&ShieldRule> {
        let map = match self {
            RuleTree::Global(rule) => return Some(rule),
            RuleTree::Types(map) => map,
        };
        let type_rule = map.types.get(&coordinate.type_name).and_then(|entry| match entry {
            TypeRules::Rule(rule) => Some(rule),
            TypeRules::Fields(fields) => fields
                .fields
                .get(&coordinate.field_name)
                .or(fields.wildcard.as_ref()),
        });
        type_rule.or(map.wildcard.as_ref())
    }

    /// Every rule the tree holds, wildcards included.
    pub fn rules(&self) -> Vec<&ShieldRule> {
        match self {
            RuleTree::Global(rule) => vec![rule],
            RuleTree::Types(map) => {
                let mut rules: Vec<&ShieldRule> = map.wildcard.iter().collect();
                for entry in map.types.values() {
                    match entry {
                        TypeRules::Rule(rule) => rules.push(rule),
                        TypeRules::Fields(fields) => {
                            rules.extend(fields.fields.values());
                            rules.extend(fields.wildcard.iter());
                        }
                    }
                }
                rules
            }
        }
    }

    /// Type names and `Type.field` coordinates named by the tree, wildcards
    /// excluded.
    pub fn referenced(&self) -> Vec<(String, Option<String>)> {
        let RuleTree::Types(map) = self else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for (type_name, entry) in &map.types {
            names.push((type_name.clone(), None));
            if let TypeRules::Fields(fields) = entry {
                for field_name in fields.fields.keys() {
                    names.push((type_name.clone(), Some(field_name.clone())));
                }
            }
        }
        names
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Assembles a `RuleTree::Types`.
///
/// `"*"` is accepted as a type or field name and sets the matching wildcard.
#[derive(Debug, Default)]
pub struct RuleTreeBuilder {
    map: TypeMap,
}

impl RuleTreeBuilder {
    /// Guard `type_name.field_name` with `rule`.
    ///
    /// If the type already has a single-rule entry, that rule becomes the
    /// type wildcard.
    pub fn field(mut self, type_name: &str, field_name: &str, rule: ShieldRule) -> Self {
        let mut fields = match self.map.types.remove(type_name) {
            Some(TypeRules::Fields(fields)) => fields,
            Some(TypeRules::Rule(existing)) => FieldMap {
                fields: BTreeMap::new(),
                wildcard: Some(existing),
            },
            None => FieldMap::default(),
        };
        if field_name == WILDCARD {
            fields.wildcard = Some(rule);
        } else {
            fields.fields.insert(field_name.to_string(), rule);
        }
        self.map
            .types
            .insert(type_name.to_string(), TypeRules::Fields(fields));
        self
    }

    /// Guard every field of `type_name` with `rule`, replacing field rules.
    pub fn type_rule(mut self, type_name: &str, rule: ShieldRule) -> Self {
        if type_name == WILDCARD {
            self.map.wildcard = Some(rule);
        } else {
            self.map
                .types
                .insert(type_name.to_string(), TypeRules::Rule(rule));
        }
        self
    }

    /// Guard fields of `type_name` that have no rule of their own.
    pub fn type_wildcard(self, type_name: &str, rule: ShieldRule) -> Self {
        self.field(type_name, WILDCARD, rule)
    }

    /// Guard every field not matched by a type entry.
    pub fn wildcard(mut self, rule: ShieldRule) -> Self {
        self.map.wildcard = Some(rule);
        self
    }

    pub fn build(self) -> RuleTree {
        RuleTree::Types(self.map)
    }
}

#[cfg(test)]
mod tests {
    use palisade_core::{allow, deny, rule};

    use super::*;

    fn named(name: &'static str) -> ShieldRule {
        rule().name(name).check(|_| true)
    }

    fn resolved_name(tree: &RuleTree, type_name: &str, field: &str) -> String {
        let fallback = named("fallback");
        tree.rule_for(&FieldCoordinate::new(type_name, field), &fallback)
            .as_rule()
            .map(|r| r.name().to_string())
            .unwrap_or_else(|| "<logic>".to_string())
    }

    #[test]
    fn resolution_goes_from_exact_to_fallback() {
        let tree = RuleTree::builder()
            .field("User", "email", named("exact"))
            .type_wildcard("User", named("typeWildcard"))
            .type_rule("Post", named("typeRule"))
            .wildcard(named("global"))
            .build();

        assert_eq!(resolved_name(&tree, "User", "email"), "exact");
        assert_eq!(resolved_name(&tree, "User", "name"), "typeWildcard");
        assert_eq!(resolved_name(&tree, "Post", "title"), "typeRule");
        assert_eq!(resolved_name(&tree, "Query", "me"), "global");

        let no_global = RuleTree::builder().field("User", "email", named("exact")).build();
        assert_eq!(resolved_name(&no_global, "Query", "me"), "fallback");
        assert_eq!(resolved_name(&no_global, "User", "name"), "fallback");
    }

    #[test]
    fn single_rule_tree_is_the_global_wildcard() {
        let tree = RuleTree::from(named("everything"));
        assert_eq!(resolved_name(&tree, "Anything", "at_all"), "everything");
    }

    #[test]
    fn star_keys_map_to_wildcards() {
        let tree = RuleTree::builder()
            .field("User", "*", named("userStar"))
            .type_rule("*", named("globalStar"))
            .build();
        assert_eq!(resolved_name(&tree, "User", "id"), "userStar");
        assert_eq!(resolved_name(&tree, "Post", "id"), "globalStar");
        assert!(tree.referenced().iter().all(|(t, f)| t != "*" && f.as_deref() != Some("*")));
    }

    #[test]
    fn field_after_type_rule_keeps_type_rule_as_wildcard() {
        let tree = RuleTree::builder()
            .type_rule("User", named("typeRule"))
            .field("User", "email", named("exact"))
            .build();
        assert_eq!(resolved_name(&tree, "User", "email"), "exact");
        assert_eq!(resolved_name(&tree, "User", "name"), "typeRule");
    }

    #[test]
    fn rules_lists_every_attached_rule() {
        let tree = RuleTree::builder()
            .field("User", "email", allow())
            .type_wildcard("User", deny())
            .type_rule("Post", allow())
            .wildcard(deny())
            .build();
        assert_eq!(tree.rules().len(), 4);
        assert_eq!(RuleTree::default().rules().len(), 0);
    }
}
