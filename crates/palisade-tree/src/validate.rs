//! Build-time checks on a rule tree against the host schema.

use std::collections::HashMap;
use std::sync::Arc;

use palisade_contracts::{
    error::{PalisadeError, PalisadeResult},
    schema::TypeFieldMap,
};
use palisade_core::{Rule, ShieldRule};

use crate::tree::RuleTree;

/// Reject trees that name coordinates the schema lacks or that reuse a rule
/// name for two different rules.
///
/// The fallback rule takes part in the name check.
pub fn validate_rule_tree(
    tree: &RuleTree,
    map: &TypeFieldMap,
    fallback: &ShieldRule,
) -> PalisadeResult<()> {
    let unknown = unknown_coordinates(tree, map);
    if !unknown.is_empty() {
        return Err(PalisadeError::UnknownCoordinates {
            coordinates: unknown,
        });
    }

    let mut rules = tree.rules();
    rules.push(fallback);
    check_rule_names(rules)
}

/// Every type or `Type.field` in the tree that is missing from `map`.
pub fn unknown_coordinates(tree: &RuleTree, map: &TypeFieldMap) -> Vec<String> {
    tree.referenced()
        .into_iter()
        .filter_map(|(type_name, field_name)| match field_name {
            None if !map.has_type(&type_name) => Some(type_name),
            Some(field_name)
                if map.has_type(&type_name) && map.field(&type_name, &field_name).is_none() =>
            {
                Some(format!("{type_name}.{field_name}"))
            }
            _ => None,
        })
        .collect()
}

/// Two distinct rules must not share a name: the name is their cache key.
pub fn check_rule_names<'a>(rules: impl IntoIterator<Item = &'a ShieldRule>) -> PalisadeResult<()> {
    let mut seen: HashMap<String, Arc<Rule>> = HashMap::new();
    for leaf in rules.into_iter().flat_map(ShieldRule::leaf_rules) {
        match seen.get(leaf.name()) {
            Some(existing) if !Arc::ptr_eq(existing, &leaf) && !existing.equals(&leaf) => {
                return Err(PalisadeError::RuleNameCollision {
                    name: leaf.name().to_string(),
                });
            }
            Some(_) => {}
            None => {
                seen.insert(leaf.name().to_string(), leaf);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use palisade_contracts::schema::FieldDescriptor;
    use palisade_core::{and, rule, CachePolicy};

    use super::*;

    fn schema() -> TypeFieldMap {
        let mut map = TypeFieldMap::new("Query");
        map.insert_field("Query", FieldDescriptor::new("me", "User"));
        map.insert_field("User", FieldDescriptor::new("id", "ID"));
        map.insert_field("User", FieldDescriptor::new("email", "String"));
        map
    }

    fn truthy(name: &str) -> ShieldRule {
        rule().name(name).check(|_| true)
    }

    // ── 1. unknown coordinates ───────────────────────────────────────────────

    #[test]
    fn lists_every_unknown_coordinate() {
        let tree = RuleTree::builder()
            .field("User", "email", truthy("a"))
            .field("User", "phone", truthy("b"))
            .type_rule("Ghost", truthy("c"))
            .build();
        let err = validate_rule_tree(&tree, &schema(), &truthy("fallback")).unwrap_err();
        match err {
            PalisadeError::UnknownCoordinates { coordinates } => {
                assert_eq!(coordinates, vec!["Ghost".to_string(), "User.phone".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wildcards_are_never_unknown() {
        let tree = RuleTree::builder()
            .type_wildcard("User", truthy("a"))
            .wildcard(truthy("b"))
            .build();
        assert!(validate_rule_tree(&tree, &schema(), &truthy("fallback")).is_ok());
    }

    // ── 2. rule names ────────────────────────────────────────────────────────

    #[test]
    fn same_rule_reused_is_not_a_collision() {
        let shared = truthy("isOwner");
        let tree = RuleTree::builder()
            .field("User", "email", shared.clone())
            .field("User", "id", and([shared.clone(), truthy("other")]))
            .build();
        assert!(validate_rule_tree(&tree, &schema(), &truthy("fallback")).is_ok());
    }

    #[test]
    fn cache_variant_of_the_same_rule_is_not_a_collision() {
        let base = truthy("isOwner");
        let strict = ShieldRule::from(base.as_rule().unwrap().with_cache(CachePolicy::Strict));
        let tree = RuleTree::builder()
            .field("User", "email", base)
            .field("User", "id", strict)
            .build();
        assert!(validate_rule_tree(&tree, &schema(), &truthy("fallback")).is_ok());
    }

    #[test]
    fn distinct_rules_with_one_name_collide() {
        let tree = RuleTree::builder()
            .field("User", "email", truthy("dup"))
            .field("User", "id", truthy("dup"))
            .build();
        let err = validate_rule_tree(&tree, &schema(), &truthy("fallback")).unwrap_err();
        assert!(matches!(err, PalisadeError::RuleNameCollision { ref name } if name == "dup"));
    }

    #[test]
    fn fallback_takes_part_in_the_name_check() {
        let tree = RuleTree::builder().field("User", "email", truthy("dup")).build();
        assert!(validate_rule_tree(&tree, &schema(), &truthy("dup")).is_err());
    }
}
