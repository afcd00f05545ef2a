//! Fragment requirements: the extra data each guarded field's rule needs.

use palisade_contracts::{
    coordinate::{FieldCoordinate, FragmentRequirement},
    error::{PalisadeError, PalisadeResult},
    schema::TypeFieldMap,
    selection::{Fragment, SelectionSet},
};
use palisade_core::{parse_fragment, ShieldRule};
use tracing::debug;

use crate::tree::RuleTree;

/// Collect `(coordinate, fragment)` pairs for every field of the schema.
///
/// Fragments are taken from the rule each coordinate resolves to, in rule
/// order, and deduplicated per coordinate by their literal source. Every
/// fragment must parse and its type condition and fields must exist in `map`.
pub fn extract_requirements(
    tree: &RuleTree,
    map: &TypeFieldMap,
    fallback: &ShieldRule,
) -> PalisadeResult<Vec<FragmentRequirement>> {
    let mut requirements = Vec::new();
    for coordinate in map.coordinates() {
        let rule = tree.rule_for(&coordinate, fallback);
        let mut seen: Vec<String> = Vec::new();
        for source in rule.extract_fragments() {
            if seen.contains(&source) {
                continue;
            }
            let fragment = parse_fragment(&source)?;
            check_fragment(&fragment, map)?;
            seen.push(source);
            requirements.push(FragmentRequirement {
                coordinate: coordinate.clone(),
                fragment,
            });
        }
    }
    debug!(count = requirements.len(), "fragment requirements extracted");
    Ok(requirements)
}

/// Requirements for a single coordinate, in extraction order.
pub fn requirements_for<'a>(
    requirements: &'a [FragmentRequirement],
    coordinate: &'a FieldCoordinate,
) -> impl Iterator<Item = &'a Fragment> + 'a {
    requirements
        .iter()
        .filter(move |r| &r.coordinate == coordinate)
        .map(|r| &r.fragment)
}

fn check_fragment(fragment: &Fragment, map: &TypeFieldMap) -> PalisadeResult<()> {
    if !map.has_type(&fragment.type_condition) {
        return Err(invalid(
            fragment,
            format!("type '{}' is not defined by the schema", fragment.type_condition),
        ));
    }
    check_selections(fragment, &fragment.type_condition, &fragment.selection_set, map)
}

fn check_selections(
    fragment: &Fragment,
    type_name: &str,
    selections: &SelectionSet,
    map: &TypeFieldMap,
) -> PalisadeResult<()> {
    for selection in selections.iter() {
        let Some(descriptor) = map.field(type_name, &selection.name) else {
            return Err(invalid(
                fragment,
                format!("field '{}' is not defined on type '{}'", selection.name, type_name),
            ));
        };
        check_selections(fragment, &descriptor.output_type, &selection.selection_set, map)?;
    }
    Ok(())
}

fn invalid(fragment: &Fragment, reason: String) -> PalisadeError {
    PalisadeError::InvalidFragment {
        fragment: fragment.source.clone(),
        reason,
    }
}
