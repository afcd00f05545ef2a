//! First-pass document rewrite.
//!
//! Every selection set of type `T` that selects a field `f` with fragment
//! requirements gets the fragments' selections merged in. A merged field is
//! skipped when the same field is already selected under its response key;
//! when both sides select it with sub-selections, those are merged
//! recursively. If the client uses that response key for a different
//! selection, the fragment field is added under an internal alias instead,
//! and [`fragment_view`] moves it back under its own key for the rules that
//! asked for it. Merged selections are themselves rewritten, but a
//! requirement is not re-applied inside the subtree it introduced.

use serde_json::{Map, Value};

use palisade_contracts::{
    coordinate::FragmentRequirement,
    execution::PathSegment,
    schema::TypeFieldMap,
    selection::{Document, FieldSelection, SelectionSet},
};

/// Prefix of the aliases given to fragment fields whose response key the
/// client already uses. Client documents may not use it.
pub const INTERNAL_ALIAS_PREFIX: &str = "__shield_";

/// The document the first pass executes.
pub fn rewrite_document(
    document: &Document,
    requirements: &[FragmentRequirement],
    map: &TypeFieldMap,
) -> Document {
    let mut selection_set = document.selection_set.merged();
    if !requirements.is_empty() {
        let mut applied = Vec::new();
        rewrite_selection_set(
            &mut selection_set,
            map.query_type(),
            requirements,
            map,
            &mut applied,
        );
    }
    Document { selection_set }
}

fn rewrite_selection_set(
    set: &mut SelectionSet,
    type_name: &str,
    requirements: &[FragmentRequirement],
    map: &TypeFieldMap,
    applied: &mut Vec<usize>,
) {
    let pending: Vec<usize> = requirements
        .iter()
        .enumerate()
        .filter(|(index, req)| {
            req.coordinate.type_name == type_name
                && req.fragment.type_condition == type_name
                && !applied.contains(index)
                && set.iter().any(|f| f.name == req.coordinate.field_name)
        })
        .map(|(index, _)| index)
        .collect();

    for &index in &pending {
        merge_selections(set, &requirements[index].fragment.selection_set);
    }

    let depth = applied.len();
    applied.extend(pending);
    for field in &mut set.fields {
        if field.selection_set.is_empty() {
            continue;
        }
        if let Some(descriptor) = map.field(type_name, &field.name) {
            rewrite_selection_set(
                &mut field.selection_set,
                &descriptor.output_type,
                requirements,
                map,
                applied,
            );
        }
    }
    applied.truncate(depth);
}

/// Merge `extra` into `target` without overriding selections already made.
pub fn merge_selections(target: &mut SelectionSet, extra: &SelectionSet) {
    for field in extra.iter() {
        let key = field.response_key();
        match target
            .fields
            .iter()
            .position(|existing| existing.response_key() == key)
        {
            Some(index) if selects_same(&target.fields[index], field) => {
                if !field.selection_set.is_empty() {
                    merge_selections(&mut target.fields[index].selection_set, &field.selection_set);
                }
            }
            Some(_) => {
                let internal = FieldSelection {
                    alias: Some(format!("{}{}", INTERNAL_ALIAS_PREFIX, key)),
                    ..field.clone()
                };
                merge_selections(target, &SelectionSet::new(vec![internal]));
            }
            None => target.fields.push(field.clone()),
        }
    }
}

fn selects_same(a: &FieldSelection, b: &FieldSelection) -> bool {
    a.name == b.name && a.arguments == b.arguments
}

/// `value` as the fragment rules see it: entries under an internal alias
/// replace the entry under their own response key, at every depth.
pub fn fragment_view(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut view = Map::with_capacity(object.len());
            let mut internal = Vec::new();
            for (key, entry) in object {
                match key.strip_prefix(INTERNAL_ALIAS_PREFIX) {
                    Some(own_key) => internal.push((own_key, entry)),
                    None => {
                        view.insert(key.clone(), fragment_view(entry));
                    }
                }
            }
            for (own_key, entry) in internal {
                view.insert(own_key.to_string(), fragment_view(entry));
            }
            Value::Object(view)
        }
        Value::Array(items) => Value::Array(items.iter().map(fragment_view).collect()),
        other => other.clone(),
    }
}

/// The first alias in `document` that uses the internal prefix.
pub fn reserved_alias(document: &Document) -> Option<&str> {
    fn find(set: &SelectionSet) -> Option<&str> {
        set.iter().find_map(|field| match field.alias.as_deref() {
            Some(alias) if alias.starts_with(INTERNAL_ALIAS_PREFIX) => Some(alias),
            _ => find(&field.selection_set),
        })
    }
    find(&document.selection_set)
}

/// True when every key of `path` names a selection of `selection_set`,
/// descending one level per key. List indices are skipped.
pub fn is_requested(selection_set: &SelectionSet, path: &[PathSegment]) -> bool {
    let mut current = selection_set;
    for segment in path {
        if let PathSegment::Key(key) = segment {
            match current.find(key) {
                Some(field) => current = &field.selection_set,
                None => return false,
            }
        }
    }
    true
}
