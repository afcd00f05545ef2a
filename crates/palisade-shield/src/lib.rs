//! Attaching rule trees to executable schemas.
//!
//! [`build_authorized_schema`] validates a [`RuleTree`] against the schema,
//! extracts fragment requirements, wraps every field resolver with its rule,
//! and returns a [`ShieldedSchema`] that runs requests in one or two passes.
//!
//! ```text
//! schema ── validate ── extract ── generate ──┬─ immediate ─▶ pass one
//!                                             └─ deferred ──▶ rebuild ─▶ pass two
//! ```

pub mod execute;
pub mod middleware;
pub mod rewrite;

use std::sync::Arc;

use tracing::info;

use palisade_contracts::error::PalisadeResult;
use palisade_core::ExecutableSchema;
use palisade_tree::{extract_requirements, validate_rule_tree, RuleTree, ShieldOptions};

pub use execute::{merge_results, ShieldedSchema};
pub use middleware::{fragment_middleware, generate_middleware, shield_middleware, MiddlewarePlan};
pub use rewrite::{
    fragment_view, is_requested, merge_selections, reserved_alias, rewrite_document,
    INTERNAL_ALIAS_PREFIX,
};

/// Attach `tree` to `schema`.
///
/// Fails with a configuration error when the tree names unknown
/// coordinates, reuses a rule name for distinct rules, or declares a
/// fragment that does not fit the schema.
pub fn build_authorized_schema<S: ExecutableSchema>(
    schema: S,
    tree: &RuleTree,
    options: ShieldOptions,
) -> PalisadeResult<ShieldedSchema<S>> {
    let map = schema.type_field_map();
    validate_rule_tree(tree, map, &options.fallback_rule)?;
    let requirements = extract_requirements(tree, map, &options.fallback_rule)?;

    let options = Arc::new(options);
    let plan = generate_middleware(map, tree, &options);

    let pass_two = if plan.has_deferred() {
        Some(schema.rebuild().wrap_field_resolvers(plan.deferred))
    } else {
        None
    };

    // Fragment rules are skipped in the first pass of a two-pass schema.
    let pass_one = schema.wrap_field_resolvers(plan.immediate);

    info!(
        fields = map.coordinates().len(),
        fragments = requirements.len(),
        two_pass = pass_two.is_some(),
        "authorization attached to schema"
    );
    Ok(ShieldedSchema::new(pass_one, pass_two, requirements))
}
