//! Per-field middleware joining the authorization outcome with the resolver.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use palisade_contracts::{
    coordinate::FieldCoordinate, execution::FieldError, result::RuleResult, schema::TypeFieldMap,
};
use palisade_core::{FieldInvocation, FieldMiddleware, FieldResolver, ShieldRule};
use palisade_tree::{RuleTree, ShieldOptions};

use crate::rewrite::fragment_view;

/// Middleware for every coordinate, split by execution pass.
///
/// `deferred` holds coordinates whose rule declares a fragment anywhere in
/// its combinator tree. Those rules run only in the second pass.
#[derive(Default)]
pub struct MiddlewarePlan {
    pub immediate: BTreeMap<FieldCoordinate, FieldMiddleware>,
    pub deferred: BTreeMap<FieldCoordinate, FieldMiddleware>,
}

impl MiddlewarePlan {
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

/// Resolve the rule for every coordinate of `map` and wrap it as middleware.
pub fn generate_middleware(
    map: &TypeFieldMap,
    tree: &RuleTree,
    options: &Arc<ShieldOptions>,
) -> MiddlewarePlan {
    let mut plan = MiddlewarePlan::default();
    for coordinate in map.coordinates() {
        let rule = tree.rule_for(&coordinate, &options.fallback_rule);
        if rule.extract_fragments().is_empty() {
            plan.immediate
                .insert(coordinate, shield_middleware(rule, Arc::clone(options)));
        } else {
            plan.deferred
                .insert(coordinate, fragment_middleware(rule, Arc::clone(options)));
        }
    }
    debug!(
        immediate = plan.immediate.len(),
        deferred = plan.deferred.len(),
        "middleware generated"
    );
    plan
}

/// Wrap a resolver so it only runs when `rule` authorizes the access.
///
/// * `Authorized`: the resolver runs; its value is returned unchanged.
/// * `Denied`: the fallback error.
/// * `DeniedWithReason`: the reason.
/// * predicate or resolver fault: the fault if `debug` or
///   `allow_external_errors` is set, otherwise the fallback error mapped
///   from it.
pub fn shield_middleware(rule: ShieldRule, options: Arc<ShieldOptions>) -> FieldMiddleware {
    Arc::new(move |next: FieldResolver, invocation: FieldInvocation| {
        let rule = rule.clone();
        let options = Arc::clone(&options);
        async move {
            match rule.resolve(&invocation, &options.hash_function).await {
                Ok(RuleResult::Authorized) => match next(invocation.clone()).await {
                    Ok(value) => Ok(value),
                    Err(error) => Err(surface_fault(&options, error, &invocation)),
                },
                Ok(RuleResult::Denied) => {
                    debug!(field = %invocation.info.coordinate(), "access denied");
                    Err(options.fallback_error.resolve(None, &invocation))
                }
                Ok(RuleResult::DeniedWithReason(denial)) => {
                    debug!(
                        field = %invocation.info.coordinate(),
                        reason = denial.message(),
                        "access denied"
                    );
                    Err(FieldError::from(denial))
                }
                Err(fault) => {
                    warn!(
                        field = %invocation.info.coordinate(),
                        error = %fault,
                        "rule predicate failed"
                    );
                    Err(surface_fault(&options, FieldError::from(fault), &invocation))
                }
            }
        }
        .boxed()
    })
}

/// [`shield_middleware`] for rules that read fragment data.
///
/// The rule sees the parent through [`fragment_view`]; the resolver still
/// receives the parent as the first pass produced it.
pub fn fragment_middleware(rule: ShieldRule, options: Arc<ShieldOptions>) -> FieldMiddleware {
    let shielded = shield_middleware(rule, options);
    Arc::new(move |next: FieldResolver, invocation: FieldInvocation| {
        let parent = invocation.parent.clone();
        let restore: FieldResolver = Arc::new(move |invocation: FieldInvocation| {
            next(FieldInvocation {
                parent: parent.clone(),
                ..invocation
            })
        });
        let view = FieldInvocation {
            parent: fragment_view(&invocation.parent),
            ..invocation
        };
        shielded(restore, view)
    })
}

fn surface_fault(options: &ShieldOptions, error: FieldError, invocation: &FieldInvocation) -> FieldError {
    if options.exposes_faults() {
        error
    } else {
        options.fallback_error.resolve(Some(&error), invocation)
    }
}
