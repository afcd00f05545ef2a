//! Composite rules and the `ShieldRule` sum type.
//!
//! | combinator | children      | scheduling                  | authorized when        |
//! |------------|---------------|-----------------------------|------------------------|
//! | `And`      | any           | concurrent, awaits all      | every child authorizes |
//! | `Or`       | any           | concurrent, awaits all      | any child authorizes   |
//! | `Race`     | any           | concurrent, first success   | any child authorizes   |
//! | `Chain`    | any           | sequential, declared order  | every child authorizes |
//! | `Not`      | exactly one   | single child                | child does not         |
//! | `Allow`    | none          | -                           | always                 |
//! | `Deny`     | none          | -                           | never                  |
//!
//! Denials with a reason win over plain denials when a composite fails.
//! A predicate fault in a child aborts `And` and `Chain`; `Or` and `Race`
//! only surface it when no child authorizes. `Not` treats a fault as a
//! non-authorized child. `And` and `Or` never cancel running siblings.

use std::sync::Arc;

use futures::{
    future::{join_all, BoxFuture, FutureExt},
    stream::{FuturesUnordered, StreamExt},
};
use tracing::debug;

use palisade_contracts::result::{Denial, RuleResult};

use crate::{
    cache::HashFunction,
    context::{FieldInvocation, RuleOutcome},
    rule::{Rule, RuleFault},
};

/// Any rule that can be attached to a field.
#[derive(Debug, Clone)]
pub enum ShieldRule {
    Rule(Arc<Rule>),
    Logic(Arc<LogicRule>),
}

/// The composite rules.
#[derive(Debug, Clone)]
pub enum LogicRule {
    And(Vec<ShieldRule>),
    Or(Vec<ShieldRule>),
    Chain(Vec<ShieldRule>),
    Race(Vec<ShieldRule>),
    Not {
        rule: ShieldRule,
        /// Returned instead of a plain denial when the child authorizes.
        error: Option<Denial>,
    },
    Allow,
    Deny,
}

impl ShieldRule {
    /// Evaluate the rule for one field access.
    pub fn resolve<'a>(
        &'a self,
        invocation: &'a FieldInvocation,
        hash: &'a HashFunction,
    ) -> BoxFuture<'a, RuleOutcome> {
        match self {
            ShieldRule::Rule(rule) => rule.resolve(invocation, hash),
            ShieldRule::Logic(logic) => logic.resolve(invocation, hash),
        }
    }

    /// Fragment sources declared by this rule and every rule beneath it,
    /// in declaration order, duplicates included.
    pub fn extract_fragments(&self) -> Vec<String> {
        let mut fragments = Vec::new();
        self.collect_fragments(&mut fragments);
        fragments
    }

    fn collect_fragments(&self, out: &mut Vec<String>) {
        match self {
            ShieldRule::Rule(rule) => {
                if let Some(fragment) = rule.extract_fragment() {
                    out.push(fragment.to_string());
                }
            }
            ShieldRule::Logic(logic) => {
                for child in logic.children() {
                    child.collect_fragments(out);
                }
            }
        }
    }

    /// Every leaf `Rule` reachable from this rule.
    pub fn leaf_rules(&self) -> Vec<Arc<Rule>> {
        let mut rules = Vec::new();
        self.collect_leaves(&mut rules);
        rules
    }

    fn collect_leaves(&self, out: &mut Vec<Arc<Rule>>) {
        match self {
            ShieldRule::Rule(rule) => out.push(rule.clone()),
            ShieldRule::Logic(logic) => {
                for child in logic.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn as_rule(&self) -> Option<&Arc<Rule>> {
        match self {
            ShieldRule::Rule(rule) => Some(rule),
            ShieldRule::Logic(_) => None,
        }
    }
}

impl From<Rule> for ShieldRule {
    fn from(rule: Rule) -> Self {
        ShieldRule::Rule(Arc::new(rule))
    }
}

impl From<LogicRule> for ShieldRule {
    fn from(logic: LogicRule) -> Self {
        ShieldRule::Logic(Arc::new(logic))
    }
}

impl LogicRule {
    pub fn children(&self) -> &[ShieldRule] {
        match self {
            LogicRule::And(rules)
            | LogicRule::Or(rules)
            | LogicRule::Chain(rules)
            | LogicRule::Race(rules) => rules,
            LogicRule::Not { rule, .. } => std::slice::from_ref(rule),
            LogicRule::Allow | LogicRule::Deny => &[],
        }
    }

    pub fn resolve<'a>(
        &'a self,
        invocation: &'a FieldInvocation,
        hash: &'a HashFunction,
    ) -> BoxFuture<'a, RuleOutcome> {
        async move {
            match self {
                LogicRule::And(rules) => {
                    let outcomes =
                        join_all(rules.iter().map(|r| r.resolve(invocation, hash))).await;
                    let mut results = Vec::with_capacity(outcomes.len());
                    for outcome in outcomes {
                        results.push(outcome?);
                    }
                    if results.iter().all(RuleResult::is_authorized) {
                        Ok(RuleResult::Authorized)
                    } else {
                        Ok(preferred_denial(results))
                    }
                }

                LogicRule::Or(rules) => {
                    let outcomes =
                        join_all(rules.iter().map(|r| r.resolve(invocation, hash))).await;
                    any_authorized(outcomes)
                }

                LogicRule::Race(rules) => {
                    let mut pending: FuturesUnordered<_> =
                        rules.iter().map(|r| r.resolve(invocation, hash)).collect();
                    let mut settled = Vec::with_capacity(rules.len());
                    while let Some(outcome) = pending.next().await {
                        if matches!(outcome, Ok(RuleResult::Authorized)) {
                            debug!(
                                field = %invocation.info.coordinate(),
                                remaining = pending.len(),
                                "race settled on first authorized child"
                            );
                            return Ok(RuleResult::Authorized);
                        }
                        settled.push(outcome);
                    }
                    any_authorized(settled)
                }

                LogicRule::Chain(rules) => {
                    for child in rules {
                        match child.resolve(invocation, hash).await? {
                            RuleResult::Authorized => continue,
                            denied => return Ok(denied),
                        }
                    }
                    Ok(RuleResult::Authorized)
                }

                LogicRule::Not { rule, error } => match rule.resolve(invocation, hash).await {
                    Ok(RuleResult::Authorized) => Ok(error
                        .clone()
                        .map(RuleResult::DeniedWithReason)
                        .unwrap_or(RuleResult::Denied)),
                    Ok(_) | Err(_) => Ok(RuleResult::Authorized),
                },

                LogicRule::Allow => Ok(RuleResult::Authorized),
                LogicRule::Deny => Ok(RuleResult::Denied),
            }
        }
        .boxed()
    }
}

/// Aggregate for `Or` and `Race` once every child has settled.
fn any_authorized(outcomes: Vec<RuleOutcome>) -> RuleOutcome {
    let mut results = Vec::with_capacity(outcomes.len());
    let mut first_fault: Option<RuleFault> = None;
    for outcome in outcomes {
        match outcome {
            Ok(RuleResult::Authorized) => return Ok(RuleResult::Authorized),
            Ok(result) => results.push(result),
            Err(fault) => {
                first_fault.get_or_insert(fault);
            }
        }
    }
    match first_fault {
        Some(fault) => Err(fault),
        None => Ok(preferred_denial(results)),
    }
}

/// The first reasoned denial in child order, else a plain denial.
fn preferred_denial(results: Vec<RuleResult>) -> RuleResult {
    results
        .into_iter()
        .find(RuleResult::has_reason)
        .unwrap_or(RuleResult::Denied)
}

// ── Constructors ──────────────────────────────────────────────────────────────

pub fn and(rules: impl IntoIterator<Item = ShieldRule>) -> ShieldRule {
    LogicRule::And(rules.into_iter().collect()).into()
}

pub fn or(rules: impl IntoIterator<Item = ShieldRule>) -> ShieldRule {
    LogicRule::Or(rules.into_iter().collect()).into()
}

pub fn chain(rules: impl IntoIterator<Item = ShieldRule>) -> ShieldRule {
    LogicRule::Chain(rules.into_iter().collect()).into()
}

pub fn race(rules: impl IntoIterator<Item = ShieldRule>) -> ShieldRule {
    LogicRule::Race(rules.into_iter().collect()).into()
}

pub fn not(rule: ShieldRule) -> ShieldRule {
    LogicRule::Not { rule, error: None }.into()
}

/// `not` that denies with `error` when the child authorizes.
pub fn not_with(rule: ShieldRule, error: impl Into<String>) -> ShieldRule {
    LogicRule::Not {
        rule,
        error: Some(Denial::new(error)),
    }
    .into()
}

pub fn allow() -> ShieldRule {
    LogicRule::Allow.into()
}

pub fn deny() -> ShieldRule {
    LogicRule::Deny.into()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::{Duration, Instant},
    };

    use serde_json::{json, Value};

    use palisade_contracts::execution::ResolveInfo;

    use super::*;
    use crate::{
        cache::{default_hash_function, CachePolicy},
        context::RequestContext,
        rule::rule,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn invocation_with(context: &RequestContext, parent: Value, args: Value) -> FieldInvocation {
        FieldInvocation {
            parent,
            args,
            context: context.clone(),
            info: ResolveInfo {
                parent_type: "Query".to_string(),
                field_name: "secret".to_string(),
                response_key: "secret".to_string(),
                return_type: "String".to_string(),
                path: vec![],
            },
        }
    }

    fn invocation() -> FieldInvocation {
        invocation_with(&RequestContext::default(), Value::Null, json!({}))
    }

    /// A never-cached rule that records its name in `log` when invoked.
    fn logged(name: &'static str, result: RuleResult, log: &Arc<Mutex<Vec<&'static str>>>) -> ShieldRule {
        let log = log.clone();
        rule()
            .name(name)
            .cache(CachePolicy::NoCache)
            .check(move |_| {
                log.lock().unwrap().push(name);
                result.clone()
            })
    }

    /// A never-cached rule that settles to `allowed` after `delay_ms`.
    fn delayed(name: &'static str, allowed: bool, delay_ms: u64) -> ShieldRule {
        rule()
            .name(name)
            .cache(CachePolicy::NoCache)
            .resolve(move |_| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok::<bool, RuleFault>(allowed)
            })
    }

    fn faulty(name: &'static str) -> ShieldRule {
        rule()
            .name(name)
            .cache(CachePolicy::NoCache)
            .resolve(|_| async { Err::<bool, _>(RuleFault::new("lookup exploded")) })
    }

    async fn eval(rule: &ShieldRule) -> RuleOutcome {
        let hash = default_hash_function();
        let inv = invocation();
        rule.resolve(&inv, &hash).await
    }

    // ── 1. constants ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn allow_and_deny_ignore_input() {
        assert_eq!(eval(&allow()).await.unwrap(), RuleResult::Authorized);
        assert_eq!(eval(&deny()).await.unwrap(), RuleResult::Denied);
    }

    // ── 2. predicate normalization ────────────────────────────────────────────

    #[tokio::test]
    async fn predicate_outputs_normalize() {
        let yes = rule().check(|_| true);
        let no = rule().check(|_| false);
        let reason = rule().check(|_| "owners only");
        let owned = rule().check(|_| String::from("owners only"));

        assert_eq!(eval(&yes).await.unwrap(), RuleResult::Authorized);
        assert_eq!(eval(&no).await.unwrap(), RuleResult::Denied);
        assert_eq!(eval(&reason).await.unwrap(), RuleResult::reason("owners only"));
        assert_eq!(eval(&owned).await.unwrap(), RuleResult::reason("owners only"));
        assert_eq!(eval(&faulty("f")).await.unwrap_err().message(), "lookup exploded");
    }

    #[tokio::test]
    async fn unnamed_rules_get_unique_names() {
        let a = rule().check(|_| true);
        let b = rule().check(|_| true);
        assert_ne!(a.as_rule().unwrap().name(), b.as_rule().unwrap().name());
    }

    // ── 3. and ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn and_requires_every_child() {
        let log = Arc::new(Mutex::new(vec![]));
        let all = and([
            logged("a", RuleResult::Authorized, &log),
            logged("b", RuleResult::Authorized, &log),
        ]);
        assert_eq!(eval(&all).await.unwrap(), RuleResult::Authorized);

        let one_denies = and([
            logged("c", RuleResult::Authorized, &log),
            logged("d", RuleResult::Denied, &log),
            logged("e", RuleResult::Authorized, &log),
        ]);
        assert_eq!(eval(&one_denies).await.unwrap(), RuleResult::Denied);
        // Every child runs; no short-circuit.
        assert_eq!(log.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn and_prefers_reasoned_denial() {
        let log = Arc::new(Mutex::new(vec![]));
        let rule = and([
            logged("plain", RuleResult::Denied, &log),
            logged("why", RuleResult::reason("first reason"), &log),
            logged("why2", RuleResult::reason("second reason"), &log),
        ]);
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::reason("first reason"));
    }

    #[tokio::test]
    async fn and_propagates_faults() {
        let rule = and([allow(), faulty("boom")]);
        assert!(eval(&rule).await.is_err());
    }

    #[tokio::test]
    async fn and_evaluates_children_concurrently() {
        let rule = and([delayed("a", true, 100), delayed("b", true, 100), delayed("c", true, 100)]);
        let started = Instant::now();
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Authorized);
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    // ── 4. or ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn or_needs_one_child() {
        let log = Arc::new(Mutex::new(vec![]));
        let rule = or([
            logged("a", RuleResult::Denied, &log),
            logged("b", RuleResult::Authorized, &log),
        ]);
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Authorized);
    }

    #[tokio::test]
    async fn or_without_success_reports_reason_then_plain_denial() {
        let log = Arc::new(Mutex::new(vec![]));
        let with_reason = or([
            logged("a", RuleResult::Denied, &log),
            logged("b", RuleResult::reason("not a member"), &log),
        ]);
        assert_eq!(eval(&with_reason).await.unwrap(), RuleResult::reason("not a member"));

        let plain = or([logged("c", RuleResult::Denied, &log), deny()]);
        assert_eq!(eval(&plain).await.unwrap(), RuleResult::Denied);
        assert_eq!(eval(&or([])).await.unwrap(), RuleResult::Denied);
    }

    #[tokio::test]
    async fn or_success_masks_sibling_fault() {
        assert_eq!(eval(&or([faulty("x"), allow()])).await.unwrap(), RuleResult::Authorized);
        assert!(eval(&or([faulty("x"), deny()])).await.is_err());
    }

    // ── 5. chain ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn chain_runs_in_order_and_stops_at_first_denial() {
        let log = Arc::new(Mutex::new(vec![]));
        let rule = chain([
            logged("A", RuleResult::Authorized, &log),
            logged("B", RuleResult::reason("B said no"), &log),
            logged("C", RuleResult::Authorized, &log),
        ]);

        assert_eq!(eval(&rule).await.unwrap(), RuleResult::reason("B said no"));
        assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn chain_is_sequential() {
        let order = Arc::new(Mutex::new(vec![]));
        let step = |name: &'static str, delay_ms: u64| {
            let order = order.clone();
            rule()
                .name(name)
                .cache(CachePolicy::NoCache)
                .resolve(move |_| {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(format!("start {name}"));
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        order.lock().unwrap().push(format!("end {name}"));
                        Ok::<bool, RuleFault>(true)
                    }
                })
        };
        let rule = chain([step("slow", 40), step("fast", 1)]);

        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Authorized);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["start slow", "end slow", "start fast", "end fast"]
        );
    }

    #[tokio::test]
    async fn chain_stops_on_fault() {
        let log = Arc::new(Mutex::new(vec![]));
        let rule = chain([faulty("boom"), logged("after", RuleResult::Authorized, &log)]);
        assert!(eval(&rule).await.is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    // ── 6. race ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn race_settles_on_first_success() {
        let rule = race([
            delayed("denyA", false, 5),
            delayed("allowB", true, 20),
            delayed("allowC", true, 2_000),
        ]);
        let started = Instant::now();

        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Authorized);
        assert!(
            started.elapsed() < Duration::from_millis(1_000),
            "race must not wait for the slow child"
        );
    }

    #[tokio::test]
    async fn race_waits_for_all_before_denying() {
        let rule = race([delayed("a", false, 30), delayed("b", false, 5)]);
        let started = Instant::now();
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Denied);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    // ── 7. not ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn not_inverts() {
        assert_eq!(eval(&not(allow())).await.unwrap(), RuleResult::Denied);
        assert_eq!(eval(&not(deny())).await.unwrap(), RuleResult::Authorized);
    }

    #[tokio::test]
    async fn not_treats_faults_as_denial() {
        assert_eq!(eval(&not(faulty("boom"))).await.unwrap(), RuleResult::Authorized);
    }

    #[tokio::test]
    async fn not_with_returns_override_verbatim() {
        let rule = not_with(allow(), "admins may not vote");
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::reason("admins may not vote"));
        assert_eq!(
            eval(&not_with(deny(), "unused")).await.unwrap(),
            RuleResult::Authorized
        );
    }

    // ── 8. caching ────────────────────────────────────────────────────────────

    fn counting(cache: CachePolicy, count: &Arc<AtomicUsize>) -> ShieldRule {
        let count = count.clone();
        rule().name("counted").cache(cache).check(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    #[tokio::test]
    async fn contextual_cache_ignores_parent_and_args() {
        let count = Arc::new(AtomicUsize::new(0));
        let rule = counting(CachePolicy::Contextual, &count);
        let hash = default_hash_function();
        let ctx = RequestContext::default();

        for i in 0..4 {
            let inv = invocation_with(&ctx, json!({ "id": i }), json!({ "n": i }));
            rule.resolve(&inv, &hash).await.unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn strict_cache_keys_on_parent_and_args() {
        let count = Arc::new(AtomicUsize::new(0));
        let rule = counting(CachePolicy::Strict, &count);
        let hash = default_hash_function();
        let ctx = RequestContext::default();

        for args in [json!({ "code": "x" }), json!({ "code": "x" }), json!({ "code": "y" })] {
            let inv = invocation_with(&ctx, json!({ "id": 1 }), args);
            rule.resolve(&inv, &hash).await.unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_cache_evaluates_every_time() {
        let count = Arc::new(AtomicUsize::new(0));
        let rule = counting(CachePolicy::NoCache, &count);
        let hash = default_hash_function();
        let ctx = RequestContext::default();

        for _ in 0..3 {
            let inv = invocation_with(&ctx, Value::Null, json!({}));
            rule.resolve(&inv, &hash).await.unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(ctx.shield().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_never_crosses_requests() {
        let count = Arc::new(AtomicUsize::new(0));
        let rule = counting(CachePolicy::Contextual, &count);
        let hash = default_hash_function();

        for _ in 0..2 {
            let inv = invocation_with(&RequestContext::default(), Value::Null, json!({}));
            rule.resolve(&inv, &hash).await.unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_evaluations_share_one_in_flight_predicate() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let rule = rule()
            .name("slowLookup")
            .cache(CachePolicy::Contextual)
            .resolve(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<bool, RuleFault>(true)
                }
            });
        let hash = default_hash_function();
        let ctx = RequestContext::default();
        let invocations: Vec<_> = (0..5)
            .map(|i| invocation_with(&ctx, json!({ "id": i }), json!({})))
            .collect();

        let outcomes = join_all(invocations.iter().map(|inv| rule.resolve(inv, &hash))).await;

        assert!(outcomes.iter().all(|o| matches!(o, Ok(RuleResult::Authorized))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn combinator_children_share_the_cache() {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = counting(CachePolicy::Contextual, &count);
        let rule = and([shared.clone(), or([shared.clone(), deny()]), shared]);
        assert_eq!(eval(&rule).await.unwrap(), RuleResult::Authorized);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // ── 9. fragments and leaves ───────────────────────────────────────────────

    #[test]
    fn extract_fragments_concatenates_without_dedup() {
        let owner = rule().fragment("... on User { ownerId }").check(|_| true);
        let team = rule().fragment("... on User { teamId }").check(|_| true);
        let tree = and([owner.clone(), or([team, not(owner)]), allow()]);

        assert_eq!(
            tree.extract_fragments(),
            vec![
                "... on User { ownerId }".to_string(),
                "... on User { teamId }".to_string(),
                "... on User { ownerId }".to_string(),
            ]
        );
        assert_eq!(tree.leaf_rules().len(), 3);
    }

    #[test]
    fn equality_is_predicate_identity() {
        let base = rule().name("isOwner").check(|_| true);
        let base_rule = base.as_rule().unwrap();
        let copy = base_rule.with_cache(CachePolicy::Strict);
        let other = rule().name("isOwner").check(|_| true);

        assert!(base_rule.equals(&copy));
        assert!(!base_rule.equals(other.as_rule().unwrap()));
    }
}
