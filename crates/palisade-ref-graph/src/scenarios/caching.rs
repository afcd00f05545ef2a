//! Scenario 3: Caching
//!
//! One field is read three times in a request (`a` and `b` with the same
//! arguments, `c` with different ones). It is guarded by four counting
//! rules, one per cache policy. Each count is the number of predicate calls.
//!
//! contextual → 1   (one per request)
//! strict     → 2   (one per distinct parent and arguments)
//! custom key → 2   (one per distinct `id`)
//! no cache   → 3   (one per field read)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use palisade_contracts::{error::PalisadeResult, schema::FieldDescriptor};
use palisade_core::{and, rule, CachePolicy, RequestContext, RuleFault, ShieldRule};
use palisade_shield::{build_authorized_schema, ShieldedSchema};
use palisade_tree::{RuleTree, ShieldOptions};

use crate::schema::GraphSchema;

pub const QUERY: &str = "{ a: item(id: 1) { id } b: item(id: 1) { id } c: item(id: 2) { id } }";

/// Predicate call counters, one per cache policy.
#[derive(Debug, Clone, Default)]
pub struct CacheCounters {
    contextual: Arc<AtomicUsize>,
    strict: Arc<AtomicUsize>,
    custom: Arc<AtomicUsize>,
    no_cache: Arc<AtomicUsize>,
}

/// A snapshot of [`CacheCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCounts {
    pub contextual: usize,
    pub strict: usize,
    pub custom: usize,
    pub no_cache: usize,
}

impl CacheCounters {
    pub fn counts(&self) -> CacheCounts {
        CacheCounts {
            contextual: self.contextual.load(Ordering::SeqCst),
            strict: self.strict.load(Ordering::SeqCst),
            custom: self.custom.load(Ordering::SeqCst),
            no_cache: self.no_cache.load(Ordering::SeqCst),
        }
    }
}

pub fn schema() -> GraphSchema {
    GraphSchema::builder("Query")
        .resolver(
            "Query",
            FieldDescriptor::new("item", "Item").argument("id"),
            |inv| async move { Ok(json!({ "id": inv.arg("id").clone() })) },
        )
        .field("Item", FieldDescriptor::new("id", "ID"))
        .build()
}

fn counted(name: &str, cache: CachePolicy, counter: Arc<AtomicUsize>) -> ShieldRule {
    rule().name(name).cache(cache).resolve(move |_inv| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            // Keep evaluations in flight long enough to overlap.
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<bool, RuleFault>(true)
        }
    })
}

pub fn rule_tree(counters: &CacheCounters) -> RuleTree {
    let guard = and([
        counted("contextual", CachePolicy::Contextual, Arc::clone(&counters.contextual)),
        counted("strict", CachePolicy::Strict, Arc::clone(&counters.strict)),
        counted(
            "customKey",
            CachePolicy::custom(|inv| inv.arg("id").to_string()),
            Arc::clone(&counters.custom),
        ),
        counted("noCache", CachePolicy::NoCache, Arc::clone(&counters.no_cache)),
    ]);
    RuleTree::builder().field("Query", "item", guard).build()
}

pub fn shielded(counters: &CacheCounters) -> PalisadeResult<ShieldedSchema<GraphSchema>> {
    build_authorized_schema(schema(), &rule_tree(counters), ShieldOptions::default())
}

/// Run [`QUERY`] as one request and return the counts it produced.
pub async fn run_request(
    shield: &ShieldedSchema<GraphSchema>,
    counters: &CacheCounters,
) -> PalisadeResult<CacheCounts> {
    let before = counters.counts();
    shield
        .execute_query(QUERY, Value::Null, RequestContext::default())
        .await?;
    let after = counters.counts();
    Ok(CacheCounts {
        contextual: after.contextual - before.contextual,
        strict: after.strict - before.strict,
        custom: after.custom - before.custom,
        no_cache: after.no_cache - before.no_cache,
    })
}

/// Run Scenario 3: Caching.
pub async fn run_scenario() -> PalisadeResult<()> {
    println!("=== Scenario 3: Caching ===");
    println!();
    println!("  Query: {}", QUERY);

    let counters = CacheCounters::default();
    let shield = shielded(&counters)?;
    for request in 1..=2 {
        let counts = run_request(&shield, &counters).await?;
        println!("  Request {}:", request);
        println!("    contextual calls: {}", counts.contextual);
        println!("    strict calls:     {}", counts.strict);
        println!("    custom key calls: {}", counts.custom);
        println!("    no cache calls:   {}", counts.no_cache);
    }
    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
