//! Scenario 2: Ownership
//!
//! A post's `secret` is readable only by its owner, and a user's `email`
//! only by that user. Neither rule's input (`Post.ownerId`, `User.id`) has
//! to be part of the query: the rules declare fragments, the first pass
//! fetches the extra data, and the rules run in the second pass.
//!
//! Case A: owner lists posts          → own secrets visible, others denied
//! Case B: anonymous lists posts      → every secret denied, `me` denied
//! Case C: owner reads nested, aliased data
//! Case D: viewer aliases another field as `ownerId` → rule still sees the real owner

use serde_json::{json, Value};

use palisade_contracts::{
    error::PalisadeResult, execution::ExecutionResult, result::RuleResult,
    schema::FieldDescriptor,
};
use palisade_core::{and, rule, CachePolicy, FieldInvocation, RequestContext, ShieldRule};
use palisade_shield::{build_authorized_schema, ShieldedSchema};
use palisade_tree::{RuleTree, ShieldOptions, ShieldSettings};

use crate::{mock_data, schema::GraphSchema};

pub const POSTS_QUERY: &str = "{ posts { title secret } }";
pub const ANONYMOUS_QUERY: &str = "{ me { name } posts { secret } }";
pub const NESTED_QUERY: &str = "{ mine: me { mail: email posts { title secret } } }";
pub const SHADOWING_QUERY: &str = "{ posts { ownerId: title secret } }";

pub fn schema() -> GraphSchema {
    GraphSchema::builder("Query")
        .resolver("Query", FieldDescriptor::new("posts", "Post").list(), |_inv| async {
            Ok(mock_data::posts())
        })
        .resolver("Query", FieldDescriptor::new("me", "User"), |inv| async move {
            Ok(viewer(&inv)
                .and_then(mock_data::user)
                .unwrap_or(Value::Null))
        })
        .field("Post", FieldDescriptor::new("id", "ID"))
        .field("Post", FieldDescriptor::new("title", "String"))
        .field("Post", FieldDescriptor::new("secret", "String"))
        .field("Post", FieldDescriptor::new("ownerId", "ID"))
        .resolver("Post", FieldDescriptor::new("author", "User"), |inv| async move {
            Ok(inv.parent["ownerId"]
                .as_str()
                .and_then(mock_data::user)
                .unwrap_or(Value::Null))
        })
        .field("User", FieldDescriptor::new("id", "ID"))
        .field("User", FieldDescriptor::new("name", "String"))
        .field("User", FieldDescriptor::new("email", "String"))
        .resolver("User", FieldDescriptor::new("posts", "Post").list(), |inv| async move {
            let owned = match mock_data::posts() {
                Value::Array(posts) => posts
                    .into_iter()
                    .filter(|post| post["ownerId"] == inv.parent["id"])
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Value::Array(owned))
        })
        .build()
}

fn viewer(inv: &FieldInvocation) -> Option<&str> {
    inv.context.data().get("user").and_then(Value::as_str)
}

// ── Rules ─────────────────────────────────────────────────────────────────────

pub fn is_authenticated() -> ShieldRule {
    rule().name("isAuthenticated").check(|inv| match viewer(inv) {
        Some(_) => RuleResult::Authorized,
        None => RuleResult::reason("sign in first"),
    })
}

pub fn is_owner() -> ShieldRule {
    rule()
        .name("isOwner")
        .fragment("... on Post { ownerId }")
        .cache(CachePolicy::Strict)
        .check(|inv| {
            let owner = inv.parent["ownerId"].as_str();
            if owner.is_some() && owner == viewer(inv) {
                RuleResult::Authorized
            } else {
                RuleResult::reason("only the owner can read this secret")
            }
        })
}

pub fn is_self() -> ShieldRule {
    rule()
        .name("isSelf")
        .fragment("... on User { id }")
        .cache(CachePolicy::Strict)
        .check(|inv| {
            let id = inv.parent["id"].as_str();
            id.is_some() && id == viewer(inv)
        })
}

pub fn rule_tree() -> RuleTree {
    let signed_in = is_authenticated();
    RuleTree::builder()
        .field("Query", "me", signed_in.clone())
        .field("Post", "secret", and([signed_in, is_owner()]))
        .field("User", "email", is_self())
        .build()
}

pub fn shielded(options: ShieldOptions) -> PalisadeResult<ShieldedSchema<GraphSchema>> {
    build_authorized_schema(schema(), &rule_tree(), options)
}

pub async fn run_query(
    shield: &ShieldedSchema<GraphSchema>,
    query: &str,
    context: Value,
) -> PalisadeResult<ExecutionResult> {
    shield
        .execute_query(query, Value::Null, RequestContext::new(context))
        .await
}

/// Run Scenario 2: Ownership.
pub async fn run_scenario() -> PalisadeResult<()> {
    println!("=== Scenario 2: Ownership ===");
    println!();

    let options = ShieldSettings::from_toml_str(super::SHIELD_SETTINGS)?.into_options();
    let shield = shielded(options)?;
    println!(
        "  Fragment requirements: {}",
        shield
            .requirements()
            .iter()
            .map(|r| format!("{} needs {}", r.coordinate, r.fragment.source))
            .collect::<Vec<_>>()
            .join("; ")
    );
    println!();

    let cases = [
        ("A", "owner u1 lists posts", POSTS_QUERY, json!({ "user": "u1" })),
        ("B", "anonymous viewer", ANONYMOUS_QUERY, json!({})),
        ("C", "owner u1 reads nested, aliased data", NESTED_QUERY, json!({ "user": "u1" })),
        ("D", "viewer named after a title", SHADOWING_QUERY, json!({ "user": "Launch plan" })),
    ];
    for (label, description, query, context) in cases {
        let result = run_query(&shield, query, context).await?;
        println!("  Case {}: {}", label, description);
        println!("  Query:  {}", query);
        println!("  Data:   {}", result.data.clone().unwrap_or(Value::Null));
        for error in &result.errors {
            println!("  Error:  {}", error);
        }
        println!();
    }

    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
