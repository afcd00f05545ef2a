//! Simulated data for the palisade reference graph.
//!
//! Everything here is hardcoded and fictional. It stands in for the data
//! sources a production host would call.

use serde_json::{json, Value};

/// The code that unlocks `Query.secret`.
pub const SECRET_CODE: &str = "open-sesame";

// ── Users ─────────────────────────────────────────────────────────────────────

/// Every user, keyed by `id`.
pub fn users() -> Value {
    json!([
        { "id": "u1", "name": "Ada", "email": "ada@example.test" },
        { "id": "u2", "name": "Grace", "email": "grace@example.test" }
    ])
}

pub fn user(id: &str) -> Option<Value> {
    find_by_id(users(), id)
}

// ── Posts ─────────────────────────────────────────────────────────────────────

/// Every post. `ownerId` links to [`users`].
pub fn posts() -> Value {
    json!([
        { "id": "p1", "title": "Launch plan", "secret": "codename heron", "ownerId": "u1" },
        { "id": "p2", "title": "Budget", "secret": "runway is 14 months", "ownerId": "u2" },
        { "id": "p3", "title": "Retro", "secret": "ship less, test more", "ownerId": "u1" }
    ])
}

pub fn post(id: &str) -> Option<Value> {
    find_by_id(posts(), id)
}

fn find_by_id(records: Value, id: &str) -> Option<Value> {
    match records {
        Value::Array(items) => items.into_iter().find(|item| item["id"] == id),
        _ => None,
    }
}
