//! # palisade-core
//!
//! The rule algebra of the palisade field authorization engine.
//!
//! This crate provides:
//! - `Rule`: a named predicate with a cache policy and optional fragment
//! - `LogicRule` / `ShieldRule`: the `and`, `or`, `not`, `chain`, `race`,
//!   `allow` and `deny` combinators
//! - `RequestContext` / `ShieldCache`: per-request memoization of rule
//!   evaluations
//! - `ExecutableSchema`: the seam to the host execution engine
//! - document and fragment parsing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use palisade_core::{and, rule, CachePolicy};
//!
//! let signed_in = rule().name("signedIn").check(|inv| !inv.context.data()["user"].is_null());
//! let is_owner = rule()
//!     .name("isOwner")
//!     .cache(CachePolicy::Strict)
//!     .fragment("... on Post { authorId }")
//!     .check(|inv| inv.parent["authorId"] == inv.context.data()["user"]);
//! let can_edit = and([signed_in, is_owner]);
//! ```

pub mod cache;
pub mod context;
pub mod document;
pub mod logic;
pub mod rule;
pub mod traits;

pub use cache::{default_hash_function, structural_hash, CachePolicy, HashFunction};
pub use context::{FieldInvocation, RequestContext, RuleOutcome, ShieldCache};
pub use document::{parse_document, parse_fragment};
pub use logic::{allow, and, chain, deny, not, not_with, or, race, LogicRule, ShieldRule};
pub use rule::{rule, Rule, RuleBuilder, RuleFault};
pub use traits::{ExecutableSchema, FieldMiddleware, FieldResolver, FieldResult};
