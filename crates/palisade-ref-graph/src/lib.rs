//! # palisade-ref-graph
//!
//! In-memory reference graph engine for palisade.
//!
//! [`GraphSchema`] implements `ExecutableSchema` over a `TypeFieldMap` with
//! async resolvers, and three scenarios show the shield over mock data:
//!
//! 1. **Secret Code**: a context-checked field with reasoned denials and
//!    hidden predicate faults.
//! 2. **Ownership**: owner-only fields whose rules declare fragment
//!    dependencies, served through two-pass execution.
//! 3. **Caching**: predicate call counts under each cache policy.
//!
//! All data is hardcoded and fictional.

pub mod executor;
pub mod mock_data;
pub mod scenarios;
pub mod schema;

pub use executor::Executor;
pub use schema::{projection_resolver, GraphSchema, GraphSchemaBuilder, Projection};
