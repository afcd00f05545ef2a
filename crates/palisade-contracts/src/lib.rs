//! # palisade-contracts
//!
//! Shared types, documents, and error contracts for the palisade field
//! authorization engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod coordinate;
pub mod error;
pub mod execution;
pub mod result;
pub mod schema;
pub mod selection;
