//! Reference graph demo scenarios.
//!
//! Each scenario wires a real `GraphSchema`, rule tree, and shield options
//! over mock data and demonstrates one authorization pattern.

pub mod caching;
pub mod ownership;
pub mod secret_code;

/// Shield settings shared by the scenarios.
pub const SHIELD_SETTINGS: &str = include_str!("../../settings/shield.toml");
