//! Crate-level tests for the battle engine.
//!
//! - `integration.rs`: end-to-end battle scenarios through the engine façade
//! - `determinism.rs`: same seed and same inputs give the same event stream
//! - `properties.rs`: turn-order invariants over random action sequences
//! - `helpers.rs`: scripted dice and scenario setup

mod helpers;
mod integration;

pub use helpers::*;
