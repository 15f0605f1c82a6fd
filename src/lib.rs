//! Spotcast library
//!
//! Tide classification, extreme annotation and forecast reconciliation for
//! coastal spots. The binary in `main.rs` wires these modules to the real
//! HTTP clients; integration tests drive them with in-memory collaborators.

pub mod cache;
pub mod civil_time;
pub mod cli;
pub mod config;
pub mod data;
pub mod reconcile;
pub mod schedule;
pub mod tide;
pub mod workflow;
