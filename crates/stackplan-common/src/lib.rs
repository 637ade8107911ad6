//! # stackplan-common
//!
//! Shared error records, domain types, configuration models, and constants
//! used across the stackplan workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the primitives the manifest pipeline and the
//! CLI build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
