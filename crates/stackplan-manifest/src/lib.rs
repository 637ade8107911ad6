//! # stackplan-manifest
//!
//! Parser, resolver, and orderer for declarative infrastructure manifests.
//!
//! Handles:
//! - **Parser**: YAML reading, intrinsic recognition, and AST construction.
//! - **Resolver**: Turning `Ref`, `GetAtt`, and `Sub` markers into typed references.
//! - **Graph**: Dependency graph construction and deterministic topological ordering.
//! - **Validator**: Accumulating structural checks over the parsed manifest.
//! - **Plan**: The Parse → Resolve → Order → Validate pipeline.

pub mod graph;
pub mod parser;
pub mod plan;
pub mod resolver;
