//! The planning pipeline: Parse → Resolve → Order → Validate.
//!
//! Parsing, resolution, and ordering each stop at their first fatal error.
//! Validation runs last and reports every violation it finds.

use std::path::Path;

use serde::Serialize;
use stackplan_common::config::PlannerConfig;
use stackplan_common::error::{Result, StackplanError};

use crate::graph::DependencyGraph;
use crate::parser::ast::Manifest;
use crate::parser::{parse_manifest, validator};
use crate::resolver::{Reference, resolve_references};

/// One resource in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedResource {
    /// Logical name.
    pub name: String,
    /// Type tag.
    pub resource_type: String,
    /// Direct dependencies, in declaration order.
    pub depends_on: Vec<String>,
}

/// A validated creation plan for one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Resources in a safe creation order.
    pub steps: Vec<PlannedResource>,
    /// Every resolved reference, grouped by source in declaration order.
    pub references: Vec<Reference>,
}

impl Plan {
    /// Logical names in creation order.
    #[must_use]
    pub fn creation_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Logical names in deletion order, the reverse of creation order.
    #[must_use]
    pub fn deletion_order(&self) -> Vec<&str> {
        self.steps.iter().rev().map(|s| s.name.as_str()).collect()
    }
}

/// Runs parse, resolve, and graph construction, stopping before ordering.
///
/// Useful for rendering the graph of a manifest that may not order cleanly.
///
/// # Errors
///
/// Returns an error if the manifest fails to parse or resolve.
pub fn build_graph(input: &str, config: &PlannerConfig) -> Result<(Manifest, DependencyGraph)> {
    let manifest = parse_manifest(input)?;
    let references = resolve_references(&manifest, config)?;
    let graph = DependencyGraph::from_manifest(&manifest, &references);
    Ok((manifest, graph))
}

/// Plans a manifest given as text.
///
/// # Errors
///
/// Returns the first fatal parse, resolve, or cycle error, or a
/// [`StackplanError::Validation`] listing every structural violation.
pub fn plan_manifest(input: &str, config: &PlannerConfig) -> Result<Plan> {
    let manifest = parse_manifest(input)?;
    let references = resolve_references(&manifest, config)?;
    let graph = DependencyGraph::from_manifest(&manifest, &references);
    let order = graph.resolve_order()?;
    validator::validate(&manifest, config)?;

    let steps = order
        .into_iter()
        .map(|name| {
            let resource_type = manifest
                .resource(&name)
                .map(|r| r.resource_type.clone())
                .unwrap_or_default();
            let depends_on = graph.dependencies_of(&name);
            PlannedResource {
                name,
                resource_type,
                depends_on,
            }
        })
        .collect::<Vec<_>>();

    tracing::info!(resources = steps.len(), "manifest planned");
    Ok(Plan { steps, references })
}

/// Reads and plans a manifest file.
///
/// # Errors
///
/// Returns [`StackplanError::Io`] if the file cannot be read, otherwise the
/// same errors as [`plan_manifest`].
pub fn plan_file(path: &Path, config: &PlannerConfig) -> Result<Plan> {
    tracing::info!(path = %path.display(), "loading manifest file");
    let content = read_manifest(path)?;
    plan_manifest(&content, config)
}

/// Reads a manifest file into memory.
///
/// # Errors
///
/// Returns [`StackplanError::Io`] if the file cannot be read.
pub fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| StackplanError::Io {
        path: path.to_path_buf(),
        source,
    })
}
