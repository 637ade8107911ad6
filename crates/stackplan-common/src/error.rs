//! Unified error types for the stackplan workspace.
//!
//! Every stage of the planning pipeline fails with a [`StackplanError`].
//! [`StackplanError::records`] flattens any of them into the structured
//! [`ErrorRecord`]s the CLI reports.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::{ErrorKind, Location, UnresolvedReference, Violation};

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StackplanError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The manifest text is malformed.
    #[error("parse error{}{}: {message}", fmt_location(.location.as_ref()), fmt_path(.path.as_deref()))]
    Parse {
        /// Position reported by the YAML reader, if known.
        location: Option<Location>,
        /// Manifest path of the offending node, if known.
        path: Option<String>,
        /// Description of the problem.
        message: String,
    },

    /// Two resources share a logical name.
    #[error("duplicate resource name: \"{name}\"")]
    DuplicateResourceName {
        /// The repeated logical name.
        name: String,
    },

    /// One or more references name resources that do not exist.
    #[error("{} unresolved reference(s): {}", .unresolved.len(), join(.unresolved))]
    UnknownReferenceTarget {
        /// Every unresolved occurrence, in declaration order.
        unresolved: Vec<UnresolvedReference>,
    },

    /// Resources depend on each other in a loop.
    #[error("dependency cycle: {}", fmt_cycle(.cycle))]
    DependencyCycle {
        /// Members of the loop in "depends on" order, without repetition.
        cycle: Vec<String>,
    },

    /// One or more structural checks failed.
    #[error("{} validation violation(s): {}", .violations.len(), join(.violations))]
    Validation {
        /// Every violation found.
        violations: Vec<Violation>,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StackplanError>;

/// A single structured failure, ready to be printed or serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Failure category.
    pub kind: ErrorKind,
    /// Logical names involved.
    pub names: Vec<String>,
    /// Manifest path involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable explanation.
    pub message: String,
}

impl StackplanError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::IoError,
            Self::Config { .. } | Self::Serialization { .. } => ErrorKind::ConfigError,
            Self::Parse { .. } => ErrorKind::ParseError,
            Self::DuplicateResourceName { .. } => ErrorKind::DuplicateResourceName,
            Self::UnknownReferenceTarget { .. } => ErrorKind::UnknownReferenceTarget,
            Self::DependencyCycle { .. } => ErrorKind::DependencyCycle,
            Self::Validation { .. } => ErrorKind::ValidationViolation,
        }
    }

    /// Flattens this error into one record per reportable occurrence.
    #[must_use]
    pub fn records(&self) -> Vec<ErrorRecord> {
        let kind = self.kind();
        match self {
            Self::UnknownReferenceTarget { unresolved } => unresolved
                .iter()
                .map(|u| ErrorRecord {
                    kind,
                    names: vec![u.resource.clone(), u.target.clone()],
                    path: Some(u.path.clone()),
                    message: u.to_string(),
                })
                .collect(),
            Self::Validation { violations } => violations
                .iter()
                .map(|v| ErrorRecord {
                    kind,
                    names: v.names.clone(),
                    path: v.path.clone(),
                    message: v.message.clone(),
                })
                .collect(),
            Self::DuplicateResourceName { name } => vec![ErrorRecord {
                kind,
                names: vec![name.clone()],
                path: Some(format!("Resources.{name}")),
                message: self.to_string(),
            }],
            Self::DependencyCycle { cycle } => vec![ErrorRecord {
                kind,
                names: cycle.clone(),
                path: None,
                message: self.to_string(),
            }],
            Self::Parse { path, .. } => vec![ErrorRecord {
                kind,
                names: Vec::new(),
                path: path.clone(),
                message: self.to_string(),
            }],
            Self::Io { path, .. } => vec![ErrorRecord {
                kind,
                names: Vec::new(),
                path: Some(path.display().to_string()),
                message: self.to_string(),
            }],
            Self::Config { .. } | Self::Serialization { .. } => vec![ErrorRecord {
                kind,
                names: Vec::new(),
                path: None,
                message: self.to_string(),
            }],
        }
    }
}

fn fmt_location(location: Option<&Location>) -> String {
    location.map_or_else(String::new, |l| format!(" at {l}"))
}

fn fmt_path(path: Option<&str>) -> String {
    path.map_or_else(String::new, |p| format!(" in {p}"))
}

fn fmt_cycle(cycle: &[String]) -> String {
    let mut chain = cycle.join(" -> ");
    if let Some(first) = cycle.first() {
        chain.push_str(" -> ");
        chain.push_str(first);
    }
    chain
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
