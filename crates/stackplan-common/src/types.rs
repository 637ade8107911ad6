//! Domain primitive types used across the stackplan workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a resource depends on the target of a reference.
///
/// Both kinds order identically; the distinction is kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Depends on the target's identity (`Ref`).
    #[serde(rename = "RefById")]
    Identity,
    /// Depends on an attribute the target produces once created (`GetAtt`).
    #[serde(rename = "RefByAttribute")]
    Attribute,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "RefById"),
            Self::Attribute => write!(f, "RefByAttribute"),
        }
    }
}

/// Category of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The input could not be read.
    IoError,
    /// The planner configuration is invalid.
    ConfigError,
    /// The manifest text is malformed.
    ParseError,
    /// Two resources share a logical name.
    DuplicateResourceName,
    /// A reference names a resource that does not exist.
    UnknownReferenceTarget,
    /// Resources depend on each other in a loop.
    DependencyCycle,
    /// A structural check failed.
    ValidationViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IoError => "IoError",
            Self::ConfigError => "ConfigError",
            Self::ParseError => "ParseError",
            Self::DuplicateResourceName => "DuplicateResourceName",
            Self::UnknownReferenceTarget => "UnknownReferenceTarget",
            Self::DependencyCycle => "DependencyCycle",
            Self::ValidationViolation => "ValidationViolation",
        };
        f.write_str(name)
    }
}

/// Line and column in the manifest text, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// A reference whose target is not declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// Resource holding the reference.
    pub resource: String,
    /// Property path of the reference inside the resource.
    pub path: String,
    /// Name that failed to resolve.
    pub target: String,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "resource \"{}\" at {} references unknown resource \"{}\"",
            self.resource, self.path, self.target
        )
    }
}

/// The structural rule a [`Violation`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A resource has no type tag.
    EmptyType,
    /// An output references a resource that does not exist.
    UnknownOutputTarget,
    /// An output does not reference exactly one resource.
    OutputReferenceCount,
    /// A resource lists itself in its explicit dependencies.
    SelfDependency,
    /// A logical name contains characters outside `[A-Za-z0-9]`.
    InvalidLogicalName,
    /// The manifest declares more resources than allowed.
    TooManyResources,
    /// The manifest declares more outputs than allowed.
    TooManyOutputs,
}

/// One failed structural check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule that failed.
    pub kind: ViolationKind,
    /// Logical names (resources or outputs) involved.
    pub names: Vec<String>,
    /// Path inside the manifest, when one applies.
    pub path: Option<String>,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_kind_serializes_with_wire_names() {
        let json = serde_json::to_string(&ReferenceKind::Attribute).expect("serialize");
        assert_eq!(json, "\"RefByAttribute\"");
        assert_eq!(ReferenceKind::Identity.to_string(), "RefById");
    }

    #[test]
    fn unresolved_reference_display_names_path() {
        let unresolved = UnresolvedReference {
            resource: "Instance".into(),
            path: "Properties.SubnetId".into(),
            target: "Subnett".into(),
        };
        let msg = unresolved.to_string();
        assert!(msg.contains("Properties.SubnetId"), "got: {msg}");
        assert!(msg.contains("Subnett"), "got: {msg}");
    }
}
