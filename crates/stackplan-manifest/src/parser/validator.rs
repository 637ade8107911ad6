//! Structural validation of a parsed manifest.
//!
//! Unlike the other stages, validation does not stop at the first problem:
//! every check runs and all violations are returned together.

use std::collections::BTreeSet;

use stackplan_common::config::PlannerConfig;
use stackplan_common::error::{Result, StackplanError};
use stackplan_common::types::{Violation, ViolationKind};

use super::ast::{Manifest, OutputDecl};
use crate::resolver::{TargetClass, classify, reference_markers};

/// Validates a parsed manifest.
///
/// # Checks performed
///
/// 1. Every resource has a non-empty type tag.
/// 2. Every output references exactly one resource, and that resource exists.
/// 3. No resource lists itself in `DependsOn`.
/// 4. Logical names are alphanumeric, when the config requires it.
/// 5. Resource and output counts stay within the configured limits.
///
/// # Errors
///
/// Returns [`StackplanError::Validation`] carrying every violation found.
pub fn validate(manifest: &Manifest, config: &PlannerConfig) -> Result<()> {
    let violations = collect_violations(manifest, config)?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(StackplanError::Validation { violations })
    }
}

/// Runs every check and returns the violations found, possibly none.
///
/// # Errors
///
/// Returns an error only if an output holds a malformed `Sub` template.
pub fn collect_violations(manifest: &Manifest, config: &PlannerConfig) -> Result<Vec<Violation>> {
    tracing::info!("validating manifest");
    let mut violations = Vec::new();
    check_limits(manifest, config, &mut violations);
    check_logical_names(manifest, config, &mut violations);
    check_types(manifest, &mut violations);
    check_self_dependencies(manifest, &mut violations);
    for output in &manifest.outputs {
        check_output(manifest, output, config, &mut violations)?;
    }
    tracing::debug!(violations = violations.len(), "validation finished");
    Ok(violations)
}

fn check_limits(manifest: &Manifest, config: &PlannerConfig, out: &mut Vec<Violation>) {
    if manifest.resources.len() > config.max_resources {
        out.push(Violation {
            kind: ViolationKind::TooManyResources,
            names: Vec::new(),
            path: Some("Resources".into()),
            message: format!(
                "manifest declares {} resources, more than the limit of {}",
                manifest.resources.len(),
                config.max_resources
            ),
        });
    }
    if manifest.outputs.len() > config.max_outputs {
        out.push(Violation {
            kind: ViolationKind::TooManyOutputs,
            names: Vec::new(),
            path: Some("Outputs".into()),
            message: format!(
                "manifest declares {} outputs, more than the limit of {}",
                manifest.outputs.len(),
                config.max_outputs
            ),
        });
    }
}

fn is_alphanumeric_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn check_logical_names(manifest: &Manifest, config: &PlannerConfig, out: &mut Vec<Violation>) {
    if !config.require_alphanumeric_names {
        return;
    }
    for resource in &manifest.resources {
        if !is_alphanumeric_name(&resource.name) {
            out.push(Violation {
                kind: ViolationKind::InvalidLogicalName,
                names: vec![resource.name.clone()],
                path: Some(format!("Resources.{}", resource.name)),
                message: format!(
                    "logical name \"{}\" must contain only ASCII letters and digits",
                    resource.name
                ),
            });
        }
    }
}

fn check_types(manifest: &Manifest, out: &mut Vec<Violation>) {
    for resource in &manifest.resources {
        if resource.resource_type.trim().is_empty() {
            out.push(Violation {
                kind: ViolationKind::EmptyType,
                names: vec![resource.name.clone()],
                path: Some(format!("Resources.{}.Type", resource.name)),
                message: format!("resource \"{}\" has an empty type tag", resource.name),
            });
        }
    }
}

fn check_self_dependencies(manifest: &Manifest, out: &mut Vec<Violation>) {
    for resource in &manifest.resources {
        if resource.depends_on.iter().any(|d| *d == resource.name) {
            out.push(Violation {
                kind: ViolationKind::SelfDependency,
                names: vec![resource.name.clone()],
                path: Some(format!("Resources.{}.DependsOn", resource.name)),
                message: format!("resource \"{}\" depends on itself", resource.name),
            });
        }
    }
}

fn check_output(
    manifest: &Manifest,
    output: &OutputDecl,
    config: &PlannerConfig,
    out: &mut Vec<Violation>,
) -> Result<()> {
    let path = format!("Outputs.{}.Value", output.name);
    let mut targets = BTreeSet::new();
    for marker in reference_markers(&output.value, &path)? {
        match classify(&marker, manifest, config) {
            TargetClass::Resource => {
                let _ = targets.insert(marker.target);
            }
            TargetClass::NotAResource => {}
            TargetClass::Unknown => {
                out.push(Violation {
                    kind: ViolationKind::UnknownOutputTarget,
                    names: vec![output.name.clone(), marker.target.clone()],
                    path: Some(marker.path),
                    message: format!(
                        "output \"{}\" references unknown resource \"{}\"",
                        output.name, marker.target
                    ),
                });
                let _ = targets.insert(marker.target);
            }
        }
    }

    if targets.len() != 1 {
        let names = std::iter::once(output.name.clone())
            .chain(targets.iter().cloned())
            .collect();
        out.push(Violation {
            kind: ViolationKind::OutputReferenceCount,
            names,
            path: Some(path),
            message: format!(
                "output \"{}\" must reference exactly one resource, found {}",
                output.name,
                targets.len()
            ),
        });
    }
    Ok(())
}
