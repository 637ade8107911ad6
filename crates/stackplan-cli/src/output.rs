//! Report rendering for CLI commands.
//!
//! Every renderer returns a `String` so commands decide where it goes:
//! plans to stdout, error records to stderr.

use std::fmt::Write as _;

use serde::Serialize;
use stackplan_common::error::ErrorRecord;
use stackplan_manifest::plan::{Plan, PlannedResource};
use stackplan_manifest::resolver::Reference;

use crate::commands::OutputFormat;
use crate::commands::validate::FileReport;

/// JSON shape of a printed plan.
#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    direction: &'static str,
    order: Vec<&'a str>,
    steps: &'a [PlannedResource],
    references: &'a [Reference],
}

fn ordered_steps(plan: &Plan, delete: bool) -> Vec<&PlannedResource> {
    if delete {
        plan.steps.iter().rev().collect()
    } else {
        plan.steps.iter().collect()
    }
}

/// Renders a plan as one logical name per line.
///
/// With `verbose`, each name is followed by its type and direct
/// dependencies.
#[must_use]
pub fn render_plan_text(plan: &Plan, delete: bool, verbose: bool) -> String {
    let mut out = String::new();
    for step in ordered_steps(plan, delete) {
        if verbose {
            let _ = writeln!(out, "{}  ({})", step.name, step.resource_type);
            if !step.depends_on.is_empty() {
                let _ = writeln!(out, "    depends on: {}", step.depends_on.join(", "));
            }
        } else {
            let _ = writeln!(out, "{}", step.name);
        }
    }
    out
}

/// Renders a plan as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_plan_json(plan: &Plan, delete: bool) -> serde_json::Result<String> {
    let report = PlanReport {
        direction: if delete { "delete" } else { "create" },
        order: if delete {
            plan.deletion_order()
        } else {
            plan.creation_order()
        },
        steps: &plan.steps,
        references: &plan.references,
    };
    Ok(serde_json::to_string_pretty(&report)? + "\n")
}

fn write_record(out: &mut String, record: &ErrorRecord, indent: &str) {
    let _ = writeln!(out, "{indent}error[{}]: {}", record.kind, record.message);
    if !record.names.is_empty() {
        let _ = writeln!(out, "{indent}  names: {}", record.names.join(", "));
    }
    if let Some(ref path) = record.path {
        let _ = writeln!(out, "{indent}  path: {path}");
    }
}

/// Renders error records in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_records(records: &[ErrorRecord], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for record in records {
                write_record(&mut out, record, "");
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

/// Renders per-file validation results as text.
#[must_use]
pub fn render_file_reports_text(reports: &[FileReport]) -> String {
    let mut out = String::new();
    for report in reports {
        if report.is_ok() {
            let _ = writeln!(out, "{}: ok", report.file.display());
        } else {
            let _ = writeln!(
                out,
                "{}: {} problem(s)",
                report.file.display(),
                report.errors.len()
            );
            for record in &report.errors {
                write_record(&mut out, record, "  ");
            }
        }
    }
    out
}
