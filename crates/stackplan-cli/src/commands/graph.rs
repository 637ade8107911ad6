//! `stackplan graph` — Print the dependency graph in DOT format.

use std::path::PathBuf;

use clap::Args;
use stackplan_common::config::PlannerConfig;
use stackplan_manifest::plan::{build_graph, read_manifest};

use super::OutputFormat;
use crate::output;

/// Arguments for the `graph` command.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Path to the manifest file.
    pub file: PathBuf,
}

/// Executes the `graph` command.
///
/// The graph is printed even when it contains a cycle, which makes the
/// loop easy to inspect.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read, parsed, or resolved.
pub fn execute(args: &GraphArgs, config: &PlannerConfig) -> anyhow::Result<()> {
    let graph = read_manifest(&args.file).and_then(|content| build_graph(&content, config));
    match graph {
        Ok((_, graph)) => {
            println!("{}", graph.to_dot());
            Ok(())
        }
        Err(e) => {
            eprint!("{}", output::render_records(&e.records(), OutputFormat::Text)?);
            anyhow::bail!("could not build graph for {}: {}", args.file.display(), e.kind());
        }
    }
}
