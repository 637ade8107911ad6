//! `stackplan plan` — Print a safe creation or deletion order.

use std::path::PathBuf;

use clap::Args;
use stackplan_common::config::PlannerConfig;

use super::OutputFormat;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the manifest file.
    pub file: PathBuf,

    /// Print the deletion order instead of the creation order.
    #[arg(long)]
    pub delete: bool,

    /// Also print each resource's type and direct dependencies.
    #[arg(short, long)]
    pub verbose: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Executes the `plan` command.
///
/// Runs the full pipeline and prints one logical name per line, or the
/// structured error records when planning fails.
///
/// # Errors
///
/// Returns an error if the manifest cannot be planned.
pub fn execute(args: &PlanArgs, config: &PlannerConfig) -> anyhow::Result<()> {
    let plan = match stackplan_manifest::plan::plan_file(&args.file, config) {
        Ok(plan) => plan,
        Err(e) => {
            let records = e.records();
            eprint!("{}", output::render_records(&records, args.format)?);
            anyhow::bail!("could not plan {}: {}", args.file.display(), e.kind());
        }
    };

    let report = match args.format {
        OutputFormat::Text => output::render_plan_text(&plan, args.delete, args.verbose),
        OutputFormat::Json => output::render_plan_json(&plan, args.delete)?,
    };
    print!("{report}");
    Ok(())
}
