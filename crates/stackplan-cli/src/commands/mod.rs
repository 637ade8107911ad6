//! CLI command definitions and dispatch.

pub mod graph;
pub mod plan;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use stackplan_common::config::PlannerConfig;
use stackplan_common::constants::{BIN_NAME, CONFIG_ENV_VAR};

/// stackplan — validate infrastructure manifests and order their resources.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON planner configuration file.
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the creation (or deletion) order of a manifest.
    Plan(plan::PlanArgs),
    /// Check one or more manifests and report every problem found.
    Validate(validate::ValidateArgs),
    /// Print the dependency graph of a manifest in Graphviz DOT format.
    Graph(graph::GraphArgs),
}

/// Report format shared by the subcommands.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PlannerConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading planner configuration");
            Ok(PlannerConfig::load(path)?)
        }
        None => Ok(PlannerConfig::default()),
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command
/// fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Plan(args) => plan::execute(&args, &config),
        Command::Validate(args) => validate::execute(&args, &config),
        Command::Graph(args) => graph::execute(&args, &config),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_is_named_after_the_binary() {
        assert_eq!(Cli::command().get_name(), BIN_NAME);
    }

    #[test]
    fn parse_plan_with_flags() {
        let cli = Cli::try_parse_from([
            "stackplan", "plan", "stack.yaml", "--delete", "--format", "json",
        ])
        .expect("should parse");
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.file, PathBuf::from("stack.yaml"));
        assert!(args.delete);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn parse_validate_requires_a_file() {
        assert!(Cli::try_parse_from(["stackplan", "validate"]).is_err());
        let cli = Cli::try_parse_from(["stackplan", "validate", "a.yaml", "b.yaml"])
            .expect("should parse");
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn load_config_defaults_without_path() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, PlannerConfig::default());
    }
}
