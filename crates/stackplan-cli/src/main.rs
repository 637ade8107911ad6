//! # stackplan — manifest planner CLI
//!
//! Validates infrastructure manifests and prints a safe creation order.
//! Logs go to stderr so stdout carries only the report.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
