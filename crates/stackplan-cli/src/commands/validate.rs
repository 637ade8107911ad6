//! `stackplan validate` — Check manifests and report every problem.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Args;
use stackplan_common::config::PlannerConfig;
use stackplan_common::error::ErrorRecord;

use super::OutputFormat;
use crate::output;

/// Arguments for the `validate` command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest files to check.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Outcome of checking one manifest.
#[derive(Debug, serde::Serialize)]
pub struct FileReport {
    /// Manifest path as given.
    pub file: PathBuf,
    /// Records of every problem; empty when the manifest is valid.
    pub errors: Vec<ErrorRecord>,
}

impl FileReport {
    /// Whether the manifest planned cleanly.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Number of files planned at once.
fn worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Plans files on at most `workers` threads at a time; reports come back in
/// argument order.
fn check_all(files: &[PathBuf], config: &PlannerConfig, workers: usize) -> Vec<FileReport> {
    files
        .chunks(workers.max(1))
        .flat_map(|batch| check_batch(batch, config))
        .collect()
}

/// Plans each file of a batch on its own scoped thread.
fn check_batch(files: &[PathBuf], config: &PlannerConfig) -> Vec<FileReport> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                scope.spawn(move || {
                    let errors = stackplan_manifest::plan::plan_file(file, config)
                        .err()
                        .map(|e| e.records())
                        .unwrap_or_default();
                    FileReport {
                        file: file.clone(),
                        errors,
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .zip(files)
            .map(|(handle, file)| {
                handle.join().unwrap_or_else(|_| FileReport {
                    file: file.clone(),
                    errors: vec![ErrorRecord {
                        kind: stackplan_common::types::ErrorKind::IoError,
                        names: Vec::new(),
                        path: Some(file.display().to_string()),
                        message: "validation worker panicked".into(),
                    }],
                })
            })
            .collect()
    })
}

/// Executes the `validate` command.
///
/// # Errors
///
/// Returns an error if any manifest fails to plan.
pub fn execute(args: &ValidateArgs, config: &PlannerConfig) -> anyhow::Result<()> {
    let workers = worker_count();
    tracing::info!(files = args.files.len(), workers, "validating manifests");
    let reports = check_all(&args.files, config, workers);
    let failed = reports.iter().filter(|r| !r.is_ok()).count();

    let rendered = match args.format {
        OutputFormat::Text => output::render_file_reports_text(&reports),
        OutputFormat::Json => serde_json::to_string_pretty(&reports)? + "\n",
    };
    print!("{rendered}");

    if failed > 0 {
        anyhow::bail!("{failed} of {} manifest(s) failed validation", reports.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_all_keeps_argument_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good = dir.path().join("good.yaml");
        let bad = dir.path().join("bad.yaml");
        std::fs::write(&good, "Resources:\n  Bucket:\n    Type: AWS::S3::Bucket\n").expect("write");
        std::fs::write(&bad, "Resources:\n  Bucket:\n    Type: ''\n").expect("write");

        let reports = check_all(&[bad.clone(), good.clone()], &PlannerConfig::default(), 4);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].file, bad);
        assert!(!reports[0].is_ok());
        assert_eq!(reports[1].file, good);
        assert!(reports[1].is_ok());
    }

    #[test]
    fn check_all_reports_missing_file() {
        let reports = check_all(
            &[PathBuf::from("/nonexistent/stack.yaml")],
            &PlannerConfig::default(),
            1,
        );
        assert_eq!(
            reports[0].errors[0].kind,
            stackplan_common::types::ErrorKind::IoError
        );
    }

    #[test]
    fn check_all_batches_more_files_than_workers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let files: Vec<PathBuf> = (0..5)
            .map(|i| {
                let path = dir.path().join(format!("stack{i}.yaml"));
                let kind = if i % 2 == 0 { "AWS::S3::Bucket" } else { "''" };
                std::fs::write(&path, format!("Resources:\n  Bucket:\n    Type: {kind}\n"))
                    .expect("write");
                path
            })
            .collect();

        let reports = check_all(&files, &PlannerConfig::default(), 2);
        assert_eq!(reports.len(), 5);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.file, files[i]);
            assert_eq!(report.is_ok(), i % 2 == 0, "file {i}");
        }
    }

    #[test]
    fn worker_count_is_at_least_one() {
        assert!(worker_count() >= 1);
    }
}
