//! Argument parsing, configuration resolution, and run orchestration.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, ValueEnum};
use pdbsift_config::{ConfigOverlay, PipelineConfig, load_overlay, validate};
use pdbsift_pipeline::{Coordinator, RunReport};
use pdbsift_telemetry::{LogFormat, LoggingConfig, Metrics, build_version, init_logging};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};
use crate::output::render_summary;

/// Parses CLI arguments, runs the pipeline, and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config = resolve_config(&cli)?;
    init_telemetry(&config)?;
    run_pipeline(&cli, config).await
}

#[derive(Parser, Debug)]
#[command(
    name = "pdbsift",
    version,
    about = "Expand, validate, and consolidate sharded PDB structure archives"
)]
struct Cli {
    /// Directory holding one subdirectory per shard.
    #[arg(value_name = "FOLDER", env = "PDBSIFT_ROOT")]
    root: PathBuf,
    /// Flat directory receiving every structure that passes validation.
    #[arg(value_name = "PROCESSED_FOLDER", env = "PDBSIFT_OUTPUT")]
    output: PathBuf,
    /// File receiving a copy of every log line [default: process.log].
    #[arg(long, env = "PDBSIFT_LOG_FILE")]
    log_file: Option<PathBuf>,
    /// YAML file with tuning overrides.
    #[arg(long, env = "PDBSIFT_CONFIG")]
    config: Option<PathBuf>,
    /// Suffix identifying compressed files [default: .gz].
    #[arg(long, env = "PDBSIFT_SUFFIX")]
    suffix: Option<String>,
    /// Capacity of each stage queue [default: 64].
    #[arg(long, env = "PDBSIFT_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,
    /// Log level used when `RUST_LOG` is unset [default: info].
    #[arg(long, env = "PDBSIFT_LOG_LEVEL")]
    log_level: Option<String>,
    /// Log line format [default: pretty].
    #[arg(long, value_enum, env = "PDBSIFT_LOG_FORMAT")]
    log_format: Option<LogFormatArg>,
    /// Write the run report as JSON to this path.
    #[arg(long, env = "PDBSIFT_REPORT")]
    report: Option<PathBuf>,
    /// Write Prometheus metrics in text format to this path.
    #[arg(long, env = "PDBSIFT_METRICS_OUT")]
    metrics_out: Option<PathBuf>,
    /// Exit with a failure code when any file or folder failed.
    #[arg(long, env = "PDBSIFT_STRICT")]
    strict: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl LogFormatArg {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl Cli {
    fn overlay(&self) -> ConfigOverlay {
        ConfigOverlay {
            compressed_suffix: self.suffix.clone(),
            queue_capacity: self.queue_capacity,
            log_file: self.log_file.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.map(|format| format.as_str().to_string()),
        }
    }
}

/// Defaults, then the YAML file, then flags and environment.
fn resolve_config(cli: &Cli) -> CliResult<PipelineConfig> {
    let mut config = PipelineConfig::new(&cli.root, &cli.output);
    if let Some(path) = &cli.config {
        config.apply_overlay(load_overlay(path)?);
    }
    config.apply_overlay(cli.overlay());
    validate(&config)?;
    Ok(config)
}

fn log_format(config: &PipelineConfig) -> LogFormat {
    config
        .log_format
        .as_deref()
        .map_or(LogFormat::Pretty, LogFormat::from_name)
}

fn init_telemetry(config: &PipelineConfig) -> CliResult<()> {
    let logging = LoggingConfig {
        level: &config.log_level,
        format: log_format(config),
        build_version: env!("CARGO_PKG_VERSION"),
        log_file: Some(&config.log_file),
    };
    init_logging(&logging).map_err(CliError::failure)
}

async fn run_pipeline(cli: &Cli, config: PipelineConfig) -> CliResult<()> {
    info!(
        version = build_version(),
        log_file = %config.log_file.display(),
        "pdbsift starting"
    );
    let metrics = Metrics::new().map_err(CliError::failure)?;
    let report = Coordinator::new(config, metrics.clone())
        .run()
        .await
        .map_err(CliError::failure)?;

    let totals = metrics.snapshot();
    info!(
        units = totals.units_total,
        files = totals.files_total,
        elapsed_ms = totals.run_duration_ms,
        "pdbsift finished"
    );
    println!("{}", render_summary(&report).trim_end());

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("failed to write run report to {}", path.display()))
            .map_err(CliError::failure)?;
    }
    if let Some(path) = &cli.metrics_out {
        metrics
            .write_to(path)
            .with_context(|| format!("failed to write metrics to {}", path.display()))
            .map_err(CliError::failure)?;
    }

    check_outcome(&report, cli.strict)
}

fn check_outcome(report: &RunReport, strict: bool) -> CliResult<()> {
    if !report.completed_cleanly() {
        let aborted: Vec<_> = report
            .aborted_stages
            .iter()
            .map(|stage| stage.as_str())
            .collect();
        return Err(CliError::failure(anyhow!(
            "pipeline did not drain cleanly (aborted stages: [{}], {} of {} folders enqueued)",
            aborted.join(", "),
            report.folders_enqueued,
            report.folders_discovered
        )));
    }
    if report.has_failures() {
        let failed_folders = report.failed_folders().len();
        if strict {
            return Err(CliError::failure(anyhow!(
                "run recorded failures ({failed_folders} withheld folders); see the log for details"
            )));
        }
        warn!(
            failed_folders,
            "run completed with recorded failures; rerun with --strict to fail the process"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pdbsift_pipeline::{FileOutcome, StageKind};
    use pdbsift_test_support::fixtures::{NOT_GZIP, PDB_WITH_ALPHA_CARBON, ShardTree};
    use std::fs;

    fn parse(tree: &ShardTree, extra: &[&str]) -> Result<Cli> {
        let root = tree.root().to_string_lossy().into_owned();
        let output = tree.output().to_string_lossy().into_owned();
        let mut args = vec!["pdbsift".to_string(), root, output];
        args.extend(extra.iter().map(ToString::to_string));
        Ok(Cli::try_parse_from(args)?)
    }

    #[test]
    fn positional_arguments_and_defaults() -> Result<()> {
        let tree = ShardTree::new()?;
        let cli = parse(&tree, &[])?;
        let config = resolve_config(&cli).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(config.root, tree.root());
        assert_eq!(config.output_dir, tree.output());
        assert_eq!(config.log_file, PathBuf::from("process.log"));
        assert_eq!(config.compressed_suffix, ".gz");
        assert_eq!(log_format(&config), LogFormat::Pretty);
        assert!(!cli.strict);
        Ok(())
    }

    #[test]
    fn flags_override_the_yaml_file() -> Result<()> {
        let tree = ShardTree::new()?;
        let yaml = tree.base().join("pdbsift.yaml");
        fs::write(&yaml, "queue_capacity: 8\nlog_level: debug\nlog_format: json\n")?;
        let yaml_arg = yaml.to_string_lossy().into_owned();

        let cli = parse(
            &tree,
            &["--config", &yaml_arg, "--queue-capacity", "2", "--strict"],
        )?;
        let config = resolve_config(&cli).map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.log_level, "debug");
        assert_eq!(log_format(&config), LogFormat::Json);
        assert!(cli.strict);
        Ok(())
    }

    #[test]
    fn invalid_configuration_maps_to_exit_code_two() -> Result<()> {
        let tree = ShardTree::new()?;
        let nested = tree.root().join("processed").to_string_lossy().into_owned();
        let root = tree.root().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["pdbsift", root.as_str(), nested.as_str()])?;
        let Err(err) = resolve_config(&cli) else {
            anyhow::bail!("expected output inside root to be rejected");
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("inside_root"));

        let cli = parse(&tree, &["--queue-capacity", "0"])?;
        let Err(err) = resolve_config(&cli) else {
            anyhow::bail!("expected zero capacity to be rejected");
        };
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[test]
    fn unknown_log_format_is_a_parse_error() -> Result<()> {
        let tree = ShardTree::new()?;
        assert!(parse(&tree, &["--log-format", "xml"]).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn run_pipeline_writes_report_and_metrics() -> Result<()> {
        let tree = ShardTree::new()?;
        tree.add_gz("s1", "1abc.pdb.gz", PDB_WITH_ALPHA_CARBON)?;
        let report_path = tree.base().join("report.json");
        let metrics_path = tree.base().join("metrics.prom");
        let report_arg = report_path.to_string_lossy().into_owned();
        let metrics_arg = metrics_path.to_string_lossy().into_owned();

        let cli = parse(
            &tree,
            &["--report", &report_arg, "--metrics-out", &metrics_arg],
        )?;
        let config = resolve_config(&cli).map_err(|err| anyhow!(err.display_message()))?;
        run_pipeline(&cli, config)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(tree.output_names()?, vec!["1abc.pdb"]);
        assert!(fs::read_to_string(&report_path)?.contains("\"folders_discovered\": 1"));
        assert!(fs::read_to_string(&metrics_path)?.contains("pipeline_files_total"));
        Ok(())
    }

    #[tokio::test]
    async fn strict_mode_turns_recorded_failures_into_exit_code_three() -> Result<()> {
        let tree = ShardTree::new()?;
        tree.add_raw("s1", "broken.pdb.gz", NOT_GZIP)?;

        let lenient = parse(&tree, &[])?;
        let config = resolve_config(&lenient).map_err(|err| anyhow!(err.display_message()))?;
        run_pipeline(&lenient, config)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        tree.add_raw("s2", "broken.pdb.gz", NOT_GZIP)?;
        let strict = parse(&tree, &["--strict"])?;
        let config = resolve_config(&strict).map_err(|err| anyhow!(err.display_message()))?;
        let Err(err) = run_pipeline(&strict, config).await else {
            anyhow::bail!("expected strict run to fail");
        };
        assert_eq!(err.exit_code(), 3);
        Ok(())
    }

    #[test]
    fn incomplete_runs_fail_regardless_of_strictness() -> Result<()> {
        let now = std::time::SystemTime::now().into();
        let report = RunReport {
            root: PathBuf::from("pdb"),
            output_dir: PathBuf::from("processed"),
            started_at: now,
            finished_at: now,
            elapsed_ms: 0,
            folders_discovered: 1,
            folders_enqueued: 1,
            stages: Vec::new(),
            aborted_stages: vec![StageKind::Validate],
        };
        let Err(err) = check_outcome(&report, false) else {
            anyhow::bail!("expected aborted run to fail");
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("validate"));
        assert_eq!(report.file_count(FileOutcome::Moved), 0);
        Ok(())
    }
}
