//! CLI binary for convert-worker.
//!
//! Reads the job's source and destination from the `input` and `output`
//! environment variables, runs one conversion job, and exits non-zero on the
//! first failure. Everything after the worker's own flags is handed to the
//! conversion engine untouched.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use convert_worker::{
    ConversionInvoker, JobLocations, JobParameters, JobReport, JobRunner, WorkerConfig,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uri_transfer::UriTransfer;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a local DITA map to HTML5 and publish to a directory
  input=/data/maps/guide.ditamap output=file:///srv/out/ \
    convert-worker -Dtranstype=html5

  # Fetch a zipped source tree over HTTP, publish the output as a zip
  input='jar:https://repo.example.com/guide.zip!/guide.ditamap' \
  output='jar:file:///srv/out/guide-html.zip!/' \
    convert-worker -- -Dtranstype=html5 -verbose

  # Keep a machine-readable summary of the job
  convert-worker --report /var/log/job.json -Dtranstype=pdf

LOCATIONS:
  file:///abs/path or /abs/path   local file or directory
  http://… https://…              GET on fetch, POST per file on publish
  s3://<bucket>/<key>             object on fetch; file or tree under <key> on publish
  jar:<location>!/<entry>         zip archive at <location>; <entry> inside it

ENVIRONMENT VARIABLES:
  input                   Source location (required)
  output                  Destination location (required)
  TOOLCHAIN_HOME          Installation root of the conversion toolchain
  JAVA_CMD                Java launcher to run the toolchain with
  WORKER_WORKSPACE_ROOT   Parent directory for the job's temporary workspaces
  WORKER_DOWNLOAD_TIMEOUT HTTP and S3 transfer timeout in seconds
  AWS_*                   S3 credentials, region and endpoint
  WORKER_REPORT           Write a JSON job report to this path
  RUST_LOG                Log filter (overrides --verbose)

  Worker logs go to stderr; the conversion engine's output goes to stdout.
"#;

/// Run one document-conversion job: fetch, convert, publish.
#[derive(Parser, Debug)]
#[command(
    name = "convert-worker",
    version,
    about = "Run one document-conversion job: fetch, convert, publish",
    long_about = "Fetch the artifact named by $input into a temporary workspace, run the \
installed conversion toolchain on it, and publish the produced files to $output. \
Worker flags are long-only; every other argument is passed to the conversion engine.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Print help.
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Print version.
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Installation root of the conversion toolchain.
    #[arg(long, env = "TOOLCHAIN_HOME", default_value = convert_worker::config::DEFAULT_TOOLCHAIN_HOME)]
    toolchain_home: PathBuf,

    /// Java launcher used to run the toolchain.
    #[arg(long = "java", env = "JAVA_CMD", default_value = "java")]
    java: String,

    /// Parent directory for job workspaces (default: system temp dir).
    #[arg(long, env = "WORKER_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// HTTP and S3 transfer timeout in seconds.
    #[arg(long, env = "WORKER_DOWNLOAD_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    download_timeout: u64,

    /// Write a JSON job report to this file.
    #[arg(long, env = "WORKER_REPORT")]
    report: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(long, env = "WORKER_VERBOSE")]
    verbose: bool,

    /// Arguments passed verbatim to the conversion engine.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ENGINE_ARGS")]
    engine_args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Never `process::exit` here: workspaces are removed by destructors.
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    // ── Init: locations first, then workspaces ───────────────────────────
    let locations = JobLocations::from_env().context("Failed to resolve job locations")?;
    let params = JobParameters::prepare(locations, cli.engine_args, &config)
        .context("Failed to prepare job")?;

    let transfer = UriTransfer::new(Duration::from_secs(config.download_timeout_secs))
        .context("Failed to initialise transfer client")?;
    let invoker = ConversionInvoker::new(&config);

    // ── Run ──────────────────────────────────────────────────────────────
    let mut runner = JobRunner::new(&transfer, &invoker);
    let result = runner.run(&params).await;

    let written = match (&cli.report, runner.report()) {
        (Some(path), Some(report)) => write_report(path, report).await,
        _ => Ok(()),
    };
    let report = result.context("Conversion job failed")?;
    written?;

    info!(
        "Converted {} -> {} in {}ms",
        report.source, report.destination, report.total_duration_ms
    );
    Ok(())
}

/// Map CLI args to `WorkerConfig`.
fn build_config(cli: &Cli) -> Result<WorkerConfig> {
    let mut builder = WorkerConfig::builder()
        .toolchain_home(&cli.toolchain_home)
        .program(&cli.java)
        .download_timeout_secs(cli.download_timeout);
    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    builder.build().context("Invalid configuration")
}

async fn write_report(path: &Path, report: &JobReport) -> Result<()> {
    let json = report
        .to_json_pretty()
        .context("Failed to serialise job report")?;
    match tokio::fs::write(path, json).await {
        Ok(()) => Ok(()),
        Err(e) if !report.succeeded() => {
            // Job error takes precedence.
            warn!("Failed to write job report {:?}: {}", path, e);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to write job report {:?}", path)),
    }
}
