//! # convert-worker
//!
//! Run exactly one document-conversion job, then exit.
//!
//! A job fetches an input artifact from a remote location, runs a
//! pre-installed conversion toolchain on it as a subprocess, and publishes
//! whatever the toolchain wrote to a remote destination. The toolchain is
//! opaque: this crate only assembles its classpath and command line.
//!
//! ## Pipeline Overview
//!
//! ```text
//! env (input, output)
//!  │
//!  ├─ 0. Init     resolve locations, allocate in/ and out/ workspaces
//!  ├─ 1. Fetch    source URI → input workspace            (uri-transfer)
//!  ├─ 2. Convert  java -cp … org.apache.tools.ant.Main …  (subprocess)
//!  └─ 3. Publish  output workspace → destination URI      (uri-transfer)
//! ```
//!
//! The first failure ends the job; nothing is retried. Workspaces are
//! temporary directories removed when [`JobParameters`] is dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use convert_worker::{ConversionInvoker, JobLocations, JobParameters, JobRunner, WorkerConfig};
//! use uri_transfer::UriTransfer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::default();
//!     let locations = JobLocations::from_env()?;
//!     let params = JobParameters::prepare(locations, vec!["-Dtranstype=html5".into()], &config)?;
//!
//!     let transfer = UriTransfer::new(Duration::from_secs(config.download_timeout_secs))?;
//!     let invoker = ConversionInvoker::new(&config);
//!     let report = JobRunner::new(&transfer, &invoker).run(&params).await?;
//!     eprintln!("done in {}ms", report.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convert-worker` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod transfer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobLocations, WorkerConfig, WorkerConfigBuilder};
pub use error::{ErrorKind, Stage, WorkerError};
pub use job::{JobParameters, JobRunner, JobState};
pub use output::{JobOutcome, JobReport, StageTiming};
pub use pipeline::invoke::{ConversionInvocation, ConversionInvoker, ConversionSummary, Converter};
pub use pipeline::toolchain::{Classpath, Toolchain};
pub use pipeline::workspace::{Workspace, WorkspaceKind};
pub use transfer::Transfer;
