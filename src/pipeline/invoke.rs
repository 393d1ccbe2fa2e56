//! Conversion invocation: run the toolchain's managed build as a subprocess.
//!
//! The command line is assembled fresh for every job:
//!
//! ```text
//! java -cp <classpath> -Dant.home=<root> org.apache.tools.ant.Main \
//!      -Dargs.input=<input> -Doutput.dir=<output> [extra args…]
//! ```
//!
//! Extra arguments are appended verbatim and in order; their meaning belongs
//! to the toolchain. Both output streams of the child go to this process's
//! stdout so operators see one interleaved log. The call waits for the child
//! without a timeout; a hung conversion must be stopped from outside.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::pipeline::toolchain::Toolchain;

/// A fully resolved command line for the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionInvocation {
    program: String,
    args: Vec<OsString>,
}

impl ConversionInvocation {
    /// Assemble the command line for converting `input` into `output_dir`.
    pub fn build(
        config: &WorkerConfig,
        classpath: &OsStr,
        input: &Path,
        output_dir: &Path,
        extra_args: &[String],
    ) -> Self {
        let mut args: Vec<OsString> = Vec::with_capacity(6 + extra_args.len());
        args.push("-cp".into());
        args.push(classpath.to_os_string());
        args.push(property(&config.home_property, config.toolchain_home.as_os_str()));
        args.push(config.entry_point.as_str().into());
        args.push(property(&config.input_property, input.as_os_str()));
        args.push(property(&config.output_property, output_dir.as_os_str()));
        args.extend(extra_args.iter().map(OsString::from));

        Self {
            program: config.program.clone(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

fn property(name: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(format!("-D{name}="));
    arg.push(value);
    arg
}

/// What a successful conversion reports back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub classpath_entries: usize,
    pub duration_ms: u64,
}

/// The conversion step as seen by the job orchestrator.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` into `output_dir`, passing `extra_args` through.
    async fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        extra_args: &[String],
    ) -> Result<ConversionSummary, WorkerError>;
}

/// Runs the installed toolchain as a child process.
#[derive(Debug, Clone)]
pub struct ConversionInvoker {
    config: WorkerConfig,
    toolchain: Toolchain,
}

impl ConversionInvoker {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            config: config.clone(),
            toolchain: Toolchain::from_config(config),
        }
    }
}

#[async_trait]
impl Converter for ConversionInvoker {
    async fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        extra_args: &[String],
    ) -> Result<ConversionSummary, WorkerError> {
        let start = Instant::now();

        // ── Resolve classpath (walks the installation) ───────────────────
        let toolchain = self.toolchain.clone();
        let classpath = tokio::task::spawn_blocking(move || toolchain.locate_classpath())
            .await
            .map_err(|e| WorkerError::Internal(format!("Classpath task panicked: {e}")))??;
        let joined = classpath.join()?;

        // ── Build and run the command ────────────────────────────────────
        let invocation =
            ConversionInvocation::build(&self.config, &joined, input, output_dir, extra_args);
        info!(
            program = invocation.program(),
            args = ?invocation.args(),
            "Launching conversion engine"
        );

        let status = Command::new(invocation.program())
            .args(invocation.args())
            .stdout(Stdio::inherit())
            .stderr(io::stdout())
            .status()
            .await
            .map_err(|source| WorkerError::ConversionLaunch {
                program: invocation.program().to_string(),
                source,
            })?;

        if !status.success() {
            return Err(WorkerError::ConversionFailed {
                program: invocation.program().to_string(),
                exit_code: status.code(),
                status: status.to_string(),
            });
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Conversion finished in {}ms", duration_ms);
        Ok(ConversionSummary {
            classpath_entries: classpath.len(),
            duration_ms,
        })
    }
}
