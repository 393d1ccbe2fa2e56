//! Error types for the convert-worker library.
//!
//! Every failure of a job is fatal: nothing is retried and the worker exits
//! non-zero on the first error. [`WorkerError`] still groups its variants by
//! the [`ErrorKind`] an operator cares about when reading the final log line:
//!
//! * [`ErrorKind::Config`]: bad or missing job input, unusable toolchain
//!   declarations. Fixing it means changing the job or the installation.
//! * [`ErrorKind::Io`]: workspace allocation or artifact transfer failed.
//! * [`ErrorKind::Conversion`]: the conversion engine could not be launched
//!   or exited non-zero.
//!
//! Failures raised while the pipeline runs are wrapped in
//! [`WorkerError::StageFailed`] so the failing [`Stage`] travels with the cause.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uri_transfer::TransferError;

use crate::pipeline::workspace::WorkspaceKind;

/// One of the three ordered phases of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Convert,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Convert => "convert",
            Stage::Publish => "publish",
        })
    }
}

/// Coarse classification of a [`WorkerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Conversion,
}

/// All errors returned by the convert-worker library.
#[derive(Debug, Error)]
pub enum WorkerError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required job location is absent from the environment.
    #[error("Environment variable '{name}' is not set\nSet it to the job's location URI.")]
    MissingLocation { name: String },

    /// A job location could not be parsed as a URI or absolute path.
    #[error("Environment variable '{name}' is not a valid location '{value}': {reason}")]
    InvalidLocation {
        name: String,
        value: String,
        reason: String,
    },

    /// The toolchain declarations file could not be opened or read.
    #[error("Failed to read toolchain declarations '{path}': {source}")]
    DeclarationsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `CLASSPATH` line in the declarations file has an unexpected shape.
    #[error("Malformed classpath declaration at {path}:{line}: {reason}\n  {content}")]
    MalformedDeclaration {
        path: PathBuf,
        line: usize,
        content: String,
        reason: String,
    },

    /// A classpath entry cannot be represented in a path list.
    #[error("Invalid classpath entry: {0}")]
    InvalidClasspath(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A unique temporary workspace could not be created.
    #[error("Failed to allocate {kind} workspace: {source}")]
    WorkspaceAllocation {
        kind: WorkspaceKind,
        #[source]
        source: std::io::Error,
    },

    /// Fetching or publishing an artifact failed.
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The conversion engine process could not be started.
    #[error("Failed to launch conversion engine '{program}': {source}")]
    ConversionLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The conversion engine ran but reported failure.
    #[error("Conversion engine '{program}' failed with {status}")]
    ConversionFailed {
        program: String,
        exit_code: Option<i32>,
        status: String,
    },

    // ── Pipeline ──────────────────────────────────────────────────────────
    /// A pipeline stage failed; the job stops here.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<WorkerError>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Wrap `self` as the cause of a failed `stage`.
    pub fn in_stage(self, stage: Stage) -> Self {
        WorkerError::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// The stage that failed, if this error came out of the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkerError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Classify the error, looking through stage wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::MissingLocation { .. }
            | WorkerError::InvalidLocation { .. }
            | WorkerError::DeclarationsUnreadable { .. }
            | WorkerError::MalformedDeclaration { .. }
            | WorkerError::InvalidClasspath(_)
            | WorkerError::InvalidConfig(_) => ErrorKind::Config,
            WorkerError::WorkspaceAllocation { .. }
            | WorkerError::Transfer(_)
            | WorkerError::Internal(_) => ErrorKind::Io,
            WorkerError::ConversionLaunch { .. } | WorkerError::ConversionFailed { .. } => {
                ErrorKind::Conversion
            }
            WorkerError::StageFailed { source, .. } => source.kind(),
        }
    }
}
