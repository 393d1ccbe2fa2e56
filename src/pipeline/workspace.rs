//! Workspace allocation: one fresh temporary directory per job role.
//!
//! A [`Workspace`] owns a `tempfile::TempDir`, so the directory and
//! everything the job wrote into it are removed when the workspace is
//! dropped: on success, on a failed stage and during unwinding alike.
//! Names carry a random suffix and are created atomically, which keeps
//! concurrent jobs on one host from colliding.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;

use crate::error::WorkerError;

/// Which side of the conversion a workspace stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    Input,
    Output,
}

impl WorkspaceKind {
    fn prefix(self) -> &'static str {
        match self {
            WorkspaceKind::Input => "in",
            WorkspaceKind::Output => "out",
        }
    }
}

impl fmt::Display for WorkspaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkspaceKind::Input => "input",
            WorkspaceKind::Output => "output",
        })
    }
}

/// An exclusively owned temporary directory, deleted on drop.
#[derive(Debug)]
pub struct Workspace {
    kind: WorkspaceKind,
    dir: TempDir,
}

impl Workspace {
    /// Allocate a new unique directory under `root` (or the system temp dir).
    pub fn create(kind: WorkspaceKind, root: Option<&Path>) -> Result<Self, WorkerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(kind.prefix());
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| WorkerError::WorkspaceAllocation { kind, source })?;

        debug!("Allocated {} workspace: {}", kind, dir.path().display());
        Ok(Self { kind, dir })
    }

    pub fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl AsRef<Path> for Workspace {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}
