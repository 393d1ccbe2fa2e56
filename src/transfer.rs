//! The fetch/publish seam between a job and the outside world.
//!
//! The orchestrator only sees [`Transfer`]. The production implementation is
//! [`uri_transfer::UriTransfer`]; tests substitute recording fakes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use crate::error::WorkerError;

/// Moves artifacts between remote locations and local workspaces.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Bring `source` into `workspace` and return the local path of the
    /// fetched artifact.
    async fn fetch(&self, source: &Url, workspace: &Path) -> Result<PathBuf, WorkerError>;

    /// Push the contents of `workspace` to `destination`.
    async fn publish(&self, workspace: &Path, destination: &Url) -> Result<(), WorkerError>;
}

#[async_trait]
impl Transfer for uri_transfer::UriTransfer {
    async fn fetch(&self, source: &Url, workspace: &Path) -> Result<PathBuf, WorkerError> {
        Ok(uri_transfer::UriTransfer::fetch(self, source, workspace).await?)
    }

    async fn publish(&self, workspace: &Path, destination: &Url) -> Result<(), WorkerError> {
        Ok(uri_transfer::UriTransfer::publish(self, workspace, destination).await?)
    }
}
