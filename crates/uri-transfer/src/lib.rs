//! # uri-transfer
//!
//! Move job artifacts between a location URI and a local directory.
//!
//! A conversion job starts from a source location and ends by shipping its
//! output directory to a destination location. This crate hides the
//! difference between the supported schemes behind two calls:
//!
//! - [`UriTransfer::fetch`] materialises a source location inside a local
//!   directory and returns the local path of the fetched artifact.
//! - [`UriTransfer::publish`] ships a local file or directory tree to a
//!   destination location.
//!
//! ## Supported schemes
//!
//! | Scheme          | Fetch                                  | Publish                               |
//! |-----------------|----------------------------------------|---------------------------------------|
//! | `file`          | copy file (or tree) into the directory | copy the tree into the target dir     |
//! | `http`, `https` | `GET` into `<dir>/<last segment>`      | `POST` every file to the URL          |
//! | `s3`            | download the object into the directory | upload the file, or the tree by key   |
//! | `jar`           | fetch archive, unzip, return the entry | zip the tree, publish the archive     |
//!
//! `jar:` locations follow the `jar:<archive-uri>!/<entry>` shape, where the
//! archive URI may use any other supported scheme.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use uri_transfer::UriTransfer;
//! use url::Url;
//!
//! # async fn run() -> Result<(), uri_transfer::TransferError> {
//! let transfer = UriTransfer::new(Duration::from_secs(120))?;
//! let dir = std::path::Path::new("/tmp/in");
//! let source = Url::parse("jar:https://example.com/docs.zip!/root.ditamap").unwrap();
//! let local = transfer.fetch(&source, dir).await?;
//! println!("fetched {}", local.display());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use object_store::ObjectStore;
use thiserror::Error;
use tracing::info;
use url::Url;

mod file;
mod http;
mod jar;
mod s3;

pub use jar::JarLocation;
pub use s3::S3Location;

/// Default number of concurrent uploads when publishing a tree.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by transfer operations.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The location uses a scheme this crate cannot handle.
    #[error("Unsupported location scheme '{scheme}' in '{location}'")]
    UnsupportedScheme { scheme: String, location: String },

    /// The location is syntactically valid but cannot be used for a transfer.
    #[error("Invalid location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// A local filesystem operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An HTTP request failed or returned a non-success status.
    #[error("HTTP transfer failed for '{url}': {reason}")]
    Http { url: String, reason: String },

    /// An object store request failed.
    #[error("Storage transfer failed for '{location}': {reason}")]
    Storage { location: String, reason: String },

    /// Creating or extracting a zip archive failed.
    #[error("Archive error for '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    /// A blocking worker task panicked or was cancelled.
    #[error("Transfer task failed: {0}")]
    Task(String),
}

impl TransferError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> TransferError + '_ {
        move |source| TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn unsupported(location: &Url) -> TransferError {
        TransferError::UnsupportedScheme {
            scheme: location.scheme().to_string(),
            location: location.to_string(),
        }
    }
}

// ── Transfer client ──────────────────────────────────────────────────────────

/// Scheme-dispatching transfer client.
///
/// Cheap to clone; the inner HTTP client shares its connection pool.
#[derive(Debug, Clone)]
pub struct UriTransfer {
    client: reqwest::Client,
    timeout: Duration,
    upload_concurrency: usize,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl UriTransfer {
    /// Build a client whose HTTP requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::Http {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            timeout,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            object_store: None,
        })
    }

    /// Set how many files are uploaded at once when publishing a tree.
    pub fn with_upload_concurrency(mut self, n: usize) -> Self {
        self.upload_concurrency = n.max(1);
        self
    }

    /// Serve every `s3:` location from `store` instead of connecting to the
    /// bucket named in the location.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Materialise `source` inside `dir` and return the local artifact path.
    pub async fn fetch(&self, source: &Url, dir: &Path) -> Result<PathBuf, TransferError> {
        match source.scheme() {
            "file" => {
                let source = source.clone();
                let dir = dir.to_path_buf();
                blocking(move || file::fetch(&source, &dir)).await
            }
            "http" | "https" => http::fetch(&self.client, source, dir).await,
            "s3" => {
                let store = self.bucket_store(source)?;
                s3::fetch(store.as_ref(), source, dir).await
            }
            "jar" => self.fetch_jar(source, dir).await,
            _ => Err(TransferError::unsupported(source)),
        }
    }

    /// Ship the file or directory tree at `local` to `destination`.
    pub async fn publish(&self, local: &Path, destination: &Url) -> Result<(), TransferError> {
        match destination.scheme() {
            "file" => {
                let destination = destination.clone();
                let local = local.to_path_buf();
                blocking(move || file::publish(&local, &destination)).await
            }
            "http" | "https" => {
                http::publish(&self.client, local, destination, self.upload_concurrency).await
            }
            "s3" => {
                let store = self.bucket_store(destination)?;
                s3::publish(store.as_ref(), local, destination, self.upload_concurrency).await
            }
            "jar" => self.publish_jar(local, destination).await,
            _ => Err(TransferError::unsupported(destination)),
        }
    }

    fn bucket_store(&self, location: &Url) -> Result<Arc<dyn ObjectStore>, TransferError> {
        match &self.object_store {
            Some(store) => Ok(Arc::clone(store)),
            None => s3::open_bucket(&S3Location::parse(location)?.bucket, self.timeout),
        }
    }

    async fn fetch_jar(&self, source: &Url, dir: &Path) -> Result<PathBuf, TransferError> {
        let location = JarLocation::parse(source)?;
        let archive = self.fetch_nested(&location.archive, dir).await?;

        let (archive_path, target) = (archive.clone(), dir.to_path_buf());
        let extracted = blocking(move || jar::extract(&archive_path, &target)).await?;
        tokio::fs::remove_file(&archive)
            .await
            .map_err(TransferError::io(&archive))?;
        info!("Unpacked {} entries from {}", extracted, location.archive);

        Ok(match location.entry {
            Some(entry) => dir.join(entry),
            None => dir.to_path_buf(),
        })
    }

    async fn publish_jar(&self, local: &Path, destination: &Url) -> Result<(), TransferError> {
        let location = JarLocation::parse(destination)?;
        let staging = staging_dir(local);
        let archive = tempfile::Builder::new()
            .prefix("out")
            .suffix(".zip")
            .tempfile_in(&staging)
            .map_err(TransferError::io(&staging))?;

        let (source, target) = (local.to_path_buf(), archive.path().to_path_buf());
        let packed = blocking(move || jar::pack(&source, &target)).await?;
        info!("Packed {} files into {}", packed, archive.path().display());

        // `archive` is deleted when it goes out of scope.
        self.publish_nested(archive.path(), &location.archive).await
    }

    // jar: locations wrap another location; the boxed futures break the
    // recursive future type.
    fn fetch_nested<'a>(
        &'a self,
        source: &'a Url,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, TransferError>> {
        Box::pin(self.fetch(source, dir))
    }

    fn publish_nested<'a>(
        &'a self,
        local: &'a Path,
        destination: &'a Url,
    ) -> BoxFuture<'a, Result<(), TransferError>> {
        Box::pin(self.publish(local, destination))
    }
}

/// Where the archive for a `jar:` publish is staged: next to `local`, so it
/// lives in the same workspace as the output it packs.
fn staging_dir(local: &Path) -> PathBuf {
    match local.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::temp_dir(),
    }
}

/// Run filesystem-heavy work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, TransferError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransferError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransferError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::fs;
    use tempfile::TempDir;

    fn client() -> UriTransfer {
        UriTransfer::new(Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let dir = TempDir::new().unwrap();
        let source = Url::parse("ftp://example.com/key.xml").unwrap();
        let err = client().fetch(&source, dir.path()).await.unwrap_err();
        match err {
            TransferError::UnsupportedScheme { scheme, .. } => assert_eq!(scheme, "ftp"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn jar_round_trip_through_file_locations() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("topics")).unwrap();
        fs::write(out.path().join("index.html"), "<html/>").unwrap();
        fs::write(out.path().join("topics/a.html"), "<p>a</p>").unwrap();

        let store = TempDir::new().unwrap();
        let archive = store.path().join("result.zip");
        let archive_url = Url::from_file_path(&archive).unwrap();
        let jar = Url::parse(&format!("jar:{archive_url}!/")).unwrap();
        client().publish(out.path(), &jar).await.expect("publish jar");
        assert!(archive.is_file());

        let input = TempDir::new().unwrap();
        let entry = Url::parse(&format!("jar:{archive_url}!/topics/a.html")).unwrap();
        let local = client().fetch(&entry, input.path()).await.expect("fetch jar");
        assert_eq!(local, input.path().join("topics/a.html"));
        assert_eq!(fs::read_to_string(&local).unwrap(), "<p>a</p>");
        assert!(
            !input.path().join("result.zip").exists(),
            "downloaded archive should be removed after extraction"
        );
    }

    #[tokio::test]
    async fn jar_without_entry_returns_directory() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("doc.xml"), "<doc/>").unwrap();
        let store = TempDir::new().unwrap();
        let archive_url = Url::from_file_path(store.path().join("in.zip")).unwrap();
        let jar = Url::parse(&format!("jar:{archive_url}!/")).unwrap();
        client().publish(out.path(), &jar).await.unwrap();

        let input = TempDir::new().unwrap();
        let local = client().fetch(&jar, input.path()).await.unwrap();
        assert_eq!(local, input.path());
        assert!(input.path().join("doc.xml").is_file());
    }

    #[tokio::test]
    async fn jar_entry_with_non_ascii_name_is_fetched() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("Dokü.xml"), "<topic/>").unwrap();
        let store = TempDir::new().unwrap();
        let archive_url = Url::from_file_path(store.path().join("docs.zip")).unwrap();
        let jar = Url::parse(&format!("jar:{archive_url}!/")).unwrap();
        client().publish(out.path(), &jar).await.unwrap();

        let input = TempDir::new().unwrap();
        let entry = Url::parse(&format!("jar:{archive_url}!/Dokü.xml")).unwrap();
        let local = client().fetch(&entry, input.path()).await.unwrap();
        assert_eq!(local, input.path().join("Dokü.xml"));
        assert!(local.is_file());
    }

    #[tokio::test]
    async fn jar_publish_stages_archive_next_to_output() {
        let workspace = TempDir::new().unwrap();
        let out = workspace.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("index.html"), "<html/>").unwrap();
        assert_eq!(staging_dir(&out), workspace.path());

        let store = TempDir::new().unwrap();
        let archive_url = Url::from_file_path(store.path().join("site.zip")).unwrap();
        let jar = Url::parse(&format!("jar:{archive_url}!/")).unwrap();
        client().publish(&out, &jar).await.unwrap();

        // Only the output tree is left; the staged zip is gone.
        let names: Vec<_> = fs::read_dir(workspace.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out")]);
    }

    #[test]
    fn staging_dir_falls_back_to_temp_dir() {
        assert_eq!(staging_dir(Path::new("out.html")), std::env::temp_dir());
        assert_eq!(staging_dir(Path::new("/")), std::env::temp_dir());
    }

    #[test]
    fn upload_concurrency_is_at_least_one() {
        assert_eq!(client().with_upload_concurrency(0).upload_concurrency, 1);
        assert_eq!(client().with_upload_concurrency(8).upload_concurrency, 8);
    }

    #[tokio::test]
    async fn s3_locations_use_the_configured_store() {
        let transfer = client()
            .with_object_store(Arc::new(InMemory::new()))
            .with_upload_concurrency(2);

        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("topics")).unwrap();
        fs::write(out.path().join("index.html"), "<html/>").unwrap();
        fs::write(out.path().join("topics/a.html"), "<p>a</p>").unwrap();
        let site = Url::parse("s3://bucket/site").unwrap();
        transfer.publish(out.path(), &site).await.unwrap();

        let input = TempDir::new().unwrap();
        let object = Url::parse("s3://bucket/site/topics/a.html").unwrap();
        let local = transfer.fetch(&object, input.path()).await.unwrap();
        assert_eq!(local, input.path().join("a.html"));
        assert_eq!(fs::read_to_string(&local).unwrap(), "<p>a</p>");
    }

    #[tokio::test]
    async fn jar_round_trip_through_s3() {
        let transfer = client().with_object_store(Arc::new(InMemory::new()));

        let out = TempDir::new().unwrap();
        fs::write(out.path().join("doc.html"), "<html/>").unwrap();
        let jar = Url::parse("jar:s3://bucket/builds/guide.zip!/").unwrap();
        transfer.publish(out.path(), &jar).await.unwrap();

        let input = TempDir::new().unwrap();
        let entry = Url::parse("jar:s3://bucket/builds/guide.zip!/doc.html").unwrap();
        let local = transfer.fetch(&entry, input.path()).await.unwrap();
        assert_eq!(fs::read_to_string(local).unwrap(), "<html/>");
        assert!(!input.path().join("guide.zip").exists());
    }
}
