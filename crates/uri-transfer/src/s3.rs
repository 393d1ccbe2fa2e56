//! `s3:` locations: objects in an S3 bucket.
//!
//! `s3://<bucket>/<key>` names one object on fetch. On publish a single file
//! is written to `<key>` (or `<key>/<file name>` when the key is empty or
//! ends with `/`), and a directory tree is written below `<key>/`.
//! Credentials and region come from the usual `AWS_*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use percent_encoding::percent_decode_str;
use tracing::{debug, info};
use url::Url;

use crate::file::list_files;
use crate::jar::entry_name;
use crate::{blocking, TransferError};

/// A parsed `s3://<bucket>/<key>` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Object key or key prefix, percent-decoded, without a leading `/`.
    pub key: String,
}

impl S3Location {
    pub fn parse(location: &Url) -> Result<Self, TransferError> {
        let invalid = |reason: String| TransferError::InvalidLocation {
            location: location.to_string(),
            reason,
        };

        if location.scheme() != "s3" {
            return Err(invalid("not an s3: location".into()));
        }
        let bucket = location
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing bucket name".into()))?;
        let key = percent_decode_str(location.path().trim_start_matches('/'))
            .decode_utf8()
            .map_err(|e| invalid(format!("key is not valid UTF-8: {e}")))?
            .into_owned();

        Ok(Self {
            bucket: bucket.to_string(),
            key,
        })
    }
}

/// Connect to `bucket` with credentials from the environment.
pub(crate) fn open_bucket(
    bucket: &str,
    timeout: Duration,
) -> Result<Arc<dyn ObjectStore>, TransferError> {
    let store = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_client_options(ClientOptions::new().with_timeout(timeout))
        .build()
        .map_err(|e| TransferError::Storage {
            location: format!("s3://{bucket}"),
            reason: e.to_string(),
        })?;
    Ok(Arc::new(store))
}

/// Download the object named by `source` into `dir`.
pub(crate) async fn fetch(
    store: &dyn ObjectStore,
    source: &Url,
    dir: &Path,
) -> Result<PathBuf, TransferError> {
    let location = S3Location::parse(source)?;
    let key = object_key(source, &location.key)?;
    let name = key.filename().ok_or_else(|| TransferError::InvalidLocation {
        location: source.to_string(),
        reason: "key does not name an object".into(),
    })?;
    let target = dir.join(name);
    info!("Download {} to {}", source, target.display());

    let bytes = store
        .get(&key)
        .await
        .map_err(|e| storage_error(source, e))?
        .bytes()
        .await
        .map_err(|e| storage_error(source, e))?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(TransferError::io(&target))?;
    debug!("Downloaded {} bytes", bytes.len());

    Ok(target)
}

/// Upload the file or tree at `local` below the key of `destination`.
pub(crate) async fn publish(
    store: &dyn ObjectStore,
    local: &Path,
    destination: &Url,
    concurrency: usize,
) -> Result<(), TransferError> {
    let location = S3Location::parse(destination)?;
    let root = local.to_path_buf();
    let files = blocking(move || list_files(&root)).await?;

    let uploads = files
        .into_iter()
        .map(|path| {
            let key = upload_key(&location.key, local, &path);
            Ok((path, object_key(destination, &key)?))
        })
        .collect::<Result<Vec<_>, TransferError>>()?;
    debug!("Uploading {} files to {}", uploads.len(), destination);

    let results: Vec<Result<(), TransferError>> =
        stream::iter(uploads.into_iter().map(|(path, key)| async move {
            upload_file(store, destination, &path, &key).await
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results.into_iter().collect()
}

async fn upload_file(
    store: &dyn ObjectStore,
    destination: &Url,
    path: &Path,
    key: &ObjectPath,
) -> Result<(), TransferError> {
    info!("Upload {} to {}", path.display(), key);
    let body = tokio::fs::read(path).await.map_err(TransferError::io(path))?;
    store
        .put(key, PutPayload::from(body))
        .await
        .map_err(|e| storage_error(destination, e))?;
    Ok(())
}

fn upload_key(prefix: &str, local: &Path, file: &Path) -> String {
    let relative = match file.strip_prefix(local) {
        Ok(rel) if !rel.as_os_str().is_empty() => entry_name(rel),
        // `local` is a single file.
        _ if prefix.is_empty() || prefix.ends_with('/') => {
            file.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
        }
        _ => return prefix.to_string(),
    };
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative
    } else {
        format!("{prefix}/{relative}")
    }
}

fn object_key(location: &Url, key: &str) -> Result<ObjectPath, TransferError> {
    ObjectPath::parse(key).map_err(|e| TransferError::InvalidLocation {
        location: location.to_string(),
        reason: format!("invalid object key '{key}': {e}"),
    })
}

fn storage_error(location: &Url, e: object_store::Error) -> TransferError {
    TransferError::Storage {
        location: location.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::fs;
    use tempfile::TempDir;

    async fn read(store: &InMemory, key: &str) -> String {
        let bytes = store
            .get(&ObjectPath::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parse_splits_bucket_and_decoded_key() {
        let url = Url::parse("s3://docs-bucket/maps/Dokü%20v2.ditamap").unwrap();
        let loc = S3Location::parse(&url).unwrap();
        assert_eq!(loc.bucket, "docs-bucket");
        assert_eq!(loc.key, "maps/Dokü v2.ditamap");
    }

    #[test]
    fn parse_requires_bucket() {
        let url = Url::parse("s3:///maps/root.ditamap").unwrap();
        assert!(S3Location::parse(&url).is_err());
    }

    #[test]
    fn upload_keys_follow_prefix() {
        let local = Path::new("/ws/out");
        assert_eq!(
            upload_key("site/", local, Path::new("/ws/out/topics/a.html")),
            "site/topics/a.html"
        );
        assert_eq!(upload_key("", local, Path::new("/ws/out/index.html")), "index.html");

        let single = Path::new("/ws/out1234.zip");
        assert_eq!(upload_key("builds/guide.zip", single, single), "builds/guide.zip");
        assert_eq!(upload_key("builds/", single, single), "builds/out1234.zip");
    }

    #[tokio::test]
    async fn fetch_downloads_object_into_directory() {
        let store = InMemory::new();
        store
            .put(
                &ObjectPath::from("maps/guide.ditamap"),
                PutPayload::from(b"<map/>".to_vec()),
            )
            .await
            .unwrap();

        let dir = TempDir::new().unwrap();
        let url = Url::parse("s3://bucket/maps/guide.ditamap").unwrap();
        let local = fetch(&store, &url, dir.path()).await.unwrap();

        assert_eq!(local, dir.path().join("guide.ditamap"));
        assert_eq!(fs::read_to_string(local).unwrap(), "<map/>");
    }

    #[tokio::test]
    async fn fetch_missing_object_is_storage_error() {
        let store = InMemory::new();
        let dir = TempDir::new().unwrap();
        let url = Url::parse("s3://bucket/absent.xml").unwrap();
        let err = fetch(&store, &url, dir.path()).await.unwrap_err();
        assert!(matches!(err, TransferError::Storage { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn publish_tree_under_key_prefix() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("topics")).unwrap();
        fs::write(out.path().join("index.html"), "index").unwrap();
        fs::write(out.path().join("topics/a.html"), "a").unwrap();

        let store = InMemory::new();
        let url = Url::parse("s3://bucket/site/").unwrap();
        publish(&store, out.path(), &url, 2).await.unwrap();

        assert_eq!(read(&store, "site/index.html").await, "index");
        assert_eq!(read(&store, "site/topics/a.html").await, "a");
    }
}
