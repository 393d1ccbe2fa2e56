//! `http:` / `https:` locations: download with `GET`, upload with `POST`.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, info};
use url::Url;

use crate::file::list_files;
use crate::{blocking, TransferError};

/// File name used when the URL path has no usable last segment.
const FALLBACK_FILE_NAME: &str = "download";

/// Download `source` into `dir`, named after the last URL path segment.
pub(crate) async fn fetch(
    client: &reqwest::Client,
    source: &Url,
    dir: &Path,
) -> Result<PathBuf, TransferError> {
    let target = dir.join(file_name(source));
    info!("Download {} to {}", source, target.display());

    let response = client
        .get(source.clone())
        .send()
        .await
        .map_err(|e| http_error(source, e))?;

    if !response.status().is_success() {
        return Err(TransferError::Http {
            url: source.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| http_error(source, e))?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(TransferError::io(&target))?;
    debug!("Downloaded {} bytes", bytes.len());

    Ok(target)
}

/// `POST` every file under `local` (or `local` itself) to `destination`.
pub(crate) async fn publish(
    client: &reqwest::Client,
    local: &Path,
    destination: &Url,
    concurrency: usize,
) -> Result<(), TransferError> {
    let root = local.to_path_buf();
    let files = blocking(move || list_files(&root)).await?;
    debug!("Uploading {} files to {}", files.len(), destination);

    // Owned paths keep the boxed `jar:` publish future `Send`.
    let results: Vec<Result<(), TransferError>> = stream::iter(files.into_iter().map(
        |path| async move { upload_file(client, &path, destination).await },
    ))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    results.into_iter().collect()
}

async fn upload_file(
    client: &reqwest::Client,
    path: &Path,
    destination: &Url,
) -> Result<(), TransferError> {
    info!("Upload {} to {}", path.display(), destination);
    let body = tokio::fs::read(path).await.map_err(TransferError::io(path))?;

    let response = client
        .post(destination.clone())
        .body(body)
        .send()
        .await
        .map_err(|e| http_error(destination, e))?;

    if !response.status().is_success() {
        return Err(TransferError::Http {
            url: destination.to_string(),
            reason: format!("HTTP {} uploading {}", response.status(), path.display()),
        });
    }
    Ok(())
}

/// Last non-empty path segment of `url`, or a fixed fallback.
pub(crate) fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn http_error(url: &Url, e: reqwest::Error) -> TransferError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    TransferError::Http {
        url: url.to_string(),
        reason,
    }
}
