//! `file:` locations: plain filesystem copies.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

use crate::TransferError;

/// Copy the file (or directory tree) named by `source` into `dir`.
pub(crate) fn fetch(source: &Url, dir: &Path) -> Result<PathBuf, TransferError> {
    let path = to_file_path(source)?;
    let meta = fs::metadata(&path).map_err(TransferError::io(&path))?;
    let name = path
        .file_name()
        .ok_or_else(|| TransferError::InvalidLocation {
            location: source.to_string(),
            reason: "path has no file name".into(),
        })?;
    let target = dir.join(name);

    info!("Copy {} to {}", path.display(), target.display());
    if meta.is_dir() {
        copy_tree(&path, &target)?;
    } else {
        fs::copy(&path, &target).map_err(TransferError::io(&target))?;
    }
    Ok(target)
}

/// Copy `local` to the path named by `destination`.
///
/// A directory is merged into the destination directory, which is created if
/// missing. A single file is copied to the destination path itself.
pub(crate) fn publish(local: &Path, destination: &Url) -> Result<(), TransferError> {
    let target = to_file_path(destination)?;
    info!("Copy {} to {}", local.display(), target.display());

    if local.is_dir() {
        let copied = copy_tree(local, &target)?;
        debug!("Copied {} files to {}", copied, target.display());
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
    }
    fs::copy(local, &target).map_err(TransferError::io(&target))?;
    Ok(())
}

/// Recursively copy `from` into `to`, returning the number of files copied.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<usize, TransferError> {
    fs::create_dir_all(to).map_err(TransferError::io(to))?;

    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| TransferError::Io {
            path: e.path().unwrap_or(from).to_path_buf(),
            source: e.into(),
        })?;
        let relative = match entry.path().strip_prefix(from) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(TransferError::io(&target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(TransferError::io(&target))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Every regular file under `local`, or `local` itself when it is a file.
pub(crate) fn list_files(local: &Path) -> Result<Vec<PathBuf>, TransferError> {
    if local.is_file() {
        return Ok(vec![local.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(local).sort_by_file_name() {
        let entry = entry.map_err(|e| TransferError::Io {
            path: e.path().unwrap_or(local).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn to_file_path(location: &Url) -> Result<PathBuf, TransferError> {
    location
        .to_file_path()
        .map_err(|()| TransferError::InvalidLocation {
            location: location.to_string(),
            reason: "not a local file path".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fetch_copies_file_into_directory() {
        let src = TempDir::new().unwrap();
        let doc = src.path().join("doc.xml");
        fs::write(&doc, "<topic/>").unwrap();
        let dir = TempDir::new().unwrap();

        let local = fetch(&Url::from_file_path(&doc).unwrap(), dir.path()).unwrap();
        assert_eq!(local, dir.path().join("doc.xml"));
        assert_eq!(fs::read_to_string(local).unwrap(), "<topic/>");
    }

    #[test]
    fn fetch_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = Url::from_file_path(dir.path().join("nope.xml")).unwrap();
        let err = fetch(&missing, dir.path()).unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }), "got: {err:?}");
    }

    #[test]
    fn publish_merges_tree_into_destination() {
        let out = TempDir::new().unwrap();
        fs::create_dir_all(out.path().join("css")).unwrap();
        fs::write(out.path().join("index.html"), "index").unwrap();
        fs::write(out.path().join("css/site.css"), "body{}").unwrap();

        let dest_root = TempDir::new().unwrap();
        let dest = dest_root.path().join("published");
        publish(out.path(), &Url::from_directory_path(&dest).unwrap()).unwrap();

        assert_eq!(fs::read_to_string(dest.join("index.html")).unwrap(), "index");
        assert_eq!(fs::read_to_string(dest.join("css/site.css")).unwrap(), "body{}");
    }

    #[test]
    fn copy_tree_counts_files_only() {
        let from = TempDir::new().unwrap();
        fs::create_dir_all(from.path().join("a/b")).unwrap();
        fs::write(from.path().join("a/b/one.txt"), "1").unwrap();
        fs::write(from.path().join("two.txt"), "2").unwrap();
        let to = TempDir::new().unwrap();

        assert_eq!(copy_tree(from.path(), to.path()).unwrap(), 2);
        assert!(to.path().join("a/b/one.txt").is_file());
    }
}
