//! `jar:` locations: a zip archive reachable through another location.

use std::fs::File;
use std::io;
use std::path::{Component, Path};

use percent_encoding::percent_decode_str;
use url::Url;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::TransferError;

/// Separator between the archive location and the entry inside it.
const ENTRY_SEPARATOR: &str = "!/";

/// A parsed `jar:<archive>!/<entry>` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarLocation {
    /// Location of the zip archive itself.
    pub archive: Url,
    /// Path of an entry inside the archive; `None` addresses the whole archive.
    pub entry: Option<String>,
}

impl JarLocation {
    /// Split a `jar:` URL into its archive location and entry.
    pub fn parse(location: &Url) -> Result<Self, TransferError> {
        let invalid = |reason: &str| TransferError::InvalidLocation {
            location: location.to_string(),
            reason: reason.to_string(),
        };

        if location.scheme() != "jar" {
            return Err(invalid("not a jar: location"));
        }
        let rest = &location.as_str()["jar:".len()..];
        let (archive, entry) = rest
            .split_once(ENTRY_SEPARATOR)
            .ok_or_else(|| invalid("missing '!/' entry separator"))?;
        let archive = Url::parse(archive)
            .map_err(|e| invalid(&format!("invalid archive location: {e}")))?;
        if archive.scheme() == "jar" {
            return Err(invalid("nested jar: locations are not supported"));
        }

        let entry = if entry.is_empty() {
            None
        } else {
            Some(decode_entry(entry).map_err(|reason| invalid(&reason))?)
        };
        Ok(Self { archive, entry })
    }
}

/// Percent-decode an entry and require it to stay inside the extraction
/// directory.
fn decode_entry(raw: &str) -> Result<String, String> {
    let entry = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| format!("entry is not valid UTF-8: {e}"))?
        .into_owned();
    for component in Path::new(&entry).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!("entry '{entry}' escapes the archive root"));
            }
        }
    }
    Ok(entry)
}

/// Extract every entry of the zip at `archive` into `dir`.
pub(crate) fn extract(archive: &Path, dir: &Path) -> Result<usize, TransferError> {
    let file = File::open(archive).map_err(TransferError::io(archive))?;
    let mut zip = ZipArchive::new(file).map_err(|e| archive_error(archive, e))?;
    let entries = zip.len();
    zip.extract(dir).map_err(|e| archive_error(archive, e))?;
    Ok(entries)
}

/// Zip the file or directory tree at `source` into a new archive at `archive`.
///
/// Entry names are relative to `source` and use `/` separators.
pub(crate) fn pack(source: &Path, archive: &Path) -> Result<usize, TransferError> {
    let file = File::create(archive).map_err(TransferError::io(archive))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut packed = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| TransferError::Io {
            path: e.path().unwrap_or(source).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match entry.path().strip_prefix(source) {
            Ok(rel) if !rel.as_os_str().is_empty() => entry_name(rel),
            // `source` is a single file.
            _ => entry.file_name().to_string_lossy().into_owned(),
        };

        zip.start_file(name, options)
            .map_err(|e| archive_error(archive, e))?;
        let mut input = File::open(entry.path()).map_err(TransferError::io(entry.path()))?;
        io::copy(&mut input, &mut zip).map_err(TransferError::io(archive))?;
        packed += 1;
    }

    zip.finish().map_err(|e| archive_error(archive, e))?;
    Ok(packed)
}

pub(crate) fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn archive_error(path: &Path, e: zip::result::ZipError) -> TransferError {
    TransferError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
