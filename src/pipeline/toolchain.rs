//! Toolchain location: assemble the conversion engine's classpath.
//!
//! The classpath for an installation root `base` is, in order:
//!
//! 1. `base/config`
//! 2. every archive file found under `base`, siblings visited by name so the
//!    walk is reproducible
//! 3. the entries declared by `CLASSPATH=` lines in `base/config/env.sh`
//!
//! ## Declaration lines
//!
//! `env.sh` is a shell fragment shipped with the installation. Lines that
//! start with `CLASSPATH` must have the shape `CLASSPATH=<value>` with a
//! double-quoted, single-quoted or bare value. The value is a `:` list in
//! which `$CLASSPATH` refers to the list built so far (skipped) and a leading
//! `$VAR/` refers to the installation root:
//!
//! ```text
//! CLASSPATH="lib/foo.jar"
//! CLASSPATH="$CLASSPATH:$DITA_HOME/plugins/org.dita.pdf2/lib/fo.jar"
//! ```
//!
//! Anything else is reported as a malformed declaration rather than guessed at.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Directory under the root holding configuration; always first on the classpath.
pub const CONFIG_DIR: &str = "config";

/// Declarations file inside [`CONFIG_DIR`].
pub const DECLARATIONS_FILE: &str = "env.sh";

const CLASSPATH_KEY: &str = "CLASSPATH";

static RE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^CLASSPATH=(?:"([^"]*)"|'([^']*)'|([^\s"']*))\s*$"#).unwrap());

static RE_SELF_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(?:CLASSPATH|\{CLASSPATH\})$").unwrap());

static RE_ROOT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(?:[A-Za-z_][A-Za-z0-9_]*|\{[A-Za-z_][A-Za-z0-9_]*\})/").unwrap());

/// Ordered classpath entries for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the config directory is always present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join the entries with the platform path-list separator.
    pub fn join(&self) -> Result<OsString, WorkerError> {
        std::env::join_paths(&self.entries).map_err(|e| WorkerError::InvalidClasspath(e.to_string()))
    }
}

/// A conversion toolchain installed under a fixed root.
#[derive(Debug, Clone)]
pub struct Toolchain {
    home: PathBuf,
    archive_extension: String,
}

impl Toolchain {
    pub fn new(home: impl Into<PathBuf>, archive_extension: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            archive_extension: archive_extension.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.toolchain_home, &config.archive_extension)
    }

    pub fn declarations_path(&self) -> PathBuf {
        self.home.join(CONFIG_DIR).join(DECLARATIONS_FILE)
    }

    /// Compute the full classpath.
    ///
    /// The declarations file is read before the installation is scanned so a
    /// broken installation fails fast. Blocking; call from `spawn_blocking`.
    pub fn locate_classpath(&self) -> Result<Classpath, WorkerError> {
        let declared = self.declared_entries()?;
        let archives = self.scan_archives();
        debug!(
            "Classpath: {} archives, {} declared entries",
            archives.len(),
            declared.len()
        );

        let mut entries = Vec::with_capacity(1 + archives.len() + declared.len());
        entries.push(self.home.join(CONFIG_DIR));
        entries.extend(archives);
        entries.extend(declared);
        Ok(Classpath { entries })
    }

    /// Every archive file under the root, in file-name walk order.
    ///
    /// Unreadable subtrees are skipped with a warning.
    pub fn scan_archives(&self) -> Vec<PathBuf> {
        let ext = self.archive_extension.as_str();
        WalkDir::new(&self.home)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable toolchain path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|e| e == ext))
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Entries declared by `CLASSPATH` lines of the declarations file.
    pub fn declared_entries(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let path = self.declarations_path();
        let file = File::open(&path).map_err(|source| WorkerError::DeclarationsUnreadable {
            path: path.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| WorkerError::DeclarationsUnreadable {
                path: path.clone(),
                source,
            })?;
            if !line.starts_with(CLASSPATH_KEY) {
                continue;
            }
            let fragments = parse_classpath_declaration(&line).map_err(|reason| {
                WorkerError::MalformedDeclaration {
                    path: path.clone(),
                    line: idx + 1,
                    content: line.clone(),
                    reason,
                }
            })?;
            entries.extend(fragments.into_iter().map(|f| self.home.join(f)));
        }
        Ok(entries)
    }
}

/// Parse one `CLASSPATH=` line into root-relative path fragments.
///
/// Returns a human-readable reason when the line does not have the expected
/// shape.
pub fn parse_classpath_declaration(line: &str) -> Result<Vec<String>, String> {
    let caps = RE_DECLARATION
        .captures(line)
        .ok_or_else(|| "expected CLASSPATH=\"<path>[:<path>…]\"".to_string())?;
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str());

    let mut fragments = Vec::new();
    for part in value.split(':') {
        if part.is_empty() || RE_SELF_REFERENCE.is_match(part) {
            continue;
        }
        let fragment = match RE_ROOT_PREFIX.find(part) {
            Some(prefix) => &part[prefix.end()..],
            None => part,
        };
        if fragment.is_empty() {
            return Err(format!("'{part}' names the installation root, not an entry"));
        }
        if fragment.contains('$') {
            return Err(format!("unsupported variable expansion in '{part}'"));
        }
        if Path::new(fragment).is_absolute() {
            return Err(format!("'{part}' must be relative to the installation root"));
        }
        fragments.push(fragment.to_string());
    }
    Ok(fragments)
}
