//! Configuration for a conversion job.
//!
//! Two things configure a job:
//!
//! * [`WorkerConfig`] describes the installation: where the conversion
//!   toolchain lives, how its launcher is invoked, where workspaces go.
//!   Built once at startup via [`WorkerConfig::builder()`].
//! * [`JobLocations`] names the source and destination of this one job. They
//!   are read from the environment exactly once, before any work starts, and
//!   then passed around explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::WorkerError;

/// Environment variable holding the source location.
pub const SOURCE_ENV: &str = "input";

/// Environment variable holding the destination location.
pub const DESTINATION_ENV: &str = "output";

/// Fixed installation root of the conversion toolchain.
pub const DEFAULT_TOOLCHAIN_HOME: &str = "/opt/app";

/// Configuration for the conversion worker.
///
/// # Example
/// ```rust
/// use convert_worker::WorkerConfig;
///
/// let config = WorkerConfig::builder()
///     .toolchain_home("/opt/dita-ot")
///     .program("/usr/bin/java")
///     .build()
///     .unwrap();
/// assert_eq!(config.entry_point, "org.apache.tools.ant.Main");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Installation root of the conversion toolchain. Default: `/opt/app`.
    pub toolchain_home: PathBuf,

    /// Launcher executable. Default: `java`.
    pub program: String,

    /// Entry-point class of the managed build. Default: `org.apache.tools.ant.Main`.
    pub entry_point: String,

    /// Property pointing the build tool at its home. Default: `ant.home`.
    pub home_property: String,

    /// Build property carrying the input artifact path. Default: `args.input`.
    pub input_property: String,

    /// Build property carrying the output directory. Default: `output.dir`.
    pub output_property: String,

    /// Extension (without the dot) of archives collected onto the classpath.
    /// Default: `jar`.
    pub archive_extension: String,

    /// Parent directory for job workspaces. Default: the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Timeout for HTTP transfers, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            toolchain_home: PathBuf::from(DEFAULT_TOOLCHAIN_HOME),
            program: "java".into(),
            entry_point: "org.apache.tools.ant.Main".into(),
            home_property: "ant.home".into(),
            input_property: "args.input".into(),
            output_property: "output.dir".into(),
            archive_extension: "jar".into(),
            workspace_root: None,
            download_timeout_secs: 120,
        }
    }
}

impl WorkerConfig {
    /// Create a new builder for `WorkerConfig`.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn toolchain_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.config.toolchain_home = home.into();
        self
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.config.program = program.into();
        self
    }

    pub fn entry_point(mut self, class: impl Into<String>) -> Self {
        self.config.entry_point = class.into();
        self
    }

    pub fn home_property(mut self, name: impl Into<String>) -> Self {
        self.config.home_property = name.into();
        self
    }

    pub fn input_property(mut self, name: impl Into<String>) -> Self {
        self.config.input_property = name.into();
        self
    }

    pub fn output_property(mut self, name: impl Into<String>) -> Self {
        self.config.output_property = name.into();
        self
    }

    /// Leading dots are stripped, so `".jar"` and `"jar"` are equivalent.
    pub fn archive_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.archive_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(root.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        let c = &self.config;
        let required = [
            ("program", &c.program),
            ("entry point", &c.entry_point),
            ("home property", &c.home_property),
            ("input property", &c.input_property),
            ("output property", &c.output_property),
            ("archive extension", &c.archive_extension),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(WorkerError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if c.toolchain_home.as_os_str().is_empty() {
            return Err(WorkerError::InvalidConfig(
                "toolchain home must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(WorkerError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Job locations ────────────────────────────────────────────────────────

/// Source and destination of one job, parsed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLocations {
    pub source: Url,
    pub destination: Url,
}

impl JobLocations {
    /// Read both locations from the process environment.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read both locations through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let source = required(&lookup, SOURCE_ENV)?;
        let destination = required(&lookup, DESTINATION_ENV)?;
        Ok(Self {
            source: parse_location(SOURCE_ENV, &source)?,
            destination: parse_location(DESTINATION_ENV, &destination)?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, WorkerError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(WorkerError::MissingLocation {
            name: name.to_string(),
        }),
    }
}

/// Parse a location given as a URI or as an absolute filesystem path.
///
/// Absolute paths become `file:` URLs; relative paths are rejected since the
/// worker's working directory is not part of the job's contract.
pub fn parse_location(name: &str, value: &str) -> Result<Url, WorkerError> {
    let invalid = |reason: String| WorkerError::InvalidLocation {
        name: name.to_string(),
        value: value.to_string(),
        reason,
    };

    match Url::parse(value) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if Path::new(value).is_absolute() => {
            Url::from_file_path(value).map_err(|()| invalid("not a valid file path".into()))
        }
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_toolchain_contract() {
        let c = WorkerConfig::default();
        assert_eq!(c.toolchain_home, PathBuf::from("/opt/app"));
        assert_eq!(c.program, "java");
        assert_eq!(c.home_property, "ant.home");
        assert_eq!(c.input_property, "args.input");
        assert_eq!(c.output_property, "output.dir");
        assert_eq!(c.archive_extension, "jar");
    }

    #[test]
    fn builder_strips_extension_dot() {
        let c = WorkerConfig::builder().archive_extension(".zip").build().unwrap();
        assert_eq!(c.archive_extension, "zip");
    }

    #[test]
    fn builder_rejects_empty_program() {
        let err = WorkerConfig::builder().program("  ").build().unwrap_err();
        assert!(err.to_string().contains("program"), "got: {err}");
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(WorkerConfig::builder().download_timeout_secs(0).build().is_err());
    }

    #[test]
    fn locations_from_lookup() {
        let loc = JobLocations::from_lookup(lookup(&[
            ("input", "file:///in/doc.xml"),
            ("output", "file:///out/"),
        ]))
        .unwrap();
        assert_eq!(loc.source.as_str(), "file:///in/doc.xml");
        assert_eq!(loc.destination.as_str(), "file:///out/");
    }

    #[test]
    fn missing_destination_is_reported() {
        let err = JobLocations::from_lookup(lookup(&[("input", "file:///in/doc.xml")])).unwrap_err();
        match err {
            WorkerError::MissingLocation { name } => assert_eq!(name, "output"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_source_counts_as_missing() {
        let err = JobLocations::from_lookup(lookup(&[("input", "  "), ("output", "file:///o/")]))
            .unwrap_err();
        assert!(matches!(err, WorkerError::MissingLocation { .. }));
    }

    #[test]
    fn absolute_path_becomes_file_url() {
        let url = parse_location("input", "/in/doc.xml").unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.path(), "/in/doc.xml");
    }

    #[test]
    fn relative_path_is_rejected() {
        let err = parse_location("input", "docs/doc.xml").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidLocation { .. }), "got: {err:?}");
    }

    #[test]
    fn malformed_uri_is_rejected() {
        let err = parse_location("output", "http://[::1").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidLocation { .. }), "got: {err:?}");
    }
}
