//! Sync configuration: defaults, the optional `.upsync.yaml` file, validation.
//!
//! # Layering
//!
//! ```text
//! SyncConfig::default()  <  .upsync.yaml  <  CLI flags (applied by the caller)
//! ```
//!
//! # API pattern
//!
//! - `load_at(dir)`: explicit directory; used in tests with `TempDir`
//! - `load()`: uses the current working directory, delegates to `load_at`
//!
//! Validation never exits the process: [`SyncConfig::validate`] collects every
//! problem into [`ConfigError::Invalid`] and the embedding application decides
//! what to do with it.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::MANIFEST_FILENAME;

/// Config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = ".upsync.yaml";

pub const DEFAULT_UPLOAD_PATH: &str = "assets";
pub const DEFAULT_BATCH: usize = 10;

// ---------------------------------------------------------------------------
// 1. Raw configuration
// ---------------------------------------------------------------------------

/// User-facing options, as read from YAML and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Public base URL of the content store, e.g. `https://cdn.example.com`.
    pub bucket_domain: String,
    /// Directory backing the local object store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_root: Option<PathBuf>,
    /// Build output directory.
    pub output_dir: PathBuf,
    /// Remote prefix for artifacts and the manifest.
    pub upload_path: String,
    /// Extra selector patterns; `!pattern` excludes.
    pub match_files: Vec<String>,
    /// Upload concurrency limit.
    pub batch: usize,
    /// When true, stale artifacts are never deleted.
    pub delta_update: bool,
    pub use_public_path: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bucket_domain: String::new(),
            bucket_root: None,
            output_dir: PathBuf::from("dist"),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            match_files: Vec::new(),
            batch: DEFAULT_BATCH,
            delta_update: true,
            use_public_path: true,
            task_timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Validated options
// ---------------------------------------------------------------------------

/// The subset of configuration the sync engine consumes, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upload prefix with leading slashes removed. May be empty.
    pub upload_path: String,
    pub match_files: Vec<String>,
    pub batch: NonZeroUsize,
    /// Run the DELETE phase (the inverse of `delta_update`).
    pub delete_stale: bool,
    pub task_timeout: Option<Duration>,
}

impl SyncOptions {
    /// Options with defaults for everything but the upload path.
    pub fn new(upload_path: impl Into<String>) -> Self {
        Self {
            upload_path: normalize_upload_path(&upload_path.into()),
            match_files: Vec::new(),
            batch: NonZeroUsize::new(DEFAULT_BATCH).unwrap_or(NonZeroUsize::MIN),
            delete_stale: false,
            task_timeout: None,
        }
    }

    /// Remote key of an artifact: `<upload_path>/<name>`, POSIX-joined.
    pub fn artifact_key(&self, name: &str) -> String {
        posix_join(&self.upload_path, name)
    }

    /// Remote key of the manifest document.
    pub fn manifest_key(&self) -> String {
        posix_join(&self.upload_path, MANIFEST_FILENAME)
    }
}

impl SyncConfig {
    /// Check every option and produce [`SyncOptions`].
    ///
    /// All problems are reported at once, not just the first.
    pub fn validate(&self) -> Result<SyncOptions, ConfigError> {
        let mut problems = Vec::new();

        if self.bucket_domain.trim().is_empty() {
            problems.push("bucket_domain is required".to_string());
        } else if !is_valid_domain(&self.bucket_domain) {
            problems.push(format!(
                "bucket_domain '{}' is not a valid url",
                self.bucket_domain
            ));
        }

        let batch = NonZeroUsize::new(self.batch);
        if batch.is_none() {
            problems.push("batch must be a positive integer".to_string());
        }

        if self.task_timeout_secs == Some(0) {
            problems.push("task_timeout_secs must be greater than zero".to_string());
        }

        for pattern in &self.match_files {
            if pattern.trim().is_empty() || pattern.trim() == "!" {
                problems.push(format!("match_files entry '{pattern}' is empty"));
            }
        }

        match batch {
            Some(batch) if problems.is_empty() => Ok(SyncOptions {
                upload_path: normalize_upload_path(&self.upload_path),
                match_files: self.match_files.clone(),
                batch,
                delete_stale: !self.delta_update,
                task_timeout: self.task_timeout_secs.map(Duration::from_secs),
            }),
            _ => Err(ConfigError::Invalid { problems }),
        }
    }

    /// Public URL prefix of uploaded artifacts, always ending in `/`.
    pub fn public_path(&self) -> String {
        let domain = self.bucket_domain.trim_end_matches('/');
        let path = normalize_upload_path(&self.upload_path);
        if path.is_empty() {
            format!("{domain}/")
        } else {
            format!("{domain}/{}/", path.trim_end_matches('/'))
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load `<dir>/.upsync.yaml` over the defaults.
///
/// A missing file is not an error; the defaults are returned unchanged.
pub fn load_at(dir: &Path) -> Result<SyncConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    load_file(&path)
}

/// Load an explicit config file. The file must exist.
pub fn load_file(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `load_at` convenience wrapper for the current working directory.
pub fn load() -> Result<SyncConfig, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| io_err(".", e))?;
    load_at(&cwd)
}

// ---------------------------------------------------------------------------
// 4. Helpers
// ---------------------------------------------------------------------------

/// Strip leading slashes: remote keys are always relative to the bucket.
pub fn normalize_upload_path(raw: &str) -> String {
    raw.trim_start_matches('/').to_string()
}

/// Join with `/` regardless of host OS. An empty base yields `name` alone.
pub fn posix_join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

fn is_valid_domain(raw: &str) -> bool {
    let rest = if let Some(rest) = raw.strip_prefix("https://") {
        rest
    } else if let Some(rest) = raw.strip_prefix("http://") {
        rest
    } else if let Some(rest) = raw.strip_prefix("//") {
        rest
    } else {
        return false;
    };
    let host = rest.split('/').next().unwrap_or_default();
    !host.is_empty() && !host.chars().any(char::is_whitespace)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
