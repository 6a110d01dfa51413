//! Error types for upsync-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::SyncPhase;

/// All errors that can abort a sync run.
///
/// A failed manifest fetch never appears here: it is recovered inside
/// [`crate::manifest::ManifestStore::fetch`] and never reaches the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A selector pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {source}")]
    Selection {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The build host could not list or open its outputs.
    #[error("build host error: {0}")]
    Host(#[from] HostError),

    /// Content for an artifact selected for upload could not be opened.
    #[error("cannot read build output {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: HostError,
    },

    /// An upload task failed; earlier uploads stay in place.
    #[error("upload failed for {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("upload of {key} timed out after {}s", timeout.as_secs())]
    UploadTimeout { key: String, timeout: Duration },

    /// The batched delete request itself failed.
    #[error("batch delete failed: {source}")]
    Delete {
        #[source]
        source: StoreError,
    },

    /// The batched delete ran but some keys were not removed.
    #[error("batch delete rejected {} key(s): {}", failed.len(), failed.join(", "))]
    DeleteRejected { failed: Vec<String> },

    /// All artifact work is done but the generation window did not advance.
    #[error("failed to write manifest {key}: {source}")]
    ManifestWrite {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// The phase the run was in when this error aborted it.
    pub fn phase(&self) -> SyncPhase {
        match self {
            SyncError::Selection { .. } | SyncError::Host(_) => SyncPhase::Select,
            SyncError::Read { .. } | SyncError::Upload { .. } | SyncError::UploadTimeout { .. } => {
                SyncPhase::Upload
            }
            SyncError::Delete { .. } | SyncError::DeleteRejected { .. } => SyncPhase::Delete,
            SyncError::ManifestWrite { .. } | SyncError::Json(_) => SyncPhase::WriteManifest,
        }
    }
}

/// Errors raised by a [`crate::ports::BuildHost`].
#[derive(Debug, Error)]
pub enum HostError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build output '{name}' does not exist")]
    MissingOutput { name: String },
}

/// Errors raised by a [`crate::ports::ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("invalid object key '{key}'")]
    InvalidKey { key: String },

    /// The storage provider refused the request.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

/// Errors raised while downloading the manifest. Always recovered.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("reading body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub(crate) fn host_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn store_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
