//! Collaborator interfaces the engine drives.
//!
//! - [`BuildHost`]: knows the build outputs and how to read them
//! - [`ObjectStore`]: the remote content store (auth/signing are its business)
//! - [`ManifestFetcher`]: plain GET of a public URL, used for the manifest only

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;

use upsync_core::ArtifactName;

use crate::error::{store_io_err, FetchError, HostError, StoreError};

/// Readable content of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl Content {
    /// Load the whole payload into memory.
    pub async fn into_bytes(self) -> Result<Vec<u8>, StoreError> {
        match self {
            Content::Bytes(bytes) => Ok(bytes),
            Content::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| store_io_err(path, e)),
        }
    }
}

/// Per-key result of a batched delete.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub key: String,
    pub result: Result<(), StoreError>,
}

impl DeleteOutcome {
    pub fn deleted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            result: Ok(()),
        }
    }

    pub fn failed(key: impl Into<String>, error: StoreError) -> Self {
        Self {
            key: key.into(),
            result: Err(error),
        }
    }

    /// A key that was already gone counts as deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(self.result, Ok(()) | Err(StoreError::NotFound { .. }))
    }
}

pub trait BuildHost: Send + Sync {
    /// Every output of the current build.
    fn list_outputs(&self) -> Result<BTreeSet<ArtifactName>, HostError>;

    /// A content handle for one output.
    fn read_output(&self, name: &ArtifactName) -> Result<Content, HostError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create or overwrite the object at `key`.
    async fn put(&self, key: &str, content: Content) -> Result<(), StoreError>;

    /// Delete many keys in one request.
    ///
    /// `Err` means the request as a whole failed; individual key failures are
    /// reported in the returned outcomes.
    async fn batch_delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>, StoreError>;

    /// Public download URL of `key`. May be protocol-relative (`//host/...`).
    fn public_url(&self, key: &str) -> String;
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// GET `url` and return the body. Non-2xx responses are errors.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
