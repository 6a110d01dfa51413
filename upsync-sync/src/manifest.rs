//! Remote manifest: fetch with fallback, write the next generation.
//!
//! The manifest lives at `<upload_path>/__upsync__manifest.json` inside the
//! object store and is the only state carried between runs.
//!
//! - `fetch` never fails: a missing, unreachable, or malformed document is
//!   logged and replaced by [`Manifest::empty`], so "never synced" and "fetch
//!   failed" behave the same way.
//! - `write` overwrites unconditionally. There is no version check, so two
//!   concurrent runs race and the last writer wins.

use chrono::Utc;

use upsync_core::{Manifest, Selection, SyncOptions};

use crate::error::FetchError;
use crate::ports::{Content, ManifestFetcher, ObjectStore};
use crate::SyncError;

/// Query parameter used to bypass intermediary caches.
pub const CACHE_BUST_PARAM: &str = "r";

pub struct ManifestStore<'a> {
    store: &'a dyn ObjectStore,
    fetcher: &'a dyn ManifestFetcher,
    key: String,
}

impl<'a> ManifestStore<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        fetcher: &'a dyn ManifestFetcher,
        options: &SyncOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            key: options.manifest_key(),
        }
    }

    /// Download URL with scheme normalization and a fresh cache buster.
    pub fn download_url(&self) -> String {
        cache_busted(&with_scheme(&self.store.public_url(&self.key)))
    }

    /// Read the manifest, falling back to the empty history on any error.
    pub async fn fetch(&self) -> Manifest {
        let url = self.download_url();
        match self.try_fetch(&url).await {
            Ok(manifest) => {
                tracing::debug!(
                    %url,
                    previous = manifest.previous.len(),
                    current = manifest.current.len(),
                    "manifest loaded"
                );
                manifest
            }
            Err(err) => {
                tracing::warn!(%url, error = %err, "manifest unavailable; starting from empty history");
                Manifest::empty()
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Manifest, FetchError> {
        let body = self.fetcher.get(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Persist the next generation: `{prev: fetched.current, current: selection}`
    /// stamped with the current time.
    ///
    /// Returns the document that was written.
    pub async fn write(
        &self,
        fetched: &Manifest,
        selection: &Selection,
    ) -> Result<Manifest, SyncError> {
        let manifest = fetched.advance(selection.clone(), Utc::now());
        let json = serde_json::to_vec(&manifest)?;
        self.store
            .put(&self.key, Content::Bytes(json))
            .await
            .map_err(|source| SyncError::ManifestWrite {
                key: self.key.clone(),
                source,
            })?;
        tracing::info!(key = %self.key, current = manifest.current.len(), "manifest written");
        Ok(manifest)
    }
}

/// Protocol-relative URLs (`//host/path`) get an explicit `http:` scheme.
pub fn with_scheme(url: &str) -> String {
    if url.starts_with("//") {
        format!("http:{url}")
    } else {
        url.to_string()
    }
}

/// Append `r=<random>` so every fetch misses intermediary caches.
pub fn cache_busted(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}{CACHE_BUST_PARAM}={}",
        rand::random::<u64>()
    )
}
