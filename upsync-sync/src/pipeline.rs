//! Sync orchestration.
//!
//! ```text
//! SELECT → FETCH_MANIFEST → DIFF → UPLOAD → (DELETE) → WRITE_MANIFEST → DONE
//! ```
//!
//! Phases run strictly in order; the only parallelism is inside UPLOAD. Any
//! error aborts the run before WRITE_MANIFEST, so the remote manifest only
//! ever describes a run that finished every artifact operation. A run that
//! failed is repaired by running again: the same delta is recomputed.
//!
//! [`Syncer::plan`] covers SELECT to DIFF and touches nothing remote except
//! the manifest GET. [`Syncer::apply`] executes a plan.

use std::collections::BTreeSet;
use std::fmt;

use upsync_core::{ArtifactName, Manifest, Selection, SyncOptions};

use crate::diff::{diff_manifest, DiffResult};
use crate::manifest::ManifestStore;
use crate::ports::{BuildHost, Content, ManifestFetcher, ObjectStore};
use crate::runner::run_limited;
use crate::select::select;
use crate::SyncError;

// ---------------------------------------------------------------------------
// Phases and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Select,
    FetchManifest,
    Diff,
    Upload,
    Delete,
    WriteManifest,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Select => "select",
            SyncPhase::FetchManifest => "fetch-manifest",
            SyncPhase::Diff => "diff",
            SyncPhase::Upload => "upload",
            SyncPhase::Delete => "delete",
            SyncPhase::WriteManifest => "write-manifest",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// One artifact to put. Plain data; the runner maps it to a future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub name: ArtifactName,
    pub content: Content,
    pub key: String,
}

/// What happened in the DELETE phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Keys removed (or already absent) in the store.
    Deleted(Vec<String>),
    /// Stale artifacts exist but `delta_update` kept them.
    SkippedDeltaUpdate { stale: usize },
    NothingToDelete,
}

/// Result of SELECT, FETCH_MANIFEST and DIFF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub selection: Selection,
    /// The manifest as fetched (empty on any fetch failure).
    pub manifest: Manifest,
    pub diff: DiffResult,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub selected: usize,
    /// Keys uploaded, in name order.
    pub uploaded: Vec<String>,
    pub deletion: DeletionOutcome,
    /// The manifest this run wrote.
    pub manifest: Manifest,
}

// ---------------------------------------------------------------------------
// Syncer
// ---------------------------------------------------------------------------

pub struct Syncer<'a> {
    host: &'a dyn BuildHost,
    store: &'a dyn ObjectStore,
    fetcher: &'a dyn ManifestFetcher,
    options: &'a SyncOptions,
}

impl<'a> Syncer<'a> {
    pub fn new(
        host: &'a dyn BuildHost,
        store: &'a dyn ObjectStore,
        fetcher: &'a dyn ManifestFetcher,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            host,
            store,
            fetcher,
            options,
        }
    }

    fn manifests(&self) -> ManifestStore<'a> {
        ManifestStore::new(self.store, self.fetcher, self.options)
    }

    /// Full run: plan, then apply.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let plan = self.plan().await?;
        self.apply(plan).await
    }

    /// SELECT, FETCH_MANIFEST and DIFF.
    ///
    /// Selection errors surface before the manifest is requested.
    pub async fn plan(&self) -> Result<SyncPlan, SyncError> {
        let outputs = self.host.list_outputs()?;
        let selection = select(&outputs, self.options.match_files.as_slice())?;
        tracing::info!(
            phase = %SyncPhase::Select,
            outputs = outputs.len(),
            selected = selection.len(),
            "selection computed"
        );

        let manifest = self.manifests().fetch().await;
        tracing::info!(
            phase = %SyncPhase::FetchManifest,
            previous = manifest.previous.len(),
            current = manifest.current.len(),
            "manifest fetched"
        );
        let diff = diff_manifest(&manifest, &selection);
        tracing::info!(
            phase = %SyncPhase::Diff,
            uploads = diff.to_upload.len(),
            deletes = diff.to_delete.len(),
            "diff computed"
        );

        Ok(SyncPlan {
            selection,
            manifest,
            diff,
        })
    }

    /// UPLOAD, DELETE and WRITE_MANIFEST for a computed plan.
    pub async fn apply(&self, plan: SyncPlan) -> Result<SyncReport, SyncError> {
        let SyncPlan {
            selection,
            manifest,
            diff,
        } = plan;

        let uploaded = self.upload(&diff.to_upload).await?;
        let deletion = self.delete(&diff.to_delete).await?;

        let written = self.manifests().write(&manifest, &selection).await?;
        tracing::info!(
            phase = %SyncPhase::Done,
            selected = selection.len(),
            uploads = uploaded.len(),
            "sync complete"
        );

        Ok(SyncReport {
            selected: selection.len(),
            uploaded,
            deletion,
            manifest: written,
        })
    }

    // -- UPLOAD -------------------------------------------------------------

    async fn upload(&self, names: &BTreeSet<ArtifactName>) -> Result<Vec<String>, SyncError> {
        if names.is_empty() {
            tracing::debug!(phase = %SyncPhase::Upload, "nothing to upload");
            return Ok(Vec::new());
        }

        let tasks = names
            .iter()
            .map(|name| self.upload_task(name))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            phase = %SyncPhase::Upload,
            uploads = tasks.len(),
            batch = self.options.batch.get(),
            "uploading"
        );

        run_limited(tasks, self.options.batch, |task| self.upload_one(task)).await
    }

    fn upload_task(&self, name: &ArtifactName) -> Result<UploadTask, SyncError> {
        let content = self
            .host
            .read_output(name)
            .map_err(|source| SyncError::Read {
                name: name.to_string(),
                source,
            })?;
        Ok(UploadTask {
            name: name.clone(),
            content,
            key: self.options.artifact_key(name.as_str()),
        })
    }

    async fn upload_one(&self, task: UploadTask) -> Result<String, SyncError> {
        let UploadTask { name, content, key } = task;
        let put = self.store.put(&key, content);
        let outcome = match self.options.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, put).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(SyncError::UploadTimeout {
                        key: key.clone(),
                        timeout: limit,
                    })
                }
            },
            None => put.await,
        };
        outcome.map_err(|source| SyncError::Upload {
            key: key.clone(),
            source,
        })?;
        tracing::info!(%name, %key, "uploaded");
        Ok(key)
    }

    // -- DELETE -------------------------------------------------------------

    async fn delete(
        &self,
        stale: &BTreeSet<ArtifactName>,
    ) -> Result<DeletionOutcome, SyncError> {
        if stale.is_empty() {
            tracing::debug!(phase = %SyncPhase::Delete, "nothing to delete");
            return Ok(DeletionOutcome::NothingToDelete);
        }
        if !self.options.delete_stale {
            tracing::debug!(
                phase = %SyncPhase::Delete,
                deletes = stale.len(),
                "delta update; keeping stale artifacts"
            );
            return Ok(DeletionOutcome::SkippedDeltaUpdate { stale: stale.len() });
        }

        let keys: Vec<String> = stale
            .iter()
            .map(|name| self.options.artifact_key(name.as_str()))
            .collect();
        tracing::info!(phase = %SyncPhase::Delete, deletes = keys.len(), "deleting stale artifacts");

        let outcomes = self
            .store
            .batch_delete(&keys)
            .await
            .map_err(|source| SyncError::Delete { source })?;

        let failed: Vec<String> = outcomes
            .iter()
            .filter(|outcome| !outcome.is_deleted())
            .map(|outcome| match &outcome.result {
                Err(err) => format!("{}: {err}", outcome.key),
                Ok(()) => outcome.key.clone(),
            })
            .collect();
        if !failed.is_empty() {
            return Err(SyncError::DeleteRejected { failed });
        }

        for key in &keys {
            tracing::info!(%key, "deleted");
        }
        Ok(DeletionOutcome::Deleted(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_display_in_kebab_case() {
        assert_eq!(SyncPhase::FetchManifest.to_string(), "fetch-manifest");
        assert_eq!(SyncPhase::WriteManifest.to_string(), "write-manifest");
        assert_eq!(SyncPhase::Done.to_string(), "done");
    }
}
