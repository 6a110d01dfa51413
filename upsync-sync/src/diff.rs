//! Three-generation manifest diff.
//!
//! Artifact names embed a content hash, so an unchanged name means unchanged
//! content and name-set membership is enough to decide what to upload.
//!
//! Deletion is computed against `previous`, the selection of the run before
//! last, never against `current`. A name first shipped by the last run and
//! dropped by this one stays remote until the window has rotated it into
//! `previous`, so clients still holding the last run's asset list keep working.

use std::collections::BTreeSet;

use upsync_core::{ArtifactName, Manifest, Selection};

/// What one run has to do remotely.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffResult {
    pub to_upload: BTreeSet<ArtifactName>,
    pub to_delete: BTreeSet<ArtifactName>,
}

impl DiffResult {
    pub fn is_noop(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// `to_upload = selection \ current`, `to_delete = previous \ selection`.
pub fn diff(
    previous: &BTreeSet<ArtifactName>,
    current: &BTreeSet<ArtifactName>,
    selection: &Selection,
) -> DiffResult {
    DiffResult {
        to_upload: selection.difference(current).cloned().collect(),
        to_delete: previous.difference(selection).cloned().collect(),
    }
}

/// [`diff`] against a fetched manifest.
pub fn diff_manifest(manifest: &Manifest, selection: &Selection) -> DiffResult {
    diff(&manifest.previous, &manifest.current, selection)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<ArtifactName> {
        items.iter().map(|s| ArtifactName::from(*s)).collect()
    }

    #[rstest]
    #[case::first_run(&[], &[], &["a", "b"], &["a", "b"], &[])]
    #[case::only_new_names_upload(&["x"], &["x", "y"], &["x", "y", "z"], &["z"], &[])]
    #[case::identical_selection(&["a"], &["a", "b"], &["a", "b"], &[], &[])]
    #[case::empty_selection_purges_previous(&["p", "q"], &["q", "r"], &[], &[], &["p", "q"])]
    #[case::retired_last_run_is_deleted(&["a", "b"], &["b", "c"], &["b", "c"], &[], &["a"])]
    #[case::dropped_from_both_generations(&["a", "b"], &["a", "b", "c"], &["b", "c"], &[], &["a"])]
    #[case::introduced_last_run_survives(&["a"], &["a", "n"], &["a"], &[], &[])]
    #[case::reselected_name_is_kept(&["a"], &["b"], &["a", "b"], &["a"], &[])]
    fn computes_upload_and_delete_sets(
        #[case] previous: &[&str],
        #[case] current: &[&str],
        #[case] selection: &[&str],
        #[case] upload: &[&str],
        #[case] delete: &[&str],
    ) {
        let result = diff(&set(previous), &set(current), &set(selection));
        assert_eq!(result.to_upload, set(upload), "to_upload");
        assert_eq!(result.to_delete, set(delete), "to_delete");
    }

    #[test]
    fn current_generation_is_never_deleted() {
        // `b` left the selection this run but only `current` knows it.
        let result = diff(&set(&[]), &set(&["a", "b"]), &set(&["a"]));
        assert!(result.to_delete.is_empty());
        assert!(result.is_noop());
    }

    #[test]
    fn diff_manifest_reads_both_generations() {
        let manifest = Manifest {
            previous: set(&["old"]),
            current: set(&["kept"]),
            upload_time: None,
        };
        let result = diff_manifest(&manifest, &set(&["kept", "new"]));
        assert_eq!(result.to_upload, set(&["new"]));
        assert_eq!(result.to_delete, set(&["old"]));
    }
}
