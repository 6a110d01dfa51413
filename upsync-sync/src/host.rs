//! Filesystem build host: a finished build output directory on disk.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use upsync_core::ArtifactName;
use walkdir::WalkDir;

use crate::error::{host_io_err, HostError};
use crate::ports::{BuildHost, Content};

/// Treats every regular file under `root` as a build output.
///
/// Names are root-relative with `/` separators on every platform.
pub struct FsBuildHost {
    root: PathBuf,
}

impl FsBuildHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BuildHost for FsBuildHost {
    fn list_outputs(&self) -> Result<BTreeSet<ArtifactName>, HostError> {
        walk(&self.root)
    }

    /// Bundlers sometimes append `?query` to output names; it is not part of
    /// the file on disk.
    fn read_output(&self, name: &ArtifactName) -> Result<Content, HostError> {
        let relative = name.as_str().split('?').next().unwrap_or_default();
        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(HostError::MissingOutput {
                name: name.to_string(),
            });
        }
        Ok(Content::File(path))
    }
}

/// Every regular file under `root`, following symlinks to files and directories.
fn walk(root: &Path) -> Result<BTreeSet<ArtifactName>, HostError> {
    let mut names = BTreeSet::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| walk_err(root, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = relative_name(root, entry.path()) {
            names.insert(ArtifactName(name));
        }
    }
    Ok(names)
}

fn walk_err(root: &Path, err: walkdir::Error) -> HostError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
    host_io_err(path, source)
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
