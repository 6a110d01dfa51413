//! Directory-backed object store.
//!
//! Keys map to paths under `root` (`a/b.js` → `<root>/a/b.js`). Writes go to
//! `<path>.upsync.tmp` first and are renamed into place, so a reader never
//! sees a half-written object. Public URLs are `<domain>/<key>`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{store_io_err, StoreError};
use crate::ports::{Content, DeleteOutcome, ObjectStore};

pub struct LocalDirStore {
    root: PathBuf,
    domain: String,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, domain: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            domain: domain.into(),
        }
    }

    /// Resolve `key` under the root, refusing anything that could escape it.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn put(&self, key: &str, content: Content) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| store_io_err(parent, e))?;
        }

        let tmp = PathBuf::from(format!("{}.upsync.tmp", path.display()));
        let written = match content {
            Content::Bytes(bytes) => tokio::fs::write(&tmp, bytes).await.map(|_| ()),
            Content::File(src) => tokio::fs::copy(&src, &tmp).await.map(|_| ()),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_io_err(&tmp, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(store_io_err(&path, e));
        }
        tracing::debug!(key, path = %path.display(), "stored object");
        Ok(())
    }

    async fn batch_delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let path = match self.path_for(key) {
                Ok(path) => path,
                Err(err) => {
                    outcomes.push(DeleteOutcome::failed(key, err));
                    continue;
                }
            };
            let outcome = match tokio::fs::remove_file(&path).await {
                Ok(()) => DeleteOutcome::deleted(key),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    DeleteOutcome::failed(key, StoreError::NotFound { key: key.clone() })
                }
                Err(e) => DeleteOutcome::failed(key, store_io_err(&path, e)),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn public_url(&self, key: &str) -> String {
        super::public_url(&self.domain, key)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn store(tmp: &TempDir) -> LocalDirStore {
        LocalDirStore::new(tmp.path().join("bucket"), "https://cdn.example.com/")
    }

    #[tokio::test]
    async fn put_bytes_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store
            .put("assets/js/app.js", Content::Bytes(b"let x = 1;".to_vec()))
            .await
            .unwrap();
        let path = tmp.path().join("bucket/assets/js/app.js");
        assert_eq!(fs::read_to_string(path).unwrap(), "let x = 1;");
    }

    #[tokio::test]
    async fn put_file_copies_content_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("app.css");
        fs::write(&src, "body{}").unwrap();

        let store = store(&tmp);
        store
            .put("assets/app.css", Content::File(src))
            .await
            .unwrap();

        let dest = tmp.path().join("bucket/assets/app.css");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "body{}");
        let leftover = PathBuf::from(format!("{}.upsync.tmp", dest.display()));
        assert!(!leftover.exists(), "tmp file should be renamed away");
    }

    #[tokio::test]
    async fn put_missing_source_fails_without_partial_object() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let err = store
            .put("assets/gone.js", Content::File(tmp.path().join("gone.js")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got {err:?}");
        assert!(!tmp.path().join("bucket/assets/gone.js").exists());
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.put("m.json", Content::Bytes(b"1".to_vec())).await.unwrap();
        store.put("m.json", Content::Bytes(b"2".to_vec())).await.unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("bucket/m.json")).unwrap(), "2");
    }

    #[tokio::test]
    async fn keys_cannot_escape_root() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        for key in ["../outside.js", "/etc/passwd", "a/./b", ""] {
            let err = store.put(key, Content::Bytes(vec![])).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{key}: {err:?}");
        }
    }

    #[tokio::test]
    async fn batch_delete_reports_per_key() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.put("a.js", Content::Bytes(vec![1])).await.unwrap();

        let outcomes = store
            .batch_delete(&["a.js".to_string(), "never.js".to_string()])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(StoreError::NotFound { .. })));
        assert!(outcomes.iter().all(DeleteOutcome::is_deleted));
        assert!(!tmp.path().join("bucket/a.js").exists());
    }

    #[test]
    fn public_url_joins_domain() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            store(&tmp).public_url("assets/a.js"),
            "https://cdn.example.com/assets/a.js"
        );
    }
}
