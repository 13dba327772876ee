// ============================================================
// Layer 6 — Local Object Store
// ============================================================
// ObjectStore implementation for buckets that are reachable as a
// directory tree, e.g. storage mounted into the training container
// or a scratch directory in tests.
//
// Layout:
//   <root>/
//     <bucket>/
//       data/vocab/...
//       data/processed/...
//       model/custom/...
//
// A key prefix maps one-to-one onto a relative path below the
// bucket directory. Transfers copy whole trees and report how many
// files were copied.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::domain::{
    location::RemoteLocation,
    traits::{ObjectStore, StorageError},
};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path backing a remote location.
    pub fn resolve(&self, remote: &RemoteLocation) -> PathBuf {
        remote
            .key_segments()
            .fold(self.root.join(&remote.bucket), |path, seg| path.join(seg))
    }
}

impl ObjectStore for LocalObjectStore {
    fn download(&self, remote: &RemoteLocation, local_dir: &Path) -> Result<usize, StorageError> {
        let source = self.resolve(remote);
        if !source.exists() {
            return Err(StorageError::NotFound(remote.clone()));
        }

        // A key can name a single object rather than a prefix.
        if source.is_file() {
            let name = source
                .file_name()
                .ok_or_else(|| StorageError::NotFound(remote.clone()))?;
            fs::create_dir_all(local_dir).map_err(|e| StorageError::io(local_dir, e))?;
            let target = local_dir.join(name);
            fs::copy(&source, &target).map_err(|e| StorageError::io(&target, e))?;
            return Ok(1);
        }

        let copied = copy_tree(&source, local_dir)?;
        tracing::debug!("Downloaded {} objects from {}", copied, remote);
        Ok(copied)
    }

    fn upload(&self, local_dir: &Path, remote: &RemoteLocation) -> Result<usize, StorageError> {
        if !local_dir.is_dir() {
            return Err(StorageError::io(
                local_dir,
                io::Error::new(io::ErrorKind::NotFound, "local directory does not exist"),
            ));
        }
        let target = self.resolve(remote);
        let copied = copy_tree(local_dir, &target)?;
        tracing::debug!("Uploaded {} objects to {}", copied, remote);
        Ok(copied)
    }
}

/// Recursively copy `from` into `to`, creating directories as needed.
/// Existing files at the destination are overwritten.
fn copy_tree(from: &Path, to: &Path) -> Result<usize, StorageError> {
    fs::create_dir_all(to).map_err(|e| StorageError::io(to, e))?;

    let mut copied = 0usize;
    for entry in fs::read_dir(from).map_err(|e| StorageError::io(from, e))? {
        let entry  = entry.map_err(|e| StorageError::io(from, e))?;
        let path   = entry.path();
        let target = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| StorageError::io(&path, e))?;

        if file_type.is_dir() {
            copied += copy_tree(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| StorageError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_resolve_maps_bucket_and_key() {
        let store = LocalObjectStore::new("/mnt/buckets");
        let path  = store.resolve(&RemoteLocation::vocab("corpus"));
        assert_eq!(path, PathBuf::from("/mnt/buckets/corpus/data/vocab"));
    }

    #[test]
    fn test_download_copies_nested_tree() {
        let root  = tempdir().unwrap();
        let local = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());

        write(&root.path().join("b/data/processed/train.jsonl"), "a");
        write(&root.path().join("b/data/processed/nested/validation.jsonl"), "b");

        let n = store
            .download(&RemoteLocation::dataset("b"), local.path())
            .unwrap();
        assert_eq!(n, 2);
        assert!(local.path().join("train.jsonl").is_file());
        assert!(local.path().join("nested/validation.jsonl").is_file());
    }

    #[test]
    fn test_download_missing_prefix_is_not_found() {
        let root  = tempdir().unwrap();
        let local = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());

        let err = store
            .download(&RemoteLocation::vocab("nope"), local.path())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_download_single_object() {
        let root  = tempdir().unwrap();
        let local = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        write(&root.path().join("b/data/vocab/vocab.json"), "{}");

        let n = store
            .download(&RemoteLocation::new("b", "data/vocab/vocab.json"), local.path())
            .unwrap();
        assert_eq!(n, 1);
        assert!(local.path().join("vocab.json").is_file());
    }

    #[test]
    fn test_upload_then_overwrite() {
        let root  = tempdir().unwrap();
        let local = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        write(&local.path().join("config.json"), "v1");

        let remote = RemoteLocation::model("b");
        assert_eq!(store.upload(local.path(), &remote).unwrap(), 1);

        write(&local.path().join("config.json"), "v2");
        store.upload(local.path(), &remote).unwrap();

        let uploaded = store.resolve(&remote).join("config.json");
        assert_eq!(fs::read_to_string(uploaded).unwrap(), "v2");
    }

    #[test]
    fn test_upload_missing_local_dir_is_io_error() {
        let root  = tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        let err = store
            .upload(&root.path().join("absent"), &RemoteLocation::model("b"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
