// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline moves whole directories between object storage
// and the worker's local disk. `ObjectStore` is that seam:
//
//   - LocalObjectStore (infra) → buckets mounted under a root dir
//   - test doubles             → scripted results per call
//
// The application layer only sees `ObjectStore`, so the fetch and
// publish policies can be exercised without any real storage.

use std::{io, path::{Path, PathBuf}};

use thiserror::Error;

use crate::domain::location::RemoteLocation;

// ─── StorageError ─────────────────────────────────────────────────────────────
/// Kinds of transfer failure a caller may need to tell apart.
/// `NotFound` and `AlreadyExists` are deliberately separate: the
/// fetch policy treats one as a warning and the other as a race.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("nothing found at {0}")]
    NotFound(RemoteLocation),

    #[error("destination '{}' already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Wrap an I/O error, keeping the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

// ─── ObjectStore ──────────────────────────────────────────────────────────────
/// A remote store that can copy directory trees in and out.
///
/// Both directions return the number of objects transferred.
pub trait ObjectStore {
    /// Copy every object under `remote` into `local_dir`, keeping
    /// the relative layout below the remote prefix.
    fn download(&self, remote: &RemoteLocation, local_dir: &Path) -> Result<usize, StorageError>;

    /// Copy every file below `local_dir` to `remote`.
    fn upload(&self, local_dir: &Path, remote: &RemoteLocation) -> Result<usize, StorageError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn download(&self, remote: &RemoteLocation, local_dir: &Path) -> Result<usize, StorageError> {
        (**self).download(remote, local_dir)
    }

    fn upload(&self, local_dir: &Path, remote: &RemoteLocation) -> Result<usize, StorageError> {
        (**self).upload(local_dir, remote)
    }
}
