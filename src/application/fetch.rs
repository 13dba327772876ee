// ============================================================
// Layer 2 — Artifact Fetcher
// ============================================================
// Copies a remote prefix into a local directory, tolerating the
// situations that arise when every worker on a host runs the same
// download into the same path at the same time.
//
//   local dir creation → "already exists"   : race, info, continue
//   store download     → "already exists"   : race, info, continue
//   store download     → "not found"        : warning, continue
//   anything else                           : propagated
//
// The missing-source case is reported separately from the race so
// a genuinely absent vocabulary or dataset shows up as a warning
// in the log instead of disappearing.

use std::{fs, io, path::Path};

use crate::domain::{
    location::RemoteLocation,
    traits::{ObjectStore, StorageError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Objects were copied (possibly zero for an empty prefix)
    Fetched(usize),
    /// Another worker got there first
    Raced,
    /// Nothing exists at the remote location
    SourceMissing,
}

pub fn fetch<S: ObjectStore + ?Sized>(
    store:     &S,
    remote:    &RemoteLocation,
    local_dir: &Path,
) -> Result<FetchOutcome, StorageError> {
    if let Err(e) = fs::create_dir_all(local_dir) {
        if e.kind() == io::ErrorKind::AlreadyExists {
            tracing::info!(
                "Ignoring 'already exists' while creating '{}' (concurrent worker)",
                local_dir.display()
            );
        } else {
            return Err(StorageError::io(local_dir, e));
        }
    }

    match store.download(remote, local_dir) {
        Ok(n) => {
            tracing::info!("Fetched {} objects from {} to '{}'", n, remote, local_dir.display());
            Ok(FetchOutcome::Fetched(n))
        }
        Err(StorageError::AlreadyExists(path)) => {
            tracing::info!(
                "Ignoring 'already exists' for '{}' (concurrent worker)",
                path.display()
            );
            Ok(FetchOutcome::Raced)
        }
        Err(StorageError::NotFound(missing)) => {
            tracing::warn!("Nothing found at {}; continuing without it", missing);
            Ok(FetchOutcome::SourceMissing)
        }
        Err(e) => Err(e),
    }
}
