// ============================================================
// Layer 2 — Artifact Publisher
// ============================================================
// Runs on the leader worker only (current host == master host):
//
//   1. create the local model directory
//   2. let the caller write weights, config.json and tokenizer into it
//   3. check the weights file and config.json are actually there
//   4. upload the model directory to s3://<bucket>/model/custom/
//   5. copy the vocabulary files next to the model
//   6. upload the vocabulary directory to the same location
//
// Every other worker returns immediately without touching disk or
// the store. An incomplete save is logged and skipped, not failed.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{identity::HostIdentity, location::RemoteLocation, traits::ObjectStore};
use crate::infra::{checkpoint::CONFIG_FILE, tokenizer_store::VOCAB_ARTIFACTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    NotLeader,
    MissingArtifacts,
    Uploaded { model_objects: usize, vocab_objects: usize },
}

pub struct ArtifactPublisher<'a, S: ObjectStore + ?Sized> {
    store:           &'a S,
    identity:        HostIdentity,
    local_model_dir: PathBuf,
    vocab_dir:       PathBuf,
    weights_file:    String,
    remote:          RemoteLocation,
}

impl<'a, S: ObjectStore + ?Sized> ArtifactPublisher<'a, S> {
    /// `weights_file` is the file name the save step is expected to
    /// produce inside the model directory (e.g. "model.mpk").
    pub fn new(
        store:           &'a S,
        identity:        HostIdentity,
        bucket:          &str,
        local_model_dir: impl Into<PathBuf>,
        vocab_dir:       impl Into<PathBuf>,
        weights_file:    impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            local_model_dir: local_model_dir.into(),
            vocab_dir:       vocab_dir.into(),
            weights_file:    weights_file.into(),
            remote:          RemoteLocation::model(bucket),
        }
    }

    pub fn publish<F>(&self, save: F) -> Result<PublishOutcome>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        if !self.identity.is_leader() {
            tracing::info!(
                "Host '{}' is not the leader ('{}'); skipping save and upload",
                self.identity.current,
                self.identity.master
            );
            return Ok(PublishOutcome::NotLeader);
        }

        let dir = self.local_model_dir.as_path();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;

        tracing::info!("Saving trained CLM to '{}'", dir.display());
        save(dir)?;

        let missing: Vec<&str> = [self.weights_file.as_str(), CONFIG_FILE]
            .into_iter()
            .filter(|name| !dir.join(name).is_file())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "Model directory '{}' is missing {:?}; nothing uploaded",
                dir.display(),
                missing
            );
            return Ok(PublishOutcome::MissingArtifacts);
        }

        let model_objects = self
            .store
            .upload(dir, &self.remote)
            .with_context(|| format!("Failed to upload model to {}", self.remote))?;
        tracing::info!("Uploaded {} model files to {}", model_objects, self.remote);

        let copied = self.copy_vocab_into(dir)?;
        if copied == 0 {
            tracing::warn!("No vocabulary files found in '{}'", self.vocab_dir.display());
        }

        let vocab_objects = self
            .store
            .upload(&self.vocab_dir, &self.remote)
            .with_context(|| format!("Failed to upload vocabulary to {}", self.remote))?;
        tracing::info!("Uploaded {} vocabulary files to {}", vocab_objects, self.remote);

        Ok(PublishOutcome::Uploaded { model_objects, vocab_objects })
    }

    fn copy_vocab_into(&self, dir: &Path) -> Result<usize> {
        let mut copied = 0;
        for name in VOCAB_ARTIFACTS {
            let src = self.vocab_dir.join(name);
            if !src.is_file() {
                continue;
            }
            fs::copy(&src, dir.join(name))
                .with_context(|| format!("Cannot copy '{}' into '{}'", src.display(), dir.display()))?;
            copied += 1;
        }
        Ok(copied)
    }
}
