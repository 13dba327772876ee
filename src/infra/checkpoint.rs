// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves model weights using Burn's CompactRecorder.
//
// Two kinds of output live here:
//
//   1. Rolling training checkpoints, one directory per save:
//        /tmp/checkpoints/
//          checkpoint-10000/
//            model.mpk            ← weights at that optimizer step
//            trainer_state.json   ← step, epoch, lr, loss
//          checkpoint-20000/
//          run_config.json        ← the resolved run configuration
//          metrics.csv            ← evaluation history (metrics.rs)
//      After each save only the `save_total_limit` most recent
//      checkpoint directories are kept; older ones are deleted.
//
//   2. The final model directory that gets published:
//        /tmp/cache/model/custom/
//          model.mpk              ← weights
//          config.json            ← Gpt2Config, needed to rebuild the model
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{Gpt2Config, Gpt2Model};

pub const WEIGHTS_STEM: &str       = "model";
pub const CONFIG_FILE: &str        = "config.json";
pub const RUN_CONFIG_FILE: &str    = "run_config.json";
pub const TRAINER_STATE_FILE: &str = "trainer_state.json";
const CHECKPOINT_PREFIX: &str      = "checkpoint-";

/// File name the recorder gives the weights, e.g. `model.mpk`.
pub fn weights_file_name<B: Backend>() -> String {
    format!(
        "{WEIGHTS_STEM}.{}",
        <CompactRecorder as FileRecorder<B>>::file_extension()
    )
}

/// Progress written next to every rolling checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub global_step:   usize,
    pub epoch:         usize,
    pub learning_rate: f64,
    pub loss:          f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
    /// 0 keeps every checkpoint.
    save_total_limit: usize,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, save_total_limit: usize) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir, save_total_limit }
    }

    /// Write weights and trainer state to `checkpoint-<step>/`, then rotate.
    pub fn save_checkpoint<B: Backend>(
        &self,
        model: &Gpt2Model<B>,
        state: &TrainerState,
    ) -> Result<PathBuf> {
        let ckpt_dir = self.dir.join(format!("{CHECKPOINT_PREFIX}{}", state.global_step));
        fs::create_dir_all(&ckpt_dir)
            .with_context(|| format!("Cannot create '{}'", ckpt_dir.display()))?;

        save_weights(model, &ckpt_dir)?;

        let state_path = ckpt_dir.join(TRAINER_STATE_FILE);
        fs::write(&state_path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Cannot write '{}'", state_path.display()))?;

        tracing::info!("Saved checkpoint at step {} to '{}'", state.global_step, ckpt_dir.display());
        self.rotate()?;
        Ok(ckpt_dir)
    }

    /// Checkpoint directories on disk, oldest step first.
    pub fn list_checkpoints(&self) -> Result<Vec<(usize, PathBuf)>> {
        let mut found = Vec::new();
        if !self.dir.exists() {
            return Ok(found);
        }
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read '{}'", self.dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let step = name
                .to_str()
                .and_then(|n| n.strip_prefix(CHECKPOINT_PREFIX))
                .and_then(|s| s.parse::<usize>().ok());
            if let Some(step) = step {
                found.push((step, entry.path()));
            }
        }
        found.sort_by_key(|(step, _)| *step);
        Ok(found)
    }

    /// Delete the oldest checkpoints beyond `save_total_limit`.
    /// Returns the directories that were removed.
    pub fn rotate(&self) -> Result<Vec<PathBuf>> {
        if self.save_total_limit == 0 {
            return Ok(Vec::new());
        }
        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.save_total_limit);

        let mut removed = Vec::with_capacity(excess);
        for (step, path) in checkpoints.into_iter().take(excess) {
            fs::remove_dir_all(&path)
                .with_context(|| format!("Cannot delete checkpoint '{}'", path.display()))?;
            tracing::debug!("Deleted checkpoint at step {}", step);
            removed.push(path);
        }
        Ok(removed)
    }

    /// Persist the run configuration next to the checkpoints.
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(RUN_CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}

// ─── Final model directory ────────────────────────────────────────────────────

/// Write weights and `config.json` into `dir`.
pub fn save_pretrained<B: Backend>(
    model:  &Gpt2Model<B>,
    config: &Gpt2Config,
    dir:    &Path,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;
    save_weights(model, dir)?;

    let config_path = dir.join(CONFIG_FILE);
    config
        .save(&config_path)
        .with_context(|| format!("Cannot write '{}'", config_path.display()))?;
    Ok(())
}

fn save_weights<B: Backend>(model: &Gpt2Model<B>, dir: &Path) -> Result<()> {
    // The recorder appends its own extension.
    let path = dir.join(WEIGHTS_STEM);
    CompactRecorder::new()
        .record(model.clone().into_record(), path.clone())
        .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;
    Ok(())
}
