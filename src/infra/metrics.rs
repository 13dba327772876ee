// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records every evaluation pass to a CSV file:
//
//   phase,global_step,eval_loss,perplexity
//   before_training,0,9.214500,10041.22
//   epoch_1,1250,5.871200,354.97
//   after_training,1250,5.871200,354.97
//
// Perplexity is exp(mean per-token loss). It is derived for the
// log only; nothing downstream consumes it.
//
// Output file: <checkpoint_dir>/metrics.csv

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

/// exp(loss). A loss of 2.0 gives ≈ 7.39.
pub fn perplexity(loss: f64) -> f64 {
    loss.exp()
}

/// One evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Where in the run this evaluation happened, e.g. "before_training"
    pub phase: String,

    /// Optimizer steps completed when the evaluation ran
    pub global_step: usize,

    /// Mean next-token cross-entropy on the validation partition
    pub eval_loss: f64,

    pub perplexity: f64,
}

impl EvalMetrics {
    pub fn new(phase: impl Into<String>, global_step: usize, eval_loss: f64) -> Self {
        Self {
            phase: phase.into(),
            global_step,
            eval_loss,
            perplexity: perplexity(eval_loss),
        }
    }
}

/// Appends evaluation rows to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "phase,global_step,eval_loss,perplexity")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvalMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{:.6},{:.2}",
            m.phase,
            m.global_step,
            m.eval_loss,
            m.perplexity,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
