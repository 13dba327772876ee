// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every flag the training platform passes, with the environment
// variable it falls back to when the flag is absent.
//
// Flag names keep their underscores (`--max_len`, not `--max-len`)
// because that is how the platform spells hyperparameters.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)

use clap::Args;
use std::path::PathBuf;

use crate::application::train_use_case::PretrainConfig;
use crate::domain::identity::HostIdentity;

#[derive(Args, Debug, Clone)]
pub struct PretrainArgs {
    // ── Platform directories and hosts ───────────────────────────────────────
    /// Input data root; the vocabulary is fetched into <input_dir>/vocab
    #[arg(long = "input_dir", env = "SM_INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Platform model directory
    #[arg(long = "model_dir", env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Training channel directory
    #[arg(long = "train", env = "SM_CHANNEL_TRAIN")]
    pub train_dir: PathBuf,

    /// Name of this worker
    #[arg(long = "current_host", env = "SM_CURRENT_HOST")]
    pub current_host: String,

    /// Name of the worker that saves and uploads the result
    #[arg(long = "master_host", env = "SMDATAPARALLEL_SERVER_ADDR")]
    pub master_host: String,

    // ── Hyperparameters (always supplied by the launcher) ────────────────────
    /// Bucket holding data/vocab/, data/processed/ and model/custom/
    #[arg(long = "s3_bucket")]
    pub s3_bucket: String,

    /// Context window and truncation length
    #[arg(long = "max_len")]
    pub max_len: usize,

    #[arg(long = "num_train_epochs")]
    pub num_train_epochs: usize,

    #[arg(long = "per_device_train_batch_size")]
    pub per_device_train_batch_size: usize,

    /// Object-store region. Recorded in the run config only: buckets
    /// are read through the mounted root, which has no region.
    #[arg(long = "region")]
    pub region: String,

    // ── Local layout ──────────────────────────────────────────────────────────
    #[arg(long = "data_cache_dir", default_value = "/tmp/cache/data/processed")]
    pub data_cache_dir: PathBuf,

    /// Where the leader writes the final model before uploading it
    #[arg(long = "model_cache_dir", default_value = "/tmp/cache/model/custom")]
    pub model_cache_dir: PathBuf,

    #[arg(long = "checkpoint_dir", default_value = "/tmp/checkpoints")]
    pub checkpoint_dir: PathBuf,

    // ── Optimisation ──────────────────────────────────────────────────────────
    /// Peak learning rate reached at the end of warmup
    #[arg(long = "learning_rate", default_value_t = 5e-4)]
    pub learning_rate: f64,

    #[arg(long = "weight_decay", default_value_t = 0.1)]
    pub weight_decay: f32,

    #[arg(long = "warmup_steps", default_value_t = 1_000)]
    pub warmup_steps: usize,

    /// Write a rolling checkpoint every N optimizer steps
    #[arg(long = "save_steps", default_value_t = 10_000)]
    pub save_steps: usize,

    /// How many rolling checkpoints to keep (0 keeps all)
    #[arg(long = "save_total_limit", default_value_t = 2)]
    pub save_total_limit: usize,

    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    // ── Model shape (GPT-2 small by default) ─────────────────────────────────
    #[arg(long = "n_embd", default_value_t = 768)]
    pub n_embd: usize,

    #[arg(long = "n_layer", default_value_t = 12)]
    pub n_layer: usize,

    /// n_embd must be divisible by n_head
    #[arg(long = "n_head", default_value_t = 12)]
    pub n_head: usize,

    #[arg(long = "dropout", default_value_t = 0.1)]
    pub dropout: f64,
}

/// The application layer never sees clap types.
impl From<PretrainArgs> for PretrainConfig {
    fn from(a: PretrainArgs) -> Self {
        PretrainConfig {
            s3_bucket:                   a.s3_bucket,
            max_len:                     a.max_len,
            num_train_epochs:            a.num_train_epochs,
            per_device_train_batch_size: a.per_device_train_batch_size,
            region:                      a.region,
            identity:                    HostIdentity::new(a.current_host, a.master_host),
            input_dir:                   a.input_dir,
            model_dir:                   a.model_dir,
            train_dir:                   a.train_dir,
            data_cache_dir:              a.data_cache_dir,
            model_cache_dir:             a.model_cache_dir,
            checkpoint_dir:              a.checkpoint_dir,
            learning_rate:               a.learning_rate,
            weight_decay:                a.weight_decay,
            warmup_steps:                a.warmup_steps,
            save_steps:                  a.save_steps,
            save_total_limit:            a.save_total_limit,
            seed:                        a.seed,
            n_embd:                      a.n_embd,
            n_layer:                     a.n_layer,
            n_head:                      a.n_head,
            dropout:                     a.dropout,
        }
    }
}
