// ============================================================
// Layer 2 — PretrainUseCase
// ============================================================
// Orchestrates the full pretraining pipeline in order:
//
//   Step 1: Fetch vocabulary           (Layer 2 - fetch)
//   Step 2: Fetch tokenized dataset    (Layer 2 - fetch)
//   Step 3: Rebuild tokenizer          (Layer 6 - infra)
//   Step 4: Build fresh GPT-2 model    (Layer 5 - ml)
//   Step 5: Load train / validation    (Layer 4 - data)
//   Step 6: Save run config            (Layer 6 - infra)
//   Step 7: Evaluate, train, evaluate  (Layer 5 - ml)
//   Step 8: Save + upload (leader)     (Layer 2 - publish)
//
// Every worker runs steps 1-7; step 8 only does work on the host
// whose name matches the master host.

use anyhow::{Context, Result};
use burn::{module::Module, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::{
    fetch::{fetch, FetchOutcome},
    publish::{ArtifactPublisher, PublishOutcome},
};
use crate::data::loader::TokenizedDatasetLoader;
use crate::domain::{identity::HostIdentity, location::RemoteLocation, traits::ObjectStore};
use crate::infra::{
    checkpoint::{save_pretrained, weights_file_name, CheckpointManager},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{model::Gpt2Config, trainer::{Trainer, TrainingArgs}};

// ─── Run Configuration ────────────────────────────────────────────────────────
// Everything the run needs, resolved once from flags and environment.
// Saved as run_config.json next to the checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainConfig {
    pub s3_bucket:                   String,
    pub max_len:                     usize,
    pub num_train_epochs:            usize,
    pub per_device_train_batch_size: usize,
    pub region:                      String,
    pub identity:                    HostIdentity,

    pub input_dir:                   PathBuf,
    pub model_dir:                   PathBuf,
    pub train_dir:                   PathBuf,

    pub data_cache_dir:              PathBuf,
    pub model_cache_dir:             PathBuf,
    pub checkpoint_dir:              PathBuf,

    pub learning_rate:               f64,
    pub weight_decay:                f32,
    pub warmup_steps:                usize,
    pub save_steps:                  usize,
    pub save_total_limit:            usize,
    pub seed:                        u64,

    pub n_embd:                      usize,
    pub n_layer:                     usize,
    pub n_head:                      usize,
    pub dropout:                     f64,
}

impl PretrainConfig {
    /// Local copy of the vocabulary: `<input_dir>/vocab`.
    pub fn vocab_dir(&self) -> PathBuf {
        self.input_dir.join("vocab")
    }

    /// Reject settings the model or trainer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.per_device_train_batch_size == 0 {
            anyhow::bail!("--per_device_train_batch_size must be at least 1");
        }
        if self.n_head == 0 || self.n_embd % self.n_head != 0 {
            anyhow::bail!(
                "--n_embd ({}) must be a positive multiple of --n_head ({})",
                self.n_embd,
                self.n_head
            );
        }
        if self.max_len < 2 {
            anyhow::bail!("--max_len must be at least 2, got {}", self.max_len);
        }
        Ok(())
    }

    pub fn training_args(&self) -> TrainingArgs {
        TrainingArgs {
            output_dir:                  self.checkpoint_dir.clone(),
            num_train_epochs:            self.num_train_epochs,
            per_device_train_batch_size: self.per_device_train_batch_size,
            per_device_eval_batch_size:  self.per_device_train_batch_size,
            learning_rate:               self.learning_rate,
            weight_decay:                self.weight_decay,
            warmup_steps:                self.warmup_steps,
            save_steps:                  self.save_steps,
            save_total_limit:            self.save_total_limit,
            seed:                        self.seed,
            ..TrainingArgs::default()
        }
    }

    fn model_config(&self, base: Gpt2Config) -> Gpt2Config {
        base.with_n_embd(self.n_embd)
            .with_n_layer(self.n_layer)
            .with_n_head(self.n_head)
            .with_dropout(self.dropout)
    }
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PretrainReport {
    pub perplexity_before: f64,
    pub perplexity_after:  f64,
    pub global_step:       usize,
    pub published:         PublishOutcome,
}

// ─── PretrainUseCase ──────────────────────────────────────────────────────────
pub struct PretrainUseCase<S: ObjectStore> {
    config: PretrainConfig,
    store:  S,
}

impl<S: ObjectStore> PretrainUseCase<S> {
    pub fn new(config: PretrainConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Execute the full pipeline end to end on backend `B`.
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<PretrainReport> {
        let cfg = &self.config;
        cfg.validate()?;
        tracing::info!("[Using clm-pretrain {}]", env!("CARGO_PKG_VERSION"));
        tracing::info!(
            "Host '{}' (master '{}'), bucket '{}', region '{}'",
            cfg.identity.current, cfg.identity.master, cfg.s3_bucket, cfg.region
        );
        tracing::debug!(
            "input_dir='{}' model_dir='{}' train='{}'",
            cfg.input_dir.display(),
            cfg.model_dir.display(),
            cfg.train_dir.display()
        );

        // ── Step 1 + 2: Pull vocabulary and dataset ──────────────────────────
        let vocab_dir = cfg.vocab_dir();
        self.fetch_logged(&RemoteLocation::vocab(&cfg.s3_bucket), &vocab_dir)?;
        self.fetch_logged(&RemoteLocation::dataset(&cfg.s3_bucket), &cfg.data_cache_dir)?;

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&vocab_dir)
            .load(cfg.max_len)
            .with_context(|| format!("Cannot load tokenizer from '{}'", vocab_dir.display()))?;
        tracing::info!("Tokenizer loaded: {:?}", tokenizer);

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let model_config = cfg.model_config(Gpt2Config::from_tokenizer(&tokenizer, cfg.max_len));
        B::seed(cfg.seed);
        let model = model_config.init::<B>(device);
        tracing::info!(
            "Initialised GPT-2: {:.1}M parameters ({} layers, {} heads, width {})",
            model.num_params() as f64 / 1e6,
            model_config.n_layer,
            model_config.n_head,
            model_config.n_embd
        );

        // ── Step 5: Datasets ──────────────────────────────────────────────────
        let datasets =
            TokenizedDatasetLoader::new(&cfg.data_cache_dir, cfg.max_len, tokenizer.vocab_size).load()?;

        // ── Step 6: Run config ────────────────────────────────────────────────
        CheckpointManager::new(&cfg.checkpoint_dir, cfg.save_total_limit).save_config(cfg)?;

        // ── Step 7: Evaluate → train → evaluate ──────────────────────────────
        let mut trainer = Trainer::new(
            model,
            cfg.training_args(),
            datasets,
            tokenizer.pad_token_id,
            device,
        )?;

        let before = trainer.evaluate("before_training")?;
        tracing::info!("Perplexity before training: {:.2}", before.perplexity);

        let trained = trainer.train()?;
        tracing::info!(
            "Finished {} steps, last epoch train loss {:.4}",
            trained.global_step, trained.train_loss
        );

        let after = trainer.evaluate("after_training")?;
        tracing::info!("Perplexity after training: {:.2}", after.perplexity);

        // ── Step 8: Publish ───────────────────────────────────────────────────
        let publisher = ArtifactPublisher::new(
            &self.store,
            cfg.identity.clone(),
            &cfg.s3_bucket,
            &cfg.model_cache_dir,
            &vocab_dir,
            weights_file_name::<B>(),
        );
        let published = publisher.publish(|dir| {
            save_pretrained(trainer.model(), &model_config, dir)?;
            tokenizer.save(dir)?;
            Ok(())
        })?;

        Ok(PretrainReport {
            perplexity_before: before.perplexity,
            perplexity_after:  after.perplexity,
            global_step:       trained.global_step,
            published,
        })
    }

    fn fetch_logged(&self, remote: &RemoteLocation, local: &std::path::Path) -> Result<()> {
        tracing::info!("Downloading {} to '{}'", remote, local.display());
        let outcome = fetch(&self.store, remote, local)
            .with_context(|| format!("Failed to fetch {remote}"))?;
        if outcome == FetchOutcome::SourceMissing {
            tracing::warn!("'{}' was left empty", local.display());
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{tests::write_split, TRAIN_SPLIT, VALIDATION_SPLIT};
    use crate::infra::{
        checkpoint::{CONFIG_FILE, RUN_CONFIG_FILE},
        storage::LocalObjectStore,
        tokenizer_store::{tests::write_tiny_vocab, TOKENIZER_FILE, VOCAB_FILE},
    };
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;
    use tempfile::tempdir;

    type TestBackend = Autodiff<NdArray>;

    /// Seed the bucket with a tiny vocabulary and dataset, and point
    /// every local directory inside `root`.
    fn tiny_run(root: &Path, current: &str) -> PretrainConfig {
        let bucket = root.join("store/corpus");
        write_tiny_vocab(&bucket.join("data/vocab"));
        let data = bucket.join("data/processed");
        write_split(
            &data,
            TRAIN_SPLIT,
            &[
                vec![1, 2, 3, 4, 5, 1],
                vec![2, 3, 4, 5, 1, 2],
                vec![3, 4, 5, 1, 2, 3],
                vec![4, 5, 1, 2],
            ],
        );
        write_split(&data, VALIDATION_SPLIT, &[vec![1, 2, 3, 4], vec![5, 1, 2, 3]]);

        PretrainConfig {
            s3_bucket:                   "corpus".into(),
            max_len:                     8,
            num_train_epochs:            1,
            per_device_train_batch_size: 2,
            region:                      "local".into(),
            identity:                    HostIdentity::new(current, "algo-1"),
            input_dir:                   root.join("input"),
            model_dir:                   root.join("model"),
            train_dir:                   root.join("train"),
            data_cache_dir:              root.join("cache/data"),
            model_cache_dir:             root.join("cache/model"),
            checkpoint_dir:              root.join("checkpoints"),
            learning_rate:               1e-3,
            weight_decay:                0.1,
            warmup_steps:                0,
            save_steps:                  1,
            save_total_limit:            1,
            seed:                        7,
            n_embd:                      16,
            n_layer:                     2,
            n_head:                      2,
            dropout:                     0.0,
        }
    }

    #[test]
    fn test_training_args_follow_config() {
        let tmp  = tempdir().unwrap();
        let cfg  = tiny_run(tmp.path(), "algo-1");
        let args = cfg.training_args();
        assert_eq!(args.output_dir, cfg.checkpoint_dir);
        assert_eq!(args.per_device_eval_batch_size, 2);
        assert_eq!(args.save_total_limit, 1);
        assert_eq!(args.max_grad_norm, 1.0);
        assert_eq!(cfg.vocab_dir(), tmp.path().join("input/vocab"));
    }

    #[test]
    fn test_validate_rejects_unrunnable_settings() {
        let tmp = tempdir().unwrap();
        let ok  = tiny_run(tmp.path(), "algo-1");
        assert!(ok.validate().is_ok());

        let heads = PretrainConfig { n_embd: 16, n_head: 3, ..ok.clone() };
        assert!(heads.validate().unwrap_err().to_string().contains("--n_head"));

        let no_heads = PretrainConfig { n_head: 0, ..ok.clone() };
        assert!(no_heads.validate().is_err());

        let batch = PretrainConfig { per_device_train_batch_size: 0, ..ok.clone() };
        assert!(batch.validate().unwrap_err().to_string().contains("batch_size"));

        let short = PretrainConfig { max_len: 1, ..ok };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_invalid_config_fails_before_any_fetch() {
        let tmp = tempdir().unwrap();
        let cfg = PretrainConfig { n_head: 3, ..tiny_run(tmp.path(), "algo-1") };
        let vocab_dir = cfg.vocab_dir();
        let store = LocalObjectStore::new(tmp.path().join("store"));

        assert!(PretrainUseCase::new(cfg, &store)
            .execute::<TestBackend>(&Default::default())
            .is_err());
        assert!(!vocab_dir.exists());
    }

    #[test]
    fn test_end_to_end_leader_publishes() {
        let tmp   = tempdir().unwrap();
        let cfg   = tiny_run(tmp.path(), "algo-1");
        let store = LocalObjectStore::new(tmp.path().join("store"));
        let model_dir = cfg.model_cache_dir.clone();
        let ckpt_dir  = cfg.checkpoint_dir.clone();

        let report = PretrainUseCase::new(cfg, &store)
            .execute::<TestBackend>(&Default::default())
            .unwrap();

        assert!(report.perplexity_before.is_finite() && report.perplexity_before > 0.0);
        assert!(report.perplexity_after.is_finite() && report.perplexity_after > 0.0);
        assert_eq!(report.global_step, 2);
        assert!(matches!(report.published, PublishOutcome::Uploaded { .. }));

        let weights = weights_file_name::<TestBackend>();
        assert!(model_dir.join(&weights).is_file());
        assert!(model_dir.join(CONFIG_FILE).is_file());
        assert!(model_dir.join(TOKENIZER_FILE).is_file());
        assert!(model_dir.join(VOCAB_FILE).is_file());

        let remote = store.resolve(&RemoteLocation::model("corpus"));
        assert!(remote.join(&weights).is_file());
        assert!(remote.join(CONFIG_FILE).is_file());
        assert!(remote.join(VOCAB_FILE).is_file());

        // save_steps=1, limit=1: only the last checkpoint survives.
        assert!(ckpt_dir.join("checkpoint-2").is_dir());
        assert!(!ckpt_dir.join("checkpoint-1").exists());
        assert!(ckpt_dir.join("metrics.csv").is_file());

        let run_config = std::fs::read_to_string(ckpt_dir.join(RUN_CONFIG_FILE)).unwrap();
        assert!(run_config.contains("\"region\": \"local\""), "{run_config}");
    }

    #[test]
    fn test_end_to_end_follower_trains_but_does_not_publish() {
        let tmp   = tempdir().unwrap();
        let cfg   = tiny_run(tmp.path(), "algo-2");
        let store = LocalObjectStore::new(tmp.path().join("store"));
        let model_dir = cfg.model_cache_dir.clone();

        let report = PretrainUseCase::new(cfg, &store)
            .execute::<TestBackend>(&Default::default())
            .unwrap();

        assert_eq!(report.published, PublishOutcome::NotLeader);
        assert!(report.perplexity_after.is_finite());
        assert!(!model_dir.exists());
        assert!(!store.resolve(&RemoteLocation::model("corpus")).exists());
    }

    #[test]
    fn test_missing_vocabulary_fails_at_tokenizer() {
        let tmp = tempdir().unwrap();
        let mut cfg = tiny_run(tmp.path(), "algo-1");
        cfg.s3_bucket = "empty".into();
        let store = LocalObjectStore::new(tmp.path().join("store"));

        // The fetch itself only warns; the tokenizer is what fails.
        let err = PretrainUseCase::new(cfg, &store)
            .execute::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("Cannot load tokenizer"));
    }
}
