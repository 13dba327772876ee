// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// There is a single command: run one pretraining job. The platform
// may append flags this program doesn't define; those are dropped
// with a warning before clap sees the argument list.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::{collections::HashSet, path::PathBuf};

use crate::application::train_use_case::{PretrainConfig, PretrainUseCase};
use crate::infra::storage::LocalObjectStore;
use crate::ml::trainer::{default_device, DefaultBackend};
use commands::PretrainArgs;

#[derive(Parser, Debug)]
#[command(
    name = "clm-pretrain",
    version,
    about = "Domain-adaptive pretraining of a GPT-2 causal LM on a custom BPE vocabulary."
)]
pub struct Cli {
    /// Directory under which each bucket is mounted as <root>/<bucket>
    #[arg(long = "object_store_root", env = "OBJECT_STORE_ROOT", default_value = "/opt/ml/object-store")]
    pub object_store_root: PathBuf,

    #[command(flatten)]
    pub args: PretrainArgs,
}

impl Cli {
    /// Parse the process arguments, ignoring flags clap doesn't know.
    pub fn parse_known() -> Self {
        Self::parse_from(known_args(std::env::args()))
    }

    pub fn run(self) -> Result<()> {
        let config: PretrainConfig = self.args.into();
        let store = LocalObjectStore::new(&self.object_store_root);
        tracing::info!("Object store root: '{}'", store.root().display());

        let report = PretrainUseCase::new(config, store)
            .execute::<DefaultBackend>(&default_device())?;

        println!(
            "Training complete after {} steps. Perplexity {:.2} -> {:.2} ({:?})",
            report.global_step,
            report.perplexity_before,
            report.perplexity_after,
            report.published,
        );
        Ok(())
    }
}

/// Drop `--flag value` / `--flag=value` pairs whose long name isn't
/// defined on [`Cli`]. Every defined flag takes a value, so an unknown
/// flag swallows the next token unless that token is itself a flag.
pub fn known_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let cmd = Cli::command();
    let mut known: HashSet<String> = cmd
        .get_arguments()
        .filter_map(|a| a.get_long().map(str::to_string))
        .collect();
    known.insert("help".into());
    known.insert("version".into());

    let mut out  = Vec::new();
    let mut iter = args.into_iter().peekable();
    if let Some(bin) = iter.next() {
        out.push(bin);
    }

    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            out.push(arg);
            continue;
        };
        let (name, inline_value) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None            => (flag, false),
        };
        if known.contains(name) {
            out.push(arg);
            continue;
        }

        tracing::warn!("Ignoring unknown argument '--{}'", name);
        if !inline_value && iter.peek().is_some_and(|next| !next.starts_with("--")) {
            iter.next();
        }
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<String> {
        [
            "clm-pretrain",
            "--input_dir", "/opt/ml/input",
            "--model_dir", "/opt/ml/model",
            "--train", "/opt/ml/input/data/train",
            "--current_host", "algo-1",
            "--master_host", "algo-1",
            "--s3_bucket", "corpus",
            "--max_len", "512",
            "--num_train_epochs", "3",
            "--per_device_train_batch_size", "8",
            "--region", "us-east-1",
        ]
        .map(String::from)
        .to_vec()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_required_flags_with_defaults() {
        let cli = Cli::try_parse_from(required()).unwrap();
        let cfg: PretrainConfig = cli.args.into();

        assert_eq!(cfg.s3_bucket, "corpus");
        assert_eq!(cfg.max_len, 512);
        assert_eq!(cfg.train_dir, PathBuf::from("/opt/ml/input/data/train"));
        assert!(cfg.identity.is_leader());
        assert_eq!(cfg.learning_rate, 5e-4);
        assert_eq!(cfg.warmup_steps, 1_000);
        assert_eq!(cfg.save_steps, 10_000);
        assert_eq!(cfg.save_total_limit, 2);
        assert_eq!(cfg.checkpoint_dir, PathBuf::from("/tmp/checkpoints"));
        assert_eq!((cfg.n_embd, cfg.n_layer, cfg.n_head), (768, 12, 12));
    }

    #[test]
    fn test_missing_hyperparameter_is_rejected() {
        let args: Vec<String> = required()
            .into_iter()
            .filter(|a| a != "--s3_bucket" && a != "corpus")
            .collect();
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_unknown_flags_are_dropped() {
        let mut args = required();
        args.insert(1, "--sagemaker_program".into());
        args.insert(2, "train.py".into());
        args.push("--extra=1".into());
        args.push("--flag_without_value".into());

        let filtered = known_args(args);
        assert_eq!(filtered, required());

        let cli = Cli::try_parse_from(filtered).unwrap();
        assert_eq!(cli.args.region, "us-east-1");
    }
}
