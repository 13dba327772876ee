// ============================================================
// Layer 4 — Tokenized Dataset Loader
// ============================================================
// Reads the pre-tokenized dataset that an earlier pipeline stage
// wrote to object storage and the fetcher copied to local disk.
//
// Directory layout:
//   <dir>/
//     dataset_dict.json     (optional) {"splits": ["train", "validation"]}
//     train.jsonl           one {"input_ids": [..]} object per line
//     validation.jsonl      same format
//
// Both partitions are required. Sequences are truncated to the
// model context and anything shorter than two tokens is dropped:
// a causal LM needs at least one (input, next token) pair.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::data::dataset::{LmDataset, LmSample};

pub const TRAIN_SPLIT: &str      = "train";
pub const VALIDATION_SPLIT: &str = "validation";
const DATASET_DICT_FILE: &str    = "dataset_dict.json";

#[derive(Debug, Deserialize)]
struct DatasetDict {
    splits: Vec<String>,
}

/// The two partitions the trainer consumes.
#[derive(Debug)]
pub struct TokenizedDatasets {
    pub train:      LmDataset,
    pub validation: LmDataset,
}

pub struct TokenizedDatasetLoader {
    dir:        PathBuf,
    max_len:    usize,
    vocab_size: usize,
}

impl TokenizedDatasetLoader {
    /// Every token id must be below `vocab_size`.
    pub fn new(dir: impl Into<PathBuf>, max_len: usize, vocab_size: usize) -> Self {
        Self { dir: dir.into(), max_len, vocab_size }
    }

    pub fn load(&self) -> Result<TokenizedDatasets> {
        let dict_path = self.dir.join(DATASET_DICT_FILE);
        if dict_path.is_file() {
            let text = std::fs::read_to_string(&dict_path)
                .with_context(|| format!("Cannot read '{}'", dict_path.display()))?;
            let dict: DatasetDict = serde_json::from_str(&text)
                .with_context(|| format!("Malformed '{}'", dict_path.display()))?;
            tracing::info!("Dataset splits on disk: {:?}", dict.splits);
        }

        let train      = self.load_split(TRAIN_SPLIT)?;
        let validation = self.load_split(VALIDATION_SPLIT)?;

        tracing::info!(
            "Tokenized datasets: train={} sequences ({} tokens), validation={} sequences ({} tokens)",
            train.sample_count(),
            train.token_count(),
            validation.sample_count(),
            validation.token_count(),
        );
        Ok(TokenizedDatasets { train, validation })
    }

    fn load_split(&self, split: &str) -> Result<LmDataset> {
        let path = self.dir.join(format!("{split}.jsonl"));
        let samples = read_jsonl(&path, self.max_len, self.vocab_size)
            .with_context(|| format!("Cannot load '{split}' partition from '{}'", path.display()))?;
        Ok(LmDataset::new(samples))
    }
}

fn read_jsonl(path: &Path, max_len: usize, vocab_size: usize) -> Result<Vec<LmSample>> {
    let file = File::open(path)?;
    let mut samples = Vec::new();
    let mut dropped = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut sample: LmSample = serde_json::from_str(&line)
            .with_context(|| format!("line {}", line_no + 1))?;
        if let Some(&bad) = sample.input_ids.iter().find(|&&id| id as usize >= vocab_size) {
            anyhow::bail!(
                "line {}: token id {} is outside the vocabulary (size {})",
                line_no + 1,
                bad,
                vocab_size
            );
        }
        sample.input_ids.truncate(max_len);
        if sample.input_ids.len() < 2 {
            dropped += 1;
            continue;
        }
        samples.push(sample);
    }

    if dropped > 0 {
        tracing::debug!("Dropped {} sequences shorter than 2 tokens from '{}'", dropped, path.display());
    }
    Ok(samples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::data::dataset::Dataset;
    use tempfile::tempdir;

    const VOCAB: usize = 16;

    pub(crate) fn write_split(dir: &Path, split: &str, rows: &[Vec<u32>]) {
        std::fs::create_dir_all(dir).unwrap();
        let body: String = rows
            .iter()
            .map(|ids| format!("{}\n", serde_json::json!({ "input_ids": ids })))
            .collect();
        std::fs::write(dir.join(format!("{split}.jsonl")), body).unwrap();
    }

    #[test]
    fn test_loads_both_partitions() {
        let dir = tempdir().unwrap();
        write_split(dir.path(), TRAIN_SPLIT, &[vec![1, 2, 3], vec![4, 5]]);
        write_split(dir.path(), VALIDATION_SPLIT, &[vec![1, 2]]);

        let ds = TokenizedDatasetLoader::new(dir.path(), 8, VOCAB).load().unwrap();
        assert_eq!(ds.train.len(), 2);
        assert_eq!(ds.validation.len(), 1);
        assert_eq!(ds.train.get(0).unwrap().input_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_truncates_and_drops_short_sequences() {
        let dir = tempdir().unwrap();
        write_split(dir.path(), TRAIN_SPLIT, &[vec![1, 2, 3, 4, 5], vec![7], vec![]]);
        write_split(dir.path(), VALIDATION_SPLIT, &[vec![1, 2]]);

        let ds = TokenizedDatasetLoader::new(dir.path(), 3, VOCAB).load().unwrap();
        assert_eq!(ds.train.len(), 1);
        assert_eq!(ds.train.get(0).unwrap().input_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_validation_is_error() {
        let dir = tempdir().unwrap();
        write_split(dir.path(), TRAIN_SPLIT, &[vec![1, 2]]);

        let err = TokenizedDatasetLoader::new(dir.path(), 8, VOCAB).load().unwrap_err();
        assert!(format!("{err:#}").contains("validation"));
    }

    #[test]
    fn test_blank_lines_and_dataset_dict_are_accepted() {
        let dir = tempdir().unwrap();
        write_split(dir.path(), TRAIN_SPLIT, &[vec![1, 2]]);
        write_split(dir.path(), VALIDATION_SPLIT, &[vec![3, 4]]);
        std::fs::write(
            dir.path().join("dataset_dict.json"),
            r#"{"splits": ["train", "validation"]}"#,
        )
        .unwrap();
        let mut train = std::fs::read_to_string(dir.path().join("train.jsonl")).unwrap();
        train.push_str("\n\n");
        std::fs::write(dir.path().join("train.jsonl"), train).unwrap();

        let ds = TokenizedDatasetLoader::new(dir.path(), 8, VOCAB).load().unwrap();
        assert_eq!(ds.train.len(), 1);
    }

    #[test]
    fn test_out_of_vocabulary_id_names_the_line() {
        let dir = tempdir().unwrap();
        write_split(dir.path(), TRAIN_SPLIT, &[vec![1, 2], vec![3, VOCAB as u32]]);
        write_split(dir.path(), VALIDATION_SPLIT, &[vec![1, 2]]);

        let err = TokenizedDatasetLoader::new(dir.path(), 8, VOCAB).load().err().unwrap();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("outside the vocabulary"), "{msg}");
    }
}
