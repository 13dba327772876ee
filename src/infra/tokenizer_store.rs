// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Rebuilds the GPT-2 byte-level BPE tokenizer from a vocabulary
// directory fetched out of object storage.
//
// Accepted layouts (first match wins):
//   1. tokenizer.json             — a full serialised tokenizer
//   2. vocab.json + merges.txt    — raw BPE files
//
// Whatever the source, the tokenizer is then aligned with the run:
//   - pad token := eos token := <|endoftext|>
//   - truncation and model_max_length := --max_len
//
// Reference: Sennrich et al. (2016) BPE paper
//            Radford et al. (2019) GPT-2 byte-level BPE

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::{
    decoders::byte_level::ByteLevel as ByteLevelDecoder,
    models::bpe::BPE,
    pre_tokenizers::byte_level::ByteLevel,
    PaddingParams, Tokenizer, TruncationParams,
};

/// GPT-2's single special token: start, end and padding all share it.
pub const END_OF_TEXT: &str = "<|endoftext|>";

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str     = "vocab.json";
pub const MERGES_FILE: &str    = "merges.txt";

/// Vocabulary files that travel with a trained model.
pub const VOCAB_ARTIFACTS: [&str; 4] = [VOCAB_FILE, MERGES_FILE, TOKENIZER_FILE, "vocab.txt"];

// ─── GptTokenizer ─────────────────────────────────────────────────────────────
/// A loaded tokenizer plus the ids the model configuration needs.
pub struct GptTokenizer {
    inner:                Tokenizer,
    pub model_max_length: usize,
    pub vocab_size:       usize,
    pub bos_token_id:     u32,
    pub eos_token_id:     u32,
    pub pad_token_id:     u32,
}

impl GptTokenizer {
    /// Write tokenizer.json into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(TOKENIZER_FILE);
        self.inner
            .save(&path, true)
            .map_err(|e| anyhow::anyhow!("Cannot save tokenizer to '{}': {e}", path.display()))?;
        Ok(path)
    }
}

impl std::fmt::Debug for GptTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GptTokenizer")
            .field("vocab_size", &self.vocab_size)
            .field("model_max_length", &self.model_max_length)
            .field("bos_token_id", &self.bos_token_id)
            .field("eos_token_id", &self.eos_token_id)
            .field("pad_token_id", &self.pad_token_id)
            .finish()
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the tokenizer and align it with `max_len`.
    pub fn load(&self, max_len: usize) -> Result<GptTokenizer> {
        let mut tokenizer = self.load_raw()?;

        let eos = tokenizer.token_to_id(END_OF_TEXT).with_context(|| {
            format!("Vocabulary in '{}' has no {END_OF_TEXT} token", self.dir.display())
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Invalid truncation for max_len={max_len}: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            pad_id:    eos,
            pad_token: END_OF_TEXT.to_string(),
            ..Default::default()
        }));

        let vocab_size = tokenizer.get_vocab_size(true);
        Ok(GptTokenizer {
            inner:            tokenizer,
            model_max_length: max_len,
            vocab_size,
            bos_token_id:     eos,
            eos_token_id:     eos,
            pad_token_id:     eos,
        })
    }

    fn load_raw(&self) -> Result<Tokenizer> {
        let json = self.dir.join(TOKENIZER_FILE);
        if json.is_file() {
            tracing::debug!("Loading tokenizer from '{}'", json.display());
            return Tokenizer::from_file(&json).map_err(|e| {
                anyhow::anyhow!("Cannot load tokenizer from '{}': {}", json.display(), e)
            });
        }

        let vocab  = self.dir.join(VOCAB_FILE);
        let merges = self.dir.join(MERGES_FILE);
        if !vocab.is_file() || !merges.is_file() {
            anyhow::bail!(
                "No {TOKENIZER_FILE} or {VOCAB_FILE} + {MERGES_FILE} in '{}'",
                self.dir.display()
            );
        }

        tracing::debug!("Building byte-level BPE from '{}'", self.dir.display());
        let bpe = BPE::from_file(&path_str(&vocab)?, &path_str(&merges)?)
            .build()
            .map_err(|e| anyhow::anyhow!("Cannot build BPE from '{}': {e}", self.dir.display()))?;

        let mut tokenizer = Tokenizer::new(bpe);
        tokenizer.with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)));
        tokenizer.with_decoder(Some(ByteLevelDecoder::default()));
        Ok(tokenizer)
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path '{}' is not valid UTF-8", path.display()))
}
