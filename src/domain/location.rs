// ============================================================
// Layer 3 — Remote Locations
// ============================================================
// An object-storage location: `s3://<bucket>/<key prefix>`.
//
// The pipeline only ever talks about three prefixes inside one
// bucket, so the well-known ones are built here instead of being
// formatted ad hoc at every call site:
//
//   data/vocab/       → tokenizer vocabulary (read)
//   data/processed/   → pre-tokenized dataset (read)
//   model/custom/     → trained model + vocabulary (write, leader only)

use std::fmt;

pub const SCHEME: &str = "s3://";

pub const VOCAB_PREFIX: &str = "data/vocab/";
pub const DATASET_PREFIX: &str = "data/processed/";
pub const MODEL_PREFIX: &str = "model/custom/";

/// A bucket plus a key prefix inside it.
/// The key never starts with `/`; an empty key means the bucket root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    pub key:    String,
}

impl RemoteLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key: String = key.into();
        Self {
            bucket: bucket.into(),
            key:    key.trim_start_matches('/').to_string(),
        }
    }

    pub fn vocab(bucket: &str) -> Self {
        Self::new(bucket, VOCAB_PREFIX)
    }

    pub fn dataset(bucket: &str) -> Self {
        Self::new(bucket, DATASET_PREFIX)
    }

    pub fn model(bucket: &str) -> Self {
        Self::new(bucket, MODEL_PREFIX)
    }

    /// Key segments with empty components removed ("a//b/" → ["a", "b"]).
    pub fn key_segments(&self) -> impl Iterator<Item = &str> {
        self.key.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}
