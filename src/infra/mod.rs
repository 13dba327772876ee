// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Concerns used by several layers that don't belong to any one:
//
//   storage.rs         — LocalObjectStore, the ObjectStore used in
//                        production: buckets reachable as a
//                        directory tree under a root path.
//
//   tokenizer_store.rs — Rebuilds the byte-level BPE tokenizer
//                        from the fetched vocabulary directory.
//
//   checkpoint.rs      — Rolling training checkpoints with a
//                        retention cap, plus the final model
//                        directory (weights + config.json).
//
//   metrics.rs         — Evaluation loss / perplexity history
//                        written to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Filesystem-backed object storage
pub mod storage;

/// Tokenizer loading from vocab files
pub mod tokenizer_store;

/// Model checkpoint saving, rotation and loading
pub mod checkpoint;

/// Evaluation metrics CSV logger
pub mod metrics;
