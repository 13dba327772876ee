// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From pre-tokenized files on local disk to tensor batches:
//
//   train.jsonl / validation.jsonl
//       │
//       ▼
//   TokenizedDatasetLoader  → reads, truncates, filters sequences
//       │
//       ▼
//   LmDataset               → implements Burn's Dataset trait
//       │
//       ▼
//   LmBatcher               → pads and shifts into (inputs, targets)
//       │
//       ▼
//   DataLoader              → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the pre-tokenized train/validation partitions
pub mod loader;

/// Implements Burn's Dataset trait for token sequences
pub mod dataset;

/// Implements Burn's Batcher trait for causal language modelling
pub mod batcher;
