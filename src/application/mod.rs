// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one run of domain-adaptive pretraining.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Storage only through the ObjectStore trait
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Fetch with the concurrent-worker tolerance policy
pub mod fetch;

// Leader-only save and upload
pub mod publish;

// The end-to-end pretraining workflow
pub mod train_use_case;
