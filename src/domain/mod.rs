// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain structs, enums and traits that describe a pretraining run:
// where artifacts live remotely, which worker is the leader, and
// the storage seam the application layer programs against.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO direct file or network access
//   - Only plain Rust types and traits

// Parsed s3:// locations and the fixed bucket layout
pub mod location;

// Current/master host identity and the leader rule
pub mod identity;

// The ObjectStore abstraction and its error kinds
pub mod traits;
