// ============================================================
// Layer 5 — Machine Learning
// ============================================================
//   model.rs     — GPT-2 decoder (Burn modules) and its config
//   scheduler.rs — linear warmup + cosine decay learning rate
//   trainer.rs   — train / evaluate loops, rolling checkpoints

pub mod model;

pub mod scheduler;

pub mod trainer;
