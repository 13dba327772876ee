// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Linear warmup to the peak rate, then cosine decay to zero over
// the remaining optimizer steps:
//
//   step < warmup:  lr = peak * step / warmup
//   otherwise:      lr = peak * 0.5 * (1 + cos(pi * progress))
//                   progress = (step - warmup) / (total - warmup)

use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct WarmupCosine {
    peak_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
}

impl WarmupCosine {
    pub fn new(peak_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { peak_lr, warmup_steps, total_steps }
    }

    /// Learning rate for the optimizer step with zero-based index `step`.
    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.peak_lr * step as f64 / self.warmup_steps.max(1) as f64;
        }
        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = ((step - self.warmup_steps) as f64 / decay_steps as f64).min(1.0);
        (self.peak_lr * 0.5 * (1.0 + (PI * progress).cos())).max(0.0)
    }
}
