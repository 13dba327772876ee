// ============================================================
// Layer 4 — Causal LM Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec<LmSample> of uneven
// lengths becomes two [batch, seq_len - 1] tensors.
//
//   ids     = [t0, t1, t2, t3, PAD]
//   inputs  = [t0, t1, t2, t3]
//   targets = [t1, t2, t3, PAD]
//
// Every row is right-padded with the pad id up to the longest
// sample in the batch. The loss ignores targets equal to the pad
// id, so padding never contributes to training. GPT-2 pads with
// <|endoftext|>, which means real end-of-text targets are ignored
// as well; this matches the usual causal-LM collator.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::LmSample;

// ─── LmBatch ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Token ids fed to the model — shape: [batch_size, seq_len]
    pub inputs: Tensor<B, 2, Int>,

    /// Next-token ids — shape: [batch_size, seq_len]
    pub targets: Tensor<B, 2, Int>,
}

// ─── LmBatcher ────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: u32,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }
}

impl<B: Backend> Batcher<LmSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmSample>) -> LmBatch<B> {
        let batch_size = items.len();
        // Loader guarantees every sample has at least 2 tokens.
        let longest = items.iter().map(|s| s.input_ids.len()).max().unwrap_or(2).max(2);
        let seq_len = longest - 1;
        let pad     = i64::from(self.pad_id);

        let mut input_flat:  Vec<i64> = Vec::with_capacity(batch_size * seq_len);
        let mut target_flat: Vec<i64> = Vec::with_capacity(batch_size * seq_len);

        for sample in &items {
            let mut ids: Vec<i64> = sample.input_ids.iter().map(|&x| i64::from(x)).collect();
            ids.resize(longest, pad);
            input_flat.extend_from_slice(&ids[..seq_len]);
            target_flat.extend_from_slice(&ids[1..]);
        }

        let inputs = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let targets = Tensor::<B, 1, Int>::from_ints(
            target_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        LmBatch { inputs, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn to_vec(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_shifts_inputs_and_targets() {
        let batcher = LmBatcher::<TestBackend>::new(Default::default(), 0);
        let batch = batcher.batch(vec![LmSample::new(vec![5, 6, 7, 8])]);

        assert_eq!(batch.inputs.dims(), [1, 3]);
        assert_eq!(to_vec(batch.inputs), vec![5, 6, 7]);
        assert_eq!(to_vec(batch.targets), vec![6, 7, 8]);
    }

    #[test]
    fn test_pads_to_longest_sample() {
        let batcher = LmBatcher::<TestBackend>::new(Default::default(), 9);
        let batch = batcher.batch(vec![
            LmSample::new(vec![1, 2, 3, 4]),
            LmSample::new(vec![5, 6]),
        ]);

        assert_eq!(batch.inputs.dims(),  [2, 3]);
        assert_eq!(batch.targets.dims(), [2, 3]);
        assert_eq!(to_vec(batch.inputs),  vec![1, 2, 3, 5, 6, 9]);
        assert_eq!(to_vec(batch.targets), vec![2, 3, 4, 6, 9, 9]);
    }

    #[test]
    fn test_large_token_ids_survive_batching() {
        let big = u32::MAX - 1;
        let batcher = LmBatcher::<TestBackend>::new(Default::default(), 0);
        let batch = batcher.batch(vec![LmSample::new(vec![big, 1])]);

        assert_eq!(to_vec(batch.inputs),  vec![i64::from(big)]);
        assert_eq!(to_vec(batch.targets), vec![1]);
    }
}
