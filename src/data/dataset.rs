use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One pre-tokenized training sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LmSample {
    pub input_ids: Vec<u32>,
}

impl LmSample {
    pub fn new(input_ids: Vec<u32>) -> Self {
        Self { input_ids }
    }
}

#[derive(Debug)]
pub struct LmDataset {
    samples: Vec<LmSample>,
}

impl LmDataset {
    pub fn new(samples: Vec<LmSample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn token_count(&self) -> usize {
        self.samples.iter().map(|s| s.input_ids.len()).sum()
    }
}

impl Dataset<LmSample> for LmDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
