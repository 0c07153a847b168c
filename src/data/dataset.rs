use burn::data::dataset::Dataset;

use crate::domain::error::RationaleError;
use crate::domain::example::Example;

/// In-memory collection of Examples sharing one padded length.
pub struct RationaleDataset {
    examples:   Vec<Example>,
    num_labels: usize,
}

impl RationaleDataset {
    /// Every example must have the same padded length and a label
    /// below `num_labels`.
    pub fn new(examples: Vec<Example>, num_labels: usize) -> Result<Self, RationaleError> {
        if let Some(first) = examples.first() {
            let len = first.padded_len();
            if let Some(bad) = examples.iter().find(|e| e.padded_len() != len) {
                return Err(RationaleError::shape(format!(
                    "dataset mixes padded lengths {} and {}",
                    len,
                    bad.padded_len()
                )));
            }
        }
        if let Some(bad) = examples.iter().find(|e| e.label() >= num_labels) {
            return Err(RationaleError::shape(format!(
                "label {} outside 0..{}",
                bad.label(),
                num_labels
            )));
        }
        Ok(Self { examples, num_labels })
    }

    pub fn num_labels(&self) -> usize { self.num_labels }

    pub fn examples(&self) -> &[Example] { &self.examples }

    /// Number of examples per label, indexed by label.
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_labels];
        for e in &self.examples {
            counts[e.label()] += 1;
        }
        counts
    }
}

impl Dataset<Example> for RationaleDataset {
    fn get(&self, index: usize) -> Option<Example> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
