// ============================================================
// Layer 4 — Rationale Batcher
// ============================================================
// Stacks a slice of Examples into backend tensors:
//
//   Input:  N Examples, each padded to length S
//   Output: RationaleBatch with
//             token_ids  [N, S]  Int
//             padding    [N, S]  Float  (1 = real token, 0 = pad)
//             labels     [N]     Int
//
// Flattening is row-major:
//   [e1_t1, ..., e1_tS, e2_t1, ..., eN_tS] → reshape [N, S]
//
// Unlike a DataLoader batcher this returns a Result: a batch
// with mixed padded lengths is an InputShape error surfaced at
// the first step rather than a panic deep inside reshape.

use burn::{prelude::*, tensor::backend::AutodiffBackend};

use crate::domain::error::RationaleError;
use crate::domain::example::Example;

#[derive(Debug, Clone)]
pub struct RationaleBatch<B: Backend> {
    /// Token ids — shape: [batch_size, seq_len]
    pub token_ids: Tensor<B, 2, Int>,

    /// 1.0 for real tokens, 0.0 for padding — shape: [batch_size, seq_len]
    pub padding: Tensor<B, 2>,

    /// Class labels — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,

    /// Real-token count per example, kept on the host for the sampler
    pub valid_lens: Vec<usize>,
}

impl<B: Backend> RationaleBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.valid_lens.len()
    }

    pub fn valid_tokens(&self) -> usize {
        self.valid_lens.iter().sum()
    }
}

impl<B: AutodiffBackend> RationaleBatch<B> {
    /// Same batch on the inner backend, for evaluation under `valid()`.
    pub fn inner(self) -> RationaleBatch<B::InnerBackend> {
        RationaleBatch {
            token_ids:  self.token_ids.inner(),
            padding:    self.padding.inner(),
            labels:     self.labels.inner(),
            valid_lens: self.valid_lens,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RationaleBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> RationaleBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, items: &[Example]) -> Result<RationaleBatch<B>, RationaleError> {
        let Some(first) = items.first() else {
            return Err(RationaleError::shape("cannot build a batch from zero examples"));
        };
        let batch_size = items.len();
        let seq_len    = first.padded_len();

        if let Some(bad) = items.iter().find(|e| e.padded_len() != seq_len) {
            return Err(RationaleError::shape(format!(
                "batch mixes padded lengths {} and {}",
                seq_len,
                bad.padded_len()
            )));
        }

        // ── Flatten ids and mask ──────────────────────────────────────────────
        let ids_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.token_ids().iter().map(|&x| x as i32))
            .collect();

        let pad_flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.mask().iter().map(|&m| m as f32))
            .collect();

        let labels: Vec<i32> = items.iter().map(|e| e.label() as i32).collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let token_ids = Tensor::<B, 1, Int>::from_ints(ids_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        let padding = Tensor::<B, 1>::from_floats(pad_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        Ok(RationaleBatch {
            token_ids,
            padding,
            labels,
            valid_lens: items.iter().map(Example::valid_len).collect(),
        })
    }
}
