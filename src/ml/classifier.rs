// ============================================================
// Layer 5 — Classifier / Anti-Classifier
// ============================================================
// One architecture, two independent instances:
//
//   classifier      sees  embedding × mask
//   anti-classifier sees  embedding × complement
//
//   token ids ──► Embedding ──► × selection ──► TokenEncoder
//                                                   │
//                       mean over real positions ◄──┘
//                                   │
//                                   ▼
//                      Linear(d_model → num_labels) ──► logits
//
// Positions outside the selection carry a zero embedding but
// remain in the sequence, so with selection = padding the
// classifier is exactly the plain full-input classifier.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::ml::encoder::{EncoderConfig, TokenEncoder};

/// Label scoring over a (possibly partial) token selection.
pub trait MaskedScorer<B: Backend> {
    /// token_ids: [batch, seq_len]; selection, padding: [batch, seq_len]
    /// → logits [batch, num_labels]
    fn forward_masked(
        &self,
        token_ids: Tensor<B, 2, Int>,
        selection: Tensor<B, 2>,
        padding:   Tensor<B, 2>,
    ) -> Tensor<B, 2>;

    fn num_labels(&self) -> usize;

    /// Logits from every real token.
    fn forward_full(&self, token_ids: Tensor<B, 2, Int>, padding: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_masked(token_ids, padding.clone(), padding)
    }
}

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub encoder:    EncoderConfig,
    pub num_labels: usize,
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RationaleClassifier<B> {
        RationaleClassifier {
            encoder:    self.encoder.init(device),
            head:       LinearConfig::new(self.encoder.d_model, self.num_labels).init(device),
            num_labels: self.num_labels,
        }
    }
}

#[derive(Module, Debug)]
pub struct RationaleClassifier<B: Backend> {
    pub encoder:    TokenEncoder<B>,
    pub head:       Linear<B>,
    pub num_labels: usize,
}

impl<B: Backend> MaskedScorer<B> for RationaleClassifier<B> {
    fn forward_masked(
        &self,
        token_ids: Tensor<B, 2, Int>,
        selection: Tensor<B, 2>,
        padding:   Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [batch_size, _] = token_ids.dims();
        let d_model = self.encoder.d_model;

        let embedded = self.encoder.embed(token_ids) * selection.unsqueeze_dim::<3>(2);
        let hidden   = self.encoder.encode(embedded, padding.clone(), None);

        // Mean pooling over real tokens only
        let summed = (hidden * padding.clone().unsqueeze_dim::<3>(2))
            .sum_dim(1)
            .reshape([batch_size, d_model]);
        let counts = padding.sum_dim(1).clamp_min(1.0);
        let pooled = summed / counts;

        self.head.forward(pooled)
    }

    fn num_labels(&self) -> usize {
        self.num_labels
    }
}
