// ============================================================
// Layer 5 — Generator
// ============================================================
// Scores every token position for inclusion in the rationale.
//
//   token ids ──► TokenEncoder ──► Linear(d_model → 1) ──► scores
//                     ▲
//                     │ (introspective only)
//   predicted label ──► label embedding [batch, d_model]
//
// The introspective variant conditions on the label the
// classifier predicts from the full input, so the generator
// looks for evidence of a specific class.
//
// Padded positions receive PAD_SCORE and are excluded from
// sampling downstream.

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::ml::encoder::{padding_to_bool, EncoderConfig, TokenEncoder};

/// Score written into padded positions.
pub const PAD_SCORE: f32 = -1.0e4;

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    pub encoder:    EncoderConfig,
    pub num_labels: usize,
    #[config(default = true)]
    pub introspective: bool,
}

impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let label_embedding = self.introspective
            .then(|| EmbeddingConfig::new(self.num_labels, self.encoder.d_model).init(device));
        Generator {
            encoder: self.encoder.init(device),
            label_embedding,
            head: LinearConfig::new(self.encoder.d_model, 1).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    pub encoder:         TokenEncoder<B>,
    pub label_embedding: Option<Embedding<B>>,
    pub head:            Linear<B>,
}

impl<B: Backend> Generator<B> {
    pub fn is_introspective(&self) -> bool {
        self.label_embedding.is_some()
    }

    /// token_ids: [batch, seq_len], padding: [batch, seq_len],
    /// predicted: optional [batch] labels for introspection
    /// → scores: [batch, seq_len]
    pub fn forward(
        &self,
        token_ids: Tensor<B, 2, Int>,
        padding:   Tensor<B, 2>,
        predicted: Option<Tensor<B, 1, Int>>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = token_ids.dims();

        let conditioning = match (&self.label_embedding, predicted) {
            (Some(emb), Some(labels)) => {
                let cond = emb.forward(labels.reshape([batch_size, 1]));
                Some(cond.reshape([batch_size, self.encoder.d_model]))
            }
            _ => None,
        };

        let embedded = self.encoder.embed(token_ids);
        let hidden   = self.encoder.encode(embedded, padding.clone(), conditioning);
        let scores   = self.head.forward(hidden).reshape([batch_size, seq_len]);

        scores.mask_fill(padding_to_bool(padding), PAD_SCORE)
    }
}
