// ============================================================
// Layer 5 — Three-Player Model
// ============================================================
// Bundles the three players and wires one forward pass:
//
//   batch ──► classifier(full input) ──► argmax ──┐  (introspective only,
//     │                                           │   detached)
//     ▼                                           ▼
//   Generator ──────────────────────────────► scores [batch, seq_len]
//                                                 │
//                                        RationaleSampler (Soft | Hard)
//                                                 │
//                               ┌─────────────────┴──────────────────┐
//                               ▼                                    ▼
//                    classifier(mask)                 anti-classifier(complement)
//                               │                                    │
//                            logits                             anti_logits
//
// Every player keeps its own embedding table and encoder.

use burn::prelude::*;

use crate::data::batcher::RationaleBatch;
use crate::domain::error::RationaleError;
use crate::domain::rationale::SamplingMode;
use crate::ml::classifier::{ClassifierConfig, MaskedScorer, RationaleClassifier};
use crate::ml::encoder::EncoderConfig;
use crate::ml::generator::{Generator, GeneratorConfig};
use crate::ml::sampler::{RationaleSampler, SampledRationale};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ThreePlayerConfig {
    pub vocab_size:  usize,
    pub num_labels:  usize,
    pub max_seq_len: usize,
    #[config(default = 64)]
    pub embedding_dim: usize,
    #[config(default = 64)]
    pub d_model: usize,
    #[config(default = 4)]
    pub num_heads: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 128)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Condition the generator on the classifier's predicted label
    #[config(default = true)]
    pub introspective: bool,
    #[config(default = false)]
    pub fixed_embeddings: bool,
}

impl ThreePlayerConfig {
    pub fn validate(&self) -> Result<(), RationaleError> {
        let sizes = [
            ("vocab_size", self.vocab_size),
            ("max_seq_len", self.max_seq_len),
            ("embedding_dim", self.embedding_dim),
            ("d_model", self.d_model),
            ("num_heads", self.num_heads),
            ("num_layers", self.num_layers),
            ("d_ff", self.d_ff),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(RationaleError::config(format!("{name} must be greater than zero")));
        }
        if self.num_labels < 2 {
            return Err(RationaleError::config(format!(
                "need at least two labels, got {}", self.num_labels
            )));
        }
        if self.d_model % self.num_heads != 0 {
            return Err(RationaleError::config(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model, self.num_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(RationaleError::config(format!(
                "dropout must be in [0, 1), got {}", self.dropout
            )));
        }
        Ok(())
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::new(
            self.vocab_size, self.max_seq_len, self.embedding_dim,
            self.d_model, self.num_heads, self.num_layers, self.d_ff,
        )
        .with_dropout(self.dropout)
        .with_fixed_embeddings(self.fixed_embeddings)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ThreePlayerModel<B>, RationaleError> {
        self.validate()?;
        let encoder = self.encoder_config();
        let generator = GeneratorConfig::new(encoder.clone(), self.num_labels)
            .with_introspective(self.introspective)
            .init(device);
        let classifier      = ClassifierConfig::new(encoder.clone(), self.num_labels).init(device);
        let anti_classifier = ClassifierConfig::new(encoder, self.num_labels).init(device);

        tracing::debug!(
            "Three-player model: d_model={}, layers={}, introspective={}",
            self.d_model, self.num_layers, self.introspective
        );
        Ok(ThreePlayerModel { generator, classifier, anti_classifier })
    }
}

#[derive(Module, Debug)]
pub struct ThreePlayerModel<B: Backend> {
    pub generator:       Generator<B>,
    pub classifier:      RationaleClassifier<B>,
    pub anti_classifier: RationaleClassifier<B>,
}

pub struct ThreePlayerOutput<B: Backend> {
    /// Generator scores — [batch, seq_len]
    pub scores:      Tensor<B, 2>,
    pub rationale:   SampledRationale<B>,
    /// Classifier logits from the rationale — [batch, num_labels]
    pub logits:      Tensor<B, 2>,
    /// Anti-classifier logits from the complement — [batch, num_labels]
    pub anti_logits: Tensor<B, 2>,
}

impl<B: Backend> ThreePlayerModel<B> {
    pub fn num_labels(&self) -> usize {
        self.classifier.num_labels()
    }

    /// Classifier argmax over the full input, detached; `None` for a
    /// label-agnostic generator.
    pub fn introspect(&self, batch: &RationaleBatch<B>) -> Option<Tensor<B, 1, Int>> {
        if !self.generator.is_introspective() {
            return None;
        }
        let logits = self.classifier
            .forward_full(batch.token_ids.clone(), batch.padding.clone())
            .detach();
        Some(logits.argmax(1).reshape([batch.batch_size()]))
    }

    pub fn forward(
        &self,
        batch:   &RationaleBatch<B>,
        sampler: &RationaleSampler,
        mode:    SamplingMode,
    ) -> Result<ThreePlayerOutput<B>, RationaleError> {
        let predicted = self.introspect(batch);
        let scores = self.generator.forward(batch.token_ids.clone(), batch.padding.clone(), predicted);
        let rationale = sampler.sample(scores.clone(), batch.padding.clone(), &batch.valid_lens, mode)?;
        let (logits, anti_logits) = self.forward_with_mask(batch, rationale.mask.clone());

        Ok(ThreePlayerOutput { scores, rationale, logits, anti_logits })
    }

    /// Classifier logits for `mask` and anti-classifier logits for
    /// its complement, `padding × (1 − mask)`.
    pub fn forward_with_mask(&self, batch: &RationaleBatch<B>, mask: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let complement = batch.padding.clone() * mask.clone().neg().add_scalar(1.0);
        let logits = self.classifier.forward_masked(batch.token_ids.clone(), mask, batch.padding.clone());
        let anti_logits = self.anti_classifier.forward_masked(
            batch.token_ids.clone(), complement, batch.padding.clone(),
        );
        (logits, anti_logits)
    }
}
