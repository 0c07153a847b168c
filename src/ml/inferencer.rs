// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads the best checkpoint and runs the model with Hard
// sampling, so every call on the same input yields the same
// rationale and the same label distribution.
//
//   Example(s) ──► batch ──► ThreePlayerModel (Hard) ──► softmax
//                                    │
//                                    ├── rationale mask
//                                    └── generator scores

use anyhow::Result;
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::batcher::{RationaleBatch, RationaleBatcher};
use crate::domain::error::RationaleError;
use crate::domain::example::Example;
use crate::domain::explanation::{LocalExplanation, TokenAttribution};
use crate::domain::metrics::RunningMetrics;
use crate::domain::rationale::{RationaleMask, SamplingMode};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::classifier::MaskedScorer;
use crate::ml::loss::LossWeights;
use crate::ml::model::ThreePlayerModel;
use crate::ml::sampler::{read_floats, RationaleSampler};
use crate::ml::trainer::eval_batch;

const INFER_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Argmax of `probs`
    pub label:      usize,
    /// Classifier distribution from the rationale
    pub probs:      Vec<f32>,
    /// Anti-classifier distribution from the complement
    pub anti_probs: Vec<f32>,
    pub mask:       RationaleMask,
    /// Generator score per padded position
    pub scores:     Vec<f32>,
}

pub struct Inferencer<B: Backend> {
    model:   ThreePlayerModel<B>,
    sampler: RationaleSampler,
    weights: LossWeights,
    batcher: RationaleBatcher<B>,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: ThreePlayerModel<B>, sampler: RationaleSampler, weights: LossWeights, device: B::Device) -> Self {
        Self { model, sampler, weights, batcher: RationaleBatcher::new(device) }
    }

    /// Rebuild the architecture from train_config.json and load
    /// the best weights into it.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg = ckpt_manager.load_config()?;
        let model_cfg = cfg.model_config().with_dropout(0.0);
        let model: ThreePlayerModel<B> = model_cfg.init(&device)?;
        let model = ckpt_manager.load_model(model, &device)?;
        let options = cfg.training_options();
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, options.sampler()?, options.weights, device))
    }

    pub fn num_labels(&self) -> usize {
        self.model.num_labels()
    }

    pub fn predict(&self, examples: &[Example]) -> Result<Vec<Prediction>, RationaleError> {
        let mut predictions = Vec::with_capacity(examples.len());
        for chunk in examples.chunks(INFER_BATCH_SIZE) {
            let batch = self.batcher.batch(chunk)?;
            predictions.extend(self.predict_batch(&batch)?);
        }
        Ok(predictions)
    }

    fn predict_batch(&self, batch: &RationaleBatch<B>) -> Result<Vec<Prediction>, RationaleError> {
        let out = self.model.forward(batch, &self.sampler, SamplingMode::Hard)?;
        let masks = out.rationale.to_masks()?;

        let [batch_size, seq_len] = out.scores.dims();
        let num_labels = self.num_labels();
        let probs  = read_floats(softmax(out.logits, 1))?;
        let anti   = read_floats(softmax(out.anti_logits, 1))?;
        let scores = read_floats(out.scores)?;

        Ok(masks.into_iter().enumerate()
            .take(batch_size)
            .map(|(i, mask)| {
                let probs = probs[i * num_labels..(i + 1) * num_labels].to_vec();
                Prediction {
                    label:      argmax(&probs),
                    probs,
                    anti_probs: anti[i * num_labels..(i + 1) * num_labels].to_vec(),
                    mask,
                    scores:     scores[i * seq_len..(i + 1) * seq_len].to_vec(),
                }
            })
            .collect())
    }

    /// Held-out metrics with Hard sampling.
    pub fn evaluate(&self, examples: &[Example]) -> Result<RunningMetrics, RationaleError> {
        let mut metrics = RunningMetrics::new();
        for chunk in examples.chunks(INFER_BATCH_SIZE) {
            let batch = self.batcher.batch(chunk)?;
            metrics.update(eval_batch(&self.model, &batch, &self.sampler, &self.weights)?);
        }
        Ok(metrics)
    }

    /// Explain one example; `tokens` are the display strings of its
    /// real positions.
    pub fn explain(&self, example: &Example, tokens: &[String]) -> Result<LocalExplanation, RationaleError> {
        if tokens.len() != example.valid_len() {
            return Err(RationaleError::shape(format!(
                "{} display tokens for {} real positions",
                tokens.len(),
                example.valid_len()
            )));
        }

        let prediction = self.predict(std::slice::from_ref(example))?
            .pop()
            .ok_or_else(|| RationaleError::shape("empty prediction batch"))?;

        tracing::debug!(
            "{} of {} tokens selected",
            prediction.mask.selected_count(),
            example.valid_len()
        );

        let batch = self.batcher.batch(std::slice::from_ref(example))?;
        let full_logits = self.model.classifier.forward_full(batch.token_ids, batch.padding);
        let full_probs  = read_floats(softmax(full_logits, 1))?;

        let tokens = tokens.iter().enumerate()
            .map(|(t, token)| TokenAttribution {
                token:    token.clone(),
                score:    prediction.scores[t],
                selected: prediction.mask.is_selected(t),
            })
            .collect();

        Ok(LocalExplanation {
            tokens,
            predicted_label: prediction.label,
            rationale_probs: prediction.probs,
            full_probs,
            anti_probs: prediction.anti_probs,
        })
    }
}

fn argmax(values: &[f32]) -> usize {
    values.iter().enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rationale::SelectionPolicy;
    use crate::ml::model::ThreePlayerConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn inferencer(target: f32) -> Inferencer<TestBackend> {
        let device = Default::default();
        let model = ThreePlayerConfig::new(20, 2, 6)
            .with_embedding_dim(8)
            .with_d_model(8)
            .with_num_heads(2)
            .with_d_ff(16)
            .with_dropout(0.0)
            .init(&device)
            .unwrap();
        let sampler = RationaleSampler::new(SelectionPolicy::new(target, 1).unwrap());
        Inferencer::new(model, sampler, LossWeights::default(), device)
    }

    fn example() -> Example {
        Example::from_tokens(vec![3, 4, 5, 6, 7], 6, 1).unwrap()
    }

    #[test]
    fn test_predict_is_idempotent() {
        let _rng = crate::ml::backend_rng_guard();
        let inf = inferencer(0.4);
        let a = inf.predict(&[example()]).unwrap();
        let b = inf.predict(&[example()]).unwrap();
        assert_eq!(a, b);

        let p = &a[0];
        assert_eq!(p.mask.selected_count(), 2);
        assert!((p.probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((p.anti_probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(!p.mask.is_selected(5));
    }

    #[test]
    fn test_explain_aligns_tokens_with_mask() {
        let _rng = crate::ml::backend_rng_guard();
        let inf = inferencer(0.4);
        let tokens: Vec<String> = ["a", "gorgeous", ",", "witty", "film"].iter().map(|s| s.to_string()).collect();
        let exp = inf.explain(&example(), &tokens).unwrap();

        assert_eq!(exp.tokens.len(), 5);
        assert_eq!(exp.rationale().len(), 2);
        assert_eq!(exp.full_probs.len(), 2);
        assert!(exp.predicted_label < 2);

        let short = &tokens[..3];
        assert!(matches!(inf.explain(&example(), short), Err(RationaleError::InputShape(_))));
    }

    #[test]
    fn test_evaluate_counts_every_example() {
        let _rng = crate::ml::backend_rng_guard();
        let inf = inferencer(0.5);
        let examples = vec![example(), Example::from_tokens(vec![8, 9], 6, 0).unwrap()];
        let m = inf.evaluate(&examples).unwrap();
        assert_eq!(m.examples(), 2);
        // round(2.5) = 3 of 5, round(1.0) = 1 of 2
        assert!((m.sparsity() - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[0.9]), 0);
    }
}
