// ============================================================
// Layer 5 — Joint Loss
// ============================================================
// Generator + classifier objective for one batch:
//
//   L = CE(classifier | rationale)
//     + λ_anti       · max(0, ln C − CE(anti-classifier | complement))
//     + λ_sparsity   · | Σ mask / Σ padding − target |
//     + λ_continuity · mean_t | mask[t] − mask[t−1] |   (real pairs only)
//
// The adversarial term rewards the generator for pushing the
// anti-classifier towards chance (CE = ln C) and stops there,
// so it is bounded below by zero. The anti-classifier itself is
// trained separately on plain CE over the detached complement.

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};
use serde::{Deserialize, Serialize};

use crate::domain::error::RationaleError;

/// Weights of the auxiliary loss terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    pub anti:       f64,
    pub sparsity:   f64,
    pub continuity: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self { anti: 1.0, sparsity: 1.0, continuity: 0.1 }
    }
}

impl LossWeights {
    pub fn validate(&self) -> Result<(), RationaleError> {
        for (name, w) in [("anti", self.anti), ("sparsity", self.sparsity), ("continuity", self.continuity)] {
            if !w.is_finite() || w < 0.0 {
                return Err(RationaleError::config(format!(
                    "λ_{name} must be a finite, non-negative weight, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// The loss tensor plus its parts for logging.
pub struct JointLoss<B: Backend> {
    pub total:          Tensor<B, 1>,
    pub classification: Tensor<B, 1>,
    pub anti:           Tensor<B, 1>,
    pub sparsity:       Tensor<B, 1>,
    pub continuity:     Tensor<B, 1>,
}

/// Host-side scalar view of a JointLoss.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub total:          f64,
    pub classification: f64,
    pub anti:           f64,
    pub sparsity:       f64,
    pub continuity:     f64,
}

impl<B: Backend> JointLoss<B> {
    pub fn breakdown(&self) -> LossBreakdown {
        LossBreakdown {
            total:          scalar(&self.total),
            classification: scalar(&self.classification),
            anti:           scalar(&self.anti),
            sparsity:       scalar(&self.sparsity),
            continuity:     scalar(&self.continuity),
        }
    }
}

/// logits [batch, C], labels [batch] → mean CE [1]
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

/// | Σ mask / Σ padding − target | over the whole batch.
pub fn sparsity_penalty<B: Backend>(mask: Tensor<B, 2>, padding: Tensor<B, 2>, target: f32) -> Tensor<B, 1> {
    let rate = mask.sum() / padding.sum().clamp_min(1.0);
    rate.sub_scalar(target).abs()
}

/// Mean absolute change between adjacent mask values where both
/// positions are real tokens.
pub fn continuity_penalty<B: Backend>(mask: Tensor<B, 2>, padding: Tensor<B, 2>) -> Tensor<B, 1> {
    let [batch_size, seq_len] = mask.dims();
    if seq_len < 2 {
        return Tensor::zeros([1], &mask.device());
    }
    let next = mask.clone().slice([0..batch_size, 1..seq_len]);
    let prev = mask.slice([0..batch_size, 0..seq_len - 1]);
    let pairs = padding.clone().slice([0..batch_size, 1..seq_len])
        * padding.slice([0..batch_size, 0..seq_len - 1]);

    ((next - prev).abs() * pairs.clone()).sum() / pairs.sum().clamp_min(1.0)
}

/// max(0, ln C − anti_ce)
pub fn adversarial_term<B: Backend>(anti_ce: Tensor<B, 1>, num_labels: usize) -> Tensor<B, 1> {
    let chance = (num_labels.max(1) as f64).ln();
    anti_ce.neg().add_scalar(chance).clamp_min(0.0)
}

/// Assemble the generator/classifier objective.
#[allow(clippy::too_many_arguments)]
pub fn joint_loss<B: Backend>(
    logits:      Tensor<B, 2>,
    anti_logits: Tensor<B, 2>,
    labels:      Tensor<B, 1, Int>,
    mask:        Tensor<B, 2>,
    padding:     Tensor<B, 2>,
    target:      f32,
    weights:     &LossWeights,
) -> JointLoss<B> {
    let num_labels = logits.dims()[1];

    let classification = cross_entropy(logits, labels.clone());
    let anti_ce        = cross_entropy(anti_logits, labels);
    let anti           = adversarial_term(anti_ce, num_labels);
    let sparsity       = sparsity_penalty(mask.clone(), padding.clone(), target);
    let continuity     = continuity_penalty(mask, padding);

    let total = classification.clone()
        + anti.clone().mul_scalar(weights.anti)
        + sparsity.clone().mul_scalar(weights.sparsity)
        + continuity.clone().mul_scalar(weights.continuity);

    JointLoss { total, classification, anti, sparsity, continuity }
}

/// Read a single-element tensor as f64.
pub fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}
