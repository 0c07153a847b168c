// ============================================================
// Layer 5 — Rationale Sampler
// ============================================================
// Turns generator scores into a rationale mask and its complement.
//
//   Hard:  mask[i, t] = 1 for the top-k valid positions, else 0
//   Soft:  gate[i, t] = sigmoid((score[i, t] - θ_i) / temperature)
//          mask       = hard + (gate - gate.detach())
//
// θ_i is read from the host (no gradient) and sits midway between
// the k-th and (k+1)-th highest valid score of example i. The Soft
// mask carries the Hard values forward (straight-through), so both
// modes select the same positions even when scores tie at the k-th
// place, and the gate's gradient still reaches the scores.
//
// k_i = round(target × valid_len_i), clamped to [1, valid_len_i].
// Ties across every valid score, or a valid length under the
// configured minimum, select the whole input instead.
//
//   complement = padding × (1 − mask)

use burn::prelude::*;

use crate::domain::error::RationaleError;
use crate::domain::rationale::{RationaleMask, SamplingMode, SelectionPolicy};

/// Threshold used when every valid position is selected.
const SELECT_ALL_THRESHOLD: f32 = -1.0e6;

#[derive(Debug, Clone)]
pub struct SampledRationale<B: Backend> {
    /// [batch, seq_len], values in [0, 1]
    pub mask: Tensor<B, 2>,
    /// [batch, seq_len], padding × (1 − mask)
    pub complement: Tensor<B, 2>,
    /// Selected positions per example
    pub selected_counts: Vec<usize>,
    /// Examples where the select-everything fallback fired
    pub fallbacks: usize,
}

impl<B: Backend> SampledRationale<B> {
    pub fn total_selected(&self) -> usize {
        self.selected_counts.iter().sum()
    }

    /// Per-example host copies of the mask.
    pub fn to_masks(&self) -> Result<Vec<RationaleMask>, RationaleError> {
        let [batch_size, seq_len] = self.mask.dims();
        let flat = read_floats(self.mask.clone())?;
        Ok((0..batch_size)
            .map(|i| RationaleMask::new(flat[i * seq_len..(i + 1) * seq_len].to_vec()))
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RationaleSampler {
    policy: SelectionPolicy,
}

impl RationaleSampler {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn target(&self) -> f32 {
        self.policy.target()
    }

    /// scores, padding: [batch, seq_len]; `valid_lens` holds the real
    /// token count of each row.
    pub fn sample<B: Backend>(
        &self,
        scores:     Tensor<B, 2>,
        padding:    Tensor<B, 2>,
        valid_lens: &[usize],
        mode:       SamplingMode,
    ) -> Result<SampledRationale<B>, RationaleError> {
        let [batch_size, seq_len] = scores.dims();
        if padding.dims() != [batch_size, seq_len] {
            return Err(RationaleError::shape(format!(
                "scores are {:?} but padding is {:?}",
                [batch_size, seq_len],
                padding.dims()
            )));
        }
        if valid_lens.len() != batch_size || valid_lens.iter().any(|&l| l > seq_len) {
            return Err(RationaleError::shape(format!(
                "valid lengths {:?} do not fit a batch of {} × {}",
                valid_lens, batch_size, seq_len
            )));
        }

        let device = scores.device();
        let host   = read_floats(scores.clone().detach())?;

        let selections: Vec<_> = valid_lens.iter().enumerate()
            .map(|(i, &len)| self.policy.select(&host[i * seq_len..(i + 1) * seq_len], len))
            .collect();

        let selected_counts: Vec<usize> = selections.iter().map(|s| s.positions.len()).collect();
        let fallbacks = selections.iter().filter(|s| s.fell_back).count();
        if fallbacks > 0 {
            tracing::debug!("{} of {} examples fell back to the full input", fallbacks, batch_size);
        }

        let mut flat = vec![0.0f32; batch_size * seq_len];
        for (i, sel) in selections.iter().enumerate() {
            for &p in &sel.positions {
                flat[i * seq_len + p] = 1.0;
            }
        }
        let hard = Tensor::<B, 1>::from_floats(flat.as_slice(), &device).reshape([batch_size, seq_len]);

        let mask = match mode {
            SamplingMode::Hard => hard,
            SamplingMode::Soft { temperature } => {
                let thresholds: Vec<f32> = selections.iter()
                    .map(|s| s.threshold.unwrap_or(SELECT_ALL_THRESHOLD))
                    .collect();
                let theta = Tensor::<B, 1>::from_floats(thresholds.as_slice(), &device)
                    .reshape([batch_size, 1]);
                let gate = burn::tensor::activation::sigmoid(
                    (scores - theta).div_scalar(temperature),
                ) * padding.clone();
                // Zero in value, gate-shaped in gradient
                hard + (gate.clone() - gate.detach())
            }
        };

        let complement = padding * mask.clone().neg().add_scalar(1.0);

        Ok(SampledRationale { mask, complement, selected_counts, fallbacks })
    }
}

pub(crate) fn read_floats<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>, RationaleError> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| RationaleError::shape(format!("cannot read tensor data: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tensor(values: &[f32], rows: usize) -> Tensor<TestBackend, 2> {
        let cols = values.len() / rows;
        Tensor::<TestBackend, 1>::from_floats(values, &Default::default()).reshape([rows, cols])
    }

    fn sampler(target: f32) -> RationaleSampler {
        RationaleSampler::new(SelectionPolicy::new(target, 1).unwrap())
    }

    #[test]
    fn test_hard_selects_top_k_per_example() {
        let scores = tensor(&[0.1, 0.9, 0.3, 0.8, 0.2,
                              0.5, 0.4, 0.7, -1e4, -1e4], 2);
        let pad = tensor(&[1., 1., 1., 1., 1.,
                           1., 1., 1., 0., 0.], 2);
        // k = round(0.4 × 5) = 2 and round(0.4 × 3) = 1
        let out = sampler(0.4).sample(scores, pad, &[5, 3], SamplingMode::Hard).unwrap();

        let mask: Vec<f32> = out.mask.clone().into_data().to_vec().unwrap();
        assert_eq!(mask, vec![0., 1., 0., 1., 0.,
                              0., 0., 1., 0., 0.]);
        assert_eq!(out.selected_counts, vec![2, 1]);
        assert_eq!(out.fallbacks, 0);

        let comp: Vec<f32> = out.complement.into_data().to_vec().unwrap();
        assert_eq!(comp, vec![1., 0., 1., 0., 1.,
                              1., 1., 0., 0., 0.]);
    }

    #[test]
    fn test_two_by_five_at_forty_percent_selects_two_each() {
        let scores = tensor(&[0.3, -0.2, 1.5, 0.0, 0.7,
                              2.0, 1.0, -1.0, 0.5, 0.1], 2);
        let pad = tensor(&[1.0; 10], 2);
        let out = sampler(0.4).sample(scores, pad, &[5, 5], SamplingMode::Hard).unwrap();
        let masks = out.to_masks().unwrap();
        for m in &masks {
            assert_eq!(m.selected_count(), 2);
        }
    }

    #[test]
    fn test_soft_selects_same_positions_as_hard() {
        let values = [0.1, 0.9, 0.3, 0.8, 0.2, 0.5, 0.4, 0.7, -1e4, -1e4];
        let pad_values = [1., 1., 1., 1., 1., 1., 1., 1., 0., 0.];
        let s = sampler(0.4);

        let hard = s.sample(tensor(&values, 2), tensor(&pad_values, 2), &[5, 3], SamplingMode::Hard).unwrap();
        let soft = s.sample(
            tensor(&values, 2), tensor(&pad_values, 2), &[5, 3],
            SamplingMode::soft(0.1).unwrap(),
        ).unwrap();

        let hard_masks = hard.to_masks().unwrap();
        let soft_masks = soft.to_masks().unwrap();
        // Same values, padding included
        assert_eq!(hard_masks, soft_masks);
        assert!(!soft_masks[1].is_selected(3));
        let comp: Vec<f32> = soft.complement.into_data().to_vec().unwrap();
        assert_eq!(comp[8], 0.0);
        assert_eq!(comp[9], 0.0);
    }

    #[test]
    fn test_tie_at_the_kth_place_selects_k_in_both_modes() {
        // k = round(0.5 × 4) = 2, but three positions share the top score
        let values = [0.2, 0.7, 0.7, 0.7];
        let pad = [1.0; 4];
        let s = sampler(0.5);

        let hard = s.sample(tensor(&values, 1), tensor(&pad, 1), &[4], SamplingMode::Hard).unwrap();
        let soft = s.sample(
            tensor(&values, 1), tensor(&pad, 1), &[4],
            SamplingMode::soft(0.5).unwrap(),
        ).unwrap();

        let hard_mask = &hard.to_masks().unwrap()[0];
        let soft_mask = &soft.to_masks().unwrap()[0];
        assert_eq!(*hard_mask, RationaleMask::new(vec![0.0, 1.0, 1.0, 0.0]));
        assert_eq!(soft_mask, hard_mask);
        assert_eq!(soft.selected_counts, vec![2]);
        assert_eq!(soft_mask.selected_count(), 2);
    }

    #[test]
    fn test_soft_mask_passes_gradient_to_scores() {
        type AdBackend = burn::backend::Autodiff<NdArray>;
        let device = Default::default();
        let scores = Tensor::<AdBackend, 1>::from_floats([0.1, 0.9, 0.3, 0.8, 0.2], &device)
            .reshape([1, 5])
            .require_grad();
        let pad = Tensor::<AdBackend, 2>::ones([1, 5], &device);

        let out = sampler(0.4)
            .sample(scores.clone(), pad, &[5], SamplingMode::soft(0.5).unwrap())
            .unwrap();
        let grads = out.mask.sum().backward();
        let grad: Vec<f32> = scores.grad(&grads).unwrap().into_data().to_vec().unwrap();
        assert!(grad.iter().all(|g| *g > 0.0));
    }

    #[test]
    fn test_tied_scores_fall_back_to_full_input() {
        let scores = tensor(&[0.2; 5], 1);
        let pad = tensor(&[1.0; 5], 1);
        let s = sampler(0.4);

        let hard = s.sample(scores.clone(), pad.clone(), &[5], SamplingMode::Hard).unwrap();
        assert_eq!(hard.selected_counts, vec![5]);
        assert_eq!(hard.fallbacks, 1);

        let soft = s.sample(scores, pad, &[5], SamplingMode::soft(0.5).unwrap()).unwrap();
        let vals: Vec<f32> = soft.mask.into_data().to_vec().unwrap();
        assert!(vals.iter().all(|&v| v > 0.99));
    }

    #[test]
    fn test_shape_mismatch_is_input_shape_error() {
        let scores = tensor(&[0.1, 0.2, 0.3, 0.4], 1);
        let pad = tensor(&[1.0, 1.0], 1);
        let err = sampler(0.5).sample(scores, pad, &[2], SamplingMode::Hard).unwrap_err();
        assert!(matches!(err, RationaleError::InputShape(_)));

        let scores = tensor(&[0.1, 0.2], 1);
        let pad = tensor(&[1.0, 1.0], 1);
        assert!(sampler(0.5).sample(scores, pad, &[2, 2], SamplingMode::Hard).is_err());
    }
}
