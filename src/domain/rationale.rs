// ============================================================
// Layer 3 — Rationale Domain Types
// ============================================================
// Plain-Rust description of a rationale selection:
//
//   SamplingMode   → Soft (training) or Hard (evaluation/explain)
//   RationaleMask  → one value in [0,1] per padded position
//   Selection      → host-side top-k logic shared by both modes
//
// The tensor side of sampling lives in ml::sampler; everything
// here works on slices so it can be tested without a backend.

use serde::{Deserialize, Serialize};

use crate::domain::error::RationaleError;

/// A position counts as selected when its mask value reaches this.
pub const SELECTED_THRESHOLD: f32 = 0.5;

/// How inclusion scores are turned into a mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Hard values forward, gradient of sigmoid((score - θ) / temperature).
    Soft { temperature: f32 },
    /// Exactly the top-k valid positions are 1.
    Hard,
}

impl SamplingMode {
    pub fn soft(temperature: f32) -> Result<Self, RationaleError> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(RationaleError::config(format!(
                "soft sampling temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self::Soft { temperature })
    }
}

/// Per-example rationale mask, one value per padded position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleMask {
    values: Vec<f32>,
}

impl RationaleMask {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.values.get(position).is_some_and(|&v| v >= SELECTED_THRESHOLD)
    }

    pub fn selected_count(&self) -> usize {
        self.values.iter().filter(|&&v| v >= SELECTED_THRESHOLD).count()
    }
}

// ─── Selection policy ─────────────────────────────────────────────────────────

/// Validated target sparsity plus the minimum length below which
/// the whole input is kept as the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    target:  f32,
    min_len: usize,
}

/// Outcome of top-k selection for one example.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Positions chosen, sorted ascending.
    pub positions: Vec<usize>,
    /// Midpoint between the k-th and (k+1)-th highest score,
    /// or `None` when every valid position is taken.
    pub threshold: Option<f32>,
    /// True when the all-positions fallback fired (ties / short input).
    pub fell_back: bool,
}

impl SelectionPolicy {
    pub fn new(target: f32, min_len: usize) -> Result<Self, RationaleError> {
        if !(0.0..=1.0).contains(&target) || target.is_nan() {
            return Err(RationaleError::config(format!(
                "target sparsity must be in [0, 1], got {target}"
            )));
        }
        Ok(Self { target, min_len })
    }

    pub fn target(&self) -> f32 { self.target }

    /// k = round(target × valid_len), clamped to [1, valid_len] when target > 0.
    pub fn select_count(&self, valid_len: usize) -> usize {
        if valid_len == 0 || self.target == 0.0 {
            return 0;
        }
        let k = (self.target * valid_len as f32).round() as usize;
        k.clamp(1, valid_len)
    }

    /// Pick the top-k of `scores[..valid_len]`. Ties are broken by
    /// position, earlier first.
    pub fn select(&self, scores: &[f32], valid_len: usize) -> Selection {
        let valid_len = valid_len.min(scores.len());
        let valid = &scores[..valid_len];

        let all_tied = valid.windows(2).all(|w| w[0] == w[1]);
        if valid_len < self.min_len.max(1) || (valid_len > 1 && all_tied) {
            return Selection {
                positions: (0..valid_len).collect(),
                threshold: None,
                fell_back: true,
            };
        }

        let k = self.select_count(valid_len);
        let mut order: Vec<usize> = (0..valid_len).collect();
        // Stable sort keeps earlier positions first among equal scores.
        order.sort_by(|&a, &b| valid[b].total_cmp(&valid[a]));

        let threshold = if k == valid_len {
            None
        } else if k == 0 {
            Some(valid[order[0]] + 1.0)
        } else {
            Some((valid[order[k - 1]] + valid[order[k]]) / 2.0)
        };

        let mut positions: Vec<usize> = order[..k].to_vec();
        positions.sort_unstable();
        Selection { positions, threshold, fell_back: false }
    }
}
