// ============================================================
// Layer 3 — Running Metrics
// ============================================================
// Counters accumulated batch by batch during one epoch:
//
//   accuracy      = classifier correct      / examples
//   anti_accuracy = anti-classifier correct / examples
//   sparsity      = selected positions      / real tokens
//   mean_loss     = summed batch losses     / batches
//
// The Trainer owns one instance and resets it at the start of
// every epoch; callers only ever see read-only copies.

use serde::{Deserialize, Serialize};

/// Counts contributed by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchTally {
    pub examples:     usize,
    pub correct:      usize,
    pub anti_correct: usize,
    pub selected:     usize,
    pub valid_tokens: usize,
    pub loss:         f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMetrics {
    examples:     usize,
    correct:      usize,
    anti_correct: usize,
    selected:     usize,
    valid_tokens: usize,
    loss_sum:     f64,
    batches:      usize,
}

impl RunningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, tally: BatchTally) {
        self.examples     += tally.examples;
        self.correct      += tally.correct;
        self.anti_correct += tally.anti_correct;
        self.selected     += tally.selected;
        self.valid_tokens += tally.valid_tokens;
        self.loss_sum     += tally.loss;
        self.batches      += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn examples(&self) -> usize { self.examples }

    pub fn batches(&self) -> usize { self.batches }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.examples)
    }

    pub fn anti_accuracy(&self) -> f64 {
        ratio(self.anti_correct, self.examples)
    }

    pub fn sparsity(&self) -> f64 {
        ratio(self.selected, self.valid_tokens)
    }

    /// NaN when no batch has been recorded.
    pub fn mean_loss(&self) -> f64 {
        if self.batches == 0 { f64::NAN } else { self.loss_sum / self.batches as f64 }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
