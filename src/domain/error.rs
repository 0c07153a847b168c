// ============================================================
// Layer 3 — Error Kinds
// ============================================================
// The three failure families of the rationale core:
//
//   InputShape          → malformed examples or batches
//                          (fatal at construction / first batch)
//   NumericInstability  → NaN or Inf loss during training
//                          (aborts the current epoch, never retried)
//   Configuration       → invalid sparsity target, λ weights, sizes
//                          (fatal at construction)
//
// The application and CLI layers wrap these in anyhow::Error.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RationaleError {
    #[error("Input shape error: {0}")]
    InputShape(String),

    #[error("Numeric instability at epoch {epoch}, batch {batch}: loss = {value}")]
    NumericInstability {
        epoch: usize,
        batch: usize,
        value: f64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RationaleError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::InputShape(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
