// ============================================================
// Layer 2 — ScoreUseCase
// ============================================================
// Evaluates the saved best model on a labelled TSV file:
//
//   Step 1: Load tokenizer + model from the checkpoint dir
//   Step 2: Load and encode the sentences
//   Step 3: Hard-mode metrics (accuracy, anti-accuracy, sparsity)

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::{loader::TsvLoader, preprocessor::Preprocessor};
use crate::domain::metrics::RunningMetrics;
use crate::domain::traits::SentenceSource;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::Inferencer;

pub struct ScoreUseCase<B: Backend> {
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    inferencer:   Inferencer<B>,
}

impl<B: Backend> ScoreUseCase<B> {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, device: B::Device) -> Result<Self> {
        let dir        = checkpoint_dir.into();
        let ckpt       = CheckpointManager::new(&dir);
        let cfg        = ckpt.load_config()?;
        let tokenizer  = TokenizerStore::new(&dir).load()?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, device)?;
        Ok(Self { tokenizer, preprocessor: Preprocessor::new(cfg.max_seq_len), inferencer })
    }

    pub fn score(&self, data_path: &str) -> Result<RunningMetrics> {
        let sentences = TsvLoader::new(data_path).load_all()?;
        let examples  = self.preprocessor.encode_all(&self.tokenizer, &sentences)?;
        if let Some(bad) = examples.iter().find(|e| e.label() >= self.inferencer.num_labels()) {
            anyhow::bail!(
                "label {} is outside the {} labels the model was trained on",
                bad.label(),
                self.inferencer.num_labels()
            );
        }

        let metrics = self.inferencer
            .evaluate(&examples)
            .with_context(|| format!("Scoring '{data_path}' failed"))?;
        tracing::info!(
            "Scored {} examples: acc={:.4}, anti_acc={:.4}, sparsity={:.4}",
            metrics.examples(), metrics.accuracy(), metrics.anti_accuracy(), metrics.sparsity(),
        );
        Ok(metrics)
    }
}
