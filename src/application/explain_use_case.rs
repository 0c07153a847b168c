// ============================================================
// Layer 2 — ExplainUseCase
// ============================================================
// Produces a LocalExplanation for one raw sentence:
//
//   raw text ──► clean ──► token ids + display tokens
//                               │
//                               ▼
//                   Inferencer::explain (Hard sampling)

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::preprocessor::Preprocessor;
use crate::domain::example::Example;
use crate::domain::explanation::LocalExplanation;
use crate::domain::traits::LocalExplainer;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::Inferencer;

pub struct ExplainUseCase<B: Backend> {
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    inferencer:   Inferencer<B>,
}

impl<B: Backend> ExplainUseCase<B> {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, device: B::Device) -> Result<Self> {
        let dir        = checkpoint_dir.into();
        let ckpt       = CheckpointManager::new(&dir);
        let cfg        = ckpt.load_config()?;
        let tokenizer  = TokenizerStore::new(&dir).load()?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, device)?;
        Ok(Self { tokenizer, preprocessor: Preprocessor::new(cfg.max_seq_len), inferencer })
    }
}

impl<B: Backend> LocalExplainer for ExplainUseCase<B> {
    fn explain_local(&self, text: &str) -> Result<LocalExplanation> {
        let ids = self.preprocessor.token_ids(&self.tokenizer, text)?;
        if ids.is_empty() {
            anyhow::bail!("Nothing to explain: '{text}' has no tokens after cleaning");
        }
        // The label is unused at inference time
        let example = Example::from_tokens(ids, self.preprocessor.max_seq_len(), 0)?;
        let tokens  = self.preprocessor.display_tokens(&self.tokenizer, text)?;

        let explanation = self.inferencer
            .explain(&example, &tokens)
            .context("Explaining sentence failed")?;
        tracing::debug!("Rationale: {}", explanation.highlighted());
        Ok(explanation)
    }
}
