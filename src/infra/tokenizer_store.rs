// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and reloads the word-level vocabulary.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. Instead the tokenizer JSON is written
// directly and loaded back with Tokenizer::from_file.
//
// Text reaching the tokenizer has already been cleaned by the
// Preprocessor (lowercased, punctuation split off), so the
// tokenizer itself only splits on whitespace:
//
//   normalizer     null
//   pre_tokenizer  WhitespaceSplit
//   model          WordLevel, unk_token = [UNK]
//
// Ids:  [PAD] = 0, [UNK] = 1, then words by descending
//       frequency (ties alphabetical, so builds are reproducible).

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf};
use tokenizers::Tokenizer;

use crate::domain::example::PAD_ID;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const UNK_ID: u32 = 1;

const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load existing tokenizer or build a new one from cleaned texts.
    pub fn load_or_build(&self, texts: &[String], max_vocab: usize, min_freq: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Building word-level vocabulary (max_vocab={}, min_freq={})", max_vocab, min_freq);
            self.build(texts, max_vocab, min_freq)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}. Have you run 'train' first?", path.display(), e
            ))
    }

    /// Build from cleaned texts, replacing any saved tokenizer.
    pub fn build(&self, texts: &[String], max_vocab: usize, min_freq: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: word frequencies ──────────────────────────────────────────
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(&str, usize)> = freq.into_iter()
            .filter(|&(w, n)| n >= min_freq.max(1) && w != PAD_TOKEN && w != UNK_TOKEN)
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        // Two slots reserved for [PAD] and [UNK]
        words.truncate(max_vocab.saturating_sub(2));

        // ── Step 2: vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        vocab.insert(PAD_TOKEN.into(), serde_json::json!(PAD_ID));
        vocab.insert(UNK_TOKEN.into(), serde_json::json!(UNK_ID));
        for (i, (word, _)) in words.iter().enumerate() {
            vocab.insert((*word).to_string(), serde_json::json!(i + 2));
        }
        let vocab_size = vocab.len();

        // ── Step 3: tokenizer JSON in HuggingFace format ──────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": PAD_ID, "content": PAD_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": UNK_ID, "content": UNK_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer to '{}'", path.display()))?;

        tracing::info!("Tokenizer built with {} entries, saved to '{}'", vocab_size, path.display());

        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "a witty film".to_string(),
            "a dull film".to_string(),
            "a film".to_string(),
        ]
    }

    #[test]
    fn test_special_ids_and_frequency_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let tok = store.load_or_build(&corpus(), 100, 1).unwrap();

        assert_eq!(tok.token_to_id(PAD_TOKEN), Some(PAD_ID));
        assert_eq!(tok.token_to_id(UNK_TOKEN), Some(UNK_ID));
        // "a" and "film" appear three times; ties break alphabetically
        assert_eq!(tok.token_to_id("a"), Some(2));
        assert_eq!(tok.token_to_id("film"), Some(3));
        assert_eq!(tok.get_vocab_size(true), 6);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 100, 1).unwrap();
        let enc = tok.encode("a boring film", false).unwrap();
        assert_eq!(enc.get_ids(), &[2, UNK_ID, 3]);
    }

    #[test]
    fn test_max_vocab_and_min_freq() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 100, 2).unwrap();
        assert_eq!(tok.get_vocab_size(true), 4);

        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 3, 1).unwrap();
        assert_eq!(tok.get_vocab_size(true), 3);
        assert_eq!(tok.token_to_id("film"), None);
    }

    #[test]
    fn test_reload_gives_same_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let built = store.load_or_build(&corpus(), 100, 1).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(built.get_vocab(true), loaded.get_vocab(true));
    }
}
