// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises a raw sentence and turns it into a padded Example.
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace variants and control characters
//      to a plain space
//   2. Lowercase
//   3. Detach punctuation from words ("witty," → "witty ,")
//   4. Collapse runs of spaces and trim
//
// Encoding: the cleaned text is passed through the word-level
// tokenizer, then padded / truncated to max_seq_len.

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::domain::example::Example;
use crate::domain::sentence::LabeledSentence;

pub struct Preprocessor {
    max_seq_len: usize,
}

impl Preprocessor {
    pub fn new(max_seq_len: usize) -> Self {
        Self { max_seq_len }
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    /// Clean a raw sentence for tokenisation.
    pub fn clean(&self, text: &str) -> String {
        // ── Step 1 + 2: normalise characters and case ─────────────────────────
        let mut spaced = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            match c {
                '\t' | '\r' | '\n' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => spaced.push(' '),
                c if c.is_control() => spaced.push(' '),
                // ── Step 3: punctuation becomes its own token ─────────────────
                // Apostrophes stay attached ("don't")
                c if c.is_ascii_punctuation() && c != '\'' => {
                    spaced.push(' ');
                    spaced.push(c);
                    spaced.push(' ');
                }
                c => spaced.extend(c.to_lowercase()),
            }
        }

        // ── Step 4: collapse whitespace ───────────────────────────────────────
        spaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Encode a corpus, skipping sentences that clean down to nothing.
    pub fn encode_all(&self, tokenizer: &Tokenizer, sentences: &[LabeledSentence]) -> Result<Vec<Example>> {
        let mut examples = Vec::with_capacity(sentences.len());
        for s in sentences {
            let ids = self.token_ids(tokenizer, &s.text)?;
            if ids.is_empty() {
                tracing::warn!("Skipping sentence with no tokens: {:?}", s.text);
                continue;
            }
            examples.push(Example::from_tokens(ids, self.max_seq_len, s.label)?);
        }
        Ok(examples)
    }

    /// Token ids of the cleaned sentence, unpadded and untruncated.
    pub fn token_ids(&self, tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
        let cleaned = self.clean(text);
        let enc = tokenizer
            .encode(cleaned.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    /// Word pieces shown back to the user, aligned with `token_ids`
    /// and truncated to max_seq_len.
    pub fn display_tokens(&self, tokenizer: &Tokenizer, text: &str) -> Result<Vec<String>> {
        let cleaned = self.clean(text);
        let enc = tokenizer
            .encode(cleaned.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        // Offsets point into the cleaned string, so unknown words are
        // shown as written rather than as [UNK].
        Ok(enc.get_offsets().iter()
            .take(self.max_seq_len)
            .map(|&(s, e)| cleaned.get(s..e).unwrap_or("[UNK]").to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_splits_punctuation() {
        let p = Preprocessor::new(16);
        assert_eq!(p.clean("A Gorgeous, Witty film!"), "a gorgeous , witty film !");
    }

    #[test]
    fn test_keeps_apostrophes() {
        let p = Preprocessor::new(16);
        assert_eq!(p.clean("Don't  miss it"), "don't miss it");
    }

    #[test]
    fn test_control_chars_and_whitespace() {
        let p = Preprocessor::new(16);
        assert_eq!(p.clean("  hello\x01\u{00A0}world \t "), "hello world");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new(16);
        assert_eq!(p.clean(""), "");
    }
}
