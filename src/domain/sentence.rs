// ============================================================
// Layer 3 — LabeledSentence Domain Type
// ============================================================
// A raw sentence and its class label, as read from disk and
// before any cleaning or tokenisation.
//
// Example (binary sentiment):
//   LabeledSentence { text: "a gorgeous, witty film", label: 1 }

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSentence {
    /// Raw sentence text
    pub text: String,

    /// Class index in 0..num_labels
    pub label: usize,
}

impl LabeledSentence {
    pub fn new(text: impl Into<String>, label: usize) -> Self {
        Self { text: text.into(), label }
    }
}

/// Number of classes implied by a corpus (largest label + 1).
pub fn infer_num_labels(sentences: &[LabeledSentence]) -> usize {
    sentences.iter().map(|s| s.label + 1).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_num_labels() {
        let s = vec![
            LabeledSentence::new("bad", 0),
            LabeledSentence::new("fine", 2),
            LabeledSentence::new("good", 1),
        ];
        assert_eq!(infer_num_labels(&s), 3);
        assert_eq!(infer_num_labels(&[]), 0);
    }
}
