// ============================================================
// Layer 3 — LocalExplanation
// ============================================================
// The result of explaining one sentence: which tokens the
// generator kept, how strongly it scored each one, and what
// the classifier concluded from the rationale alone versus
// from the full sentence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAttribution {
    pub token:    String,
    /// Raw generator inclusion score
    pub score:    f32,
    /// Hard rationale membership
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalExplanation {
    pub tokens:               Vec<TokenAttribution>,
    /// Argmax of `rationale_probs`
    pub predicted_label:      usize,
    /// Classifier distribution given the rationale only
    pub rationale_probs:      Vec<f32>,
    /// Classifier distribution given the full sentence
    pub full_probs:           Vec<f32>,
    /// Anti-classifier distribution given the complement
    pub anti_probs:           Vec<f32>,
}

impl LocalExplanation {
    /// The selected tokens, in sentence order.
    pub fn rationale(&self) -> Vec<&str> {
        self.tokens.iter()
            .filter(|t| t.selected)
            .map(|t| t.token.as_str())
            .collect()
    }

    /// Sentence with rationale tokens wrapped in brackets,
    /// e.g. "the [gorgeous] , [witty] film".
    pub fn highlighted(&self) -> String {
        self.tokens.iter()
            .map(|t| if t.selected { format!("[{}]", t.token) } else { t.token.clone() })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
