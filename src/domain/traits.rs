// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams the application layer programs against:
//
//   SentenceSource  → anything that yields labelled sentences
//                     (TsvLoader today)
//   LocalExplainer  → anything that explains one sentence
//                     (ExplainUseCase today)

use anyhow::Result;

use crate::domain::explanation::LocalExplanation;
use crate::domain::sentence::LabeledSentence;

// ─── SentenceSource ───────────────────────────────────────────────────────────
/// Any component that can load labelled sentences.
pub trait SentenceSource {
    fn load_all(&self) -> Result<Vec<LabeledSentence>>;
}

// ─── LocalExplainer ───────────────────────────────────────────────────────────
/// Any component that can produce a rationale for one sentence.
pub trait LocalExplainer {
    fn explain_local(&self, text: &str) -> Result<LocalExplanation>;
}
