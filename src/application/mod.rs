// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one user-facing goal:
// training, scoring a labelled file, or explaining a sentence.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// Held-out metrics for a saved model
pub mod score_use_case;

// Rationale for a single sentence
pub mod explain_use_case;
