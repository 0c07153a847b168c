// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the checkpoint directory:
//
//   checkpoint.rs      — best model weights (CompactRecorder),
//                        best_epoch.json and train_config.json
//
//   tokenizer_store.rs — word-level vocabulary built from the
//                        training corpus, saved as tokenizer.json
//
//   metrics.rs         — per-epoch metrics appended to metrics.csv

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
