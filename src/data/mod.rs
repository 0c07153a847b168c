// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a TSV file on disk to backend tensors:
//
//   sentences.tsv
//       │
//       ▼
//   TsvLoader         → reads (sentence, label) rows
//       │
//       ▼
//   Preprocessor      → cleans text, tokenises, pads → Example
//       │
//       ▼
//   split_train_val   → seeded train / validation split
//       │
//       ▼
//   RationaleDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   RationaleBatcher  → stacks Examples into tensor batches

/// Reads labelled sentences from TSV files
pub mod loader;

/// Cleans, tokenises and pads sentences into Examples
pub mod preprocessor;

/// Implements Burn's Dataset trait for Examples
pub mod dataset;

/// Stacks Examples into RationaleBatch tensors
pub mod batcher;

/// Seeded train/validation split and epoch shuffling
pub mod splitter;
