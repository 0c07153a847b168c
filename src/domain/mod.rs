// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define the core
// concepts of the rationale system. No Burn types, no file I/O.
//
//   sentence     — a raw labelled sentence
//   example      — a tokenised, padded, validated sentence
//   rationale    — sampling modes, masks, top-k selection policy
//   metrics      — per-epoch running accuracy / anti-accuracy / sparsity
//   explanation  — the result of explaining one sentence
//   error        — InputShape / NumericInstability / Configuration
//   traits       — SentenceSource and LocalExplainer seams

pub mod sentence;

pub mod example;

pub mod rationale;

pub mod metrics;

pub mod explanation;

pub mod error;

pub mod traits;
