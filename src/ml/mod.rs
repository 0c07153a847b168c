// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code of the three-player rationale model.
//
//   encoder.rs    — embedding + transformer encoder shared by
//                   every player (each owns its own copy)
//
//   generator.rs  — per-token inclusion scores, optionally
//                   conditioned on the classifier's prediction
//
//   sampler.rs    — Soft / Hard rationale masks at a target
//                   sparsity, plus their complements
//
//   classifier.rs — MaskedScorer capability and the classifier
//                   used for both the rationale and the complement
//
//   model.rs      — the three players wired into one forward pass
//
//   loss.rs       — joint objective: CE, adversarial, sparsity,
//                   continuity
//
//   trainer.rs    — pretrain / train / eval state machine with
//                   one Adam optimizer per player
//
//   inferencer.rs — checkpoint loading, prediction and local
//                   explanations with Hard sampling
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Yu et al. (2019) Rethinking Cooperative Rationalization

pub mod encoder;

pub mod generator;

pub mod sampler;

pub mod classifier;

/// Three-player model: generator, classifier, anti-classifier
pub mod model;

pub mod loss;

/// Full training loop with validation and best-model tracking
pub mod trainer;

/// Inference engine — loads the best checkpoint and explains inputs
pub mod inferencer;

/// NdArray keeps one process-wide RNG; tests that draw from it
/// (parameter init, dropout, seeding) hold this guard so seeded
/// runs are not interleaved with other tests' draws.
#[cfg(test)]
pub(crate) fn backend_rng_guard() -> std::sync::MutexGuard<'static, ()> {
    static BACKEND_RNG: std::sync::Mutex<()> = std::sync::Mutex::new(());
    BACKEND_RNG.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
