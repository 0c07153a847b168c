// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Joint training of the three players with Adam.
//
//   Init ──► Pretrain(e)* ──► TrainEpoch(e) ──► EvalEpoch(e) ──┐
//                                  ▲                           │
//                                  └──────── next epoch ◄──────┤
//                                                              ▼
//                                                            Done
//
// Per training batch:
//   1. Generator → Sampler (Soft) → Classifier / Anti-Classifier
//   2. L      = joint loss (see ml::loss), drives generator + classifier
//   3. L_anti = CE(anti-classifier | detached complement)
//   4. one Adam step per player, each from its own gradients
//
// Every step first re-seeds the backend RNG from (seed, epoch, batch),
// so dropout draws are reproducible for a given configuration.
//
// Key Burn 0.20 insight:
//   - Training runs on an AutodiffBackend
//   - model.valid() returns the model on B::InnerBackend
//   - evaluation batches go through batch.inner() to match
//   - argmax(1) returns [batch, 1], reshaped to [batch] before .equal()
//
// Reference: Kingma & Ba (2015) Adam

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use burn::{
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{RationaleBatch, RationaleBatcher},
    dataset::RationaleDataset,
    splitter::shuffled_indices,
};
use crate::domain::error::RationaleError;
use crate::domain::example::Example;
use crate::domain::metrics::{BatchTally, RunningMetrics};
use crate::domain::rationale::{SamplingMode, SelectionPolicy};
use crate::ml::classifier::{MaskedScorer, RationaleClassifier};
use crate::ml::generator::Generator;
use crate::ml::loss::{cross_entropy, joint_loss, scalar, LossWeights};
use crate::ml::model::ThreePlayerModel;
use crate::ml::sampler::RationaleSampler;

// ─── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub epochs:            usize,
    /// Classifier-only epochs on the full input before joint training
    pub pretrain_epochs:   usize,
    pub batch_size:        usize,
    pub lr:                f64,
    pub seed:              u64,
    /// Target fraction of real tokens kept in the rationale
    pub sparsity:          f32,
    pub min_rationale_len: usize,
    pub temperature:       f32,
    pub weights:           LossWeights,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs:            10,
            pretrain_epochs:   1,
            batch_size:        32,
            lr:                1e-3,
            seed:              42,
            sparsity:          0.2,
            min_rationale_len: 1,
            temperature:       0.5,
            weights:           LossWeights::default(),
        }
    }
}

impl TrainingOptions {
    pub fn validate(&self) -> Result<(), RationaleError> {
        if self.epochs == 0 {
            return Err(RationaleError::config("epochs must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(RationaleError::config("batch_size must be greater than zero"));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(RationaleError::config(format!("learning rate must be positive, got {}", self.lr)));
        }
        self.weights.validate()?;
        self.sampler()?;
        self.soft_mode()?;
        Ok(())
    }

    pub fn sampler(&self) -> Result<RationaleSampler, RationaleError> {
        Ok(RationaleSampler::new(SelectionPolicy::new(self.sparsity, self.min_rationale_len)?))
    }

    pub fn soft_mode(&self) -> Result<SamplingMode, RationaleError> {
        SamplingMode::soft(self.temperature)
    }
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Init,
    Pretrain { epoch: usize },
    TrainEpoch { epoch: usize },
    EvalEpoch { epoch: usize },
    Done,
}

/// Shared stop request, checked after every completed batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// The underlying flag, for handlers that set it directly.
    pub fn shared(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Highest held-out accuracy seen so far, with its parameters.
#[derive(Debug, Clone)]
pub struct BestModel<B: Backend> {
    pub epoch:    usize,
    pub accuracy: f64,
    pub model:    ThreePlayerModel<B>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train: RunningMetrics,
    pub val:   RunningMetrics,
}

#[derive(Debug, Clone)]
pub struct TrainingReport<B: Backend> {
    pub history:   Vec<EpochRecord>,
    pub best:      Option<BestModel<B>>,
    /// Parameters after the last completed step
    pub model:     ThreePlayerModel<B>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub loss:  f64,
    pub tally: BatchTally,
}

pub struct PlayerOptimizers<OG, OC, OA> {
    pub generator:       OG,
    pub classifier:      OC,
    pub anti_classifier: OA,
}

/// One fresh Adam optimizer per player.
pub fn adam_optimizers<B: AutodiffBackend>() -> PlayerOptimizers<
    impl Optimizer<Generator<B>, B>,
    impl Optimizer<RationaleClassifier<B>, B>,
    impl Optimizer<RationaleClassifier<B>, B>,
> {
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let cfg = AdamConfig::new().with_epsilon(1e-8);
    PlayerOptimizers {
        generator:       cfg.init::<B, Generator<B>>(),
        classifier:      cfg.init::<B, RationaleClassifier<B>>(),
        anti_classifier: cfg.init::<B, RationaleClassifier<B>>(),
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

pub struct Trainer<B, OG, OC, OA>
where
    B: AutodiffBackend,
{
    model:      ThreePlayerModel<B>,
    optimizers: PlayerOptimizers<OG, OC, OA>,
    options:    TrainingOptions,
    sampler:    RationaleSampler,
    soft:       SamplingMode,
    batcher:    RationaleBatcher<B>,
    phase:      TrainerPhase,
    cancel:     CancelFlag,
    device:     B::Device,
}

impl<B, OG, OC, OA> Trainer<B, OG, OC, OA>
where
    B:  AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OC: Optimizer<RationaleClassifier<B>, B>,
    OA: Optimizer<RationaleClassifier<B>, B>,
{
    pub fn new(
        model:      ThreePlayerModel<B>,
        optimizers: PlayerOptimizers<OG, OC, OA>,
        options:    TrainingOptions,
        device:     B::Device,
    ) -> Result<Self, RationaleError> {
        options.validate()?;
        Ok(Self {
            model,
            optimizers,
            sampler: options.sampler()?,
            soft:    options.soft_mode()?,
            options,
            batcher: RationaleBatcher::new(device.clone()),
            phase:   TrainerPhase::Init,
            cancel:  CancelFlag::default(),
            device,
        })
    }

    /// Share a flag the caller can set from another thread.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn seed_step(&self, epoch: usize, batch_index: usize) {
        B::seed(&self.device, step_seed(self.options.seed, epoch, batch_index));
    }

    fn set_phase(&mut self, phase: TrainerPhase) {
        tracing::debug!("Trainer phase: {:?} → {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// One joint update of all three players.
    pub fn train_step(
        &mut self,
        batch:       &RationaleBatch<B>,
        epoch:       usize,
        batch_index: usize,
    ) -> Result<StepOutcome, RationaleError> {
        self.seed_step(epoch, batch_index);
        let model = self.model.clone();
        let out = model.forward(batch, &self.sampler, self.soft)?;

        // ── Generator + classifier objective ──────────────────────────────────
        let joint = joint_loss(
            out.logits.clone(),
            out.anti_logits.clone(),
            batch.labels.clone(),
            out.rationale.mask.clone(),
            batch.padding.clone(),
            self.sampler.target(),
            &self.options.weights,
        );
        let loss = scalar(&joint.total);
        ensure_finite(loss, epoch, batch_index)?;

        // ── Anti-classifier objective (complement detached) ───────────────────
        let anti_logits = model.anti_classifier.forward_masked(
            batch.token_ids.clone(),
            out.rationale.complement.clone().detach(),
            batch.padding.clone(),
        );
        let anti_loss = cross_entropy(anti_logits, batch.labels.clone());
        ensure_finite(scalar(&anti_loss), epoch, batch_index)?;

        let tally = BatchTally {
            examples:     batch.batch_size(),
            correct:      count_correct(out.logits, batch.labels.clone())?,
            anti_correct: count_correct(out.anti_logits, batch.labels.clone())?,
            selected:     out.rationale.total_selected(),
            valid_tokens: batch.valid_tokens(),
            loss,
        };

        // ── Backward + one Adam step per player ───────────────────────────────
        let mut grads      = joint.total.backward();
        let gen_grads      = GradientsParams::from_module(&mut grads, &model.generator);
        let cls_grads      = GradientsParams::from_module(&mut grads, &model.classifier);
        let mut anti_grads = anti_loss.backward();
        let anti_grads     = GradientsParams::from_module(&mut anti_grads, &model.anti_classifier);

        let lr = self.options.lr;
        let ThreePlayerModel { generator, classifier, anti_classifier } = model;
        self.model = ThreePlayerModel {
            generator:       self.optimizers.generator.step(lr, generator, gen_grads),
            classifier:      self.optimizers.classifier.step(lr, classifier, cls_grads),
            anti_classifier: self.optimizers.anti_classifier.step(lr, anti_classifier, anti_grads),
        };

        tracing::debug!("epoch {} batch {}: {:?}", epoch, batch_index, joint.breakdown());

        Ok(StepOutcome { loss, tally })
    }

    /// Classifier-only update on the full input.
    pub fn pretrain_step(
        &mut self,
        batch:       &RationaleBatch<B>,
        epoch:       usize,
        batch_index: usize,
    ) -> Result<StepOutcome, RationaleError> {
        self.seed_step(epoch, batch_index);
        let logits = self.model.classifier.forward_full(batch.token_ids.clone(), batch.padding.clone());
        let ce = cross_entropy(logits.clone(), batch.labels.clone());
        let loss = scalar(&ce);
        ensure_finite(loss, epoch, batch_index)?;

        let tally = BatchTally {
            examples:     batch.batch_size(),
            correct:      count_correct(logits, batch.labels.clone())?,
            anti_correct: 0,
            selected:     batch.valid_tokens(),
            valid_tokens: batch.valid_tokens(),
            loss,
        };

        let mut grads = ce.backward();
        let grads = GradientsParams::from_module(&mut grads, &self.model.classifier);
        let classifier = self.model.classifier.clone();
        self.model.classifier = self.optimizers.classifier.step(self.options.lr, classifier, grads);

        Ok(StepOutcome { loss, tally })
    }

    /// Hard-mode metrics of the current parameters on held-out examples.
    pub fn evaluate(&self, examples: &[Example]) -> Result<RunningMetrics, RationaleError> {
        let model = self.model.valid();
        let mut metrics = RunningMetrics::new();
        for chunk in examples.chunks(self.options.batch_size) {
            let batch = self.batcher.batch(chunk)?.inner();
            metrics.update(eval_batch(&model, &batch, &self.sampler, &self.options.weights)?);
        }
        Ok(metrics)
    }

    fn batches_in_order(&self, dataset: &RationaleDataset, seed: u64) -> Vec<Vec<Example>> {
        shuffled_indices(dataset.len(), seed)
            .chunks(self.options.batch_size)
            .map(|idx| idx.iter().filter_map(|&i| dataset.get(i)).collect())
            .collect()
    }

    /// Run the full state machine and hand back the best model.
    pub fn fit(
        &mut self,
        train: &RationaleDataset,
        val:   &RationaleDataset,
    ) -> Result<TrainingReport<B>, RationaleError> {
        if train.examples().is_empty() {
            return Err(RationaleError::shape("training set is empty"));
        }
        if train.num_labels() != self.model.num_labels() {
            return Err(RationaleError::shape(format!(
                "dataset has {} labels but the model predicts {}",
                train.num_labels(),
                self.model.num_labels()
            )));
        }
        self.set_phase(TrainerPhase::Init);

        let mut history   = Vec::with_capacity(self.options.epochs);
        let mut best: Option<BestModel<B>> = None;
        let mut cancelled = false;
        let mut metrics   = RunningMetrics::new();

        // ── Pretraining ───────────────────────────────────────────────────────
        'pretrain: for epoch in 1..=self.options.pretrain_epochs {
            self.set_phase(TrainerPhase::Pretrain { epoch });
            metrics.reset();
            let seed = self.options.seed.wrapping_add(epoch as u64);
            for (i, items) in self.batches_in_order(train, seed).iter().enumerate() {
                let batch = self.batcher.batch(items)?;
                metrics.update(self.pretrain_step(&batch, epoch, i)?.tally);
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'pretrain;
                }
            }
            tracing::info!(
                "Pretrain {:>3}/{} | {} batches | loss={:.4} | acc={:.1}%",
                epoch, self.options.pretrain_epochs, metrics.batches(),
                metrics.mean_loss(), metrics.accuracy() * 100.0,
            );
        }

        // ── Joint training ────────────────────────────────────────────────────
        if !cancelled {
            for epoch in 1..=self.options.epochs {
                self.set_phase(TrainerPhase::TrainEpoch { epoch });
                metrics.reset();
                let seed = self.options.seed
                    .wrapping_add((self.options.pretrain_epochs + epoch) as u64);

                for (i, items) in self.batches_in_order(train, seed).iter().enumerate() {
                    let batch = self.batcher.batch(items)?;
                    metrics.update(self.train_step(&batch, epoch, i)?.tally);
                    if self.cancel.is_cancelled() {
                        cancelled = true;
                        break;
                    }
                }
                if cancelled {
                    tracing::info!("Training cancelled during epoch {}", epoch);
                    break;
                }

                self.set_phase(TrainerPhase::EvalEpoch { epoch });
                let val_metrics = self.evaluate(val.examples())?;

                tracing::info!(
                    "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | acc={:.1}% | anti_acc={:.1}% | sparsity={:.3}",
                    epoch, self.options.epochs,
                    metrics.mean_loss(), val_metrics.mean_loss(),
                    val_metrics.accuracy() * 100.0, val_metrics.anti_accuracy() * 100.0,
                    val_metrics.sparsity(),
                );

                let improved = best.as_ref().map_or(true, |b| val_metrics.accuracy() > b.accuracy);
                if improved {
                    tracing::debug!("New best model at epoch {} (acc {:.4})", epoch, val_metrics.accuracy());
                    best = Some(BestModel {
                        epoch,
                        accuracy: val_metrics.accuracy(),
                        model:    self.model.clone(),
                    });
                }

                history.push(EpochRecord { epoch, train: metrics.clone(), val: val_metrics });
            }
        }

        self.set_phase(TrainerPhase::Done);
        Ok(TrainingReport { history, best, model: self.model.clone(), cancelled })
    }
}

/// Hard-mode forward pass and metrics for one batch, no update.
pub fn eval_batch<B: Backend>(
    model:   &ThreePlayerModel<B>,
    batch:   &RationaleBatch<B>,
    sampler: &RationaleSampler,
    weights: &LossWeights,
) -> Result<BatchTally, RationaleError> {
    let out = model.forward(batch, sampler, SamplingMode::Hard)?;
    let loss = joint_loss(
        out.logits.clone(),
        out.anti_logits.clone(),
        batch.labels.clone(),
        out.rationale.mask.clone(),
        batch.padding.clone(),
        sampler.target(),
        weights,
    );
    Ok(BatchTally {
        examples:     batch.batch_size(),
        correct:      count_correct(out.logits, batch.labels.clone())?,
        anti_correct: count_correct(out.anti_logits, batch.labels.clone())?,
        selected:     out.rationale.total_selected(),
        valid_tokens: batch.valid_tokens(),
        loss:         scalar(&loss.total),
    })
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Result<usize, RationaleError> {
    let n = labels.dims()[0];
    if logits.dims()[0] != n {
        return Err(RationaleError::shape(format!(
            "{} logit rows for {} labels", logits.dims()[0], n
        )));
    }
    let correct: i64 = logits.argmax(1).reshape([n])
        .equal(labels)
        .int().sum().into_scalar().elem::<i64>();
    Ok(correct as usize)
}

/// Backend seed for one step, fixed by the configured seed and the
/// step's position in the run.
fn step_seed(seed: u64, epoch: usize, batch_index: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(batch_index as u64)
}

fn ensure_finite(value: f64, epoch: usize, batch: usize) -> Result<(), RationaleError> {
    if value.is_finite() {
        Ok(())
    } else {
        tracing::warn!("Non-finite loss {} at epoch {}, batch {}", value, epoch, batch);
        Err(RationaleError::NumericInstability { epoch, batch, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::ThreePlayerConfig;
    use burn::{backend::{Autodiff, NdArray}, module::Param};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_config() -> ThreePlayerConfig {
        ThreePlayerConfig::new(30, 2, 6)
            .with_embedding_dim(8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_d_ff(32)
            .with_dropout(0.0)
    }

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> ThreePlayerModel<TestBackend> {
        tiny_config().init(device).unwrap()
    }

    fn options() -> TrainingOptions {
        TrainingOptions {
            epochs: 2,
            pretrain_epochs: 1,
            batch_size: 2,
            sparsity: 0.4,
            ..Default::default()
        }
    }

    fn dataset() -> RationaleDataset {
        let examples = (0..6)
            .map(|i| {
                let label = i % 2;
                let ids = if label == 1 { vec![3, 4, 5 + i as u32] } else { vec![10, 11, 12, 13 + i as u32] };
                Example::from_tokens(ids, 6, label).unwrap()
            })
            .collect();
        RationaleDataset::new(examples, 2).unwrap()
    }

    fn trainer(
        model: ThreePlayerModel<TestBackend>,
        opts:  TrainingOptions,
    ) -> Trainer<
        TestBackend,
        impl Optimizer<Generator<TestBackend>, TestBackend>,
        impl Optimizer<RationaleClassifier<TestBackend>, TestBackend>,
        impl Optimizer<RationaleClassifier<TestBackend>, TestBackend>,
    > {
        Trainer::new(model, adam_optimizers::<TestBackend>(), opts, Default::default()).unwrap()
    }

    fn head_weights(model: &ThreePlayerModel<TestBackend>) -> Vec<f32> {
        model.generator.head.weight.val().into_data().to_vec().unwrap()
    }

    #[test]
    fn test_options_validation() {
        assert!(options().validate().is_ok());
        assert!(TrainingOptions { sparsity: 1.5, ..options() }.validate().is_err());
        assert!(TrainingOptions { batch_size: 0, ..options() }.validate().is_err());
        assert!(TrainingOptions { temperature: 0.0, ..options() }.validate().is_err());
        let weights = LossWeights { sparsity: -0.1, ..Default::default() };
        assert!(matches!(
            TrainingOptions { weights, ..options() }.validate(),
            Err(RationaleError::Configuration(_))
        ));
    }

    #[test]
    fn test_one_step_is_deterministic_with_dropout() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let model: ThreePlayerModel<TestBackend> = tiny_config()
            .with_dropout(0.1)
            .init(&device)
            .unwrap();
        let data = dataset();
        let batcher = RationaleBatcher::<TestBackend>::new(device);
        let batch = batcher.batch(&data.examples()[..4]).unwrap();

        let mut a = trainer(model.clone(), options());
        let mut b = trainer(model, options());
        let out_a = a.train_step(&batch, 1, 0).unwrap();
        let out_b = b.train_step(&batch, 1, 0).unwrap();

        assert_eq!(out_a.loss, out_b.loss);
        assert!(out_a.loss.is_finite());
        assert_eq!(out_a.tally, out_b.tally);
        assert_eq!(head_weights(&a.model), head_weights(&b.model));

        // The same position in the run replays the same dropout draws
        let again_a = a.train_step(&batch, 1, 1).unwrap();
        let again_b = b.train_step(&batch, 1, 1).unwrap();
        assert_eq!(again_a.loss, again_b.loss);
        assert_eq!(head_weights(&a.model), head_weights(&b.model));
    }

    #[test]
    fn test_step_seed_depends_on_position() {
        assert_eq!(step_seed(42, 1, 0), step_seed(42, 1, 0));
        assert_ne!(step_seed(42, 1, 0), step_seed(42, 1, 1));
        assert_ne!(step_seed(42, 1, 0), step_seed(42, 2, 0));
        assert_ne!(step_seed(42, 1, 0), step_seed(7, 1, 0));
    }

    #[test]
    fn test_step_updates_every_player() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let model = tiny_model(&device);
        let before = model.clone();
        let data = dataset();
        let batch = RationaleBatcher::<TestBackend>::new(device).batch(&data.examples()[..2]).unwrap();

        let mut t = trainer(model, options());
        t.train_step(&batch, 1, 0).unwrap();

        let changed = |x: Tensor<TestBackend, 2>, y: Tensor<TestBackend, 2>| {
            let x: Vec<f32> = x.into_data().to_vec().unwrap();
            let y: Vec<f32> = y.into_data().to_vec().unwrap();
            x.iter().zip(&y).any(|(p, q)| p != q)
        };
        assert!(changed(before.generator.head.weight.val(), t.model.generator.head.weight.val()));
        assert!(changed(before.classifier.head.weight.val(), t.model.classifier.head.weight.val()));
        assert!(changed(
            before.anti_classifier.head.weight.val(),
            t.model.anti_classifier.head.weight.val(),
        ));
    }

    #[test]
    fn test_nan_loss_aborts_with_numeric_instability() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let mut model: ThreePlayerModel<TestBackend> =
            tiny_config().with_introspective(false).init(&device).unwrap();
        model.classifier.head.bias = Some(Param::from_tensor(
            Tensor::<TestBackend, 1>::full([2], f32::NAN, &device),
        ));

        let mut t = trainer(model, TrainingOptions { pretrain_epochs: 0, ..options() });
        let err = t.fit(&dataset(), &dataset()).unwrap_err();
        assert!(matches!(err, RationaleError::NumericInstability { epoch: 1, batch: 0, .. }));
    }

    #[test]
    fn test_cancel_stops_after_first_batch() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let cancel = CancelFlag::default();
        let mut t = trainer(tiny_model(&device), TrainingOptions { pretrain_epochs: 0, ..options() })
            .with_cancel_flag(cancel.clone());
        cancel.shared().store(true, Ordering::SeqCst);

        let report = t.fit(&dataset(), &dataset()).unwrap();
        assert!(report.cancelled);
        assert!(report.history.is_empty());
        assert!(report.best.is_none());
        assert_eq!(t.phase, TrainerPhase::Done);
    }

    #[test]
    fn test_fit_returns_best_model() {
        let _rng = crate::ml::backend_rng_guard();
        let device = Default::default();
        let mut t = trainer(tiny_model(&device), options());
        let report = t.fit(&dataset(), &dataset()).unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.history.len(), 2);
        let best = report.best.unwrap();
        let best_acc = report.history.iter().map(|r| r.val.accuracy()).fold(0.0, f64::max);
        assert_eq!(best.accuracy, best_acc);
        assert!((1..=2).contains(&best.epoch));
        for record in &report.history {
            // 1 of 3 and 2 of 4 tokens per example → 9 / 21 overall
            assert!(record.val.sparsity() > 0.3 && record.val.sparsity() < 0.7);
            assert!(record.train.mean_loss().is_finite());
        }
    }
}
