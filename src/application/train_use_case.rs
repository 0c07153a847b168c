// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load labelled sentences      (Layer 4 - data)
//   Step 2: Split train/validation       (Layer 4 - data)
//   Step 3: Build tokenizer              (Layer 6 - infra)
//   Step 4: Encode examples              (Layer 4 - data)
//   Step 5: Build datasets               (Layer 4 - data)
//   Step 6: Save resolved config         (Layer 6 - infra)
//   Step 7: Run the trainer              (Layer 5 - ml)
//   Step 8: Persist metrics + best model (Layer 6 - infra)

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::RationaleDataset,
    loader::TsvLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::error::RationaleError;
use crate::domain::sentence::infer_num_labels;
use crate::domain::traits::SentenceSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    loss::LossWeights,
    model::{ThreePlayerConfig, ThreePlayerModel},
    trainer::{adam_optimizers, CancelFlag, Trainer, TrainingOptions},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoint so score / explain can rebuild the same model.
// vocab_size is filled in once the tokenizer exists; a zero
// num_labels is inferred from the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:         String,
    pub checkpoint_dir:    String,
    pub max_seq_len:       usize,
    pub max_vocab:         usize,
    pub min_freq:          usize,
    pub vocab_size:        usize,
    pub num_labels:        usize,
    pub embedding_dim:     usize,
    pub d_model:           usize,
    pub num_heads:         usize,
    pub num_layers:        usize,
    pub d_ff:              usize,
    pub dropout:           f64,
    pub introspective:     bool,
    pub fixed_embeddings:  bool,
    pub epochs:            usize,
    pub pretrain_epochs:   usize,
    pub batch_size:        usize,
    pub lr:                f64,
    pub seed:              u64,
    pub train_fraction:    f64,
    pub sparsity:          f32,
    pub min_rationale_len: usize,
    pub temperature:       f32,
    pub lambda_anti:       f64,
    pub lambda_sparsity:   f64,
    pub lambda_continuity: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:         "data/train.tsv".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
            max_seq_len:       64,
            max_vocab:         20_000,
            min_freq:          1,
            vocab_size:        0,
            num_labels:        0,
            embedding_dim:     64,
            d_model:           64,
            num_heads:         4,
            num_layers:        1,
            d_ff:              128,
            dropout:           0.1,
            introspective:     true,
            fixed_embeddings:  false,
            epochs:            10,
            pretrain_epochs:   1,
            batch_size:        32,
            lr:                1e-3,
            seed:              42,
            train_fraction:    0.8,
            sparsity:          0.2,
            min_rationale_len: 1,
            temperature:       0.5,
            lambda_anti:       1.0,
            lambda_sparsity:   1.0,
            lambda_continuity: 0.1,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> ThreePlayerConfig {
        ThreePlayerConfig::new(self.vocab_size, self.num_labels, self.max_seq_len)
            .with_embedding_dim(self.embedding_dim)
            .with_d_model(self.d_model)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
            .with_introspective(self.introspective)
            .with_fixed_embeddings(self.fixed_embeddings)
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            epochs:            self.epochs,
            pretrain_epochs:   self.pretrain_epochs,
            batch_size:        self.batch_size,
            lr:                self.lr,
            seed:              self.seed,
            sparsity:          self.sparsity,
            min_rationale_len: self.min_rationale_len,
            temperature:       self.temperature,
            weights: LossWeights {
                anti:       self.lambda_anti,
                sparsity:   self.lambda_sparsity,
                continuity: self.lambda_continuity,
            },
        }
    }

    /// True when `self` would build the same vocabulary from the same
    /// training split as `previous`.
    pub fn same_vocabulary_source(&self, previous: &TrainConfig) -> bool {
        self.data_path == previous.data_path
            && self.train_fraction == previous.train_fraction
            && self.seed == previous.seed
            && self.max_vocab == previous.max_vocab
            && self.min_freq == previous.min_freq
    }

    /// Checks everything that is known before the data is read.
    pub fn validate(&self) -> Result<(), RationaleError> {
        if self.max_seq_len == 0 {
            return Err(RationaleError::config("max_seq_len must be greater than zero"));
        }
        if self.max_vocab < 3 {
            return Err(RationaleError::config("max_vocab must leave room for [PAD], [UNK] and one word"));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
            return Err(RationaleError::config(format!(
                "train_fraction must be in (0, 1], got {}", self.train_fraction
            )));
        }
        self.training_options().validate()?;
        // Sizes only: vocab and labels are resolved later
        ThreePlayerConfig { vocab_size: 3, num_labels: 2, ..self.model_config() }.validate()
    }
}

/// What a finished run reports back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub epochs_run:    usize,
    pub best_epoch:    Option<usize>,
    pub best_accuracy: Option<f64>,
    pub cancelled:     bool,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    cancel: CancelFlag,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, cancel: CancelFlag::default() }
    }

    /// Setting this flag stops `execute` after the current batch; the
    /// last parameters are still saved.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute the full training pipeline end to end.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let mut cfg = self.config.clone();
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 1: Load labelled sentences ───────────────────────────────────
        let sentences = TsvLoader::new(&cfg.data_path).load_all()?;
        if sentences.is_empty() {
            anyhow::bail!("No labelled sentences found in '{}'", cfg.data_path);
        }
        if cfg.num_labels == 0 {
            cfg.num_labels = infer_num_labels(&sentences);
            tracing::info!("Inferred {} labels from the data", cfg.num_labels);
        }

        // ── Step 2: Train / validation split ──────────────────────────────────
        let (train_sentences, val_sentences) = split_train_val(sentences, cfg.train_fraction, cfg.seed);
        tracing::info!("Split: {} train, {} validation", train_sentences.len(), val_sentences.len());

        // ── Step 3: Build / load tokenizer from the training side only ────────
        // A saved tokenizer is reused only if the previous run in this
        // directory read the same data with the same vocabulary settings.
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        let resume = ckpt.load_config().is_ok_and(|prev| cfg.same_vocabulary_source(&prev));
        let preprocessor = Preprocessor::new(cfg.max_seq_len);
        let cleaned: Vec<String> = train_sentences.iter().map(|s| preprocessor.clean(&s.text)).collect();
        let store = TokenizerStore::new(&cfg.checkpoint_dir);
        let tokenizer = if resume {
            store.load_or_build(&cleaned, cfg.max_vocab, cfg.min_freq)?
        } else {
            if store.path().exists() {
                tracing::warn!(
                    "'{}' belongs to a run on other data or settings; rebuilding it",
                    store.path().display()
                );
            }
            store.build(&cleaned, cfg.max_vocab, cfg.min_freq)?
        };
        cfg.vocab_size = tokenizer.get_vocab_size(true);

        // ── Step 4 + 5: Encode and build datasets ─────────────────────────────
        let train_ds = RationaleDataset::new(
            preprocessor.encode_all(&tokenizer, &train_sentences)?, cfg.num_labels,
        ).context("Invalid training data")?;
        let val_ds = RationaleDataset::new(
            preprocessor.encode_all(&tokenizer, &val_sentences)?, cfg.num_labels,
        ).context("Invalid validation data")?;
        tracing::info!(
            "Datasets ready: {} train / {} validation examples, label counts {:?}",
            train_ds.examples().len(), val_ds.examples().len(), train_ds.label_counts(),
        );

        // ── Step 6: Save resolved config for inference ────────────────────────
        ckpt.save_config(&cfg)?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        // Seeding before init makes the initial parameters reproducible too
        B::seed(&device, cfg.seed);
        let model: ThreePlayerModel<B> = cfg.model_config().init(&device)?;
        tracing::info!(
            "Model ready: vocab={}, labels={}, d_model={}, introspective={}",
            cfg.vocab_size, cfg.num_labels, cfg.d_model, cfg.introspective,
        );
        let mut trainer = Trainer::new(model, adam_optimizers::<B>(), cfg.training_options(), device)?
            .with_cancel_flag(self.cancel.clone());
        let report = trainer.fit(&train_ds, &val_ds)?;

        // ── Step 8: Persist metrics and the best model ────────────────────────
        let logger = if resume {
            MetricsLogger::new(&cfg.checkpoint_dir)?
        } else {
            MetricsLogger::fresh(&cfg.checkpoint_dir)?
        };
        for record in &report.history {
            logger.log(&EpochMetrics::from_running(record.epoch, &record.train, &record.val))?;
        }

        match &report.best {
            Some(best) => ckpt.save_best(&best.model, best.epoch, best.accuracy)?,
            None => {
                tracing::warn!("No epoch finished evaluation; saving the last parameters instead");
                ckpt.save_best(&report.model, 0, 0.0)?;
            }
        }

        tracing::info!("Training complete! Metrics in '{}'", logger.csv_path().display());
        Ok(TrainSummary {
            epochs_run:    report.history.len(),
            best_epoch:    report.best.as_ref().map(|b| b.epoch),
            best_accuracy: report.best.as_ref().map(|b| b.accuracy),
            cancelled:     report.cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{explain_use_case::ExplainUseCase, score_use_case::ScoreUseCase};
    use crate::domain::traits::LocalExplainer;
    use burn::backend::{Autodiff, NdArray};
    use std::path::Path;

    fn write_corpus(path: &Path) {
        let mut rows = vec!["sentence\tlabel".to_string()];
        for i in 0..12 {
            rows.push(format!("a gorgeous , witty film number {i}\t1"));
            rows.push(format!("a dull , boring mess number {i}\t0"));
        }
        std::fs::write(path, rows.join("\n")).unwrap();
    }

    fn tiny(data: &Path, ckpt: &Path) -> TrainConfig {
        TrainConfig {
            data_path:       data.to_string_lossy().to_string(),
            checkpoint_dir:  ckpt.to_string_lossy().to_string(),
            max_seq_len:     10,
            embedding_dim:   8,
            d_model:         8,
            num_heads:       2,
            d_ff:            16,
            dropout:         0.0,
            epochs:          2,
            pretrain_epochs: 1,
            batch_size:      4,
            sparsity:        0.3,
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        assert!(TrainConfig::default().validate().is_ok());
        assert!(TrainConfig { sparsity: -0.1, ..Default::default() }.validate().is_err());
        assert!(TrainConfig { lambda_anti: -1.0, ..Default::default() }.validate().is_err());
        assert!(TrainConfig { train_fraction: 0.0, ..Default::default() }.validate().is_err());
        assert!(TrainConfig { d_model: 10, num_heads: 4, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_train_then_score_and_explain() {
        let _rng = crate::ml::backend_rng_guard();
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("train.tsv");
        let ckpt = dir.path().join("ckpt");
        write_corpus(&data);

        let summary = TrainUseCase::new(tiny(&data, &ckpt))
            .execute::<Autodiff<NdArray>>(Default::default())
            .unwrap();
        assert_eq!(summary.epochs_run, 2);
        assert!(!summary.cancelled);
        assert!(summary.best_epoch.is_some());

        for file in ["train_config.json", "tokenizer.json", "best_model.mpk.gz", "best_epoch.json", "metrics.csv"] {
            assert!(ckpt.join(file).exists(), "missing {file}");
        }
        let saved = CheckpointManager::new(&ckpt).load_config().unwrap();
        assert_eq!(saved.num_labels, 2);
        assert!(saved.vocab_size > 2);

        let scorer = ScoreUseCase::<NdArray>::new(&ckpt, Default::default()).unwrap();
        let metrics = scorer.score(&data.to_string_lossy()).unwrap();
        assert_eq!(metrics.examples(), 24);
        assert!(metrics.sparsity() > 0.0 && metrics.sparsity() < 1.0);

        let explainer = ExplainUseCase::<NdArray>::new(&ckpt, Default::default()).unwrap();
        let exp = explainer.explain_local("A gorgeous, witty film!").unwrap();
        assert_eq!(exp.tokens.len(), 6);
        assert!(!exp.rationale().is_empty());
        assert_eq!(exp.tokens[1].token, "gorgeous");
    }

    #[test]
    fn test_cancel_before_start_saves_last_parameters() {
        let _rng = crate::ml::backend_rng_guard();
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("train.tsv");
        let ckpt = dir.path().join("ckpt");
        write_corpus(&data);

        let use_case = TrainUseCase::new(tiny(&data, &ckpt));
        use_case.cancel_flag().shared().store(true, std::sync::atomic::Ordering::SeqCst);
        let summary = use_case.execute::<Autodiff<NdArray>>(Default::default()).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.epochs_run, 0);
        assert_eq!(summary.best_epoch, None);
        assert_eq!(CheckpointManager::new(&ckpt).best_info().unwrap().epoch, 0);
    }

    #[test]
    fn test_same_seed_reproduces_a_run_with_dropout() {
        let _rng = crate::ml::backend_rng_guard();
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("train.tsv");
        write_corpus(&data);

        let run = |name: &str| {
            let ckpt = dir.path().join(name);
            let cfg = TrainConfig { dropout: 0.1, ..tiny(&data, &ckpt) };
            let summary = TrainUseCase::new(cfg)
                .execute::<Autodiff<NdArray>>(Default::default())
                .unwrap();
            (summary, std::fs::read_to_string(ckpt.join("metrics.csv")).unwrap())
        };
        let (first, first_csv) = run("a");
        let (second, second_csv) = run("b");

        assert_eq!(first, second);
        assert_eq!(first_csv, second_csv);
    }

    #[test]
    fn test_new_data_in_old_checkpoint_dir_rebuilds_vocabulary() {
        let _rng = crate::ml::backend_rng_guard();
        let dir = tempfile::tempdir().unwrap();
        let ckpt = dir.path().join("ckpt");
        let first = dir.path().join("first.tsv");
        let second = dir.path().join("second.tsv");
        write_corpus(&first);
        let rows: Vec<String> = (0..12)
            .flat_map(|i| [format!("a superb cast {i}\t1"), format!("a tedious plot {i}\t0")])
            .collect();
        std::fs::write(&second, rows.join("\n")).unwrap();

        let train = |data: &Path| {
            TrainUseCase::new(tiny(data, &ckpt))
                .execute::<Autodiff<NdArray>>(Default::default())
                .unwrap()
        };
        let csv_rows = || std::fs::read_to_string(ckpt.join("metrics.csv")).unwrap().lines().count();

        train(&first);
        assert_eq!(csv_rows(), 3);
        // Same data again: tokenizer reused, rows appended
        train(&first);
        assert_eq!(csv_rows(), 5);

        train(&second);
        let tokenizer = TokenizerStore::new(&ckpt).load().unwrap();
        assert!(tokenizer.token_to_id("superb").is_some());
        assert!(tokenizer.token_to_id("gorgeous").is_none());
        assert_eq!(csv_rows(), 3);
    }

    #[test]
    fn test_vocabulary_source_comparison() {
        let base = TrainConfig::default();
        assert!(base.same_vocabulary_source(&TrainConfig { epochs: 3, dropout: 0.0, ..base.clone() }));
        assert!(!base.same_vocabulary_source(&TrainConfig { data_path: "other.tsv".into(), ..base.clone() }));
        assert!(!base.same_vocabulary_source(&TrainConfig { seed: 7, ..base.clone() }));
        assert!(!base.same_vocabulary_source(&TrainConfig { min_freq: 2, ..base.clone() }));
    }
}
