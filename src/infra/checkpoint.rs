// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the three-player model using Burn's
// CompactRecorder.
//
// What gets saved:
//   1. best_model.mpk.gz  — parameters of the best epoch
//   2. best_epoch.json    — which epoch that was and its accuracy
//   3. train_config.json  — everything needed to rebuild the model
//
// Loading for inference rebuilds the architecture from the
// config first, then loads the weights into it.
//
// checkpoints/
//   train_config.json
//   tokenizer.json        ← written by TokenizerStore
//   best_model.mpk.gz
//   best_epoch.json
//   metrics.csv           ← written by MetricsLogger

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ThreePlayerModel;

const MODEL_FILE:  &str = "best_model";
const BEST_FILE:   &str = "best_epoch.json";
const CONFIG_FILE: &str = "train_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestInfo {
    pub epoch:    usize,
    pub accuracy: f64,
}

/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))
    }

    /// Write the best model's parameters plus the epoch pointer.
    pub fn save_best<B: Backend>(&self, model: &ThreePlayerModel<B>, epoch: usize, accuracy: f64) -> Result<()> {
        self.ensure_dir()?;
        // The recorder appends the .mpk.gz extension itself
        let path = self.dir.join(MODEL_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let info = BestInfo { epoch, accuracy };
        fs::write(self.dir.join(BEST_FILE), serde_json::to_string_pretty(&info)?)
            .with_context(|| format!("Failed to write {BEST_FILE}"))?;

        tracing::debug!("Saved best model: epoch {} (acc {:.4})", epoch, accuracy);
        Ok(())
    }

    /// Load saved weights into a model of the matching architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  ThreePlayerModel<B>,
        device: &B::Device,
    ) -> Result<ThreePlayerModel<B>> {
        let info = self.best_info()?;
        let path = self.dir.join(MODEL_FILE);
        tracing::info!("Loading best model from epoch {} (acc {:.4})", info.epoch, info.accuracy);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!(
                "Cannot load checkpoint '{}'. Have you trained the model first?",
                path.display()
            ))?;
        Ok(model.load_record(record))
    }

    pub fn best_info(&self) -> Result<BestInfo> {
        let path = self.dir.join(BEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            ))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}
