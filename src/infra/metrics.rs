// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:          the epoch number (1, 2, 3, ...)
//   - train_loss:     mean joint loss over training batches
//   - train_acc:      classifier accuracy from the soft rationale
//   - train_anti_acc: anti-classifier accuracy from the complement
//   - train_sparsity: selected / real tokens
//   - val_*:          the same, Hard sampling on held-out data
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,train_acc,train_anti_acc,train_sparsity,val_loss,val_acc,val_anti_acc,val_sparsity
//   1,1.204500,0.612000,0.540000,0.201000,1.101200,0.655000,0.523000,0.198000
//
// How to read the metrics:
//   - val_acc should rise while val_anti_acc drifts towards chance
//   - sparsity should settle near the configured target

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::metrics::RunningMetrics;

const HEADER: &str =
    "epoch,train_loss,train_acc,train_anti_acc,train_sparsity,val_loss,val_acc,val_anti_acc,val_sparsity";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub train_loss:     f64,
    pub train_acc:      f64,
    pub train_anti_acc: f64,
    pub train_sparsity: f64,
    pub val_loss:       f64,
    pub val_acc:        f64,
    pub val_anti_acc:   f64,
    pub val_sparsity:   f64,
}

impl EpochMetrics {
    pub fn from_running(epoch: usize, train: &RunningMetrics, val: &RunningMetrics) -> Self {
        Self {
            epoch,
            train_loss:     train.mean_loss(),
            train_acc:      train.accuracy(),
            train_anti_acc: train.anti_accuracy(),
            train_sparsity: train.sparsity(),
            val_loss:       val.mean_loss(),
            val_acc:        val.accuracy(),
            val_anti_acc:   val.anti_accuracy(),
            val_sparsity:   val.sparsity(),
        }
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        // Appending across runs keeps the header from the first one
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Start a new CSV, discarding rows from earlier runs.
    pub fn fresh(dir: impl AsRef<Path>) -> Result<Self> {
        let csv_path = dir.as_ref().join("metrics.csv");
        if csv_path.exists() {
            fs::remove_file(&csv_path)
                .with_context(|| format!("Cannot replace '{}'", csv_path.display()))?;
        }
        Self::new(dir)
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss, m.train_acc, m.train_anti_acc, m.train_sparsity,
            m.val_loss,   m.val_acc,   m.val_anti_acc,   m.val_sparsity,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_acc={:.4}",
            m.epoch, m.train_loss, m.val_acc,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::BatchTally;

    fn sample(epoch: usize, val_acc: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.0, train_acc: 0.5, train_anti_acc: 0.5, train_sparsity: 0.2,
            val_loss: 0.9, val_acc, val_anti_acc: 0.5, val_sparsity: 0.2,
        }
    }

    #[test]
    fn test_from_running() {
        let mut train = RunningMetrics::new();
        train.update(BatchTally { examples: 4, correct: 3, anti_correct: 1, selected: 5, valid_tokens: 20, loss: 0.8 });
        let mut val = RunningMetrics::new();
        val.update(BatchTally { examples: 2, correct: 2, anti_correct: 1, selected: 2, valid_tokens: 10, loss: 0.4 });

        let m = EpochMetrics::from_running(3, &train, &val);
        assert_eq!(m.epoch, 3);
        assert!((m.train_acc - 0.75).abs() < 1e-12);
        assert!((m.train_sparsity - 0.25).abs() < 1e-12);
        assert!((m.val_acc - 1.0).abs() < 1e-12);
        assert!((m.val_anti_acc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_csv_rows_append_under_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&sample(1, 0.6)).unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&sample(2, 0.7)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("1,1.000000,0.500000"));
        assert!(lines[2].starts_with("2,"));
        assert_eq!(lines[2].split(',').count(), 9);
    }

    #[test]
    fn test_fresh_logger_drops_earlier_rows() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&sample(1, 0.6)).unwrap();

        let logger = MetricsLogger::fresh(dir.path()).unwrap();
        logger.log(&sample(1, 0.8)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER);
    }
}
