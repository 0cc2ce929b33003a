// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch:
//
//   stage,epoch,train_loss,valid_loss,lr
//   1,1,3.912004,3.744120,0.000000
//   2,1,3.101877,3.020551,0.000040
//
// `stage` is 1-based and `epoch` restarts at 1 in every stage.
// `lr` is the rate used for the last optimiser step of the epoch.
//
// The header is only written when the file is created, so
// repeated runs into the same output directory append.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

pub const METRICS_FILE: &str = "metrics.csv";
const HEADER: &str = "stage,epoch,train_loss,valid_loss,lr";

/// One row of metrics for a single epoch of a training stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub stage: usize,

    pub epoch: usize,

    /// Mean masked cross entropy over the training batches
    pub train_loss: f64,

    /// Mean masked cross entropy on the validation split.
    /// NaN when the validation split is empty.
    pub valid_loss: f64,

    pub lr: f64,
}

impl EpochMetrics {
    pub fn new(stage: usize, epoch: usize, train_loss: f64, valid_loss: f64, lr: f64) -> Self {
        Self { stage, epoch, train_loss, valid_loss, lr }
    }

    /// Returns true if this epoch beat the previous best valid_loss
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }
}

/// Appends epoch metrics to `<dir>/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.8}",
            m.stage, m.epoch, m.train_loss, m.valid_loss, m.lr,
        )?;

        tracing::debug!(
            "Logged stage {} epoch {}: train_loss={:.4}, valid_loss={:.4}",
            m.stage,
            m.epoch,
            m.train_loss,
            m.valid_loss,
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

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(1, 2, 2.5, 2.3, 1e-4);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
        assert!(!m.is_improvement(2.3));
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 1, 3.0, 2.5, 4e-5)).unwrap();

        // A second logger on the same directory appends without a new header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(2, 1, 2.0, 1.5, 1e-4)).unwrap();

        let content = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("1,1,3.000000,2.500000,"));
        assert!(lines[2].starts_with("2,1,2.000000,1.500000,"));
    }
}
