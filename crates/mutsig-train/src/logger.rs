//! Training loggers.
//!
//! The trainer reports a `TrainingRecord` every `log_freq` steps to an
//! injected `TrainingLogger`. Reporting is a side effect: a logger failure
//! is surfaced to the caller but never changes what was trained.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Losses and quality metrics at one training step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub step: usize,
    pub epoch: usize,
    pub reg_weight: f64,
    pub train_loss: f32,
    pub train_reconstruction: f32,
    pub train_kl: f32,
    pub val_loss: f32,
    pub val_reconstruction: f32,
    pub val_kl: f32,
    /// Mean Jensen–Shannon divergence between validation inputs and
    /// their reconstructions
    pub val_js: f64,
}

pub trait TrainingLogger: Send + Sync {
    fn log(&self, record: &TrainingRecord) -> Result<()>;
}

/// Emits structured `tracing` events.
pub struct TracingLogger;

impl TrainingLogger for TracingLogger {
    fn log(&self, r: &TrainingRecord) -> Result<()> {
        info!(
            step = r.step,
            epoch = r.epoch,
            reg_weight = r.reg_weight,
            train_loss = r.train_loss,
            val_loss = r.val_loss,
            val_js = r.val_js,
            "generator training"
        );
        Ok(())
    }
}

/// Discards every record.
pub struct NullLogger;

impl TrainingLogger for NullLogger {
    fn log(&self, _record: &TrainingRecord) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    record: &'a TrainingRecord,
}

/// Appends one JSON object per record to a file, tagged with a run id.
pub struct JsonLinesLogger {
    path: PathBuf,
    run_id: Uuid,
}

impl JsonLinesLogger {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        Ok(Self {
            path,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrainingLogger for JsonLinesLogger {
    fn log(&self, record: &TrainingRecord) -> Result<()> {
        let line = serde_json::to_string(&JsonLine {
            run_id: self.run_id,
            timestamp: Utc::now(),
            record,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening training log {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Forwards every record to each inner logger in turn.
pub struct MultiLogger {
    loggers: Vec<Box<dyn TrainingLogger>>,
}

impl MultiLogger {
    pub fn new(loggers: Vec<Box<dyn TrainingLogger>>) -> Self {
        Self { loggers }
    }
}

impl TrainingLogger for MultiLogger {
    fn log(&self, record: &TrainingRecord) -> Result<()> {
        for logger in &self.loggers {
            logger.log(record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: usize) -> TrainingRecord {
        TrainingRecord {
            step,
            epoch: 0,
            reg_weight: 1.0,
            train_loss: 0.5,
            train_reconstruction: 0.25,
            train_kl: 0.25,
            val_loss: 0.6,
            val_reconstruction: 0.3,
            val_kl: 0.3,
            val_js: 0.1,
        }
    }

    #[test]
    fn test_json_lines_appends_with_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonLinesLogger::new(dir.path().join("logs").join("train.jsonl")).unwrap();
        logger.log(&record(0)).unwrap();
        logger.log(&record(100)).unwrap();

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["step"], 100);
        assert_eq!(lines[0]["run_id"], logger.run_id().to_string());
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn test_multi_logger_fans_out() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        let multi = MultiLogger::new(vec![
            Box::new(JsonLinesLogger::new(&a).unwrap()),
            Box::new(NullLogger),
            Box::new(JsonLinesLogger::new(&b).unwrap()),
        ]);
        multi.log(&record(5)).unwrap();

        assert_eq!(std::fs::read_to_string(a).unwrap().lines().count(), 1);
        assert_eq!(std::fs::read_to_string(b).unwrap().lines().count(), 1);
    }
}
