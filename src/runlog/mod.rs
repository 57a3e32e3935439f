//! Structured run logs.
//!
//! Every CLI run leaves a machine-readable JSON record under
//! `logs/runs/YYYY-MM-DD/HHMMSS_<command>.json`: what ran, what it
//! touched, how it ended. The records are an audit trail, not a
//! replacement for console output.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub command: String,
    pub args: Vec<String>,
    pub paths_touched: Vec<String>,
    pub outcome: String,
    pub errors: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    pub info: BTreeMap<String, serde_json::Value>,
    pub duration_ms: u64,
}

/// Collects one run's audit data and writes it on [`RunLogger::write`].
pub struct RunLogger {
    started: Instant,
    started_at: DateTime<Utc>,
    record: RunRecord,
}

impl RunLogger {
    pub fn new(command: &str, args: &[String]) -> Self {
        let started_at = Utc::now();
        Self {
            started: Instant::now(),
            started_at,
            record: RunRecord {
                timestamp: started_at.to_rfc3339(),
                command: command.to_string(),
                args: args.to_vec(),
                paths_touched: Vec::new(),
                outcome: "pending".to_string(),
                errors: Vec::new(),
                warnings: Vec::new(),
                info: BTreeMap::new(),
                duration_ms: 0,
            },
        }
    }

    pub fn add_path(&mut self, path: &Path) {
        let display = path.display().to_string();
        if !self.record.paths_touched.contains(&display) {
            self.record.paths_touched.push(display);
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.record.errors.push(LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.record.warnings.push(LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            message: message.into(),
        });
    }

    pub fn set_info(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.record.info.insert(key.to_string(), value.into());
    }

    pub fn success(&mut self) {
        self.record.outcome = "success".to_string();
    }

    pub fn failure(&mut self, message: impl Into<String>) {
        self.record.outcome = "failure".to_string();
        self.add_error(message);
    }

    /// Write the record to `logs_dir/YYYY-MM-DD/HHMMSS_<command>.json`.
    pub fn write(mut self, logs_dir: &Path) -> Result<PathBuf> {
        self.record.duration_ms = self.started.elapsed().as_millis() as u64;

        let date_dir = logs_dir.join(self.started_at.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&date_dir).with_context(|| format!("creating {}", date_dir.display()))?;

        let path = date_dir.join(format!(
            "{}_{}.json",
            self.started_at.format("%H%M%S"),
            self.record.command
        ));
        fs::write(&path, serde_json::to_string_pretty(&self.record)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
