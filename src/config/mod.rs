//! Repository configuration.
//!
//! Settings live in `config.json` at the repository root. Every field has
//! a default, so a missing file or sparse JSON degrades to a fully-usable
//! configuration instead of an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::extract::{ExtractorConfig, NumberFormat};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub broker: String,
    pub base_currency: String,
    pub portfolio_raw_dir: String,
    pub snapshots_dir: String,
    pub exports_dir: String,
    pub logs_dir: String,
    pub min_text_len: usize,
    pub holdings_anchors: Vec<String>,
    pub section_terminators: Vec<String>,
    pub cash_keywords: Vec<String>,
    pub number_format: NumberFormat,
}

impl Default for Config {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            version: "1.0.0".to_string(),
            broker: "Trade Republic".to_string(),
            base_currency: extractor.default_currency,
            portfolio_raw_dir: "portfolio/raw".to_string(),
            snapshots_dir: "portfolio/snapshots".to_string(),
            exports_dir: "portfolio/exports".to_string(),
            logs_dir: "logs/runs".to_string(),
            min_text_len: extractor.min_text_len,
            holdings_anchors: extractor.holdings_anchors,
            section_terminators: extractor.section_terminators,
            cash_keywords: extractor.cash_keywords,
            number_format: extractor.number_format,
        }
    }
}

impl Config {
    /// Load `config.json` from the repository root. A missing file yields
    /// the defaults; a present but unparsable file is an error.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// The engine's view of this configuration.
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            holdings_anchors: self.holdings_anchors.clone(),
            section_terminators: self.section_terminators.clone(),
            cash_keywords: self.cash_keywords.clone(),
            default_currency: self.base_currency.clone(),
            number_format: self.number_format,
            min_text_len: self.min_text_len,
        }
    }

    pub fn raw_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.portfolio_raw_dir)
    }

    pub fn snapshots_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.snapshots_dir)
    }

    pub fn exports_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.exports_dir)
    }

    pub fn logs_dir(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.logs_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_currency, "EUR");
        assert_eq!(config.broker, "Trade Republic");
        assert_eq!(config.min_text_len, 100);
        assert_eq!(config.number_format, NumberFormat::Auto);
        assert!(!config.holdings_anchors.is_empty());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.base_currency, "EUR");
    }

    #[test]
    fn test_sparse_json_keeps_defaults_for_absent_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "base_currency": "CHF", "number_format": "decimal_comma" }"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.base_currency, "CHF");
        assert_eq!(config.number_format, NumberFormat::DecimalComma);
        assert_eq!(config.snapshots_dir, "portfolio/snapshots");
    }

    #[test]
    fn test_broken_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_extractor_config_projection() {
        let mut config = Config::default();
        config.base_currency = "USD".to_string();
        config.min_text_len = 50;
        let extractor = config.extractor_config();
        assert_eq!(extractor.default_currency, "USD");
        assert_eq!(extractor.min_text_len, 50);
    }
}
