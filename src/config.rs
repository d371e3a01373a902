//! Analysis configuration.
//!
//! Every tunable threshold of the pipeline lives in [`AnalysisConfig`], which
//! is passed explicitly to the predictor selector and the classifier. It can
//! be loaded from a YAML file; unspecified fields take their defaults.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::normalize::CollisionPolicy;

pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f64 = 90.0;
pub const DEFAULT_MAX_PREDICTOR_RATIO: f64 = 0.5;
pub const DEFAULT_SMALL_SAMPLE_ROWS: usize = 20;
pub const DEFAULT_MIN_EXCEPTION_ROWS: usize = 2;

/// Audit and company fields left out of classification unless configured otherwise.
pub const DEFAULT_SKIP_TARGETS: &[&str] = &["CONO", "DIVI", "RGDT", "LMDT", "RGTM", "CHID"];

/// Key columns tried, in order, when joining the legacy and target datasets.
pub const JOIN_KEY_PRIORITY: &[&str] = &["ITNO", "CUNO", "SUNO", "CONO", "ORDN"];

/// Key columns used to stitch auxiliary target sections onto the primary one.
pub const SECTION_KEY_PRIORITY: &[&str] = &["CONO", "DIVI", "ITNO", "CUNO", "SUNO", "FACI", "WHLO"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Dominant-value share (percent) at or above which exception patterns are searched.
    pub high_confidence_threshold: f64,
    /// Predictors must have `distinct / rows` strictly below this ratio.
    pub max_predictor_ratio: f64,
    /// Datasets with at most this many rows skip the ratio gate.
    pub small_sample_rows: usize,
    /// Fewer exception rows than this and the classifier abstains.
    pub min_exception_rows: usize,
    /// Explicit join keys; empty means resolve automatically.
    pub join_keys: Vec<String>,
    /// Target columns excluded from classification. Setting this in a config
    /// file replaces [`DEFAULT_SKIP_TARGETS`].
    pub skip_targets: Vec<String>,
    pub header_collisions: CollisionPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            max_predictor_ratio: DEFAULT_MAX_PREDICTOR_RATIO,
            small_sample_rows: DEFAULT_SMALL_SAMPLE_ROWS,
            min_exception_rows: DEFAULT_MIN_EXCEPTION_ROWS,
            join_keys: Vec::new(),
            skip_targets: DEFAULT_SKIP_TARGETS.iter().map(|s| s.to_string()).collect(),
            header_collisions: CollisionPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: AnalysisConfig =
            serde_yaml::from_reader(reader).context("Parsing analysis config YAML")?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=100.0).contains(&self.high_confidence_threshold),
            "high_confidence_threshold must be between 0 and 100 (got {})",
            self.high_confidence_threshold
        );
        ensure!(
            self.max_predictor_ratio > 0.0 && self.max_predictor_ratio <= 1.0,
            "max_predictor_ratio must be in (0, 1] (got {})",
            self.max_predictor_ratio
        );
        ensure!(
            self.min_exception_rows >= 1,
            "min_exception_rows must be at least 1"
        );
        Ok(())
    }

    /// Whether `count` out of `total` rows reaches the high-confidence threshold.
    pub fn meets_threshold(&self, count: usize, total: usize) -> bool {
        total > 0 && (count as f64) * 100.0 >= self.high_confidence_threshold * total as f64
    }

    pub fn skips_target(&self, column: &str) -> bool {
        self.skip_targets
            .iter()
            .any(|skip| skip.trim().eq_ignore_ascii_case(column))
    }
}
