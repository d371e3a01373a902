//! Selection of legacy columns usable as categorical predictors.
//!
//! A predictor must take more than one value and must not look like an
//! identifier: its distinct-value ratio has to stay below
//! `max_predictor_ratio`, unless the sample is small enough that the ratio
//! says nothing.

use std::collections::HashSet;

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;

use crate::{
    align::{AlignedRecordSet, ColumnSide},
    analyze,
    cli::ProfileArgs,
    config::AnalysisConfig,
    report,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predictor {
    pub column: usize,
    pub name: String,
    pub display: String,
    /// Distinct non-missing values.
    pub cardinality: usize,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Selected,
    SingleValue,
    HighCardinality,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Selected => "predictor",
            Verdict::SingleValue => "single value",
            Verdict::HighCardinality => "identifier-like",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub cardinality: usize,
    pub row_count: usize,
    pub ratio: f64,
    pub verdict: Verdict,
}

/// Profiles every non-key legacy column of the aligned set.
pub fn profile_sources(aligned: &AlignedRecordSet, config: &AnalysisConfig) -> Vec<(usize, ColumnProfile)> {
    let row_count = aligned.row_count();
    aligned
        .source_columns()
        .filter(|idx| aligned.column(*idx).side() == ColumnSide::Source)
        .map(|idx| {
            let cardinality = aligned
                .cells(idx)
                .filter_map(|cell| cell.as_deref())
                .collect::<HashSet<_>>()
                .len();
            let ratio = if row_count == 0 {
                0.0
            } else {
                cardinality as f64 / row_count as f64
            };
            let verdict = if cardinality <= 1 {
                Verdict::SingleValue
            } else if ratio < config.max_predictor_ratio || row_count <= config.small_sample_rows {
                Verdict::Selected
            } else {
                Verdict::HighCardinality
            };
            let profile = ColumnProfile {
                name: aligned.column(idx).name().to_string(),
                cardinality,
                row_count,
                ratio,
                verdict,
            };
            (idx, profile)
        })
        .collect()
}

/// Legacy columns retained as predictors, in legacy column order.
pub fn select_predictors(aligned: &AlignedRecordSet, config: &AnalysisConfig) -> Vec<Predictor> {
    let profiles = profile_sources(aligned, config);
    let total = profiles.len();
    let predictors = profiles
        .into_iter()
        .filter_map(|(idx, profile)| {
            debug!(
                "Column '{}': {} distinct over {} row(s) -> {}",
                profile.name,
                profile.cardinality,
                profile.row_count,
                profile.verdict.as_str()
            );
            (profile.verdict == Verdict::Selected).then(|| Predictor {
                column: idx,
                display: aligned.column(idx).display().to_string(),
                name: profile.name,
                cardinality: profile.cardinality,
                row_count: profile.row_count,
            })
        })
        .collect::<Vec<_>>();
    info!(
        "Found {} predictor column(s) out of {} legacy column(s)",
        predictors.len(),
        total
    );
    predictors
}

pub fn execute(args: &ProfileArgs) -> Result<()> {
    let config = analyze::resolve_config(&args.sources, Some(&args.tuning))?;
    let aligned = analyze::load_aligned(&args.sources, &config)?;
    let rows = profile_sources(&aligned, &config)
        .into_iter()
        .map(|(_, profile)| {
            vec![
                profile.name,
                profile.cardinality.to_string(),
                profile.row_count.to_string(),
                format!("{:.3}", profile.ratio),
                profile.verdict.as_str().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["column", "distinct", "rows", "ratio", "verdict"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    print!("{}", report::render_table(&headers, &rows));
    Ok(())
}
