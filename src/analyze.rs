//! Shared command plumbing: configuration resolution, loading, alignment.

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{debug, info};

use crate::{
    align::{AlignedRecordSet, align},
    classify::infer_rules,
    cli::{AnalyzeArgs, SourceArgs, TuningArgs},
    config::AnalysisConfig,
    ingest::{LoadOptions, load_legacy, load_target},
    io_utils,
    join::resolve_join_keys,
    report,
};

/// Config file values, then CLI overrides, validated together.
pub fn resolve_config(sources: &SourceArgs, tuning: Option<&TuningArgs>) -> Result<AnalysisConfig> {
    let mut config = match &sources.config {
        Some(path) => {
            AnalysisConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => AnalysisConfig::default(),
    };
    let keys = clean_list(&sources.keys);
    if !keys.is_empty() {
        config.join_keys = keys;
    }
    if let Some(policy) = sources.header_collisions {
        config.header_collisions = policy;
    }
    if let Some(tuning) = tuning {
        if let Some(threshold) = tuning.threshold {
            config.high_confidence_threshold = threshold;
        }
        if let Some(ratio) = tuning.max_ratio {
            config.max_predictor_ratio = ratio;
        }
        if let Some(rows) = tuning.small_sample {
            config.small_sample_rows = rows;
        }
        config.skip_targets.extend(clean_list(&tuning.skip));
    }
    config.validate().context("Validating analysis settings")?;
    debug!("Analysis settings: {config:?}");
    Ok(config)
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads both sides and joins them.
pub fn load_aligned(sources: &SourceArgs, config: &AnalysisConfig) -> Result<AlignedRecordSet> {
    let options = LoadOptions {
        delimiter: sources.delimiter,
        encoding: io_utils::resolve_encoding(sources.input_encoding.as_deref())?,
        layout: sources.layout,
        collisions: config.header_collisions,
    };
    let legacy = load_legacy(&sources.legacy, sources.legacy_sheet.as_deref(), &options)
        .with_context(|| format!("Loading legacy data from {:?}", sources.legacy))?;
    let target = load_target(
        &sources.target,
        sources.target_sheet.as_deref(),
        &sources.merge_sheets,
        &options,
    )
    .with_context(|| format!("Loading target data from {:?}", sources.target))?;

    let keys = resolve_join_keys(&legacy, &target, &config.join_keys)?;
    info!(
        "Joining on {} ({:?})",
        keys.columns().join(", "),
        keys.strategy()
    );
    let aligned = align(&legacy, &target, &keys)?;
    if aligned.is_empty() {
        bail!(
            "No rows of {:?} and {:?} share a value for {}",
            sources.legacy,
            sources.target,
            keys.columns().join(", ")
        );
    }
    Ok(aligned)
}

pub fn execute(args: &AnalyzeArgs) -> Result<()> {
    let config = resolve_config(&args.sources, Some(&args.tuning))?;
    let aligned = load_aligned(&args.sources, &config)?;
    let results = infer_rules(&aligned, &config);
    let summary = report::summarize(&results)
        .into_iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .join(" ");
    info!("Classified {} field(s): {summary}", results.len());
    let sheet = aligned.sections().iter().join("+");
    report::write_report(&sheet, &results, args.format, args.output.as_deref())
        .context("Writing analysis report")?;
    if let Some(path) = &args.output {
        info!("Report written to {path:?}");
    }
    Ok(())
}
