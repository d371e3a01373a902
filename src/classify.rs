//! Per-field rule inference.
//!
//! Each target column runs through an ordered cascade and the first rule that
//! applies wins:
//!
//! 1. **CONST**: one value on every row.
//! 2. **DIRECT**: equal, row for row, to a legacy column.
//! 3. **LOGIC**: a dominant value whose exceptions line up with one
//!    predictor category. When no such pattern can be established the result
//!    is tagged **DOMINANT** instead, with the reason it abstained.
//! 4. **UNKNOWN**: too variable for a simple rule.
//!
//! The aligned record set and the encoded predictors are read-only here, so
//! columns can be classified independently of each other.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    align::AlignedRecordSet,
    config::AnalysisConfig,
    dataset::cell_text,
    encoder::{EncodedPredictor, MISSING_SENTINEL, encode_predictors},
    error::MinerError,
    frequency::ValueDistribution,
    predictors::select_predictors,
    stump::fit_split,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleKind {
    Const,
    Direct,
    Logic,
    /// Dominant value without an explained exception pattern.
    Dominant,
    Unknown,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Const => "CONST",
            RuleKind::Direct => "DIRECT",
            RuleKind::Logic => "LOGIC",
            RuleKind::Dominant => "DOMINANT",
            RuleKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
    NoPredictors,
    FewExceptions { found: usize, required: usize },
    NoInformativeSplit,
}

impl fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstainReason::NoPredictors => write!(f, "no predictor columns available"),
            AbstainReason::FewExceptions { found, required } => {
                write!(f, "{found} exception row(s), at least {required} needed")
            }
            AbstainReason::NoInformativeSplit => {
                write!(f, "no predictor separates the exceptions")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionPattern {
    /// Predictor name with any provenance suffix removed.
    pub feature: String,
    /// Most frequent predictor value among the exception rows.
    pub cause: String,
    /// Category the fitted split isolates.
    pub split_value: String,
    pub exception_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAnalysis {
    target: String,
    kind: RuleKind,
    confidence: f64,
    explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dominant_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<ExceptionPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abstained: Option<AbstainReason>,
}

impl FieldAnalysis {
    fn new(target: &str, kind: RuleKind, confidence: f64, explanation: String) -> Self {
        Self {
            target: target.to_string(),
            kind,
            confidence,
            explanation,
            source_column: None,
            dominant_value: None,
            pattern: None,
            abstained: None,
        }
    }

    fn failed(target: &str, err: &MinerError) -> Self {
        Self::new(
            target,
            RuleKind::Unknown,
            0.0,
            format!("Analysis failed: {err}"),
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Percentage in `[0, 100]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn source_column(&self) -> Option<&str> {
        self.source_column.as_deref()
    }

    pub fn dominant_value(&self) -> Option<&str> {
        self.dominant_value.as_deref()
    }

    pub fn pattern(&self) -> Option<&ExceptionPattern> {
        self.pattern.as_ref()
    }

    pub fn abstained(&self) -> Option<AbstainReason> {
        self.abstained
    }
}

pub struct FieldClassifier<'a> {
    aligned: &'a AlignedRecordSet,
    predictors: &'a [EncodedPredictor],
    config: &'a AnalysisConfig,
}

impl<'a> FieldClassifier<'a> {
    pub fn new(
        aligned: &'a AlignedRecordSet,
        predictors: &'a [EncodedPredictor],
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            aligned,
            predictors,
            config,
        }
    }

    pub fn classify_named(&self, column: &str) -> Result<FieldAnalysis, MinerError> {
        let idx = self
            .aligned
            .column_index(column)
            .ok_or_else(|| MinerError::MissingColumn {
                column: column.to_string(),
            })?;
        self.classify(idx)
    }

    /// Classifies every target column not skipped by the configuration.
    ///
    /// A column whose analysis fails is reported as UNKNOWN with the error
    /// message; the remaining columns are still classified.
    pub fn classify_all(&self) -> Vec<FieldAnalysis> {
        self.aligned
            .target_columns()
            .filter(|idx| !self.config.skips_target(self.aligned.column(*idx).display()))
            .map(|idx| {
                let target = self.aligned.column(idx).display();
                match self.classify(idx) {
                    Ok(analysis) => analysis,
                    Err(err) => {
                        warn!("Could not classify '{target}': {err}");
                        FieldAnalysis::failed(target, &err)
                    }
                }
            })
            .collect()
    }

    pub fn classify(&self, column: usize) -> Result<FieldAnalysis, MinerError> {
        let target = self.aligned.column(column).display();
        let values = self.aligned.texts(column);
        let total = values.len();
        if total == 0 {
            return Err(MinerError::EmptyColumn {
                column: target.to_string(),
            });
        }
        for encoded in self.predictors {
            if encoded.codes.len() != total {
                return Err(MinerError::ColumnLengthMismatch {
                    column: encoded.predictor.name.clone(),
                    expected: total,
                    actual: encoded.codes.len(),
                });
            }
        }

        let distribution = ValueDistribution::from_values(values.iter().copied());
        let Some((dominant, count)) = distribution.dominant() else {
            return Err(MinerError::EmptyColumn {
                column: target.to_string(),
            });
        };
        let share = distribution.percent(count);

        if count == total {
            debug!("'{target}' is constant '{dominant}'");
            let mut analysis = FieldAnalysis::new(
                target,
                RuleKind::Const,
                100.0,
                format!("Value is '{dominant}'"),
            );
            analysis.dominant_value = Some(dominant.to_string());
            return Ok(analysis);
        }

        let (best_source, best_matches) = self.best_direct_source(&values);
        if let Some(source) = best_source
            && best_matches == total
        {
            debug!("'{target}' copies '{source}'");
            let mut analysis = FieldAnalysis::new(
                target,
                RuleKind::Direct,
                100.0,
                format!("Copy from {source}"),
            );
            analysis.source_column = Some(source.to_string());
            return Ok(analysis);
        }

        if self.config.meets_threshold(count, total) {
            return self.explain_exceptions(target, &values, dominant, share);
        }

        let mut explanation =
            "Too variable for a simple rule; requires explicit manual mapping".to_string();
        if let Some(source) = best_source {
            explanation.push_str(&format!(
                " (closest source {source} matches {:.1}% of rows)",
                distribution.percent(best_matches)
            ));
        }
        debug!(
            "'{target}' is unexplained at {share:.1}% over {} distinct value(s)",
            distribution.distinct()
        );
        let mut analysis = FieldAnalysis::new(target, RuleKind::Unknown, share, explanation);
        analysis.dominant_value = Some(dominant.to_string());
        Ok(analysis)
    }

    /// Legacy column equal to the target on the most rows; ties keep the
    /// earliest column. Missing equals missing.
    fn best_direct_source(&self, values: &[&str]) -> (Option<&'a str>, usize) {
        let mut best: Option<&'a str> = None;
        let mut best_matches = 0usize;
        for idx in self.aligned.source_columns() {
            let matches = self
                .aligned
                .cells(idx)
                .zip(values)
                .filter(|(cell, value)| cell_text(cell) == **value)
                .count();
            if matches > best_matches {
                best_matches = matches;
                best = Some(self.aligned.column(idx).display());
            }
        }
        (best, best_matches)
    }

    fn explain_exceptions(
        &self,
        target: &str,
        values: &[&str],
        dominant: &str,
        share: f64,
    ) -> Result<FieldAnalysis, MinerError> {
        let labels = values.iter().map(|v| *v != dominant).collect::<Vec<_>>();
        let exceptions = labels.iter().filter(|label| **label).count();

        let reason = if self.predictors.is_empty() {
            Some(AbstainReason::NoPredictors)
        } else if exceptions < self.config.min_exception_rows {
            Some(AbstainReason::FewExceptions {
                found: exceptions,
                required: self.config.min_exception_rows,
            })
        } else {
            None
        };
        if let Some(reason) = reason {
            return Ok(abstain(target, dominant, share, reason));
        }

        let Some(split) = fit_split(self.predictors, &labels) else {
            return Ok(abstain(
                target,
                dominant,
                share,
                AbstainReason::NoInformativeSplit,
            ));
        };
        let encoded = &self.predictors[split.feature];
        let missing = || MinerError::MissingEncoding {
            column: encoded.predictor.name.clone(),
        };
        let split_value = as_text(encoded.table.decode(split.code).ok_or_else(missing)?);

        let mut causes = ValueDistribution::default();
        for (code, label) in encoded.codes.iter().zip(&labels) {
            if *label {
                causes.ingest(as_text(encoded.table.decode(*code).ok_or_else(missing)?));
            }
        }
        let (cause, _) = causes.dominant().ok_or_else(missing)?;
        let feature = encoded.predictor.display.clone();
        debug!(
            "'{target}' exceptions split on {feature} == '{split_value}' (gain {:.4})",
            split.gain
        );

        let mut analysis = FieldAnalysis::new(
            target,
            RuleKind::Logic,
            share,
            format!("Mostly '{dominant}'; exceptions correlate with {feature} == '{cause}'"),
        );
        analysis.dominant_value = Some(dominant.to_string());
        analysis.pattern = Some(ExceptionPattern {
            feature,
            cause: cause.to_string(),
            split_value: split_value.to_string(),
            exception_rows: exceptions,
        });
        Ok(analysis)
    }
}

/// Decoded predictor value with missing read as empty text.
fn as_text(decoded: &str) -> &str {
    if decoded == MISSING_SENTINEL { "" } else { decoded }
}

fn abstain(target: &str, dominant: &str, share: f64, reason: AbstainReason) -> FieldAnalysis {
    debug!("'{target}' abstains: {reason}");
    let mut analysis = FieldAnalysis::new(
        target,
        RuleKind::Dominant,
        share,
        format!("Mostly '{dominant}'; no discriminating pattern found ({reason})"),
    );
    analysis.dominant_value = Some(dominant.to_string());
    analysis.abstained = Some(reason);
    analysis
}

/// Selects and encodes predictors once, then classifies every target column.
pub fn infer_rules(aligned: &AlignedRecordSet, config: &AnalysisConfig) -> Vec<FieldAnalysis> {
    let predictors = select_predictors(aligned, config);
    let encoded = encode_predictors(aligned, &predictors);
    FieldClassifier::new(aligned, &encoded, config).classify_all()
}
