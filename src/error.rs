//! Typed errors raised by the alignment and rule-inference engine.
//!
//! Command handlers wrap these in `anyhow` with context; library callers can
//! match on the variants directly (e.g. to detect [`MinerError::NoCommonKey`]).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MinerError {
    #[error("No common key columns found between '{legacy}' and '{target}'")]
    NoCommonKey { legacy: String, target: String },

    #[error("Join key '{key}' is not present in {side} dataset '{dataset}'")]
    UnknownJoinKey {
        key: String,
        side: &'static str,
        dataset: String,
    },

    #[error(
        "Columns '{first}' and '{second}' in '{dataset}' both normalize to '{canonical}'"
    )]
    HeaderCollision {
        dataset: String,
        canonical: String,
        first: String,
        second: String,
    },

    #[error("Column '{column}' has {actual} value(s) but the record set has {expected} row(s)")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Predictor '{column}' has no encoding table")]
    MissingEncoding { column: String },

    #[error("Column '{column}' not found in aligned record set")]
    MissingColumn { column: String },

    #[error("Column '{column}' has no rows to analyze")]
    EmptyColumn { column: String },
}
