//! Dense integer codes for predictor values.
//!
//! Codes follow the ascending order of the value text, with missing cells
//! represented by [`MISSING_SENTINEL`]. Tables are built once per aligned
//! record set and shared by every target-column classification.

use std::collections::BTreeSet;

use crate::{
    align::AlignedRecordSet,
    dataset::Cell,
    predictors::Predictor,
};

pub const MISSING_SENTINEL: &str = "<<EMPTY>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingTable {
    values: Vec<String>,
}

impl EncodingTable {
    pub fn fit<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let values = cells
            .into_iter()
            .map(|cell| cell.as_deref().unwrap_or(MISSING_SENTINEL))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn encode(&self, cell: &Cell) -> Option<usize> {
        let text = cell.as_deref().unwrap_or(MISSING_SENTINEL);
        self.values
            .binary_search_by(|value| value.as_str().cmp(text))
            .ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }
}

/// One predictor column with its table and per-row codes.
#[derive(Debug, Clone)]
pub struct EncodedPredictor {
    pub predictor: Predictor,
    pub table: EncodingTable,
    pub codes: Vec<usize>,
}

/// Encodes every predictor over the full aligned record set.
pub fn encode_predictors(aligned: &AlignedRecordSet, predictors: &[Predictor]) -> Vec<EncodedPredictor> {
    predictors
        .iter()
        .map(|predictor| {
            let table = EncodingTable::fit(aligned.cells(predictor.column));
            let codes = aligned
                .cells(predictor.column)
                .map(|cell| table.encode(cell).unwrap_or_default())
                .collect();
            EncodedPredictor {
                predictor: predictor.clone(),
                table,
                codes,
            }
        })
        .collect()
}
