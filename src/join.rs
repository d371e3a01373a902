//! Join key resolution and hashed key lookup.
//!
//! Keys are compared as trimmed text. Composite keys are joined with an ASCII
//! unit separator so that `("A", "BC")` and `("AB", "C")` stay distinct.

use std::collections::{BTreeSet, HashMap};

use log::{info, warn};

use crate::{
    config::JOIN_KEY_PRIORITY,
    dataset::{Cell, Dataset, cell_text},
    error::MinerError,
};

const KEY_SEPARATOR: &str = "\u{1f}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Supplied by the caller.
    Explicit,
    /// Every priority key common to both datasets.
    Priority,
    /// No priority key matched; the lowest-sorting common column was used.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKeys {
    columns: Vec<String>,
    strategy: KeyStrategy,
}

impl JoinKeys {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Picks the key columns linking the legacy and target datasets.
///
/// Explicit keys win when given. Otherwise every name from
/// [`JOIN_KEY_PRIORITY`] present on both sides is used jointly; failing that,
/// the first common column in sorted order.
pub fn resolve_join_keys(
    legacy: &Dataset,
    target: &Dataset,
    explicit: &[String],
) -> Result<JoinKeys, MinerError> {
    if !explicit.is_empty() {
        let mut columns = Vec::with_capacity(explicit.len());
        for key in explicit {
            let key = key.trim().to_uppercase();
            for (side, dataset) in [("legacy", legacy), ("target", target)] {
                if !dataset.has_column(&key) {
                    return Err(MinerError::UnknownJoinKey {
                        key,
                        side,
                        dataset: dataset.name().to_string(),
                    });
                }
            }
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
        return Ok(JoinKeys {
            columns,
            strategy: KeyStrategy::Explicit,
        });
    }

    let priority = JOIN_KEY_PRIORITY
        .iter()
        .filter(|key| legacy.has_column(key) && target.has_column(key))
        .map(|key| key.to_string())
        .collect::<Vec<_>>();
    if !priority.is_empty() {
        info!("Joining on priority key(s): {}", priority.join(", "));
        return Ok(JoinKeys {
            columns: priority,
            strategy: KeyStrategy::Priority,
        });
    }

    let common = legacy
        .columns()
        .iter()
        .filter(|c| target.has_column(c))
        .collect::<BTreeSet<_>>();
    match common.into_iter().next() {
        Some(column) => {
            warn!(
                "No priority key shared by '{}' and '{}'; falling back to common column '{}'",
                legacy.name(),
                target.name(),
                column
            );
            Ok(JoinKeys {
                columns: vec![column.clone()],
                strategy: KeyStrategy::Fallback,
            })
        }
        None => Err(MinerError::NoCommonKey {
            legacy: legacy.name().to_string(),
            target: target.name().to_string(),
        }),
    }
}

pub(crate) fn key_indices(dataset: &Dataset, keys: &[String]) -> Result<Vec<usize>, MinerError> {
    keys.iter()
        .map(|name| {
            dataset
                .column_index(name)
                .ok_or_else(|| MinerError::MissingColumn {
                    column: name.clone(),
                })
        })
        .collect()
}

/// Composite key text for a row; `None` when every key part is blank.
pub(crate) fn build_key(row: &[Cell], key_indices: &[usize]) -> Option<String> {
    let parts = key_indices
        .iter()
        .map(|idx| row.get(*idx).map(cell_text).unwrap_or("").trim())
        .collect::<Vec<_>>();
    if parts.iter().all(|part| part.is_empty()) {
        None
    } else {
        Some(parts.join(KEY_SEPARATOR))
    }
}

/// Row indices of one dataset bucketed by key, in row order.
pub(crate) struct KeyLookup {
    buckets: HashMap<String, Vec<usize>>,
}

impl KeyLookup {
    pub(crate) fn build(dataset: &Dataset, key_indices: &[usize]) -> Self {
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (row_idx, row) in dataset.rows().iter().enumerate() {
            if let Some(key) = build_key(row, key_indices) {
                buckets.entry(key).or_default().push(row_idx);
            }
        }
        Self { buckets }
    }

    pub(crate) fn get(&self, key: &str) -> &[usize] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_every_common_priority_key() {
        let legacy = Dataset::from_rows("legacy", &["CONO", "ITNO", "WHLO"], &[]);
        let target = Dataset::from_rows("target", &["ITNO", "CONO", "STAT"], &[]);
        let keys = resolve_join_keys(&legacy, &target, &[]).expect("keys");
        assert_eq!(keys.columns(), ["ITNO", "CONO"]);
        assert_eq!(keys.strategy(), KeyStrategy::Priority);
    }

    #[test]
    fn resolve_falls_back_to_lowest_sorting_common_column() {
        let legacy = Dataset::from_rows("legacy", &["WHLO", "FACI", "STAT"], &[]);
        let target = Dataset::from_rows("target", &["STAT", "WHLO"], &[]);
        let keys = resolve_join_keys(&legacy, &target, &[]).expect("keys");
        assert_eq!(keys.columns(), ["STAT"]);
        assert_eq!(keys.strategy(), KeyStrategy::Fallback);
    }

    #[test]
    fn resolve_fails_without_common_columns() {
        let legacy = Dataset::from_rows("legacy", &["A"], &[]);
        let target = Dataset::from_rows("target", &["B"], &[]);
        let err = resolve_join_keys(&legacy, &target, &[]).expect_err("no key");
        assert!(matches!(err, MinerError::NoCommonKey { .. }));
    }

    #[test]
    fn resolve_validates_explicit_keys() {
        let legacy = Dataset::from_rows("legacy", &["ITNO", "WHLO"], &[]);
        let target = Dataset::from_rows("target", &["ITNO"], &[]);
        let keys = resolve_join_keys(&legacy, &target, &[" itno ".to_string()]).expect("keys");
        assert_eq!(keys.columns(), ["ITNO"]);
        assert_eq!(keys.strategy(), KeyStrategy::Explicit);

        let err = resolve_join_keys(&legacy, &target, &["WHLO".to_string()]).expect_err("missing");
        assert_eq!(
            err,
            MinerError::UnknownJoinKey {
                key: "WHLO".to_string(),
                side: "target",
                dataset: "target".to_string(),
            }
        );
    }

    #[test]
    fn build_key_trims_parts_and_skips_blank_keys() {
        let row = vec![Some(" A1 ".to_string()), None, Some("10".to_string())];
        assert_eq!(build_key(&row, &[0, 2]), Some(format!("A1{KEY_SEPARATOR}10")));
        assert_eq!(build_key(&row, &[1]), None);
        assert_eq!(build_key(&[Some("  ".to_string())], &[0]), None);
    }

    #[test]
    fn lookup_buckets_rows_in_order() {
        let dataset = Dataset::from_rows("t", &["ITNO"], &[&["A"], &["B"], &[" A"], &[""]]);
        let lookup = KeyLookup::build(&dataset, &[0]);
        assert_eq!(lookup.get("A"), [0, 2]);
        assert_eq!(lookup.get("B"), [1]);
        assert!(lookup.get("C").is_empty());
    }
}
