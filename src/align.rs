//! Inner join of the legacy and target datasets into one aligned record set.
//!
//! Columns keep their canonical names unless the same non-key name exists on
//! both sides, in which case the legacy copy gets [`SOURCE_SUFFIX`] and the
//! target copy [`TARGET_SUFFIX`]. Key columns appear once.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::{
    analyze,
    cli::AlignArgs,
    dataset::{Cell, Dataset, cell_text},
    error::MinerError,
    io_utils,
    join::{JoinKeys, KeyLookup, build_key, key_indices},
};

pub const SOURCE_SUFFIX: &str = "_SRC";
pub const TARGET_SUFFIX: &str = "_TGT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSide {
    Key,
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedColumn {
    name: String,
    display: String,
    side: ColumnSide,
}

impl AlignedColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with any provenance suffix removed.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn side(&self) -> ColumnSide {
        self.side
    }

    /// Key and legacy columns both carry source-row values.
    pub fn is_source(&self) -> bool {
        matches!(self.side, ColumnSide::Key | ColumnSide::Source)
    }
}

#[derive(Debug, Clone)]
pub struct AlignedRecordSet {
    keys: JoinKeys,
    columns: Vec<AlignedColumn>,
    rows: Vec<Vec<Cell>>,
    sections: Vec<String>,
    row_sections: Vec<usize>,
}

impl AlignedRecordSet {
    pub fn keys(&self) -> &JoinKeys {
        &self.keys
    }

    pub fn columns(&self) -> &[AlignedColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, idx: usize) -> &AlignedColumn {
        &self.columns[idx]
    }

    /// Legacy-side columns (keys included) in legacy column order.
    pub fn source_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_source())
            .map(|(idx, _)| idx)
    }

    /// Target-side non-key columns in target column order.
    pub fn target_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.side == ColumnSide::Target)
            .map(|(idx, _)| idx)
    }

    pub fn cells(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[column])
    }

    /// Column values with missing read as empty text.
    pub fn texts(&self, column: usize) -> Vec<&str> {
        self.cells(column).map(cell_text).collect()
    }

    pub fn section_of(&self, row: usize) -> &str {
        self.row_sections
            .get(row)
            .and_then(|idx| self.sections.get(*idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Distinct legacy sections contributing aligned rows, in first-seen order.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

/// Joins `legacy` and `target` on `keys`, keeping only matched rows.
///
/// Each target row pairs with at most one legacy row (the first unconsumed
/// match in legacy order), so the result never exceeds the smaller input.
/// Rows whose key is blank are dropped.
pub fn align(legacy: &Dataset, target: &Dataset, keys: &JoinKeys) -> Result<AlignedRecordSet, MinerError> {
    let legacy_keys = key_indices(legacy, keys.columns())?;
    let target_keys = key_indices(target, keys.columns())?;

    let target_names = target
        .columns()
        .iter()
        .filter(|c| !keys.contains(c))
        .collect::<HashSet<_>>();
    let colliding = legacy
        .columns()
        .iter()
        .filter(|c| !keys.contains(c) && target_names.contains(c))
        .cloned()
        .collect::<HashSet<_>>();

    // Names kept verbatim are reserved before any suffixed name is chosen.
    let mut taken = legacy
        .columns()
        .iter()
        .chain(target_names.iter().copied())
        .filter(|c| !colliding.contains(*c))
        .cloned()
        .collect::<HashSet<_>>();

    let mut columns = Vec::with_capacity(legacy.columns().len() + target.columns().len());
    for name in legacy.columns() {
        let (aligned, side) = if keys.contains(name) {
            (name.clone(), ColumnSide::Key)
        } else if colliding.contains(name) {
            (suffixed_name(name, SOURCE_SUFFIX, &mut taken), ColumnSide::Source)
        } else {
            (name.clone(), ColumnSide::Source)
        };
        columns.push(AlignedColumn {
            name: aligned,
            display: name.clone(),
            side,
        });
    }
    let target_columns = target
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !target_keys.contains(idx))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    for idx in &target_columns {
        let name = &target.columns()[*idx];
        let aligned = if colliding.contains(name) {
            suffixed_name(name, TARGET_SUFFIX, &mut taken)
        } else {
            name.clone()
        };
        columns.push(AlignedColumn {
            name: aligned,
            display: name.clone(),
            side: ColumnSide::Target,
        });
    }

    let lookup = KeyLookup::build(target, &target_keys);
    let mut cursors: HashMap<String, usize> = HashMap::new();
    let mut rows = Vec::new();
    let mut sections: Vec<String> = Vec::new();
    let mut row_sections = Vec::new();
    let mut blank_keys = 0usize;
    let mut surplus = 0usize;

    for (row_idx, row) in legacy.rows().iter().enumerate() {
        let Some(key) = build_key(row, &legacy_keys) else {
            blank_keys += 1;
            continue;
        };
        let matches = lookup.get(&key);
        if matches.is_empty() {
            continue;
        }
        let cursor = cursors.entry(key).or_insert(0);
        let Some(target_idx) = matches.get(*cursor) else {
            surplus += 1;
            continue;
        };
        *cursor += 1;

        let target_row = &target.rows()[*target_idx];
        let mut combined = row.clone();
        combined.extend(target_columns.iter().map(|idx| target_row[*idx].clone()));
        rows.push(combined);

        let section = legacy.section_of(row_idx);
        let section_idx = match sections.iter().position(|s| s == section) {
            Some(idx) => idx,
            None => {
                sections.push(section.to_string());
                sections.len() - 1
            }
        };
        row_sections.push(section_idx);
    }

    if blank_keys > 0 {
        warn!("Dropped {blank_keys} legacy row(s) with a blank join key");
    }
    if surplus > 0 {
        warn!("{surplus} legacy row(s) repeat a key with no remaining target row; they were not aligned");
    }
    info!(
        "Aligned {} row(s) on {} ({} legacy, {} target)",
        rows.len(),
        keys.columns().join(", "),
        legacy.row_count(),
        target.row_count()
    );

    Ok(AlignedRecordSet {
        keys: keys.clone(),
        columns,
        rows,
        sections,
        row_sections,
    })
}

/// `{name}{suffix}`, or `{name}{suffix}_{n}` when that is already taken.
fn suffixed_name(name: &str, suffix: &str, taken: &mut HashSet<String>) -> String {
    let base = format!("{name}{suffix}");
    let mut candidate = base.clone();
    let mut counter = 2usize;
    while taken.contains(&candidate) {
        candidate = format!("{base}_{counter}");
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Writes the aligned record set for inspection.
pub fn execute(args: &AlignArgs) -> Result<()> {
    let config = analyze::resolve_config(&args.sources, None)?;
    let aligned = analyze::load_aligned(&args.sources, &config)?;
    let delimiter = args.output_delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    writer
        .write_record(aligned.columns().iter().map(AlignedColumn::name))
        .context("Writing aligned headers")?;
    for (row_idx, row) in aligned.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(cell_text))
            .with_context(|| format!("Writing aligned row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing aligned output")?;
    info!(
        "Wrote {} aligned row(s) joined on {}",
        aligned.row_count(),
        aligned.keys().columns().join(", ")
    );
    Ok(())
}
