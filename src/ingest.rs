//! Loading legacy and target tables from delimited files or workbooks.
//!
//! A source is made of one or more *sections*: the single table of a CSV file,
//! or one worksheet of a workbook. Target workbooks in the structured
//! (multi-metadata) layout carry two descriptive rows under the header, which
//! are skipped. Several target sections can be stitched onto a primary one
//! with a left join on shared business keys.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use chrono::{NaiveDate, TimeDelta};
use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::SECTION_KEY_PRIORITY,
    dataset::{Cell, Dataset, to_cell},
    error::MinerError,
    io_utils,
    join::{KeyLookup, build_key, key_indices},
    normalize::{CollisionPolicy, NamingConvention, canonicalize_headers},
};

/// Header that marks a section as using the structured layout.
const STRUCTURED_MARKER: &str = "MESSAGE";
/// Descriptive rows under the header of a structured section.
const STRUCTURED_PREAMBLE_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Detect per section from the header row.
    #[default]
    Auto,
    Flat,
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Flat,
    Structured,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub layout: LayoutMode,
    pub collisions: CollisionPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            layout: LayoutMode::Auto,
            collisions: CollisionPolicy::Warn,
        }
    }
}

/// One physical table before header normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSection {
    pub fn detect_layout(&self) -> Layout {
        if self
            .headers
            .iter()
            .any(|h| h.trim().eq_ignore_ascii_case(STRUCTURED_MARKER))
        {
            Layout::Structured
        } else {
            Layout::Flat
        }
    }

    /// Drops blank rows, then the descriptive rows of a structured section.
    pub fn apply_layout(mut self, layout: Layout) -> Self {
        self.rows.retain(|row| row.iter().any(Option::is_some));
        if layout == Layout::Structured {
            if self.rows.len() > STRUCTURED_PREAMBLE_ROWS {
                self.rows.drain(..STRUCTURED_PREAMBLE_ROWS);
            } else {
                self.rows.clear();
            }
        }
        self
    }

    pub fn into_dataset(
        self,
        dataset_name: &str,
        convention: NamingConvention,
        collisions: CollisionPolicy,
    ) -> Result<Dataset, MinerError> {
        let (columns, names) =
            canonicalize_headers(dataset_name, &self.headers, convention, collisions)?;
        let mut dataset = Dataset::new(dataset_name, columns, names);
        for row in self.rows {
            dataset.push_row(row, &self.name);
        }
        Ok(dataset)
    }
}

fn resolve_layout(mode: LayoutMode, section: &RawSection, section_count: usize) -> Layout {
    match mode {
        LayoutMode::Flat => Layout::Flat,
        LayoutMode::Structured => Layout::Structured,
        LayoutMode::Auto if section_count <= 1 => Layout::Flat,
        LayoutMode::Auto => section.detect_layout(),
    }
}

/// A readable source: either a delimited file or an open workbook.
pub enum Source {
    Delimited { path: std::path::PathBuf, label: String },
    Workbook {
        path: std::path::PathBuf,
        book: Sheets<BufReader<File>>,
        sheets: Vec<String>,
    },
}

impl Source {
    pub fn open(path: &Path) -> Result<Self> {
        if io_utils::is_workbook(path) {
            let book: Sheets<BufReader<File>> = open_workbook_auto(path)
                .with_context(|| format!("Opening workbook {path:?}"))?;
            let sheets = book.sheet_names().to_vec();
            if sheets.is_empty() {
                bail!("Workbook {path:?} contains no sheets");
            }
            Ok(Source::Workbook {
                path: path.to_path_buf(),
                book,
                sheets,
            })
        } else {
            Ok(Source::Delimited {
                path: path.to_path_buf(),
                label: io_utils::section_label(path),
            })
        }
    }

    pub fn section_count(&self) -> usize {
        match self {
            Source::Delimited { .. } => 1,
            Source::Workbook { sheets, .. } => sheets.len(),
        }
    }

    /// Reads a section by name; `None` selects the first section.
    pub fn read_section(&mut self, name: Option<&str>, options: &LoadOptions) -> Result<RawSection> {
        match self {
            Source::Delimited { path, label } => {
                if let Some(name) = name
                    && name != label.as_str()
                {
                    warn!("{path:?} is a delimited file with a single section; ignoring sheet '{name}'");
                }
                read_delimited(path, label, options)
            }
            Source::Workbook { path, book, sheets } => {
                let sheet = match name {
                    Some(name) => sheets
                        .iter()
                        .find(|s| s.as_str() == name || s.eq_ignore_ascii_case(name))
                        .cloned()
                        .ok_or_else(|| {
                            anyhow!(
                                "Sheet '{name}' not found in {path:?} (available: {})",
                                sheets.join(", ")
                            )
                        })?,
                    None => sheets[0].clone(),
                };
                read_sheet(book, &sheet).with_context(|| format!("Reading sheet '{sheet}' from {path:?}"))
            }
        }
    }
}

fn read_delimited(path: &Path, label: &str, options: &LoadOptions) -> Result<RawSection> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {} in {path:?}", row_idx + 2))?;
        rows.push(decoded.iter().map(|v| to_cell(v)).collect());
    }
    Ok(RawSection {
        name: label.to_string(),
        headers,
        rows,
    })
}

fn read_sheet(book: &mut Sheets<BufReader<File>>, sheet: &str) -> Result<RawSection> {
    let range = book.worksheet_range(sheet)?;
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| {
            row.iter()
                .map(|cell| data_text(cell).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let rows = rows
        .map(|row| row.iter().map(data_text).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    Ok(RawSection {
        name: sheet.to_string(),
        headers,
        rows,
    })
}

/// Renders a workbook cell as text. Integers lose their `.0`.
fn data_text(cell: &Data) -> Cell {
    match cell {
        Data::Empty => None,
        Data::String(s) => to_cell(s),
        Data::Float(n) => Some(if n.fract() == 0.0 && n.abs() < 1e15 {
            format!("{}", *n as i64)
        } else {
            format!("{n}")
        }),
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Some(format!("#{e:?}")),
        Data::DateTime(dt) => {
            Some(excel_serial_text(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string()))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => to_cell(s),
    }
}

/// ISO text for an Excel serial date (1900 date system). Whole days render
/// as a bare date.
fn excel_serial_text(serial: f64) -> Option<String> {
    const MILLIS_PER_DAY: i64 = 86_400_000;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * MILLIS_PER_DAY as f64).round() as i64;
    let moment = epoch.checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
    Some(if millis % MILLIS_PER_DAY == 0 {
        moment.format("%Y-%m-%d").to_string()
    } else {
        moment.format("%Y-%m-%d %H:%M:%S").to_string()
    })
}

/// Loads the legacy table from one section, stripping module prefixes.
pub fn load_legacy(path: &Path, sheet: Option<&str>, options: &LoadOptions) -> Result<Dataset> {
    let mut source = Source::open(path)?;
    let section = source.read_section(sheet, options)?;
    let layout = resolve_layout(options.layout, &section, source.section_count());
    debug!("Legacy section '{}' uses {:?} layout", section.name, layout);
    let name = dataset_name(path, &section.name);
    let dataset = section
        .apply_layout(layout)
        .into_dataset(&name, NamingConvention::Legacy, options.collisions)?;
    info!(
        "Loaded legacy '{}' with {} row(s) and {} column(s)",
        dataset.name(),
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(dataset)
}

/// Loads the target table from a primary section plus stitched auxiliaries.
///
/// Auxiliary sections that cannot be read or share no stitching key are
/// skipped with a warning.
pub fn load_target(
    path: &Path,
    primary: Option<&str>,
    auxiliaries: &[String],
    options: &LoadOptions,
) -> Result<Dataset> {
    let mut source = Source::open(path)?;
    if !auxiliaries.is_empty() && source.section_count() <= 1 {
        bail!("{path:?} has a single section; there is nothing to merge");
    }
    let section_count = source.section_count();
    let section = source.read_section(primary, options)?;
    let layout = resolve_layout(options.layout, &section, section_count);
    debug!("Target section '{}' uses {:?} layout", section.name, layout);
    let name = dataset_name(path, &section.name);
    let primary_name = section.name.clone();
    let base = section
        .apply_layout(layout)
        .into_dataset(&name, NamingConvention::Plain, options.collisions)?;

    let mut extra = Vec::with_capacity(auxiliaries.len());
    for aux in auxiliaries {
        if aux.eq_ignore_ascii_case(&primary_name) {
            continue;
        }
        let loaded = source.read_section(Some(aux), options).and_then(|section| {
            let layout = resolve_layout(options.layout, &section, section_count);
            let section_name = section.name.clone();
            Ok(section.apply_layout(layout).into_dataset(
                &section_name,
                NamingConvention::Plain,
                options.collisions,
            )?)
        });
        match loaded {
            Ok(dataset) => extra.push(dataset),
            Err(err) => warn!("Skipping section '{aux}': {err:#}"),
        }
    }

    let dataset = stitch_sections(base, extra)?;
    info!(
        "Loaded target '{}' with {} row(s) and {} column(s)",
        dataset.name(),
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(dataset)
}

fn dataset_name(path: &Path, section: &str) -> String {
    let label = io_utils::section_label(path);
    if label == section {
        label
    } else {
        format!("{label}:{section}")
    }
}

/// Left-joins each auxiliary section onto the primary one.
///
/// Keys are the names from the section key priority list present on both
/// sides. Colliding non-key columns from an auxiliary are suffixed with its
/// name; primary rows are always preserved.
pub fn stitch_sections(primary: Dataset, auxiliaries: Vec<Dataset>) -> Result<Dataset, MinerError> {
    let mut accumulator = primary;
    for aux in auxiliaries {
        let keys = SECTION_KEY_PRIORITY
            .iter()
            .filter(|key| accumulator.has_column(key) && aux.has_column(key))
            .map(|key| key.to_string())
            .collect::<Vec<_>>();
        if keys.is_empty() {
            warn!(
                "Section '{}' shares no key with '{}'; skipping it",
                aux.name(),
                accumulator.name()
            );
            continue;
        }
        accumulator = left_join(&accumulator, &aux, &keys)?;
        info!(
            "Merged section '{}' on {} ({} row(s))",
            aux.name(),
            keys.join(", "),
            accumulator.row_count()
        );
    }
    Ok(accumulator)
}

fn left_join(left: &Dataset, right: &Dataset, keys: &[String]) -> Result<Dataset, MinerError> {
    let left_keys = key_indices(left, keys)?;
    let right_keys = key_indices(right, keys)?;
    let lookup = KeyLookup::build(right, &right_keys);

    let mut columns = left.columns().to_vec();
    let mut names = left.names().clone();
    let mut right_columns = Vec::new();
    for (idx, name) in right.columns().iter().enumerate() {
        if right_keys.contains(&idx) {
            continue;
        }
        let mut candidate = name.clone();
        if columns.contains(&candidate) {
            let base = format!("{name}_{}", right.name());
            candidate = base.clone();
            let mut counter = 2usize;
            while columns.contains(&candidate) {
                candidate = format!("{base}_{counter}");
                counter += 1;
            }
        }
        names.insert(candidate.clone(), right.names().original(name).to_string());
        columns.push(candidate);
        right_columns.push(idx);
    }

    let mut joined = Dataset::new(left.name(), columns, names);
    for (row_idx, row) in left.rows().iter().enumerate() {
        let section = left.section_of(row_idx);
        let matches = build_key(row, &left_keys)
            .map(|key| lookup.get(&key))
            .unwrap_or(&[]);
        if matches.is_empty() {
            joined.push_row(row.clone(), section);
            continue;
        }
        for right_idx in matches {
            let right_row = &right.rows()[*right_idx];
            let mut combined = row.clone();
            combined.extend(right_columns.iter().map(|idx| right_row[*idx].clone()));
            joined.push_row(combined, section);
        }
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawSection {
        RawSection {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| to_cell(v)).collect())
                .collect(),
        }
    }

    #[test]
    fn structured_layout_detected_from_message_column() {
        let section = raw("MMS001", &["message", "ITNO"], &[]);
        assert_eq!(section.detect_layout(), Layout::Structured);
        let flat = raw("MMS001", &["ITNO", "STAT"], &[]);
        assert_eq!(flat.detect_layout(), Layout::Flat);
    }

    #[test]
    fn structured_layout_skips_two_descriptive_rows() {
        let section = raw(
            "API",
            &["MESSAGE", "ITNO"],
            &[&["", "Item number"], &["", "15"], &["", "A1"], &["", "A2"]],
        );
        let applied = section.apply_layout(Layout::Structured);
        assert_eq!(applied.rows.len(), 2);
        assert_eq!(applied.rows[0][1].as_deref(), Some("A1"));
    }

    #[test]
    fn structured_preamble_counts_only_rows_with_values() {
        let section = raw(
            "API",
            &["MESSAGE", "ITNO"],
            &[&["", ""], &["", "Item number"], &["", "15"], &["", "A1"]],
        );
        let applied = section.apply_layout(Layout::Structured);
        assert_eq!(applied.rows.len(), 1);
        assert_eq!(applied.rows[0][1].as_deref(), Some("A1"));
    }

    #[test]
    fn structured_section_with_only_preamble_is_empty() {
        let section = raw("API", &["MESSAGE", "ITNO"], &[&["", "desc"], &["", "len"]]);
        let applied = section.apply_layout(Layout::Structured);
        assert!(applied.rows.is_empty());
        assert_eq!(applied.headers.len(), 2);
    }

    #[test]
    fn single_section_sources_are_always_flat() {
        let section = raw("API", &["MESSAGE", "ITNO"], &[]);
        assert_eq!(resolve_layout(LayoutMode::Auto, &section, 1), Layout::Flat);
        assert_eq!(resolve_layout(LayoutMode::Auto, &section, 3), Layout::Structured);
        assert_eq!(resolve_layout(LayoutMode::Flat, &section, 3), Layout::Flat);
    }

    #[test]
    fn data_text_formats_numbers_without_trailing_zero() {
        assert_eq!(data_text(&Data::Float(10.0)), Some("10".to_string()));
        assert_eq!(data_text(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(data_text(&Data::Int(7)), Some("7".to_string()));
        assert_eq!(data_text(&Data::Bool(true)), Some("TRUE".to_string()));
        assert_eq!(data_text(&Data::String(String::new())), None);
        assert_eq!(data_text(&Data::Empty), None);
    }

    #[test]
    fn excel_serial_dates_render_as_iso_text() {
        assert_eq!(excel_serial_text(45292.0).as_deref(), Some("2024-01-01"));
        assert_eq!(
            excel_serial_text(45292.5).as_deref(),
            Some("2024-01-01 12:00:00")
        );
        assert_eq!(excel_serial_text(f64::MAX), None);
    }

    #[test]
    fn stitch_left_joins_on_shared_section_keys() {
        let primary = Dataset::from_rows(
            "MMS001",
            &["CONO", "ITNO", "STAT"],
            &[&["100", "A1", "20"], &["100", "A2", "20"]],
        );
        let warehouse = Dataset::from_rows(
            "MMS002",
            &["CONO", "ITNO", "WHLO", "STAT"],
            &[&["100", "A1", "W1", "90"]],
        );
        let stitched = stitch_sections(primary, vec![warehouse]).expect("stitch");
        assert_eq!(stitched.columns(), ["CONO", "ITNO", "STAT", "WHLO", "STAT_MMS002"]);
        assert_eq!(stitched.row_count(), 2);
        assert_eq!(stitched.cell(0, 3).as_deref(), Some("W1"));
        assert_eq!(stitched.cell(0, 4).as_deref(), Some("90"));
        assert_eq!(stitched.cell(1, 3), &None);
        assert_eq!(stitched.section_of(1), "MMS001");
    }

    #[test]
    fn stitch_skips_sections_without_shared_keys() {
        let primary = Dataset::from_rows("MMS001", &["ITNO", "STAT"], &[&["A1", "20"]]);
        let unrelated = Dataset::from_rows("NOTES", &["TEXT"], &[&["hello"]]);
        let stitched = stitch_sections(primary.clone(), vec![unrelated]).expect("stitch");
        assert_eq!(stitched, primary);
    }

    #[test]
    fn stitch_repeats_primary_rows_for_multiple_matches() {
        let primary = Dataset::from_rows("MMS001", &["ITNO"], &[&["A1"], &["A2"]]);
        let aux = Dataset::from_rows(
            "MMS002",
            &["ITNO", "WHLO"],
            &[&["A1", "W1"], &["A1", "W2"]],
        );
        let stitched = stitch_sections(primary, vec![aux]).expect("stitch");
        assert_eq!(stitched.row_count(), 3);
        assert_eq!(stitched.cell(1, 1).as_deref(), Some("W2"));
        assert_eq!(stitched.cell(2, 1), &None);
    }
}
