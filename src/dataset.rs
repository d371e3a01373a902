//! In-memory tabular dataset.
//!
//! Values are kept as text exactly as read; an empty input cell is stored as
//! missing (`None`). Nothing in the pipeline coerces values to numbers.

use crate::normalize::NameMap;

pub type Cell = Option<String>;

/// Text of a cell with missing read as the empty string.
pub fn cell_text(cell: &Cell) -> &str {
    cell.as_deref().unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    sections: Vec<String>,
    row_sections: Vec<usize>,
    names: NameMap,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<String>, names: NameMap) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            sections: Vec::new(),
            row_sections: Vec::new(),
            names,
        }
    }

    /// Builds a dataset from literal rows; blank strings become missing cells.
    pub fn from_rows(name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let mut dataset = Dataset::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            NameMap::default(),
        );
        for row in rows {
            dataset.push_row(row.iter().map(|v| to_cell(v)).collect(), name);
        }
        dataset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn names(&self) -> &NameMap {
        &self.names
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
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.rows[row][column]
    }

    /// Section (worksheet or file) the given row was read from.
    pub fn section_of(&self, row: usize) -> &str {
        self.row_sections
            .get(row)
            .and_then(|idx| self.sections.get(*idx))
            .map(String::as_str)
            .unwrap_or(self.name.as_str())
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut cells: Vec<Cell>, section: &str) {
        cells.resize(self.columns.len(), None);
        let section_idx = match self.sections.iter().position(|s| s == section) {
            Some(idx) => idx,
            None => {
                self.sections.push(section.to_string());
                self.sections.len() - 1
            }
        };
        self.rows.push(cells);
        self.row_sections.push(section_idx);
    }
}

pub(crate) fn to_cell(raw: &str) -> Cell {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_marks_blank_cells_missing() {
        let dataset = Dataset::from_rows("legacy", &["ITNO", "WHLO"], &[&["A1", ""], &["A2"]]);
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.cell(0, 1), &None);
        assert_eq!(dataset.cell(1, 1), &None);
        assert_eq!(cell_text(dataset.cell(0, 0)), "A1");
        assert_eq!(dataset.section_of(1), "legacy");
    }

    #[test]
    fn push_row_tracks_sections() {
        let mut dataset = Dataset::new("book", vec!["A".to_string()], NameMap::default());
        dataset.push_row(vec![Some("1".to_string())], "Sheet1");
        dataset.push_row(vec![Some("2".to_string()), Some("extra".to_string())], "Sheet2");
        assert_eq!(dataset.sections().to_vec(), vec!["Sheet1", "Sheet2"]);
        assert_eq!(dataset.section_of(1), "Sheet2");
        assert_eq!(dataset.rows()[1].len(), 1);
    }
}
