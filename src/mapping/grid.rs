//! Bounds-safe 2-D cell grid
//!
//! Every positional heuristic in the mapper (label search, adjacent-value
//! probing, section walking) reads through [`Grid::get`], which answers
//! `None` for anything outside the sheet instead of panicking.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

/// A single already-parsed cell value
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// Explicit "missing" marker (empty cell, error cell)
    #[default]
    Missing,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl Cell {
    /// Render the cell as trimmed display text
    ///
    /// Whole numbers print without a fractional part so item numbers
    /// read from numeric cells ("3.0") compare as "3".
    pub fn text(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Date(dt) => {
                if dt.time().num_seconds_from_midnight() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    /// True for missing cells and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// A rectangular view over a sheet's cells (rows may be ragged)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    /// Build a grid from string literals; empty strings become missing cells
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|s| Cell::from(*s)).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Cell::is_blank))
    }

    /// Cell at `(row, col)`; `None` when out of range (negative included)
    /// or when the cell is missing.
    pub fn get(&self, row: isize, col: isize) -> Option<&Cell> {
        let r = usize::try_from(row).ok()?;
        let c = usize::try_from(col).ok()?;
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .filter(|cell| !matches!(cell, Cell::Missing))
    }

    /// Trimmed, non-empty text at `(row, col)`
    pub fn text_at(&self, row: isize, col: isize) -> Option<String> {
        self.get(row, col)
            .map(Cell::text)
            .filter(|s| !s.is_empty())
    }

    /// Iterate rows as slices
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}
