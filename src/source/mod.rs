//! Tabular source: spreadsheet and CSV files as grids of parsed cells
//!
//! `.xlsx/.xlsm/.xlsb/.xls/.ods` are read with calamine, `.csv` with the csv
//! crate. Every sheet becomes a [`Grid`]; sheets calamine cannot read are
//! kept aside so the mapper can report them without failing the file.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::mapping::coerce::date_or;
use crate::mapping::grid::{Cell, Grid};

/// Extensions handled by calamine
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Errors that stop an import before any record is processed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source file not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file type '{extension}' (expected csv, xlsx, xlsm, xlsb, xls or ods)")]
    Unsupported { extension: String },

    #[error("cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Which reader produced the workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Spreadsheet,
}

/// One named sheet
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: Grid,
}

/// A loaded source file
#[derive(Debug, Clone)]
pub struct Workbook {
    /// File name without directories, recorded as provenance
    pub file_name: String,
    pub kind: SourceKind,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
    pub sheets: Vec<Sheet>,
    /// Sheets that failed to load: (name, reason)
    pub unreadable: Vec<(String, String)>,
}

impl Workbook {
    /// Build an in-memory workbook (tests, piped input)
    pub fn from_sheets(file_name: impl Into<String>, kind: SourceKind, sheets: Vec<Sheet>) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
            sha256: String::new(),
            sheets,
            unreadable: Vec::new(),
        }
    }
}

/// Load a source file
pub fn read(path: &Path) -> Result<Workbook, SourceError> {
    if !path.is_file() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let kind = if extension == "csv" {
        SourceKind::Csv
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        SourceKind::Spreadsheet
    } else {
        return Err(SourceError::Unsupported { extension });
    };

    let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
    let sha256 = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (sheets, unreadable_sheets) = match kind {
        SourceKind::Csv => (vec![read_csv(path, &bytes, &file_name)?], Vec::new()),
        SourceKind::Spreadsheet => read_spreadsheet(path)?,
    };

    log::debug!(
        "loaded {} ({} sheets, {} unreadable)",
        file_name,
        sheets.len(),
        unreadable_sheets.len()
    );

    Ok(Workbook {
        file_name,
        kind,
        sha256,
        sheets,
        unreadable: unreadable_sheets,
    })
}

fn unreadable(path: &Path, e: impl std::fmt::Display) -> SourceError {
    SourceError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Guess the delimiter from the first line: `;` wins when it outnumbers `,`
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv(path: &Path, bytes: &[u8], file_name: &str) -> Result<Sheet, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| unreadable(path, e))?;
        let row: Vec<Cell> = record
            .iter()
            .map(|field| {
                let text = String::from_utf8_lossy(field);
                Cell::from(text.trim_start_matches('\u{feff}').to_string())
            })
            .collect();
        rows.push(row);
    }

    let name = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    Ok(Sheet { name, grid: Grid::new(rows) })
}

type SheetsAndFailures = (Vec<Sheet>, Vec<(String, String)>);

fn read_spreadsheet(path: &Path) -> Result<SheetsAndFailures, SourceError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;

    let mut sheets = Vec::new();
    let mut failures = Vec::new();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows = range.rows().map(|row| row.iter().map(data_to_cell).collect()).collect();
                sheets.push(Sheet { name, grid: Grid::new(rows) });
            }
            Err(e) => {
                log::warn!("cannot read sheet '{}': {}", name, e);
                failures.push((name, e.to_string()));
            }
        }
    }

    Ok((sheets, failures))
}

/// Convert a calamine cell into a grid cell
pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match date_or(Some(&Cell::Number(dt.as_f64())), None).into_inner() {
            Some(parsed) => Cell::Date(parsed),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match date_or(Some(&Cell::Text(s.clone())), None).into_inner() {
            Some(parsed) => Cell::Date(parsed),
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_precondition_error() {
        let err = read(Path::new("/definitely/not/here.xlsx")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("orders.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(err, SourceError::Unsupported { ref extension } if extension == "pdf"));
    }

    #[test]
    fn test_csv_with_semicolons() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ot.csv");
        std::fs::write(&path, "\u{feff}OT;Encargado;Máquina\n001-25;Ana;Prensa\n002-25;;\n").unwrap();

        let wb = read(&path).unwrap();
        assert_eq!(wb.kind, SourceKind::Csv);
        assert_eq!(wb.file_name, "ot.csv");
        assert_eq!(wb.sha256.len(), 64);
        assert_eq!(wb.sheets.len(), 1);

        let grid = &wb.sheets[0].grid;
        assert_eq!(grid.text_at(0, 0).as_deref(), Some("OT"));
        assert_eq!(grid.text_at(1, 2).as_deref(), Some("Prensa"));
        assert_eq!(grid.get(2, 1), None);
    }

    #[test]
    fn test_xlsx_sheets_and_types() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ot.xlsx");

        let mut book = XlsxWorkbook::new();
        let sheet = book.add_worksheet();
        sheet.set_name("001-25").unwrap();
        sheet.write_string(0, 0, "N°:").unwrap();
        sheet.write_number(0, 1, 3.0).unwrap();
        let sheet = book.add_worksheet();
        sheet.set_name("002-25").unwrap();
        sheet.write_string(0, 0, "Equipo").unwrap();
        book.save(&path).unwrap();

        let wb = read(&path).unwrap();
        assert_eq!(wb.kind, SourceKind::Spreadsheet);
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["001-25", "002-25"]);
        assert_eq!(wb.sheets[0].grid.get(0, 1), Some(&Cell::Number(3.0)));
        assert!(wb.unreadable.is_empty());
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1,5;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a,b,c"), b',');
        assert_eq!(sniff_delimiter(b""), b',');
    }
}
