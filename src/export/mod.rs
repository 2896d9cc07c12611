//! Exports of resolved orders: spreadsheet, CSV and printable HTML

pub mod html;
pub mod table;
pub mod xlsx;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::entities::work_order::WorkOrder;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("spreadsheet export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0} export covers a single order")]
    SingleOrderOnly(ExportFormat),
}

/// Export target format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Excel workbook (form for one order, table for many)
    Xlsx,
    /// Row-per-record CSV, importable again
    Csv,
    /// Printable HTML page
    Html,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// File name used when no output path is given: `OT_<folio>.<ext>`
pub fn default_path(folio: Option<&str>, format: ExportFormat) -> PathBuf {
    let stem = match folio {
        Some(folio) => {
            let safe: String = folio
                .trim()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect();
            format!("OT_{}", safe)
        }
        None => "ordenes".to_string(),
    };
    PathBuf::from(format!("{}.{}", stem, format.extension()))
}

fn write_csv(orders: &[WorkOrder], path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table::headers())?;
    for order in orders {
        writer.write_record(table::record(order).iter().map(table::Value::text))?;
    }
    writer.flush().map_err(|e| ExportError::Io(e.to_string()))?;
    Ok(())
}

/// Export one order
pub fn export_order(order: &WorkOrder, format: ExportFormat, path: &Path) -> Result<(), ExportError> {
    match format {
        ExportFormat::Xlsx => xlsx::write_form(order, path)?,
        ExportFormat::Csv => write_csv(std::slice::from_ref(order), path)?,
        ExportFormat::Html => {
            let html = html::HtmlRenderer::new()?.render(order)?;
            std::fs::write(path, html).map_err(|e| ExportError::Io(e.to_string()))?;
        }
    }
    log::info!("exported {} to {}", order.folio, path.display());
    Ok(())
}

/// Export many orders as one table
pub fn export_orders(orders: &[WorkOrder], format: ExportFormat, path: &Path) -> Result<(), ExportError> {
    match format {
        ExportFormat::Xlsx => xlsx::write_table(orders, path)?,
        ExportFormat::Csv => write_csv(orders, path)?,
        ExportFormat::Html => return Err(ExportError::SingleOrderOnly(format)),
    }
    log::info!("exported {} orders to {}", orders.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::OrderStore;
    use crate::entities::work_order::Task;
    use crate::mapping::{import_file, MapOptions};
    use tempfile::tempdir;

    #[test]
    fn test_default_path() {
        assert_eq!(default_path(Some("001/25"), ExportFormat::Xlsx), PathBuf::from("OT_001_25.xlsx"));
        assert_eq!(default_path(None, ExportFormat::Csv), PathBuf::from("ordenes.csv"));
    }

    #[test]
    fn test_html_needs_single_order() {
        let tmp = tempdir().unwrap();
        let err = export_orders(&[], ExportFormat::Html, &tmp.path().join("x.html")).unwrap_err();
        assert!(matches!(err, ExportError::SingleOrderOnly(ExportFormat::Html)));
    }

    #[test]
    fn test_csv_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ordenes.csv");

        let mut order = WorkOrder::new("001-25");
        order.responsible = "Ana, jefa de turno".into();
        order.tasks.push(Task { number: 1, detail: "Cambiar filtro".into(), estimated_time: 30, actual_time: 45 });
        export_orders(std::slice::from_ref(&order), ExportFormat::Csv, &path).unwrap();

        let mut store = OrderStore::open_in_memory().unwrap();
        let result = import_file(&mut store, &path, &MapOptions::default()).unwrap();
        assert_eq!(result.created.orders, 1);
        assert!(result.missing_columns.is_empty());

        let back = store.get("001-25").unwrap().unwrap();
        assert_eq!(back.responsible, "Ana, jefa de turno");
        assert_eq!(back.tasks, order.tasks);
    }
}
