//! Spreadsheet exports via rust_xlsxwriter
//!
//! A single order is written as a freeform form sheet laid out the way the
//! sheet-per-record importer reads it; a set of orders is written as one
//! table in the row-per-record layout.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::table::{self, date_text, Value};
use crate::entities::work_order::{Material, WorkOrder};

/// Characters Excel refuses in sheet names
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Excel's sheet name length limit
const SHEET_NAME_MAX: usize = 31;

/// Turn a folio into a valid, non-empty sheet name
pub fn sheet_name(folio: &str) -> String {
    let name: String = folio
        .trim()
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '-' } else { c })
        .take(SHEET_NAME_MAX)
        .collect();
    let name = name.trim_matches('\'').trim().to_string();
    if name.is_empty() {
        "OT".to_string()
    } else {
        name
    }
}

/// Sequential row writer for the form layout
struct FormWriter<'a> {
    sheet: &'a mut Worksheet,
    row: u32,
    bold: Format,
}

impl FormWriter<'_> {
    fn write(&mut self, col: u16, value: &Value) -> Result<(), XlsxError> {
        match value {
            Value::Text(s) if s.is_empty() => {}
            Value::Text(s) => {
                self.sheet.write_string(self.row, col, s)?;
            }
            Value::Number(n) => {
                self.sheet.write_number(self.row, col, *n)?;
            }
        }
        Ok(())
    }

    /// Label in column A, value in column B; skipped when the value is empty
    /// so the importer never mistakes the next label for this value
    fn field(&mut self, label: &str, value: Value) -> Result<(), XlsxError> {
        if value == Value::Text(String::new()) {
            return Ok(());
        }
        self.sheet.write_string_with_format(self.row, 0, label, &self.bold)?;
        self.write(1, &value)?;
        self.row += 1;
        Ok(())
    }

    fn heading(&mut self, text: &str) -> Result<(), XlsxError> {
        self.row += 1;
        self.sheet.write_string_with_format(self.row, 0, text, &self.bold)?;
        self.row += 1;
        Ok(())
    }

    fn line(&mut self, values: &[Value]) -> Result<(), XlsxError> {
        for (col, value) in (0u16..).zip(values) {
            self.write(col, value)?;
        }
        self.row += 1;
        Ok(())
    }

    fn columns(&mut self, names: &[&str]) -> Result<(), XlsxError> {
        for (col, name) in (0u16..).zip(names) {
            self.sheet.write_string_with_format(self.row, col, *name, &self.bold)?;
        }
        self.row += 1;
        Ok(())
    }

    fn materials(&mut self, title: &str, items: &[Material]) -> Result<(), XlsxError> {
        self.heading(title)?;
        self.columns(&["N°", "Código", "Descripción", "Cantidad"])?;
        for m in items {
            self.line(&[
                Value::Number(m.number as f64),
                Value::Text(m.code.clone()),
                Value::Text(m.description.clone()),
                Value::Number(m.quantity as f64),
            ])?;
        }
        Ok(())
    }
}

fn text(s: &str) -> Value {
    Value::Text(s.trim().to_string())
}

/// Write `order` as a one-sheet form workbook
pub fn write_form(order: &WorkOrder, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(&order.folio))?;
    sheet.set_column_width(0, 26)?;
    sheet.set_column_width(1, 36)?;
    sheet.set_column_width(2, 30)?;

    let bold = Format::new().set_bold();
    sheet.write_string_with_format(0, 0, "ORDEN DE TRABAJO", &bold)?;
    sheet.write_string_with_format(0, 2, "N°:", &bold)?;
    sheet.write_string(0, 3, &order.folio)?;

    let mut form = FormWriter { sheet, row: 2, bold };
    form.field("Fecha", Value::Text(date_text(order.start_date)))?;
    form.field("Fecha Término", Value::Text(date_text(order.end_date)))?;
    form.field("Equipo/Máquina", text(&order.machine))?;
    form.field("Responsable de Ejecución", text(&order.responsible))?;
    form.field("Tipo de Falla", text(&order.fault_type))?;
    form.field("Tipo de Acción", text(&order.action_type))?;
    form.field("Supervisor", text(&order.supervisor))?;
    form.field("Ubicación", text(&order.location))?;
    form.field("Estado", Value::Text(order.status.as_str().to_string()))?;
    form.field("Horas Hombre", Value::Number(order.labor_hours))?;
    form.field("Personas", Value::Number(order.persons as f64))?;
    form.field("Descripción", text(&order.description))?;
    form.field("Observaciones", text(&order.observation))?;

    form.heading("TAREAS A EJECUTAR")?;
    form.columns(&["N°", "Detalle", "Tiempo Estimado", "Tiempo Real"])?;
    for t in &order.tasks {
        form.line(&[
            Value::Number(t.number as f64),
            Value::Text(t.detail.clone()),
            Value::Number(t.estimated_time as f64),
            Value::Number(t.actual_time as f64),
        ])?;
    }
    form.materials("REPUESTOS REQUERIDOS", &order.parts)?;
    form.materials("INSUMOS REQUERIDOS", &order.supplies)?;
    form.heading("FIRMAS")?;

    workbook.save(path)
}

/// Write `orders` as one row-per-record table
pub fn write_table(orders: &[WorkOrder], path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("ordenes")?;

    let bold = Format::new().set_bold();
    for (col, header) in (0u16..).zip(table::headers()) {
        sheet.write_string_with_format(0, col, header, &bold)?;
    }

    for (row, order) in (1u32..).zip(orders) {
        for (col, value) in (0u16..).zip(table::record(order)) {
            match value {
                Value::Text(s) if s.is_empty() => {}
                Value::Text(s) => {
                    sheet.write_string(row, col, s)?;
                }
                Value::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
            }
        }
    }

    workbook.save(path)
}
