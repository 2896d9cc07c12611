//! Query methods for listing and looking up stored orders

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, OptionalExtension};

use super::{load_items, order_from_row, OrderStore, StoreError, ORDER_COLUMNS};
use crate::entities::work_order::{OrderStatus, RawRowCapture, WorkOrder};

static SEQUENCE_FOLIO: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\d+)-(\d{2})$").ok());

/// Sort order for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Most recent start date first
    #[default]
    StartDate,
    Folio,
}

/// Filter for listing orders
#[derive(Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Case-insensitive substring of the responsible party
    pub responsible: Option<String>,
    /// Case-insensitive substring of the machine
    pub machine: Option<String>,
    pub incomplete: Option<bool>,
    pub source_file: Option<String>,
    /// Free text over folio, machine and description
    pub search: Option<String>,
    pub sort: SortBy,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl OrderStore {
    /// Every folio, in insertion order
    pub fn folios(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT folio FROM work_orders ORDER BY id")?;
        let folios = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(folios)
    }

    /// Folios containing `key`, ignoring ASCII case
    pub fn folios_containing(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT folio FROM work_orders WHERE folio LIKE ?1 ESCAPE '\\' ORDER BY id")?;
        let pattern = format!("%{}%", escape_like(key));
        let folios = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(folios)
    }

    /// Orders matching `filter`, each with its line items
    pub fn list(&self, filter: &OrderFilter) -> Result<Vec<WorkOrder>, StoreError> {
        let mut sql = format!("SELECT {} FROM work_orders WHERE 1=1", ORDER_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str().to_string()));
        }

        if let Some(ref responsible) = filter.responsible {
            sql.push_str(" AND responsible LIKE ? ESCAPE '\\'");
            params_vec.push(Box::new(format!("%{}%", escape_like(responsible))));
        }

        if let Some(ref machine) = filter.machine {
            sql.push_str(" AND machine LIKE ? ESCAPE '\\'");
            params_vec.push(Box::new(format!("%{}%", escape_like(machine))));
        }

        if let Some(incomplete) = filter.incomplete {
            sql.push_str(" AND incomplete = ?");
            params_vec.push(Box::new(incomplete));
        }

        if let Some(ref source_file) = filter.source_file {
            sql.push_str(" AND source_file = ?");
            params_vec.push(Box::new(source_file.clone()));
        }

        if let Some(ref search) = filter.search {
            sql.push_str(
                " AND (folio LIKE ? ESCAPE '\\' OR machine LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(search));
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }

        let (column, natural_desc) = match filter.sort {
            SortBy::StartDate => ("start_date", true),
            SortBy::Folio => ("folio", false),
        };
        let desc = natural_desc != filter.reverse;
        sql.push_str(&format!(
            " ORDER BY {} {}, id {}",
            column,
            if desc { "DESC" } else { "ASC" },
            if desc { "DESC" } else { "ASC" }
        ));

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), order_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut orders = Vec::with_capacity(rows.len());
        for (id, mut order) in rows {
            load_items(&self.conn, id, &mut order)?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// Raw captures, newest first, optionally for one source file
    pub fn raw_captures(&self, source_file: Option<&str>, limit: Option<usize>) -> Result<Vec<RawRowCapture>, StoreError> {
        let mut sql = String::from(
            "SELECT id, batch, source_file, source_sha256, row_number, sheet, data, captured_at FROM raw_rows",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];
        if let Some(file) = source_file {
            sql.push_str(" WHERE source_file = ?");
            params_vec.push(Box::new(file.to_string()));
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), raw_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(finish_raw).collect()
    }

    pub fn raw_capture(&self, id: i64) -> Result<Option<RawRowCapture>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, batch, source_file, source_sha256, row_number, sheet, data, captured_at FROM raw_rows WHERE id = ?1",
                params![id],
                raw_from_row,
            )
            .optional()?;
        row.map(finish_raw).transpose()
    }

    /// Next sequential folio for a year: `<seq:03>-<yy>`
    ///
    /// One past the highest sequence among folios shaped `<digits>-<yy>`.
    pub fn next_folio(&self, year: i32) -> Result<String, StoreError> {
        let yy = format!("{:02}", year.rem_euclid(100));
        let highest = self
            .folios()?
            .iter()
            .filter_map(|folio| {
                let caps = SEQUENCE_FOLIO.as_ref()?.captures(folio.trim())?;
                if caps[2] != yy {
                    return None;
                }
                caps[1].parse::<u64>().ok()
            })
            .max()
            .unwrap_or(0);

        Ok(format!("{:03}-{}", highest + 1, yy))
    }
}

type RawRow = (i64, String, String, String, i64, Option<String>, String, String);

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn finish_raw(raw: RawRow) -> Result<RawRowCapture, StoreError> {
    let (id, batch, source_file, source_sha256, row, sheet, data, captured_at) = raw;
    Ok(RawRowCapture {
        id: Some(id),
        batch,
        source_file,
        source_sha256,
        row,
        sheet,
        data: serde_json::from_str(&data)?,
        captured_at: DateTime::parse_from_rfc3339(&captured_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(folios: &[&str]) -> OrderStore {
        let mut store = OrderStore::open_in_memory().unwrap();
        for folio in folios {
            let mut order = WorkOrder::new(*folio);
            order.machine = format!("Máquina {}", folio);
            store.insert(&order).unwrap();
        }
        store
    }

    #[test]
    fn test_folios_containing_is_case_insensitive() {
        let store = store_with(&["OT-7", "ot-17", "001-25"]);
        assert_eq!(store.folios_containing("ot-").unwrap(), vec!["OT-7", "ot-17"]);
        assert_eq!(store.folios_containing("001-25").unwrap(), vec!["001-25"]);
        assert!(store.folios_containing("%").unwrap().is_empty());
    }

    #[test]
    fn test_next_folio() {
        let store = store_with(&["001-25", "014-25", "099-24", "OT-3", "7-25 extra"]);
        assert_eq!(store.next_folio(2025).unwrap(), "015-25");
        assert_eq!(store.next_folio(2024).unwrap(), "100-24");
        assert_eq!(store.next_folio(2026).unwrap(), "001-26");
    }

    #[test]
    fn test_list_filters() {
        let mut store = store_with(&["001-25", "002-25"]);
        let mut done = WorkOrder::new("003-25");
        done.status = OrderStatus::Done;
        done.responsible = "Ana".into();
        done.refresh_incomplete();
        store.insert(&done).unwrap();

        let filter = OrderFilter { status: Some(OrderStatus::Done), ..Default::default() };
        let found = store.list(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].folio, "003-25");

        let filter = OrderFilter { search: Some("máquina 002".into()), ..Default::default() };
        assert_eq!(store.list(&filter).unwrap().len(), 1);

        let filter = OrderFilter { sort: SortBy::Folio, limit: Some(2), ..Default::default() };
        let folios: Vec<String> = store.list(&filter).unwrap().into_iter().map(|o| o.folio).collect();
        assert_eq!(folios, vec!["001-25", "002-25"]);

        let filter = OrderFilter { responsible: Some("an".into()), ..Default::default() };
        assert_eq!(store.list(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_raw_capture_round_trip() {
        let store = OrderStore::open_in_memory().unwrap();
        let capture = RawRowCapture {
            id: None,
            batch: "01J0000000000000000000000".into(),
            source_file: "ot.csv".into(),
            source_sha256: "abc".into(),
            row: 2,
            sheet: None,
            data: serde_json::json!({"OT": "001-25", "Equipo": null}),
            captured_at: Utc::now(),
        };
        let id = store.insert_raw(&capture).unwrap();

        let stored = store.raw_capture(id).unwrap().unwrap();
        assert_eq!(stored.data, capture.data);
        assert_eq!(stored.row, 2);
        assert_eq!(store.raw_captures(Some("ot.csv"), None).unwrap().len(), 1);
        assert!(store.raw_captures(Some("other.csv"), Some(5)).unwrap().is_empty());
        assert!(store.raw_capture(id + 1).unwrap().is_none());
    }
}
