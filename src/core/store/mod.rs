//! SQLite-backed work order store
//!
//! One database file per project (`.wot/orders.db` by default) holding:
//! - work orders keyed by a unique folio
//! - task / part / supply lines, unique per (order, item number), cascading
//!   on order deletion
//! - raw row captures written during imports, for traceability
//!
//! The schema is versioned; a version mismatch drops and recreates every
//! table (there are no migrations).

mod queries;
mod schema;
mod summary;

pub use queries::{OrderFilter, SortBy};
pub use summary::{GroupStat, MonthStat, StatusShare, Summary};

use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use thiserror::Error;

use crate::entities::work_order::{Material, RawRowCapture, Supplied, Task, WorkOrder};

/// Current schema version - tables are rebuilt on mismatch
const SCHEMA_VERSION: i32 = 1;

/// Storage format for dates and timestamps
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised by the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("work order not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub orders: usize,
    pub tasks: usize,
    pub parts: usize,
    pub supplies: usize,
    pub raw_rows: usize,
}

impl StoreCounts {
    pub fn total(&self) -> usize {
        self.orders + self.tasks + self.parts + self.supplies + self.raw_rows
    }
}

/// The work order database
pub struct OrderStore {
    conn: Connection,
}

impl OrderStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let needs_init = !path.exists();
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::prepare(conn, needs_init)
    }

    /// A throwaway database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?, true)
    }

    fn prepare(conn: Connection, needs_init: bool) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut store = Self { conn };

        if needs_init {
            store.init_schema()?;
        } else if store.needs_schema_rebuild() {
            log::warn!("work order database schema changed, rebuilding");
            store.reinitialize_schema()?;
        }

        Ok(store)
    }

    /// Insert a new order and its line items as one unit
    pub fn insert(&mut self, order: &WorkOrder) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        insert_order(&tx, order)?;
        tx.commit()?;
        Ok(())
    }

    /// Delete `targets` (cascading) and insert `order` as one unit
    pub fn replace(&mut self, targets: &[String], order: &WorkOrder) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for folio in targets {
            tx.execute("DELETE FROM work_orders WHERE folio = ?1", params![folio])?;
        }
        insert_order(&tx, order)?;
        tx.commit()?;
        Ok(())
    }

    /// Create the order, or merge it into the existing one with that folio
    ///
    /// Merging keeps fields the new order leaves empty (and scalars not in
    /// `supplied`) and replaces all three line item sets wholesale.
    pub fn upsert(&mut self, order: &WorkOrder, supplied: Supplied) -> Result<UpsertOutcome, StoreError> {
        let tx = self.conn.transaction()?;

        let outcome = match order_id(&tx, &order.folio)? {
            None => {
                insert_order(&tx, order)?;
                UpsertOutcome::Created
            }
            Some(id) => {
                let mut merged = load_order(&tx, &order.folio)?
                    .ok_or_else(|| StoreError::NotFound(order.folio.clone()))?;
                merged.merge_from(order.clone(), supplied);
                update_order(&tx, id, &merged)?;
                for table in ["tasks", "parts", "supplies"] {
                    tx.execute(&format!("DELETE FROM {} WHERE order_id = ?1", table), params![id])?;
                }
                insert_items(&tx, id, &merged)?;
                UpsertOutcome::Updated
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Delete an order and its line items. Returns false if it did not exist.
    pub fn delete(&mut self, folio: &str) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM work_orders WHERE folio = ?1", params![folio])?;
        Ok(n > 0)
    }

    pub fn get(&self, folio: &str) -> Result<Option<WorkOrder>, StoreError> {
        load_order(&self.conn, folio)
    }

    pub fn exists(&self, folio: &str) -> Result<bool, StoreError> {
        Ok(order_id(&self.conn, folio)?.is_some())
    }

    /// Append one raw capture; returns its id
    pub fn insert_raw(&self, capture: &RawRowCapture) -> Result<i64, StoreError> {
        self.conn.execute(
            r#"INSERT INTO raw_rows (batch, source_file, source_sha256, row_number, sheet, data, captured_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                capture.batch,
                capture.source_file,
                capture.source_sha256,
                capture.row,
                capture.sheet,
                serde_json::to_string(&capture.data)?,
                capture.captured_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        let count = |table: &str| -> Result<usize, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        Ok(StoreCounts {
            orders: count("work_orders")?,
            tasks: count("tasks")?,
            parts: count("parts")?,
            supplies: count("supplies")?,
            raw_rows: count("raw_rows")?,
        })
    }

    /// Delete everything; returns what was deleted
    pub fn reset(&mut self) -> Result<StoreCounts, StoreError> {
        let counts = self.counts()?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM tasks;
            DELETE FROM parts;
            DELETE FROM supplies;
            DELETE FROM work_orders;
            DELETE FROM raw_rows;
            "#,
        )?;
        tx.commit()?;
        Ok(counts)
    }
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_datetime(s: Option<String>) -> Option<NaiveDateTime> {
    let s = s?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()
}

fn order_id(conn: &Connection, folio: &str) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row("SELECT id FROM work_orders WHERE folio = ?1", params![folio], |row| row.get(0))
        .optional()?)
}

const ORDER_COLUMNS: &str = "id, folio, description, responsible, machine, fault_type, action_type, \
     brand, model, location, odometer, supervisor, planned_date, start_date, end_date, days, \
     persons, labor_hours, status, observation, reviewed_by, review_date, received_by, \
     incomplete, source_file, source_row, source_sheet";

/// Map one `ORDER_COLUMNS` row (without items)
fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, WorkOrder)> {
    let status: String = row.get(18)?;
    let mut order = WorkOrder::new(row.get::<_, String>(1)?);
    order.description = row.get(2)?;
    order.responsible = row.get(3)?;
    order.machine = row.get(4)?;
    order.fault_type = row.get(5)?;
    order.action_type = row.get(6)?;
    order.brand = row.get(7)?;
    order.model = row.get(8)?;
    order.location = row.get(9)?;
    order.odometer = row.get(10)?;
    order.supervisor = row.get(11)?;
    order.planned_date = parse_datetime(row.get(12)?);
    order.start_date = parse_datetime(row.get(13)?);
    order.end_date = parse_datetime(row.get(14)?);
    order.days = row.get(15)?;
    order.persons = row.get(16)?;
    order.labor_hours = row.get(17)?;
    order.status = status.parse().unwrap_or_default();
    order.observation = row.get(19)?;
    order.reviewed_by = row.get(20)?;
    order.review_date = parse_datetime(row.get(21)?);
    order.received_by = row.get(22)?;
    order.incomplete = row.get::<_, i64>(23)? != 0;
    order.source_file = row.get(24)?;
    order.source_row = row.get(25)?;
    order.source_sheet = row.get(26)?;
    Ok((row.get(0)?, order))
}

fn load_order(conn: &Connection, folio: &str) -> Result<Option<WorkOrder>, StoreError> {
    let found = conn
        .query_row(
            &format!("SELECT {} FROM work_orders WHERE folio = ?1", ORDER_COLUMNS),
            params![folio],
            order_from_row,
        )
        .optional()?;

    match found {
        Some((id, mut order)) => {
            load_items(conn, id, &mut order)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

fn load_items(conn: &Connection, id: i64, order: &mut WorkOrder) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT item_number, detail, estimated_time, actual_time FROM tasks WHERE order_id = ?1 ORDER BY item_number",
    )?;
    order.tasks = stmt
        .query_map(params![id], |row| {
            Ok(Task {
                number: row.get(0)?,
                detail: row.get(1)?,
                estimated_time: row.get(2)?,
                actual_time: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    order.parts = load_materials(conn, "parts", id)?;
    order.supplies = load_materials(conn, "supplies", id)?;
    Ok(())
}

fn load_materials(conn: &Connection, table: &str, id: i64) -> Result<Vec<Material>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT item_number, code, description, quantity FROM {} WHERE order_id = ?1 ORDER BY item_number",
        table
    ))?;
    let items = stmt
        .query_map(params![id], |row| {
            Ok(Material {
                number: row.get(0)?,
                code: row.get(1)?,
                description: row.get(2)?,
                quantity: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn insert_order(tx: &Transaction<'_>, order: &WorkOrder) -> Result<i64, StoreError> {
    let now = format_datetime(&Utc::now().naive_utc());
    tx.execute(
        r#"INSERT INTO work_orders (
               folio, description, responsible, machine, fault_type, action_type,
               brand, model, location, odometer, supervisor, planned_date, start_date, end_date,
               days, persons, labor_hours, status, observation, reviewed_by, review_date,
               received_by, incomplete, source_file, source_row, source_sheet, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?27)"#,
        params![
            order.folio,
            order.description,
            order.responsible,
            order.machine,
            order.fault_type,
            order.action_type,
            order.brand,
            order.model,
            order.location,
            order.odometer,
            order.supervisor,
            order.planned_date.as_ref().map(format_datetime),
            order.start_date.as_ref().map(format_datetime),
            order.end_date.as_ref().map(format_datetime),
            order.days,
            order.persons,
            order.labor_hours,
            order.status.as_str(),
            order.observation,
            order.reviewed_by,
            order.review_date.as_ref().map(format_datetime),
            order.received_by,
            order.incomplete,
            order.source_file,
            order.source_row,
            order.source_sheet,
            now,
        ],
    )?;
    let id = tx.last_insert_rowid();
    insert_items(tx, id, order)?;
    Ok(id)
}

fn update_order(tx: &Transaction<'_>, id: i64, order: &WorkOrder) -> Result<(), StoreError> {
    tx.execute(
        r#"UPDATE work_orders SET
               description = ?2, responsible = ?3, machine = ?4, fault_type = ?5, action_type = ?6,
               brand = ?7, model = ?8, location = ?9, odometer = ?10, supervisor = ?11,
               planned_date = ?12, start_date = ?13, end_date = ?14, days = ?15, persons = ?16,
               labor_hours = ?17, status = ?18, observation = ?19, reviewed_by = ?20,
               review_date = ?21, received_by = ?22, incomplete = ?23, source_file = ?24,
               source_row = ?25, source_sheet = ?26, updated_at = ?27
           WHERE id = ?1"#,
        params![
            id,
            order.description,
            order.responsible,
            order.machine,
            order.fault_type,
            order.action_type,
            order.brand,
            order.model,
            order.location,
            order.odometer,
            order.supervisor,
            order.planned_date.as_ref().map(format_datetime),
            order.start_date.as_ref().map(format_datetime),
            order.end_date.as_ref().map(format_datetime),
            order.days,
            order.persons,
            order.labor_hours,
            order.status.as_str(),
            order.observation,
            order.reviewed_by,
            order.review_date.as_ref().map(format_datetime),
            order.received_by,
            order.incomplete,
            order.source_file,
            order.source_row,
            order.source_sheet,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

fn insert_items(tx: &Transaction<'_>, id: i64, order: &WorkOrder) -> Result<(), StoreError> {
    for task in &order.tasks {
        tx.execute(
            "INSERT INTO tasks (order_id, item_number, detail, estimated_time, actual_time) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, task.number, task.detail, task.estimated_time, task.actual_time],
        )?;
    }
    for (table, items) in [("parts", &order.parts), ("supplies", &order.supplies)] {
        for item in items {
            tx.execute(
                &format!(
                    "INSERT INTO {} (order_id, item_number, code, description, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
                    table
                ),
                params![id, item.number, item.code, item.description, item.quantity],
            )?;
        }
    }
    Ok(())
}
