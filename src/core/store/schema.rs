//! Database schema initialization

use rusqlite::params;

use super::{OrderStore, StoreError, SCHEMA_VERSION};

impl OrderStore {
    /// Create every table and record the schema version
    pub(super) fn init_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS work_orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                folio TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                responsible TEXT NOT NULL DEFAULT '',
                machine TEXT NOT NULL DEFAULT '',
                fault_type TEXT NOT NULL DEFAULT '',
                action_type TEXT NOT NULL DEFAULT '',
                brand TEXT NOT NULL DEFAULT '',
                model TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                odometer TEXT NOT NULL DEFAULT '',
                supervisor TEXT NOT NULL DEFAULT '',
                planned_date TEXT,
                start_date TEXT,
                end_date TEXT,
                days INTEGER NOT NULL DEFAULT 0,
                persons INTEGER NOT NULL DEFAULT 1,
                labor_hours REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                observation TEXT NOT NULL DEFAULT '',
                reviewed_by TEXT NOT NULL DEFAULT '',
                review_date TEXT,
                received_by TEXT NOT NULL DEFAULT '',
                incomplete INTEGER NOT NULL DEFAULT 0,
                source_file TEXT,
                source_row INTEGER,
                source_sheet TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_work_orders_status ON work_orders(status);
            CREATE INDEX IF NOT EXISTS idx_work_orders_responsible ON work_orders(responsible);
            CREATE INDEX IF NOT EXISTS idx_work_orders_start ON work_orders(start_date);

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                item_number INTEGER NOT NULL,
                detail TEXT NOT NULL DEFAULT '',
                estimated_time INTEGER NOT NULL DEFAULT 0,
                actual_time INTEGER NOT NULL DEFAULT 0,
                UNIQUE (order_id, item_number),
                FOREIGN KEY (order_id) REFERENCES work_orders(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS parts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                item_number INTEGER NOT NULL,
                code TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                quantity INTEGER NOT NULL DEFAULT 1,
                UNIQUE (order_id, item_number),
                FOREIGN KEY (order_id) REFERENCES work_orders(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS supplies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                item_number INTEGER NOT NULL,
                code TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                quantity INTEGER NOT NULL DEFAULT 1,
                UNIQUE (order_id, item_number),
                FOREIGN KEY (order_id) REFERENCES work_orders(id) ON DELETE CASCADE
            );

            -- Append-only audit copies of imported rows / sheets
            CREATE TABLE IF NOT EXISTS raw_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch TEXT NOT NULL,
                source_file TEXT NOT NULL,
                source_sha256 TEXT NOT NULL,
                row_number INTEGER NOT NULL,
                sheet TEXT,
                data TEXT NOT NULL,
                captured_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_raw_rows_file ON raw_rows(source_file);
            "#,
        )?;

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Check if the stored schema version differs from the current one
    pub(super) fn needs_schema_rebuild(&self) -> bool {
        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .unwrap_or(0);
        current != SCHEMA_VERSION
    }

    /// Drop all tables and recreate them
    pub(super) fn reinitialize_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            DROP TABLE IF EXISTS schema_version;
            DROP TABLE IF EXISTS tasks;
            DROP TABLE IF EXISTS parts;
            DROP TABLE IF EXISTS supplies;
            DROP TABLE IF EXISTS work_orders;
            DROP TABLE IF EXISTS raw_rows;
            "#,
        )?;
        self.init_schema()
    }
}
