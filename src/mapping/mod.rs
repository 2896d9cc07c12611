//! Spreadsheet-to-record mapping
//!
//! Turns loosely formatted spreadsheets into [`WorkOrder`] records in two
//! layouts:
//!
//! - **rows**: one header row, one order per row, numbered column groups for
//!   tasks / parts / supplies ([`rows`])
//! - **sheets**: one freeform sheet per order, values found next to labels
//!   ([`sheets`])
//!
//! [`import`] is the single entry point. Per-record failures never escape
//! it; they come back as [`Diagnostic`]s in the [`MappingResult`].

pub mod coerce;
pub mod columns;
pub mod grid;
pub mod items;
pub mod locate;
pub mod normalize;
pub mod rows;
pub mod sheets;

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::store::{OrderStore, StoreError};
use crate::entities::work_order::{RawRowCapture, Supplied, WorkOrder};
use crate::source::{self, SourceError, SourceKind, Workbook};

/// Spreadsheet layout selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Detect from the file
    #[default]
    Auto,
    /// One order per row under a header row
    Rows,
    /// One order per sheet
    Sheets,
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Auto => write!(f, "auto"),
            Layout::Rows => write!(f, "rows"),
            Layout::Sheets => write!(f, "sheets"),
        }
    }
}

/// What to do when an incoming folio already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDuplicate {
    /// Leave the stored order untouched
    Skip,
    /// Delete the stored order (and its items), then create the new one
    Overwrite,
    /// Merge non-empty fields into the stored order, replace its items
    Update,
}

/// Options for one import invocation
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub layout: Layout,
    /// Resolve everything, write nothing
    pub dry_run: bool,
    /// `None` picks the layout default (rows: update, sheets: skip)
    pub on_duplicate: Option<OnDuplicate>,
    /// Cap on rows / sheets examined
    pub limit: Option<usize>,
    pub capture_raw: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            layout: Layout::Auto,
            dry_run: false,
            on_duplicate: None,
            limit: None,
            capture_raw: true,
        }
    }
}

/// Where a diagnostic points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// 1-based spreadsheet row
    Row { sheet: String, row: usize },
    Sheet(String),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Row { sheet, row } => write!(f, "{} row {}", sheet, row),
            Location::Sheet(name) => write!(f, "sheet '{}'", name),
        }
    }
}

/// A per-record problem that did not stop the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folio: Option<String>,
    pub message: String,
}

/// Created counts per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub orders: usize,
    pub tasks: usize,
    pub parts: usize,
    pub supplies: usize,
}

impl ItemCounts {
    fn add_items(&mut self, order: &WorkOrder) {
        self.tasks += order.tasks.len();
        self.parts += order.parts.len();
        self.supplies += order.supplies.len();
    }
}

/// Outcome of one import invocation
#[derive(Debug, Clone, Serialize)]
pub struct MappingResult {
    /// ULID shared by the raw captures of this invocation
    pub batch: String,
    pub file: String,
    /// Layout actually used (never `auto`)
    pub layout: Layout,
    pub dry_run: bool,
    /// New orders, plus every line item written
    pub created: ItemCounts,
    pub updated: usize,
    pub overwritten: usize,
    pub skipped: usize,
    /// Rows / sheets looked at
    pub examined: usize,
    pub raw_captured: usize,
    /// Canonical fields found in the header (rows layout)
    pub resolved_columns: Vec<String>,
    /// Required canonical fields with no column (rows layout)
    pub missing_columns: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MappingResult {
    fn new(workbook: &Workbook, layout: Layout, dry_run: bool) -> Self {
        Self {
            batch: ulid::Ulid::new().to_string(),
            file: workbook.file_name.clone(),
            layout,
            dry_run,
            created: ItemCounts::default(),
            updated: 0,
            overwritten: 0,
            skipped: 0,
            examined: 0,
            raw_captured: 0,
            resolved_columns: Vec::new(),
            missing_columns: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn diagnose(&mut self, location: Location, folio: Option<&str>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            location,
            folio: folio.map(str::to_string),
            message: message.into(),
        };
        log::warn!("{}: {}", diagnostic.location, diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    /// Orders written or (in a dry run) that would be written
    pub fn orders_written(&self) -> usize {
        self.created.orders + self.updated + self.overwritten
    }

    fn limit_reached(&self, limit: Option<usize>) -> bool {
        limit.is_some_and(|n| self.examined >= n)
    }
}

/// Failures that stop an import before any record is processed
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("no recognizable columns in {file}; detected headers: [{}]", .headers.join(", "))]
    NoCanonicalColumns { file: String, headers: Vec<String> },

    #[error("{0} contains no sheets with data")]
    Empty(String),
}

/// Load `path` and map it into `store`
pub fn import_file(store: &mut OrderStore, path: &Path, options: &MapOptions) -> Result<MappingResult, ImportError> {
    let workbook = source::read(path)?;
    import(store, &workbook, options)
}

/// Map every row or sheet of `workbook` into `store`
pub fn import(store: &mut OrderStore, workbook: &Workbook, options: &MapOptions) -> Result<MappingResult, ImportError> {
    if workbook.sheets.iter().all(|s| s.grid.is_empty()) && workbook.unreadable.is_empty() {
        return Err(ImportError::Empty(workbook.file_name.clone()));
    }

    let layout = match options.layout {
        Layout::Auto => detect_layout(workbook),
        other => other,
    };
    log::info!(
        "importing {} as {} layout{}",
        workbook.file_name,
        layout,
        if options.dry_run { " (dry run)" } else { "" }
    );

    let mut run = ImportRun {
        store,
        workbook,
        options,
        result: MappingResult::new(workbook, layout, options.dry_run),
    };
    for (name, reason) in &workbook.unreadable {
        run.result
            .diagnose(Location::Sheet(name.clone()), None, format!("unreadable sheet: {}", reason));
    }

    match layout {
        Layout::Sheets => sheets::map_sheets(&mut run),
        _ => rows::map_rows(&mut run)?,
    }

    let result = run.result;
    log::info!(
        "import of {} finished: {} created, {} updated, {} overwritten, {} skipped, {} diagnostics",
        workbook.file_name,
        result.created.orders,
        result.updated,
        result.overwritten,
        result.skipped,
        result.diagnostics.len()
    );
    Ok(result)
}

/// CSV is always row-per-record. A workbook with labelled item sections
/// ("TAREAS A EJECUTAR", ...) is sheet-per-record; otherwise it is
/// row-per-record when its first non-empty sheet has a recognizable header.
pub fn detect_layout(workbook: &Workbook) -> Layout {
    if workbook.kind == SourceKind::Csv {
        return Layout::Rows;
    }

    let has_sections = workbook.sheets.iter().any(|sheet| {
        [items::TASKS, items::PARTS, items::SUPPLIES]
            .iter()
            .any(|section| section.locate(&sheet.grid).is_some())
    });
    if has_sections {
        return Layout::Sheets;
    }

    let first = workbook.sheets.iter().find(|s| !s.grid.is_empty());
    match first.and_then(|s| rows::detect_header(&s.grid)) {
        Some(_) => Layout::Rows,
        None => Layout::Sheets,
    }
}

/// State of one import invocation; owns the result accumulator
pub(crate) struct ImportRun<'a> {
    store: &'a mut OrderStore,
    workbook: &'a Workbook,
    options: &'a MapOptions,
    result: MappingResult,
}

impl ImportRun<'_> {
    /// Store a raw capture unless disabled or dry-running; failures become diagnostics
    fn capture(&mut self, location: Location, row: usize, sheet: Option<&str>, data: serde_json::Value) {
        if self.options.dry_run || !self.options.capture_raw {
            return;
        }

        let raw = RawRowCapture {
            id: None,
            batch: self.result.batch.clone(),
            source_file: self.workbook.file_name.clone(),
            source_sha256: self.workbook.sha256.clone(),
            row: i64::try_from(row).unwrap_or(i64::MAX),
            sheet: sheet.map(str::to_string),
            data,
            captured_at: Utc::now(),
        };

        match self.store.insert_raw(&raw) {
            Ok(_) => self.result.raw_captured += 1,
            Err(e) => self.result.diagnose(location, None, format!("raw capture failed: {}", e)),
        }
    }

    /// Write one mapped order under the duplicate policy
    ///
    /// `matches` are the stored folios this order collides with. A missing
    /// start date becomes `now` only when the order is created or replaced;
    /// a merge keeps the stored one. The store error is returned for the
    /// caller to turn into a diagnostic.
    fn write_order(
        &mut self,
        order: &WorkOrder,
        supplied: Supplied,
        matches: &[String],
        policy: OnDuplicate,
    ) -> Result<(), StoreError> {
        let dry_run = self.options.dry_run;
        let created = || {
            let mut fresh = order.clone();
            fresh.start_date.get_or_insert_with(|| Utc::now().naive_utc());
            fresh
        };

        if matches.is_empty() {
            if !dry_run {
                self.store.insert(&created())?;
            }
            self.result.created.orders += 1;
            self.result.created.add_items(order);
            log::debug!("created {}", order.folio);
            return Ok(());
        }

        match policy {
            OnDuplicate::Skip => {
                self.result.skipped += 1;
                log::debug!("{} exists as {:?}, skipping", order.folio, matches);
            }
            OnDuplicate::Overwrite => {
                if !dry_run {
                    self.store.replace(matches, &created())?;
                }
                self.result.overwritten += 1;
                self.result.created.add_items(order);
                log::debug!("{} replaced {:?}", order.folio, matches);
            }
            OnDuplicate::Update => {
                let mut update = order.clone();
                if let Some(target) = matches.first() {
                    update.folio = target.clone();
                }
                if !dry_run {
                    self.store.upsert(&update, supplied)?;
                }
                self.result.updated += 1;
                self.result.created.add_items(order);
                log::debug!("{} merged into {}", order.folio, update.folio);
            }
        }
        Ok(())
    }
}
