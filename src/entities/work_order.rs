//! Work order entity - a maintenance ticket with its task and material lines

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::normalize::normalize;

/// Display label for an empty responsible / machine / fault type
pub const UNSPECIFIED: &str = "No Especificado";

/// Legacy sentinel some spreadsheets carry for "left blank"
pub const UNSPECIFIED_SENTINEL: &str = "no_especificado";

/// Work order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [OrderStatus::Pending, OrderStatus::InProgress, OrderStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Done => "done",
        }
    }

    /// Lenient parse of free text found in spreadsheet cells
    ///
    /// Accepts the canonical names plus the Spanish labels used on the
    /// shop floor ("pendiente", "en proceso", "terminada", ...).
    pub fn parse_loose(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "pending" | "pendiente" | "abierta" | "abierto" => Some(OrderStatus::Pending),
            "in progress" | "en progreso" | "en proceso" | "en curso" | "en ejecucion" => {
                Some(OrderStatus::InProgress)
            }
            "done" | "completada" | "completado" | "terminada" | "terminado" | "finalizada"
            | "finalizado" | "cerrada" | "cerrado" | "realizada" => Some(OrderStatus::Done),
            _ => None,
        }
    }

    /// Map the deprecated "maintenance achieved" SI/NO flag onto a status
    ///
    /// Only the first two letters count ("SI", "Sí, parcial" → done);
    /// anything else is pending.
    pub fn from_legacy_flag(s: &str) -> Self {
        let flag: String = normalize(s).chars().take(2).collect();
        if flag == "si" {
            OrderStatus::Done
        } else {
            OrderStatus::Pending
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "in_progress" => Ok(OrderStatus::InProgress),
            "done" => Ok(OrderStatus::Done),
            _ => Err(format!(
                "Invalid status: {}. Use pending, in_progress, or done",
                s
            )),
        }
    }
}

/// The three kinds of line item a work order owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Task,
    Part,
    Supply,
}

impl ItemKind {
    pub fn table(&self) -> &'static str {
        match self {
            ItemKind::Task => "tasks",
            ItemKind::Part => "parts",
            ItemKind::Supply => "supplies",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::Part => write!(f, "part"),
            ItemKind::Supply => write!(f, "supply"),
        }
    }
}

/// A task line (what was done, estimated vs actual time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub number: i64,

    #[serde(default)]
    pub detail: String,

    #[serde(default)]
    pub estimated_time: i64,

    #[serde(default)]
    pub actual_time: i64,
}

/// A spare part or consumable supply line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub number: i64,

    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

fn default_persons() -> i64 {
    1
}

/// A maintenance work order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Unique human-facing identifier ("001-25", "OT-7")
    pub folio: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub responsible: String,

    #[serde(default)]
    pub machine: String,

    #[serde(default)]
    pub fault_type: String,

    #[serde(default)]
    pub action_type: String,

    #[serde(default)]
    pub brand: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub odometer: String,

    #[serde(default)]
    pub supervisor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDateTime>,

    #[serde(default)]
    pub days: i64,

    #[serde(default = "default_persons")]
    pub persons: i64,

    /// Labor hours (HH)
    #[serde(default)]
    pub labor_hours: f64,

    #[serde(default)]
    pub status: OrderStatus,

    #[serde(default)]
    pub observation: String,

    #[serde(default)]
    pub reviewed_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date: Option<NaiveDateTime>,

    #[serde(default)]
    pub received_by: String,

    /// Set when responsible, machine and fault type all came out empty
    #[serde(default)]
    pub incomplete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    /// 1-based spreadsheet row (row-per-record imports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_row: Option<i64>,

    /// Sheet name (sheet-per-record imports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sheet: Option<String>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(default)]
    pub parts: Vec<Material>,

    #[serde(default)]
    pub supplies: Vec<Material>,
}

impl WorkOrder {
    /// Create an empty order with the given folio
    pub fn new(folio: impl Into<String>) -> Self {
        Self {
            folio: folio.into(),
            description: String::new(),
            responsible: String::new(),
            machine: String::new(),
            fault_type: String::new(),
            action_type: String::new(),
            brand: String::new(),
            model: String::new(),
            location: String::new(),
            odometer: String::new(),
            supervisor: String::new(),
            planned_date: None,
            start_date: None,
            end_date: None,
            days: 0,
            persons: 1,
            labor_hours: 0.0,
            status: OrderStatus::Pending,
            observation: String::new(),
            reviewed_by: String::new(),
            review_date: None,
            received_by: String::new(),
            incomplete: false,
            source_file: None,
            source_row: None,
            source_sheet: None,
            tasks: Vec::new(),
            parts: Vec::new(),
            supplies: Vec::new(),
        }
    }

    /// True when every required field (responsible, machine, fault type)
    /// is empty or carries the legacy "no_especificado" sentinel.
    pub fn lacks_required_fields(&self) -> bool {
        [&self.responsible, &self.machine, &self.fault_type]
            .iter()
            .all(|v| is_unspecified(v))
    }

    /// Recompute the `incomplete` flag from the current field values
    pub fn refresh_incomplete(&mut self) {
        self.incomplete = self.lacks_required_fields();
    }

    pub fn item_count(&self) -> usize {
        self.tasks.len() + self.parts.len() + self.supplies.len()
    }

    /// Merge a re-submitted order into this one
    ///
    /// Non-empty text and present dates from `other` overwrite, as do the
    /// scalars flagged in `supplied`; everything else is kept. Line items
    /// are replaced wholesale, never merged.
    pub fn merge_from(&mut self, other: WorkOrder, supplied: Supplied) {
        fn take_text(dst: &mut String, src: String) {
            if !src.trim().is_empty() {
                *dst = src;
            }
        }
        fn take_date(dst: &mut Option<NaiveDateTime>, src: Option<NaiveDateTime>) {
            if src.is_some() {
                *dst = src;
            }
        }

        take_text(&mut self.description, other.description);
        take_text(&mut self.responsible, other.responsible);
        take_text(&mut self.machine, other.machine);
        take_text(&mut self.fault_type, other.fault_type);
        take_text(&mut self.action_type, other.action_type);
        take_text(&mut self.brand, other.brand);
        take_text(&mut self.model, other.model);
        take_text(&mut self.location, other.location);
        take_text(&mut self.odometer, other.odometer);
        take_text(&mut self.supervisor, other.supervisor);
        take_text(&mut self.observation, other.observation);
        take_text(&mut self.reviewed_by, other.reviewed_by);
        take_text(&mut self.received_by, other.received_by);

        take_date(&mut self.planned_date, other.planned_date);
        take_date(&mut self.start_date, other.start_date);
        take_date(&mut self.end_date, other.end_date);
        take_date(&mut self.review_date, other.review_date);

        if supplied.days {
            self.days = other.days;
        }
        if supplied.persons {
            self.persons = other.persons;
        }
        if supplied.labor_hours {
            self.labor_hours = other.labor_hours;
        }
        if supplied.status {
            self.status = other.status;
        }

        if other.source_file.is_some() {
            self.source_file = other.source_file;
            self.source_row = other.source_row;
            self.source_sheet = other.source_sheet;
        }

        self.tasks = other.tasks;
        self.parts = other.parts;
        self.supplies = other.supplies;

        self.refresh_incomplete();
    }
}

/// Scalar fields a source gave explicitly
///
/// Their defaults (pending, one person, zero days and hours) are also valid
/// values, so presence is tracked apart from the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Supplied {
    pub status: bool,
    pub days: bool,
    pub persons: bool,
    pub labor_hours: bool,
}

impl Supplied {
    pub const ALL: Supplied = Supplied {
        status: true,
        days: true,
        persons: true,
        labor_hours: true,
    };

    /// Non-null keys of a submitted JSON order
    pub fn from_json(value: &serde_json::Value) -> Self {
        let present = |key: &str| value.get(key).is_some_and(|v| !v.is_null());
        Self {
            status: present("status"),
            days: present("days"),
            persons: present("persons"),
            labor_hours: present("labor_hours"),
        }
    }
}

/// Empty, whitespace-only, or the "no_especificado" sentinel
pub fn is_unspecified(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(UNSPECIFIED_SENTINEL) || normalize(v) == normalize(UNSPECIFIED)
}

/// Display form for grouping: unspecified values collapse to one label
pub fn display_or_unspecified(value: &str) -> &str {
    if is_unspecified(value) {
        UNSPECIFIED
    } else {
        value.trim()
    }
}

/// Audit copy of one imported source row or sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRowCapture {
    /// Database id (absent until stored)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// ULID shared by every capture of one import invocation
    pub batch: String,

    pub source_file: String,

    /// SHA-256 of the source file contents
    pub source_sha256: String,

    /// 1-based row number, or sheet position for sheet-per-record input
    pub row: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,

    pub data: serde_json::Value,

    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with_items() -> WorkOrder {
        let mut order = WorkOrder::new("001-25");
        order.responsible = "Juan".into();
        order.machine = "Prensa".into();
        order.days = 2;
        order.tasks = vec![
            Task { number: 1, detail: "Cambiar filtro".into(), estimated_time: 1, actual_time: 1 },
            Task { number: 2, detail: "Revisar correas".into(), estimated_time: 2, actual_time: 3 },
        ];
        order.parts = vec![Material { number: 1, code: "F-1".into(), description: "Filtro".into(), quantity: 2 }];
        order
    }

    #[test]
    fn test_incomplete_requires_all_three_missing() {
        let mut order = WorkOrder::new("x");
        order.refresh_incomplete();
        assert!(order.incomplete);

        order.fault_type = "Eléctrica".into();
        order.refresh_incomplete();
        assert!(!order.incomplete);

        let mut sentinel = WorkOrder::new("y");
        sentinel.responsible = "no_especificado".into();
        sentinel.machine = "  ".into();
        sentinel.refresh_incomplete();
        assert!(sentinel.incomplete);
    }

    #[test]
    fn test_merge_keeps_unsupplied_fields_and_replaces_items() {
        let mut existing = order_with_items();
        let mut update = WorkOrder::new("001-25");
        update.machine = "Torno".into();
        update.supplies = vec![Material { number: 1, code: String::new(), description: "Grasa".into(), quantity: 1 }];

        existing.merge_from(update, Supplied::default());

        assert_eq!(existing.responsible, "Juan");
        assert_eq!(existing.machine, "Torno");
        assert_eq!(existing.days, 2);
        assert!(existing.tasks.is_empty());
        assert!(existing.parts.is_empty());
        assert_eq!(existing.supplies.len(), 1);
        assert_eq!(existing.item_count(), 1);
    }

    #[test]
    fn test_merge_applies_supplied_defaults() {
        let mut existing = order_with_items();
        existing.status = OrderStatus::Done;
        existing.persons = 3;

        let update = WorkOrder::new("001-25");
        existing.merge_from(update.clone(), Supplied { status: true, days: true, ..Default::default() });
        assert_eq!(existing.status, OrderStatus::Pending);
        assert_eq!(existing.days, 0);
        assert_eq!(existing.persons, 3);

        existing.merge_from(update, Supplied::ALL);
        assert_eq!(existing.persons, 1);
    }

    #[test]
    fn test_supplied_from_json_keys() {
        let value = serde_json::json!({"folio": "1", "status": "pending", "days": 0, "persons": null});
        assert_eq!(
            Supplied::from_json(&value),
            Supplied { status: true, days: true, ..Default::default() }
        );
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("in-progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert!("later".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::parse_loose("En Proceso"), Some(OrderStatus::InProgress));
        assert_eq!(OrderStatus::parse_loose("TERMINADA"), Some(OrderStatus::Done));
        assert_eq!(OrderStatus::parse_loose("quizás"), None);
    }

    #[test]
    fn test_legacy_flag_maps_to_status() {
        assert_eq!(OrderStatus::from_legacy_flag("SI"), OrderStatus::Done);
        assert_eq!(OrderStatus::from_legacy_flag("Sí"), OrderStatus::Done);
        assert_eq!(OrderStatus::from_legacy_flag("NO"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_legacy_flag(""), OrderStatus::Pending);
    }

    #[test]
    fn test_unspecified_display() {
        assert_eq!(display_or_unspecified(""), UNSPECIFIED);
        assert_eq!(display_or_unspecified("no_especificado"), UNSPECIFIED);
        assert_eq!(display_or_unspecified(" Pedro "), "Pedro");
    }

    #[test]
    fn test_json_defaults() {
        let order: WorkOrder = serde_json::from_str(r#"{"folio": "OT-7"}"#).unwrap();
        assert_eq!(order.persons, 1);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.tasks.is_empty());
    }
}
