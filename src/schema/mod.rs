//! Direct order submission, validated against the embedded JSON schema

use std::collections::HashSet;

use jsonschema::{validator_for, Validator};
use rust_embed::Embed;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::store::{OrderStore, StoreError, UpsertOutcome};
use crate::entities::work_order::{Supplied, WorkOrder};

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// File name of the work order schema inside `schemas/`
pub const WORK_ORDER_SCHEMA: &str = "work_order.schema.json";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("work order rejected:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),

    #[error("work order schema unavailable: {0}")]
    Schema(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Raw text of the embedded work order schema
pub fn schema_source() -> Option<String> {
    EmbeddedSchemas::get(WORK_ORDER_SCHEMA).and_then(|file| String::from_utf8(file.data.into_owned()).ok())
}

/// Compiled work order schema
pub struct OrderValidator {
    validator: Validator,
}

impl OrderValidator {
    pub fn new() -> Result<Self, SubmitError> {
        let source = schema_source().ok_or_else(|| SubmitError::Schema(format!("{} not embedded", WORK_ORDER_SCHEMA)))?;
        let schema: JsonValue = serde_json::from_str(&source)?;
        let validator = validator_for(&schema).map_err(|e| SubmitError::Schema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Every schema violation in `value`, as "<path>: <message>"
    pub fn violations(&self, value: &JsonValue) -> Vec<String> {
        self.validator
            .iter_errors(value)
            .map(|error| {
                let path = if error.instance_path.as_str().is_empty() {
                    "document root".to_string()
                } else {
                    error.instance_path.to_string()
                };
                format!("{}: {}", path, error)
            })
            .collect()
    }

    /// Validate and deserialize one submitted order, noting which scalar
    /// keys it carried
    ///
    /// Beyond the schema, item numbers must be unique within each list.
    pub fn parse(&self, json: &str) -> Result<(WorkOrder, Supplied), SubmitError> {
        let value: JsonValue = serde_json::from_str(json)?;

        let mut violations = self.violations(&value);
        if !violations.is_empty() {
            return Err(SubmitError::Invalid(violations));
        }

        let supplied = Supplied::from_json(&value);
        let mut order: WorkOrder = serde_json::from_value(value)?;
        order.folio = order.folio.trim().to_string();

        violations.extend(duplicate_numbers("tasks", order.tasks.iter().map(|t| t.number)));
        violations.extend(duplicate_numbers("parts", order.parts.iter().map(|m| m.number)));
        violations.extend(duplicate_numbers("supplies", order.supplies.iter().map(|m| m.number)));
        if !violations.is_empty() {
            return Err(SubmitError::Invalid(violations));
        }

        order.refresh_incomplete();
        Ok((order, supplied))
    }
}

fn duplicate_numbers(list: &str, numbers: impl Iterator<Item = i64>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    numbers
        .filter(|n| !seen.insert(*n) && reported.insert(*n))
        .map(|n| format!("/{}: item number {} appears more than once", list, n))
        .collect()
}

/// Validate `json` and upsert it: a new folio is created, an existing one is
/// merged and has all of its line items replaced.
pub fn submit(store: &mut OrderStore, json: &str) -> Result<(UpsertOutcome, WorkOrder), SubmitError> {
    let (order, supplied) = OrderValidator::new()?.parse(json)?;
    let outcome = store.upsert(&order, supplied)?;
    log::info!("submitted {} ({:?})", order.folio, outcome);
    Ok((outcome, order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::work_order::OrderStatus;

    #[test]
    fn test_schema_is_embedded_and_compiles() {
        assert!(schema_source().is_some());
        assert!(OrderValidator::new().is_ok());
    }

    #[test]
    fn test_rejects_schema_violations() {
        let validator = OrderValidator::new().unwrap();
        let err = validator
            .parse(r#"{"folio": "1", "status": "finished", "persons": 0, "colour": "red"}"#)
            .unwrap_err();
        match err {
            SubmitError::Invalid(violations) => {
                assert!(violations.iter().any(|v| v.starts_with("/status")));
                assert!(violations.iter().any(|v| v.starts_with("/persons")));
                assert!(violations.iter().any(|v| v.contains("colour")));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(validator.parse(r#"{"machine": "Prensa"}"#), Err(SubmitError::Invalid(_))));
        assert!(matches!(validator.parse(r#"{"folio": "   "}"#), Err(SubmitError::Invalid(_))));
        assert!(matches!(validator.parse("{not json"), Err(SubmitError::Parse(_))));
    }

    #[test]
    fn test_rejects_duplicate_item_numbers() {
        let validator = OrderValidator::new().unwrap();
        let err = validator
            .parse(r#"{"folio": "1", "tasks": [{"number": 1}, {"number": 1}, {"number": 1}]}"#)
            .unwrap_err();
        match err {
            SubmitError::Invalid(violations) => assert_eq!(violations, vec!["/tasks: item number 1 appears more than once"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resubmission_replaces_items() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let first = r#"{
            "folio": "OT-7",
            "responsible": "Ana",
            "machine": "Prensa",
            "start_date": "2025-01-05T08:00:00",
            "tasks": [{"number": 1, "detail": "a"}, {"number": 2, "detail": "b"}, {"number": 3, "detail": "c"}],
            "parts": [{"number": 1, "code": "F-1"}]
        }"#;
        let (outcome, order) = submit(&mut store, first).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(order.parts[0].quantity, 1);

        let second = r#"{"folio": "OT-7", "machine": "Torno", "tasks": [{"number": 1, "detail": "nuevo"}]}"#;
        let (outcome, _) = submit(&mut store, second).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let stored = store.get("OT-7").unwrap().unwrap();
        assert_eq!(stored.responsible, "Ana");
        assert_eq!(stored.machine, "Torno");
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.tasks[0].detail, "nuevo");
        assert!(stored.parts.is_empty());
        assert_eq!(store.counts().unwrap().tasks, 1);
    }

    #[test]
    fn test_resubmission_can_reset_status_and_counts() {
        let mut store = OrderStore::open_in_memory().unwrap();
        submit(&mut store, r#"{"folio": "OT-8", "status": "done", "persons": 4, "days": 2}"#).unwrap();

        submit(&mut store, r#"{"folio": "OT-8", "status": "pending", "persons": 1}"#).unwrap();

        let stored = store.get("OT-8").unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.persons, 1);
        assert_eq!(stored.days, 2);
    }
}
