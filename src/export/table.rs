//! Flat row-per-order rendering shared by the CSV and spreadsheet exports
//!
//! Headers use the canonical field names and the numbered item-group
//! spellings the row importer recognizes, so an exported table can be
//! imported again.

use chrono::NaiveDateTime;

use crate::entities::work_order::{Material, OrderStatus, WorkOrder};
use crate::mapping::columns::{Field, ITEM_GROUPS};
use crate::mapping::grid::Cell;

/// Item groups per kind, as a slice index bound
const GROUPS: usize = ITEM_GROUPS as usize;

/// Order fields exported, in column order
pub const EXPORT_FIELDS: [Field; 22] = [
    Field::Folio,
    Field::Responsible,
    Field::Machine,
    Field::FaultType,
    Field::ActionType,
    Field::StartDate,
    Field::EndDate,
    Field::PlannedDate,
    Field::ReviewDate,
    Field::Days,
    Field::Persons,
    Field::LaborHours,
    Field::Status,
    Field::Description,
    Field::Observation,
    Field::Brand,
    Field::Model,
    Field::Location,
    Field::Supervisor,
    Field::Odometer,
    Field::ReviewedBy,
    Field::ReceivedBy,
];

/// A value destined for one exported cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => Cell::Number(*n).text(),
        }
    }
}

/// Date text the importer parses back (`2025-01-05`, `2025-01-05 08:30:00`)
pub fn date_text(date: Option<NaiveDateTime>) -> String {
    date.map(|d| Cell::Date(d).text()).unwrap_or_default()
}

/// Header row: order fields, then task / part / supply groups 1..=5
pub fn headers() -> Vec<String> {
    let mut headers: Vec<String> = EXPORT_FIELDS.iter().map(|f| f.canonical().to_string()).collect();
    for i in 1..=ITEM_GROUPS {
        headers.extend([format!("tarea {i}"), format!("tiempo estimado {i}"), format!("tiempo real {i}")]);
    }
    for prefix in ["repuesto", "insumo"] {
        for i in 1..=ITEM_GROUPS {
            headers.extend([
                format!("{prefix} codigo {i}"),
                format!("{prefix} desc {i}"),
                format!("{prefix} cantidad {i}"),
            ]);
        }
    }
    headers
}

/// Value of one order field
pub fn field_value(order: &WorkOrder, field: Field) -> Value {
    let text = |s: &str| Value::Text(s.to_string());
    match field {
        Field::Folio => text(&order.folio),
        Field::Responsible => text(&order.responsible),
        Field::Machine => text(&order.machine),
        Field::FaultType => text(&order.fault_type),
        Field::ActionType => text(&order.action_type),
        Field::StartDate => Value::Text(date_text(order.start_date)),
        Field::EndDate => Value::Text(date_text(order.end_date)),
        Field::PlannedDate => Value::Text(date_text(order.planned_date)),
        Field::ReviewDate => Value::Text(date_text(order.review_date)),
        Field::Days => Value::Number(order.days as f64),
        Field::Persons => Value::Number(order.persons as f64),
        Field::LaborHours => Value::Number(order.labor_hours),
        Field::Status => text(order.status.as_str()),
        Field::MaintenanceAchieved => text(if order.status == OrderStatus::Done { "SI" } else { "NO" }),
        Field::Observation => text(&order.observation),
        Field::Description => text(&order.description),
        Field::Brand => text(&order.brand),
        Field::Model => text(&order.model),
        Field::Location => text(&order.location),
        Field::Supervisor => text(&order.supervisor),
        Field::Odometer => text(&order.odometer),
        Field::ReviewedBy => text(&order.reviewed_by),
        Field::ReceivedBy => text(&order.received_by),
    }
}

fn material_values(items: &[Material], out: &mut Vec<Value>) {
    for i in 0..GROUPS {
        match items.get(i) {
            Some(m) => out.extend([
                Value::Text(m.code.clone()),
                Value::Text(m.description.clone()),
                Value::Number(m.quantity as f64),
            ]),
            None => out.extend([Value::Text(String::new()), Value::Text(String::new()), Value::Text(String::new())]),
        }
    }
}

/// One record aligned with [`headers`]; items past the fifth are dropped
pub fn record(order: &WorkOrder) -> Vec<Value> {
    let dropped = [order.tasks.len(), order.parts.len(), order.supplies.len()]
        .iter()
        .map(|n| n.saturating_sub(GROUPS))
        .sum::<usize>();
    if dropped > 0 {
        log::warn!("{}: {} line items beyond {} per kind are not exported", order.folio, dropped, ITEM_GROUPS);
    }

    let mut values: Vec<Value> = EXPORT_FIELDS.iter().map(|f| field_value(order, *f)).collect();
    for i in 0..GROUPS {
        match order.tasks.get(i) {
            Some(t) => values.extend([
                Value::Text(t.detail.clone()),
                Value::Number(t.estimated_time as f64),
                Value::Number(t.actual_time as f64),
            ]),
            None => values.extend([Value::Text(String::new()), Value::Text(String::new()), Value::Text(String::new())]),
        }
    }
    material_values(&order.parts, &mut values);
    material_values(&order.supplies, &mut values);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::work_order::Task;
    use crate::mapping::columns::ColumnMap;

    #[test]
    fn test_headers_map_back_onto_every_field() {
        let headers = headers();
        let map = ColumnMap::build(&headers);
        for field in EXPORT_FIELDS {
            assert_eq!(map.header(field), Some(field.canonical()), "{field}");
        }
        assert_eq!(map.tasks().len(), GROUPS);
        assert_eq!(map.parts().len(), GROUPS);
        assert_eq!(map.supplies().len(), GROUPS);
    }

    #[test]
    fn test_record_aligns_with_headers() {
        let mut order = WorkOrder::new("001-25");
        order.tasks.push(Task { number: 1, detail: "Cambiar filtro".into(), estimated_time: 30, actual_time: 45 });
        let record = record(&order);
        let headers = headers();
        assert_eq!(record.len(), headers.len());

        let at = |name: &str| record[headers.iter().position(|h| h == name).unwrap()].text();
        assert_eq!(at("ot"), "001-25");
        assert_eq!(at("personas"), "1");
        assert_eq!(at("tarea 1"), "Cambiar filtro");
        assert_eq!(at("tiempo real 1"), "45");
        assert_eq!(at("tarea 2"), "");
    }
}
