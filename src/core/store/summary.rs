//! Aggregate analytics over stored orders

use std::collections::BTreeMap;

use serde::Serialize;

use super::{OrderStore, StoreError};
use crate::entities::work_order::{display_or_unspecified, OrderStatus};

/// Count and labor hours for one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStat {
    pub name: String,
    pub count: usize,
    pub total_hours: f64,
    pub mean_hours: f64,
}

/// Orders started in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStat {
    pub year: i32,
    pub month: u32,
    pub count: usize,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub status: OrderStatus,
    pub count: usize,
    pub percent: f64,
}

/// Full analytics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_orders: usize,
    pub incomplete: usize,
    pub total_hours: f64,
    pub by_responsible: Vec<GroupStat>,
    pub by_fault_type: Vec<GroupStat>,
    pub monthly: Vec<MonthStat>,
    pub by_status: Vec<StatusShare>,
}

#[derive(Default)]
struct Acc {
    count: usize,
    hours: f64,
}

fn into_groups(map: BTreeMap<String, Acc>) -> Vec<GroupStat> {
    let mut groups: Vec<GroupStat> = map
        .into_iter()
        .map(|(name, acc)| GroupStat {
            name,
            count: acc.count,
            total_hours: acc.hours,
            mean_hours: if acc.count == 0 { 0.0 } else { acc.hours / acc.count as f64 },
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    groups
}

impl OrderStore {
    /// Group counts and labor hours by responsible, fault type, month and status
    ///
    /// Empty and "no_especificado" values fall under "No Especificado".
    pub fn summary(&self) -> Result<Summary, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT responsible, fault_type, start_date, labor_hours, status, incomplete FROM work_orders",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)? != 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_responsible: BTreeMap<String, Acc> = BTreeMap::new();
        let mut by_fault: BTreeMap<String, Acc> = BTreeMap::new();
        let mut monthly: BTreeMap<(i32, u32), Acc> = BTreeMap::new();
        let mut by_status: BTreeMap<OrderStatus, usize> = BTreeMap::new();
        let mut incomplete = 0;
        let mut total_hours = 0.0;

        for (responsible, fault, start, hours, status, is_incomplete) in &rows {
            let acc = by_responsible.entry(display_or_unspecified(responsible).to_string()).or_default();
            acc.count += 1;
            acc.hours += hours;

            let acc = by_fault.entry(display_or_unspecified(fault).to_string()).or_default();
            acc.count += 1;
            acc.hours += hours;

            if let Some(dt) = super::parse_datetime(start.clone()) {
                use chrono::Datelike;
                let acc = monthly.entry((dt.year(), dt.month())).or_default();
                acc.count += 1;
                acc.hours += hours;
            }

            *by_status.entry(status.parse().unwrap_or_default()).or_default() += 1;
            if *is_incomplete {
                incomplete += 1;
            }
            total_hours += hours;
        }

        let total = rows.len();
        Ok(Summary {
            total_orders: total,
            incomplete,
            total_hours,
            by_responsible: into_groups(by_responsible),
            by_fault_type: into_groups(by_fault),
            monthly: monthly
                .into_iter()
                .map(|((year, month), acc)| MonthStat { year, month, count: acc.count, total_hours: acc.hours })
                .collect(),
            by_status: OrderStatus::ALL
                .iter()
                .map(|status| {
                    let count = by_status.get(status).copied().unwrap_or(0);
                    StatusShare {
                        status: *status,
                        count,
                        percent: if total == 0 { 0.0 } else { count as f64 * 100.0 / total as f64 },
                    }
                })
                .collect(),
        })
    }
}
