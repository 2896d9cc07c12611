//! Row-per-record mapping: one header row, one work order per row

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{Map, Value};

use super::{ImportError, ImportRun, Location, OnDuplicate};
use crate::entities::work_order::{Material, OrderStatus, Supplied, Task, WorkOrder};
use crate::mapping::coerce::{date_or, float_or, int_or, text};
use crate::mapping::columns::{ColumnMap, Field, MaterialColumns};
use crate::mapping::grid::{Cell, Grid};
use crate::mapping::normalize::{contains_term, normalize};

/// Rows scanned for a header when the first row is not one
pub const HEADER_SCAN_ROWS: usize = 10;

/// Words that mark a header row
const HEADER_KEYWORDS: &[&str] = &["encargado", "maquina", "tipo", "fecha"];

fn header_texts(row: &[Cell]) -> Vec<String> {
    row.iter().map(Cell::text).collect()
}

/// Locate the header row and build its column map
///
/// The first row wins when it maps any canonical field. Otherwise the first
/// [`HEADER_SCAN_ROWS`] rows are scanned for one mentioning a header keyword
/// that also maps.
pub fn detect_header(grid: &Grid) -> Option<(usize, ColumnMap)> {
    let first = grid.row(0).map(|row| ColumnMap::build(&header_texts(row)))?;
    if !first.is_empty() {
        return Some((0, first));
    }

    (1..HEADER_SCAN_ROWS.min(grid.height())).find_map(|r| {
        let row = grid.row(r)?;
        let mentions_keyword = row.iter().any(|cell| {
            let text = normalize(&cell.text());
            HEADER_KEYWORDS.iter().any(|k| contains_term(&text, k))
        });
        if !mentions_keyword {
            return None;
        }
        let map = ColumnMap::build(&header_texts(row));
        (!map.is_empty()).then_some((r, map))
    })
}

fn cell<'r>(map: &ColumnMap, row: &'r [Cell], field: Field) -> Option<&'r Cell> {
    map.column(field).and_then(|c| at(row, Some(c)))
}

fn at(row: &[Cell], col: Option<usize>) -> Option<&Cell> {
    col.and_then(|c| row.get(c)).filter(|c| !c.is_blank())
}

/// Map one data row onto a work order, with the scalars the row actually set
///
/// The folio is left empty when the row has none. Numeric fields are
/// clamped (persons ≥ 1, days ≥ 0, hours ≥ 0). A missing start date stays
/// `None` here; the writer fills in `now` for new orders.
pub fn map_row(map: &ColumnMap, row: &[Cell]) -> (WorkOrder, Supplied) {
    let txt = |field| text(cell(map, row, field)).unwrap_or_default();

    let mut order = WorkOrder::new(txt(Field::Folio));
    order.responsible = txt(Field::Responsible);
    order.machine = txt(Field::Machine);
    order.fault_type = txt(Field::FaultType);
    order.action_type = txt(Field::ActionType);
    order.description = txt(Field::Description);
    order.observation = txt(Field::Observation);
    order.brand = txt(Field::Brand);
    order.model = txt(Field::Model);
    order.location = txt(Field::Location);
    order.supervisor = txt(Field::Supervisor);
    order.odometer = txt(Field::Odometer);
    order.reviewed_by = txt(Field::ReviewedBy);
    order.received_by = txt(Field::ReceivedBy);

    order.start_date = date_or(cell(map, row, Field::StartDate), None).into_inner();
    order.end_date = date_or(cell(map, row, Field::EndDate), None).into_inner();
    order.planned_date = date_or(cell(map, row, Field::PlannedDate), None).into_inner();
    order.review_date = date_or(cell(map, row, Field::ReviewDate), None).into_inner();

    let days = int_or(cell(map, row, Field::Days), 0);
    let persons = int_or(cell(map, row, Field::Persons), 1);
    let labor_hours = float_or(cell(map, row, Field::LaborHours), 0.0);
    let status = text(cell(map, row, Field::Status))
        .and_then(|s| OrderStatus::parse_loose(&s))
        .or_else(|| {
            cell(map, row, Field::MaintenanceAchieved)
                .map(|_| OrderStatus::from_legacy_flag(&txt(Field::MaintenanceAchieved)))
        });
    let supplied = Supplied {
        status: status.is_some(),
        days: !days.is_default(),
        persons: !persons.is_default(),
        labor_hours: !labor_hours.is_default(),
    };

    order.days = days.into_inner().max(0);
    order.persons = persons.into_inner().max(1);
    order.labor_hours = labor_hours.into_inner().max(0.0);
    order.status = status.unwrap_or_default();

    for group in map.tasks() {
        let detail = text(at(row, group.detail));
        let estimated = int_or(at(row, group.estimated), 0);
        let actual = int_or(at(row, group.actual), 0);
        if detail.is_some() || !estimated.is_default() || !actual.is_default() {
            order.tasks.push(Task {
                number: i64::from(group.number),
                detail: detail.unwrap_or_default(),
                estimated_time: estimated.into_inner(),
                actual_time: actual.into_inner(),
            });
        }
    }
    order.parts = materials(map.parts(), row);
    order.supplies = materials(map.supplies(), row);

    order.refresh_incomplete();
    (order, supplied)
}

fn materials(groups: &[MaterialColumns], row: &[Cell]) -> Vec<Material> {
    groups
        .iter()
        .filter_map(|group| {
            let code = text(at(row, group.code));
            let description = text(at(row, group.description));
            let quantity = int_or(at(row, group.quantity), 1);
            if code.is_none() && description.is_none() && quantity.is_default() {
                return None;
            }
            Some(Material {
                number: i64::from(group.number),
                code: code.unwrap_or_default(),
                description: description.unwrap_or_default(),
                quantity: quantity.into_inner(),
            })
        })
        .collect()
}

/// Raw JSON object of a row keyed by header (`col_N` for blank / repeated headers)
pub fn row_json(headers: &[String], row: &[Cell]) -> Value {
    let mut seen = HashSet::new();
    let mut object = Map::new();
    for i in 0..headers.len().max(row.len()) {
        let header = headers.get(i).map(|h| h.trim()).unwrap_or_default();
        let key = if header.is_empty() || !seen.insert(header.to_string()) {
            format!("col_{}", i + 1)
        } else {
            header.to_string()
        };
        let value = row
            .get(i)
            .and_then(|c| serde_json::to_value(c).ok())
            .unwrap_or(Value::Null);
        object.insert(key, value);
    }
    Value::Object(object)
}

pub(crate) fn map_rows(run: &mut ImportRun<'_>) -> Result<(), ImportError> {
    let workbook = run.workbook;
    let policy = run.options.on_duplicate.unwrap_or(OnDuplicate::Update);
    let limit = run.options.limit;

    let mut tables = Vec::new();
    let mut headerless = Vec::new();
    for sheet in workbook.sheets.iter().filter(|s| !s.grid.is_empty()) {
        match detect_header(&sheet.grid) {
            Some((header_row, map)) => tables.push((sheet, header_row, map)),
            None => headerless.push(sheet),
        }
    }

    if tables.is_empty() {
        let headers = headerless
            .first()
            .and_then(|s| s.grid.row(0))
            .map(header_texts)
            .unwrap_or_default()
            .into_iter()
            .filter(|h| !h.is_empty())
            .collect();
        return Err(ImportError::NoCanonicalColumns {
            file: workbook.file_name.clone(),
            headers,
        });
    }

    for sheet in headerless {
        run.result
            .diagnose(Location::Sheet(sheet.name.clone()), None, "no recognizable header row, sheet skipped");
    }

    for (sheet, header_row, map) in &tables {
        for field in map.resolved() {
            let name = field.canonical().to_string();
            if !run.result.resolved_columns.contains(&name) {
                run.result.resolved_columns.push(name);
            }
        }
        let missing = map.missing_required();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(Field::canonical).collect();
            let resolved: Vec<&str> = map.resolved().iter().map(Field::canonical).collect();
            run.result.diagnose(
                Location::Sheet(sheet.name.clone()),
                None,
                format!(
                    "missing required columns: {} (resolved: {}); rows import with defaults",
                    names.join(", "),
                    resolved.join(", ")
                ),
            );
        }
        log::debug!("{}: header at row {}, columns {:?}", sheet.name, header_row + 1, map.resolved());

        for r in (header_row + 1)..sheet.grid.height() {
            if run.result.limit_reached(limit) {
                break;
            }
            let Some(row) = sheet.grid.row(r) else { break };
            if row.iter().all(Cell::is_blank) {
                continue;
            }
            run.result.examined += 1;

            let row_number = r + 1;
            let location = Location::Row { sheet: sheet.name.clone(), row: row_number };
            run.capture(location.clone(), row_number, Some(sheet.name.as_str()), row_json(map.headers(), row));

            let (mut order, supplied) = map_row(map, row);
            if order.folio.is_empty() {
                order.folio = format!("OT-{}-{}", Utc::now().timestamp_millis(), row_number);
            }
            order.source_file = Some(workbook.file_name.clone());
            order.source_row = i64::try_from(row_number).ok();
            order.source_sheet = Some(sheet.name.clone());

            let matches = match run.store.exists(&order.folio) {
                Ok(true) => vec![order.folio.clone()],
                Ok(false) => Vec::new(),
                Err(e) => {
                    run.result.diagnose(location, Some(&order.folio), e.to_string());
                    continue;
                }
            };

            if let Err(e) = run.write_order(&order, supplied, &matches, policy) {
                run.result.diagnose(location, Some(&order.folio), e.to_string());
            }
        }
    }

    let missing: Vec<String> = Field::REQUIRED
        .iter()
        .map(|f| f.canonical().to_string())
        .filter(|name| !run.result.resolved_columns.contains(name))
        .collect();
    run.result.missing_columns = missing;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::OrderStore;
    use crate::mapping::{import, Layout, MapOptions};
    use crate::source::{Sheet, SourceKind, Workbook};
    use chrono::NaiveDate;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn cells(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|s| Cell::from(*s)).collect()
    }

    fn csv(rows: &[&[&str]]) -> Workbook {
        Workbook::from_sheets(
            "ot.csv",
            SourceKind::Csv,
            vec![Sheet { name: "ot".into(), grid: Grid::from_strs(rows) }],
        )
    }

    #[test]
    fn test_map_row_fields_and_clamps() {
        let map = ColumnMap::build(&headers(&[
            "OT", "Encargado", "Máquina", "Tipo de Falla", "Fecha Inicio", "Días", "Personas", "HH", "Mantención Lograda",
        ]));
        let (order, supplied) = map_row(
            &map,
            &cells(&["001-25", "Ana", "Prensa", "Eléctrica", "2025-01-05", "-3", "0", "2,5", "SI"]),
        );

        assert_eq!(order.folio, "001-25");
        assert_eq!(order.responsible, "Ana");
        assert_eq!(order.fault_type, "Eléctrica");
        assert_eq!(order.start_date.map(|d| d.to_string()), Some("2025-01-05 00:00:00".to_string()));
        assert_eq!(order.days, 0);
        assert_eq!(order.persons, 1);
        assert_eq!(order.labor_hours, 2.5);
        assert_eq!(order.status, OrderStatus::Done);
        assert!(!order.incomplete);
        assert_eq!(supplied, Supplied::ALL);
    }

    #[test]
    fn test_map_row_defaults() {
        let map = ColumnMap::build(&headers(&["OT", "Fecha Inicio", "Observación"]));
        let (order, supplied) = map_row(&map, &cells(&["", "no es fecha", "ok"]));
        assert_eq!(order.folio, "");
        assert_eq!(order.start_date, None);
        assert_eq!(supplied, Supplied::default());
        assert_eq!(order.end_date, None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.incomplete);
    }

    #[test]
    fn test_map_row_item_groups() {
        let map = ColumnMap::build(&headers(&[
            "OT", "Tarea 1", "tiempoEstimado1", "Tarea 2", "repuestoCodigo1", "repuestoCantidad1", "insumoDesc2",
        ]));
        let (order, _) = map_row(&map, &cells(&["9", "Cambiar filtro", "30", "", "F-1", "", "Grasa"]));

        assert_eq!(order.tasks.len(), 1);
        assert_eq!(order.tasks[0].number, 1);
        assert_eq!(order.tasks[0].estimated_time, 30);
        assert_eq!(order.parts.len(), 1);
        assert_eq!(order.parts[0].quantity, 1);
        assert_eq!(order.supplies.len(), 1);
        assert_eq!(order.supplies[0].number, 2);
        assert_eq!(order.supplies[0].description, "Grasa");
    }

    #[test]
    fn test_detect_header_below_title_rows() {
        let grid = Grid::from_strs(&[
            &["Informe mensual"],
            &[""],
            &["OT", "Encargado", "Tipo"],
            &["1", "Ana", "Mecánica"],
        ]);
        let (row, map) = detect_header(&grid).unwrap();
        assert_eq!(row, 2);
        assert_eq!(map.header(Field::FaultType), Some("Tipo"));

        assert!(detect_header(&Grid::from_strs(&[&["Color", "Peso"], &["rojo", "3"]])).is_none());
    }

    #[test]
    fn test_row_json_keys() {
        let json = row_json(&headers(&["OT", "", "OT"]), &cells(&["1", "x", "2", "extra"]));
        assert_eq!(
            json,
            serde_json::json!({"OT": "1", "col_2": "x", "col_3": "2", "col_4": "extra"})
        );
    }

    #[test]
    fn test_import_rows_upserts_by_default() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let first = csv(&[
            &["OT", "Encargado", "Máquina", "Tarea 1", "Tarea 2"],
            &["001-25", "Ana", "Prensa", "Cambiar filtro", "Revisar correas"],
            &["", "", "", "", ""],
            &["002-25", "", "", "", ""],
        ]);
        let result = import(&mut store, &first, &MapOptions::default()).unwrap();
        assert_eq!(result.layout, Layout::Rows);
        assert_eq!(result.created.orders, 2);
        assert_eq!(result.created.tasks, 2);
        assert_eq!(result.examined, 2);
        assert_eq!(result.raw_captured, 2);
        assert_eq!(result.missing_columns, vec!["tipo_falla", "fecha_inicio"]);
        assert!(store.get("002-25").unwrap().unwrap().incomplete);

        let second = csv(&[
            &["OT", "Encargado", "Máquina", "Tarea 1"],
            &["001-25", "", "Torno", "Solo una"],
        ]);
        let result = import(&mut store, &second, &MapOptions::default()).unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(result.created.orders, 0);

        let order = store.get("001-25").unwrap().unwrap();
        assert_eq!(order.responsible, "Ana");
        assert_eq!(order.machine, "Torno");
        assert_eq!(order.tasks.len(), 1);
        assert_eq!(store.counts().unwrap().tasks, 1);
    }

    #[test]
    fn test_reimport_keeps_start_date_when_cell_is_empty() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let first = csv(&[&["OT", "Encargado", "Fecha Inicio"], &["1", "Ana", "2020-01-05"]]);
        import(&mut store, &first, &MapOptions::default()).unwrap();

        let second = csv(&[&["OT", "Encargado", "Fecha Inicio"], &["1", "Luis", ""]]);
        let result = import(&mut store, &second, &MapOptions::default()).unwrap();
        assert_eq!(result.updated, 1);

        let order = store.get("1").unwrap().unwrap();
        assert_eq!(order.responsible, "Luis");
        assert_eq!(order.start_date, NaiveDate::from_ymd_opt(2020, 1, 5).and_then(|d| d.and_hms_opt(0, 0, 0)));
    }

    #[test]
    fn test_new_order_without_date_starts_now() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let before = Utc::now().naive_utc() - chrono::Duration::seconds(1);
        let wb = csv(&[&["OT", "Encargado", "Fecha Inicio"], &["1", "Ana", ""]]);
        import(&mut store, &wb, &MapOptions::default()).unwrap();

        let start = store.get("1").unwrap().unwrap().start_date.unwrap();
        assert!(start >= before);
    }

    #[test]
    fn test_reimport_moves_status_back_to_pending() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let done = csv(&[&["OT", "Encargado", "Estado", "Personas"], &["1", "Ana", "terminada", "3"]]);
        import(&mut store, &done, &MapOptions::default()).unwrap();
        assert_eq!(store.get("1").unwrap().unwrap().status, OrderStatus::Done);

        let reopened = csv(&[&["OT", "Encargado", "Estado", "Personas"], &["1", "Ana", "pendiente", ""]]);
        import(&mut store, &reopened, &MapOptions::default()).unwrap();

        let order = store.get("1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.persons, 3);
    }

    #[test]
    fn test_import_rows_skip_policy_and_limit() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = csv(&[&["OT", "Encargado"], &["1", "Ana"], &["2", "Luis"], &["3", "Eva"]]);
        let options = MapOptions { limit: Some(2), ..Default::default() };
        let result = import(&mut store, &wb, &options).unwrap();
        assert_eq!(result.created.orders, 2);
        assert!(!store.exists("3").unwrap());

        let options = MapOptions { on_duplicate: Some(OnDuplicate::Skip), ..Default::default() };
        let again = csv(&[&["OT", "Encargado"], &["1", "Otro"]]);
        let result = import(&mut store, &again, &options).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(store.get("1").unwrap().unwrap().responsible, "Ana");
    }

    #[test]
    fn test_import_rows_synthesizes_folio() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = csv(&[&["Encargado", "Máquina"], &["Ana", "Prensa"]]);
        let result = import(&mut store, &wb, &MapOptions::default()).unwrap();
        assert_eq!(result.created.orders, 1);
        let folios = store.folios().unwrap();
        assert!(folios[0].starts_with("OT-"));
        assert!(folios[0].ends_with("-2"));
    }

    #[test]
    fn test_import_rows_without_columns_fails() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = csv(&[&["Color", "Peso"], &["rojo", "3"]]);
        let err = import(&mut store, &wb, &MapOptions::default()).unwrap_err();
        match err {
            ImportError::NoCanonicalColumns { headers, .. } => assert_eq!(headers, vec!["Color", "Peso"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.counts().unwrap().total(), 0);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = csv(&[&["OT", "Encargado", "Tarea 1"], &["1", "Ana", "x"]]);
        let options = MapOptions { dry_run: true, ..Default::default() };
        let result = import(&mut store, &wb, &options).unwrap();
        assert_eq!(result.created.orders, 1);
        assert_eq!(result.created.tasks, 1);
        assert_eq!(result.raw_captured, 0);
        assert_eq!(store.counts().unwrap().total(), 0);
    }
}
