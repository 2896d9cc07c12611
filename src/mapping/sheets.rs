//! Sheet-per-record mapping: every sheet is one freeform work order form

use serde_json::json;

use super::{ImportRun, Location, OnDuplicate};
use crate::core::store::{OrderStore, StoreError};
use crate::entities::work_order::{Material, OrderStatus, Supplied, WorkOrder};
use crate::mapping::coerce::{date_or, float_or, int_or, text};
use crate::mapping::grid::Grid;
use crate::mapping::items::{
    extract_materials, extract_tasks, MaterialLayout, Numbering, Section, TaskLayout, PARTS, SUPPLIES, TASKS,
};
use crate::mapping::locate::{adjacent_cell, find_any_label, labelled_value};
use crate::mapping::normalize::{matches_either_way, normalize_folio};
use crate::source::Sheet;

/// Labels that carry the order number ("N°:", "Nº")
const FOLIO_LABELS: &[&str] = &["n°", "n:", "nº"];

const START_DATE_LABELS: &[&str] = &["fecha de inicio", "fecha inicio", "fecha"];
const END_DATE_LABELS: &[&str] = &["fecha de termino", "fecha termino"];
const MACHINE_LABELS: &[&str] = &["equipo/maquina", "equipo"];
const RESPONSIBLE_LABELS: &[&str] = &["responsable de ejecucion", "responsable"];
const DESCRIPTION_LABELS: &[&str] = &["descripcion"];
const FAULT_TYPE_LABELS: &[&str] = &["tipo de falla"];
const ACTION_TYPE_LABELS: &[&str] = &["tipo de accion"];
const SUPERVISOR_LABELS: &[&str] = &["supervisor"];
const LOCATION_LABELS: &[&str] = &["ubicacion"];
const STATUS_LABELS: &[&str] = &["estado"];
const HOURS_LABELS: &[&str] = &["horas hombre", "hh"];
const PERSONS_LABELS: &[&str] = &["personas"];
const OBSERVATION_LABELS: &[&str] = &["observaciones", "observacion"];

/// Shortest folio key matched by substring against stored folios
const MIN_FUZZY_KEY: usize = 3;

/// Rows above the first item section; header labels are only read there so
/// item column headings ("Descripción") are never taken for fields.
fn header_area(grid: &Grid) -> Grid {
    let end = [TASKS, PARTS, SUPPLIES]
        .iter()
        .filter_map(|section| section.locate(grid))
        .min()
        .unwrap_or(grid.height());
    Grid::new(grid.rows().take(end).map(<[_]>::to_vec).collect())
}

/// Raw folio text: the label cell itself when it carries digits
/// ("N°: 001-25"), else the value next to it, else the sheet name.
pub fn folio_text(grid: &Grid, sheet_name: &str) -> String {
    find_any_label(grid, FOLIO_LABELS)
        .and_then(|hit| {
            let label = hit.raw.text();
            if label.chars().any(|c| c.is_ascii_digit()) {
                Some(label)
            } else {
                hit.value(grid)
            }
        })
        .unwrap_or_else(|| {
            log::debug!("sheet '{}' has no folio label, using its name", sheet_name);
            sheet_name.trim().to_string()
        })
}

/// Map one freeform sheet onto a work order, with the scalars the form set
///
/// A missing start date stays `None`; the writer fills in `now` for new
/// orders.
pub fn map_sheet(sheet: &Sheet) -> (WorkOrder, Supplied) {
    let grid = &sheet.grid;
    let header = header_area(grid);
    let value = |labels: &[&str]| labelled_value(&header, labels).unwrap_or_default();
    let cell_after = |labels: &[&str]| {
        find_any_label(&header, labels).and_then(|hit| adjacent_cell(&header, hit.row, hit.col).cloned())
    };

    let raw_folio = folio_text(&header, &sheet.name);
    let key = normalize_folio(&raw_folio);
    let mut order = WorkOrder::new(if key.is_empty() { raw_folio } else { key });

    order.machine = value(MACHINE_LABELS);
    order.responsible = value(RESPONSIBLE_LABELS);
    order.description = value(DESCRIPTION_LABELS);
    order.fault_type = value(FAULT_TYPE_LABELS);
    order.action_type = value(ACTION_TYPE_LABELS);
    order.supervisor = value(SUPERVISOR_LABELS);
    order.location = value(LOCATION_LABELS);
    order.observation = labelled_value(grid, OBSERVATION_LABELS).unwrap_or_default();

    order.start_date = date_or(cell_after(START_DATE_LABELS).as_ref(), None).into_inner();
    order.end_date = date_or(cell_after(END_DATE_LABELS).as_ref(), None).into_inner();

    let labor_hours = float_or(cell_after(HOURS_LABELS).as_ref(), 0.0);
    let persons = int_or(cell_after(PERSONS_LABELS).as_ref(), 1);
    let status = text(cell_after(STATUS_LABELS).as_ref()).and_then(|s| OrderStatus::parse_loose(&s));
    let supplied = Supplied {
        status: status.is_some(),
        persons: !persons.is_default(),
        labor_hours: !labor_hours.is_default(),
        days: false,
    };
    order.labor_hours = labor_hours.into_inner().max(0.0);
    order.persons = persons.into_inner().max(1);
    order.status = status.unwrap_or_default();

    order.tasks = TASKS
        .locate(grid)
        .map(|row| extract_tasks(grid, row, &TaskLayout::default(), &TASKS, Numbering::LeadingInteger))
        .unwrap_or_default();
    order.parts = materials(grid, &PARTS);
    order.supplies = materials(grid, &SUPPLIES);

    order.source_sheet = Some(sheet.name.clone());
    order.refresh_incomplete();
    (order, supplied)
}

fn materials(grid: &Grid, section: &Section) -> Vec<Material> {
    section
        .locate(grid)
        .map(|row| extract_materials(grid, row, &MaterialLayout::default(), section, Numbering::LeadingInteger))
        .unwrap_or_default()
}

/// Stored folios that refer to the same order as `folio`
///
/// Exact match first, then substring search for keys of at least
/// [`MIN_FUZZY_KEY`] characters, then a full scan comparing normalized
/// folios in both directions.
pub fn find_matches(store: &OrderStore, folio: &str) -> Result<Vec<String>, StoreError> {
    let key = normalize_folio(folio);

    if key.is_empty() {
        let wanted = folio.trim().to_lowercase();
        return Ok(store
            .folios()?
            .into_iter()
            .filter(|f| !wanted.is_empty() && f.trim().to_lowercase() == wanted)
            .collect());
    }

    if store.exists(&key)? {
        return Ok(vec![key]);
    }
    if key.chars().count() >= MIN_FUZZY_KEY {
        let found = store.folios_containing(&key)?;
        if !found.is_empty() {
            return Ok(found);
        }
    }

    Ok(store
        .folios()?
        .into_iter()
        .filter(|f| matches_either_way(&normalize_folio(f), &key))
        .collect())
}

pub(crate) fn map_sheets(run: &mut ImportRun<'_>) {
    let workbook = run.workbook;
    let policy = run.options.on_duplicate.unwrap_or(OnDuplicate::Skip);
    let limit = run.options.limit;

    for (index, sheet) in workbook.sheets.iter().enumerate() {
        if sheet.grid.is_empty() {
            log::debug!("sheet '{}' is empty, skipping", sheet.name);
            continue;
        }
        if run.result.limit_reached(limit) {
            break;
        }
        run.result.examined += 1;

        let location = Location::Sheet(sheet.name.clone());
        let data = json!({ "sheet": sheet.name, "rows": sheet.grid.rows().collect::<Vec<_>>() });
        run.capture(location.clone(), index + 1, Some(sheet.name.as_str()), data);

        let (mut order, supplied) = map_sheet(sheet);
        order.source_file = Some(workbook.file_name.clone());

        let matches = match find_matches(run.store, &order.folio) {
            Ok(matches) => matches,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{import, Layout, MapOptions};
    use crate::source::{SourceKind, Workbook};
    use chrono::NaiveDate;

    fn form(folio: &str, machine: &str, tasks: &[&str]) -> Grid {
        let mut rows: Vec<Vec<String>> = vec![
            vec!["ORDEN DE TRABAJO".into(), "".into(), "N°:".into(), folio.into()],
            vec!["Fecha".into(), "05/01/2025".into()],
            vec!["Equipo/Máquina".into(), machine.into()],
            vec!["Responsable de Ejecución".into(), "".into(), "Ana".into()],
            vec!["TAREAS A EJECUTAR".into()],
            vec!["N°".into(), "Detalle".into()],
        ];
        for t in tasks {
            rows.push(vec![t.to_string(), format!("tarea {}", t)]);
        }
        rows.push(vec!["REPUESTOS REQUERIDOS".into()]);
        rows.push(vec!["1".into(), "F-100".into(), "Filtro".into(), "2".into()]);
        let cells = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        Grid::new(cells)
    }

    fn workbook(sheets: Vec<(&str, Grid)>) -> Workbook {
        Workbook::from_sheets(
            "ordenes.xlsx",
            SourceKind::Spreadsheet,
            sheets
                .into_iter()
                .map(|(name, grid)| Sheet { name: name.into(), grid })
                .collect(),
        )
    }

    fn sheets_options(on_duplicate: Option<OnDuplicate>) -> MapOptions {
        MapOptions { layout: Layout::Sheets, on_duplicate, ..Default::default() }
    }

    #[test]
    fn test_map_sheet_reads_labels_and_sections() {
        let sheet = Sheet { name: "Hoja1".into(), grid: form("001-25", "Prensa", &["1", "2"]) };
        let (order, supplied) = map_sheet(&sheet);

        assert_eq!(order.folio, "001-25");
        assert_eq!(order.machine, "Prensa");
        assert_eq!(order.responsible, "Ana");
        assert_eq!(order.start_date, NaiveDate::from_ymd_opt(2025, 1, 5).and_then(|d| d.and_hms_opt(0, 0, 0)));
        assert_eq!(order.tasks.len(), 2);
        assert_eq!(order.tasks[1].detail, "tarea 2");
        assert_eq!(order.parts.len(), 1);
        assert_eq!(order.parts[0].quantity, 2);
        assert_eq!(order.source_sheet.as_deref(), Some("Hoja1"));
        assert!(!order.incomplete);
        assert_eq!(supplied, Supplied::default());
    }

    #[test]
    fn test_update_keeps_stored_start_date() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let dated = Grid::from_strs(&[&["N°:", "005-25"], &["Fecha", "05/01/2025"], &["Equipo", "Prensa"]]);
        import(&mut store, &workbook(vec![("a", dated)]), &sheets_options(None)).unwrap();

        let undated = Grid::from_strs(&[&["N°:", "005-25"], &["Fecha", ""], &["Equipo", "Torno"]]);
        let result = import(&mut store, &workbook(vec![("a", undated)]), &sheets_options(Some(OnDuplicate::Update))).unwrap();
        assert_eq!(result.updated, 1);

        let order = store.get("005-25").unwrap().unwrap();
        assert_eq!(order.machine, "Torno");
        assert_eq!(order.start_date, NaiveDate::from_ymd_opt(2025, 1, 5).and_then(|d| d.and_hms_opt(0, 0, 0)));
    }

    #[test]
    fn test_folio_from_label_cell_or_sheet_name() {
        let inline = Grid::from_strs(&[&["N°: 017 - 24", ""]]);
        assert_eq!(normalize_folio(&folio_text(&inline, "x")), "017-24");

        let below = Grid::from_strs(&[&["N°:"], &["OT 44"]]);
        assert_eq!(folio_text(&below, "x"), "OT 44");

        let none = Grid::from_strs(&[&["Equipo", "Torno"]]);
        assert_eq!(folio_text(&none, " 003-25 "), "003-25");
    }

    #[test]
    fn test_skip_then_overwrite_same_folio() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let first = workbook(vec![("a", form("001-25", "Prensa", &["1", "2"]))]);
        let result = import(&mut store, &first, &sheets_options(None)).unwrap();
        assert_eq!(result.created.orders, 1);
        assert_eq!(result.created.tasks, 2);
        assert_eq!(result.raw_captured, 1);

        let second = workbook(vec![("b", form("N° 001-25", "Torno", &["1"]))]);
        let result = import(&mut store, &second, &sheets_options(None)).unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(store.get("001-25").unwrap().unwrap().machine, "Prensa");

        let result = import(&mut store, &second, &sheets_options(Some(OnDuplicate::Overwrite))).unwrap();
        assert_eq!(result.overwritten, 1);
        let order = store.get("001-25").unwrap().unwrap();
        assert_eq!(order.machine, "Torno");
        assert_eq!(order.tasks.len(), 1);

        let counts = store.counts().unwrap();
        assert_eq!(counts.orders, 1);
        assert_eq!(counts.tasks, 1);
        assert_eq!(counts.parts, 1);
    }

    #[test]
    fn test_duplicate_task_number_aborts_only_that_sheet() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = workbook(vec![
            ("a", form("001-25", "Prensa", &["1", "1"])),
            ("b", form("002-25", "Torno", &["1", "2"])),
        ]);
        let result = import(&mut store, &wb, &sheets_options(None)).unwrap();

        assert_eq!(result.created.orders, 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].location, Location::Sheet("a".into()));
        assert!(!store.exists("001-25").unwrap());
        assert_eq!(store.get("002-25").unwrap().unwrap().tasks.len(), 2);

        let counts = store.counts().unwrap();
        assert_eq!(counts.tasks, 2);
        assert_eq!(counts.parts, 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let mut store = OrderStore::open_in_memory().unwrap();
        let wb = workbook(vec![("a", form("001-25", "Prensa", &["1"]))]);
        let options = MapOptions { dry_run: true, ..sheets_options(None) };
        let result = import(&mut store, &wb, &options).unwrap();
        assert!(result.dry_run);
        assert_eq!(result.created.orders, 1);
        assert_eq!(store.counts().unwrap().total(), 0);
    }

    #[test]
    fn test_find_matches_fuzzy() {
        let mut store = OrderStore::open_in_memory().unwrap();
        store.insert(&WorkOrder::new("OT 001-25 rev")).unwrap();
        store.insert(&WorkOrder::new("17")).unwrap();

        assert_eq!(find_matches(&store, "N°: 001-25").unwrap(), vec!["OT 001-25 rev"]);
        assert_eq!(find_matches(&store, "OT 17").unwrap(), vec!["17"]);
        assert!(find_matches(&store, "99").unwrap().is_empty());
    }
}
