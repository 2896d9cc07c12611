//! Line-item extraction from labelled sections of a freeform sheet
//!
//! A section starts at a header label ("TAREAS A EJECUTAR", "REPUESTOS
//! REQUERIDOS", ...) and runs down the sheet until the lead cell of a row
//! names a sibling section, or the grid ends.

use crate::entities::work_order::{Material, Task};
use crate::mapping::coerce::{int_or, text, whole_number};
use crate::mapping::grid::{Cell, Grid};
use crate::mapping::locate::find_any_label;
use crate::mapping::normalize::{contains_term, normalize};

/// Lead-cell texts of a column-heading row inside a section ("N°", "Item")
const HEADING_TOKENS: &[&str] = &["n", "no", "nro", "item", "numero", "codigo"];

/// How an extracted item gets its number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numbering {
    /// 1-based position among the items emitted for the section
    Position,
    /// The lead cell's integer when it holds one, else the position
    LeadingInteger,
}

/// Where a section starts and what ends it
#[derive(Debug, Clone, Copy)]
pub struct Section {
    /// Header labels, tried in priority order
    pub labels: &'static [&'static str],
    /// Normalized markers that end the section when found in a lead cell
    pub terminators: &'static [&'static str],
}

pub const TASKS: Section = Section {
    labels: &["tareas a ejecutar"],
    terminators: &["repuestos", "insumos", "firmas"],
};

pub const PARTS: Section = Section {
    labels: &["repuestos requeridos", "repuestos"],
    terminators: &["insumos", "finalizacion", "firmas"],
};

pub const SUPPLIES: Section = Section {
    labels: &["insumos requeridos", "insumos"],
    terminators: &["finalizacion", "firmas"],
};

impl Section {
    /// Row of the section header, if the sheet has one
    pub fn locate(&self, grid: &Grid) -> Option<usize> {
        find_any_label(grid, self.labels).map(|hit| hit.row)
    }

    fn ends_at(&self, lead: &str) -> bool {
        self.terminators.iter().any(|t| contains_term(lead, t))
    }
}

/// Column positions of task attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLayout {
    pub number: usize,
    pub detail: usize,
    pub estimated: usize,
    pub actual: usize,
}

impl Default for TaskLayout {
    fn default() -> Self {
        Self { number: 0, detail: 1, estimated: 2, actual: 3 }
    }
}

/// Column positions of part / supply attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialLayout {
    pub number: usize,
    pub code: usize,
    pub description: usize,
    pub quantity: usize,
}

impl Default for MaterialLayout {
    fn default() -> Self {
        Self { number: 0, code: 1, description: 2, quantity: 3 }
    }
}

fn cell(row: &[Cell], col: usize) -> Option<&Cell> {
    row.get(col).filter(|c| !c.is_blank())
}

/// Walk rows below `header_row`, handing each candidate item row to `emit`
/// along with its 1-based position among emitted items.
fn walk<T>(
    grid: &Grid,
    header_row: usize,
    section: &Section,
    lead_col: usize,
    mut emit: impl FnMut(&[Cell], usize) -> Option<T>,
) -> Vec<T> {
    let mut items = Vec::new();

    for r in header_row.saturating_add(1)..grid.height() {
        let Some(row) = grid.row(r) else { break };
        let lead = normalize(&cell(row, lead_col).map(Cell::text).unwrap_or_default());

        if section.ends_at(&lead) {
            break;
        }
        if lead.is_empty() || HEADING_TOKENS.contains(&lead.as_str()) {
            continue;
        }
        if let Some(item) = emit(row, items.len() + 1) {
            items.push(item);
        }
    }

    items
}

fn item_number(lead: Option<&Cell>, position: usize, numbering: Numbering) -> i64 {
    let position = i64::try_from(position).unwrap_or(i64::MAX);
    match numbering {
        Numbering::Position => position,
        Numbering::LeadingInteger => whole_number(lead).unwrap_or(position),
    }
}

/// Extract task rows; a task row must lead with a whole number
pub fn extract_tasks(
    grid: &Grid,
    header_row: usize,
    layout: &TaskLayout,
    section: &Section,
    numbering: Numbering,
) -> Vec<Task> {
    walk(grid, header_row, section, layout.number, |row, position| {
        let lead = cell(row, layout.number);
        whole_number(lead)?;
        Some(Task {
            number: item_number(lead, position, numbering),
            detail: text(cell(row, layout.detail)).unwrap_or_default(),
            estimated_time: int_or(cell(row, layout.estimated), 0).into_inner(),
            actual_time: int_or(cell(row, layout.actual), 0).into_inner(),
        })
    })
}

/// Extract part or supply rows; quantity defaults to 1
pub fn extract_materials(
    grid: &Grid,
    header_row: usize,
    layout: &MaterialLayout,
    section: &Section,
    numbering: Numbering,
) -> Vec<Material> {
    walk(grid, header_row, section, layout.number, |row, position| {
        Some(Material {
            number: item_number(cell(row, layout.number), position, numbering),
            code: text(cell(row, layout.code)).unwrap_or_default(),
            description: text(cell(row, layout.description)).unwrap_or_default(),
            quantity: int_or(cell(row, layout.quantity), 1).into_inner(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Grid {
        Grid::from_strs(&[
            &["ORDEN DE TRABAJO", "", "N°:", "001-25"],
            &["Equipo", "Prensa"],
            &["TAREAS A EJECUTAR"],
            &["1", "Cambiar filtro"],
            &["2", "Revisar correas"],
            &["REPUESTOS", ""],
            &["N°", "Código", "Descripción", "Cantidad"],
            &["1", "F-100", "Filtro aceite", "2"],
            &[""],
            &["2", "C-7", "Correa", "x"],
            &["INSUMOS REQUERIDOS"],
            &["1", "", "Grasa"],
            &["FIRMAS"],
            &["1", "", "no es insumo"],
        ])
    }

    #[test]
    fn test_tasks_stop_at_parts_header() {
        let grid = sheet();
        let tasks = extract_tasks(&grid, 2, &TaskLayout::default(), &TASKS, Numbering::LeadingInteger);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].number, 1);
        assert_eq!(tasks[0].detail, "Cambiar filtro");
        assert_eq!(tasks[1].number, 2);
        assert_eq!(tasks[1].detail, "Revisar correas");
        assert_eq!(tasks[1].estimated_time, 0);
    }

    #[test]
    fn test_locate_sections() {
        let grid = sheet();
        assert_eq!(TASKS.locate(&grid), Some(2));
        assert_eq!(PARTS.locate(&grid), Some(5));
        assert_eq!(SUPPLIES.locate(&grid), Some(10));
        assert_eq!(TASKS.locate(&Grid::from_strs(&[&["nada"]])), None);
    }

    #[test]
    fn test_parts_skip_blank_and_heading_rows() {
        let grid = sheet();
        let parts = extract_materials(&grid, 5, &MaterialLayout::default(), &PARTS, Numbering::LeadingInteger);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].code, "F-100");
        assert_eq!(parts[0].quantity, 2);
        assert_eq!(parts[1].number, 2);
        assert_eq!(parts[1].quantity, 1, "unparsable quantity defaults to 1");
    }

    #[test]
    fn test_supplies_stop_at_signatures() {
        let grid = sheet();
        let supplies = extract_materials(&grid, 10, &MaterialLayout::default(), &SUPPLIES, Numbering::LeadingInteger);
        assert_eq!(supplies.len(), 1);
        assert_eq!(supplies[0].description, "Grasa");
        assert_eq!(supplies[0].code, "");
    }

    #[test]
    fn test_tasks_skip_rows_without_integer_lead() {
        let grid = Grid::from_strs(&[
            &["TAREAS A EJECUTAR"],
            &["Item", "Detalle"],
            &["a)", "nota suelta"],
            &["7", "Lubricar"],
        ]);
        let tasks = extract_tasks(&grid, 0, &TaskLayout::default(), &TASKS, Numbering::LeadingInteger);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].number, 7);
    }

    #[test]
    fn test_position_numbering() {
        let grid = Grid::from_strs(&[&["REPUESTOS"], &["A", "x"], &["B", "y"], &["5", "z"]]);
        let parts = extract_materials(&grid, 0, &MaterialLayout::default(), &PARTS, Numbering::Position);
        let numbers: Vec<i64> = parts.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let literal = extract_materials(&grid, 0, &MaterialLayout::default(), &PARTS, Numbering::LeadingInteger);
        let numbers: Vec<i64> = literal.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 5]);
    }

    #[test]
    fn test_stops_at_grid_end_without_terminator() {
        let grid = Grid::from_strs(&[&["TAREAS A EJECUTAR"], &["1", "Uno"]]);
        let tasks = extract_tasks(&grid, 0, &TaskLayout::default(), &TASKS, Numbering::LeadingInteger);
        assert_eq!(tasks.len(), 1);
        assert!(extract_tasks(&grid, 50, &TaskLayout::default(), &TASKS, Numbering::Position).is_empty());
    }
}
