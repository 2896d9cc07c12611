//! Label search and adjacent-value resolution for freeform sheets

use crate::mapping::grid::{Cell, Grid};
use crate::mapping::normalize::{contains_term, normalize};

/// Column offsets probed to the right of a label, in order
const RIGHT_OFFSETS: [isize; 3] = [1, 2, 3];

/// Row offsets probed below a label, in order
const DOWN_OFFSETS: [isize; 2] = [1, 2];

/// A located label cell
#[derive(Debug, Clone, PartialEq)]
pub struct LabelHit {
    pub row: usize,
    pub col: usize,
    pub raw: Cell,
}

impl LabelHit {
    /// Resolve the value that belongs to this label
    pub fn value(&self, grid: &Grid) -> Option<String> {
        adjacent_value(grid, self.row, self.col)
    }
}

/// Find the first cell, in reading order, whose normalized text contains
/// the normalized needle.
///
/// Containment follows [`contains_term`]: needles shorter than three
/// characters ("n°" normalizes to "n") must match a whole token, longer ones
/// match anywhere in the cell.
pub fn find_label(grid: &Grid, needle: &str) -> Option<LabelHit> {
    let needle = normalize(needle);
    if needle.is_empty() {
        return None;
    }

    for (r, row) in grid.rows().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if cell.is_blank() {
                continue;
            }
            if contains_term(&normalize(&cell.text()), &needle) {
                return Some(LabelHit {
                    row: r,
                    col: c,
                    raw: cell.clone(),
                });
            }
        }
    }

    None
}

/// Try each needle in priority order, returning the first hit
pub fn find_any_label(grid: &Grid, needles: &[&str]) -> Option<LabelHit> {
    needles.iter().find_map(|needle| find_label(grid, needle))
}

/// First non-empty cell to the right of `(row, col)` (+1, +2, +3), then
/// below it (+1, +2).
pub fn adjacent_cell(grid: &Grid, row: usize, col: usize) -> Option<&Cell> {
    let (Ok(r), Ok(c)) = (isize::try_from(row), isize::try_from(col)) else {
        return None;
    };
    let probe = move |r, c| grid.get(r, c).filter(|cell| !cell.is_blank());

    RIGHT_OFFSETS
        .iter()
        .find_map(|dc| probe(r, c + dc))
        .or_else(|| DOWN_OFFSETS.iter().find_map(|dr| probe(r + dr, c)))
}

/// Text of [`adjacent_cell`]
pub fn adjacent_value(grid: &Grid, row: usize, col: usize) -> Option<String> {
    adjacent_cell(grid, row, col).map(Cell::text)
}

/// Locate a labelled field and resolve its value in one step
pub fn labelled_value(grid: &Grid, needles: &[&str]) -> Option<String> {
    find_any_label(grid, needles).and_then(|hit| hit.value(grid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_label_returns_first_match() {
        let grid = Grid::from_strs(&[&["Fecha:", "2024-01-01"]]);
        let hit = find_label(&grid, "fecha").unwrap();
        assert_eq!((hit.row, hit.col), (0, 0));
        assert_eq!(hit.raw, Cell::Text("Fecha:".into()));
    }

    #[test]
    fn test_find_label_not_found() {
        let grid = Grid::from_strs(&[&["Equipo", "Prensa"]]);
        assert_eq!(find_label(&grid, "fecha"), None);
        assert_eq!(find_label(&grid, ""), None);
    }

    #[test]
    fn test_find_label_reading_order() {
        let grid = Grid::from_strs(&[
            &["", "", "Responsable turno"],
            &["Responsable de ejecución", "Juan"],
        ]);
        let hit = find_label(&grid, "responsable").unwrap();
        assert_eq!((hit.row, hit.col), (0, 2));
    }

    #[test]
    fn test_find_label_accent_insensitive_substring() {
        let grid = Grid::from_strs(&[&["ORDEN DE TRABAJO"], &["", "DESCRIPCIÓN DEL TRABAJO:"]]);
        let hit = find_label(&grid, "descripcion").unwrap();
        assert_eq!((hit.row, hit.col), (1, 1));
    }

    #[test]
    fn test_short_needle_needs_whole_token() {
        let grid = Grid::from_strs(&[&["ORDEN DE TRABAJO"], &["N°: 001-25"]]);
        let hit = find_label(&grid, "n°").unwrap();
        assert_eq!((hit.row, hit.col), (1, 0));
    }

    #[test]
    fn test_adjacent_value_skips_empty_neighbor() {
        let grid = Grid::from_strs(&[&["Equipo", "", "Prensa-1"]]);
        assert_eq!(adjacent_value(&grid, 0, 0).as_deref(), Some("Prensa-1"));
    }

    #[test]
    fn test_adjacent_value_prefers_right_over_below() {
        let grid = Grid::from_strs(&[&["Equipo", "", "", "Torno"], &["Fresadora"]]);
        assert_eq!(adjacent_value(&grid, 0, 0).as_deref(), Some("Torno"));
    }

    #[test]
    fn test_adjacent_value_falls_back_below() {
        let grid = Grid::from_strs(&[&["Responsable", "", "", "", "ignored"], &[""], &["  Pedro  "]]);
        assert_eq!(adjacent_value(&grid, 0, 0).as_deref(), Some("Pedro"));
    }

    #[test]
    fn test_adjacent_value_none_at_edges() {
        let grid = Grid::from_strs(&[&["Fecha"]]);
        assert_eq!(adjacent_value(&grid, 0, 0), None);
        assert_eq!(adjacent_value(&grid, 10, 10), None);
    }

    #[test]
    fn test_labelled_value_tries_needles_in_order() {
        let grid = Grid::from_strs(&[&["Equipo", "Compresor"], &["Equipo/Máquina", "Grúa"]]);
        assert_eq!(
            labelled_value(&grid, &["equipo/maquina", "equipo"]).as_deref(),
            Some("Grúa")
        );
    }
}
