//! Fallible cell coercion that never fails the record
//!
//! Each parser returns [`Parsed`], telling the caller whether the value came
//! from the cell or from the fallback it supplied.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::mapping::grid::Cell;

/// Excel serial dates count days from this epoch
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial Excel can represent (9999-12-31)
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// A coerced value, tagged with where it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    /// Read from the cell
    Value(T),
    /// Cell absent or unparsable; the caller's fallback
    Default(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Value(v) | Parsed::Default(v) => v,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Parsed::Default(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Parsed::Value(v) => Parsed::Value(f(v)),
            Parsed::Default(v) => Parsed::Default(f(v)),
        }
    }
}

/// Trimmed non-empty text of a cell
pub fn text(cell: Option<&Cell>) -> Option<String> {
    cell.map(Cell::text).filter(|s| !s.is_empty())
}

fn parse_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => {
            let s = s.trim().replace(',', ".");
            s.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Integer value, truncating fractional numbers ("3.0", 2.7 → 2)
pub fn int_or(cell: Option<&Cell>, default: i64) -> Parsed<i64> {
    match cell.and_then(parse_number) {
        Some(n) if n.abs() < i64::MAX as f64 => Parsed::Value(n.trunc() as i64),
        _ => Parsed::Default(default),
    }
}

/// Floating-point value; accepts a decimal comma
pub fn float_or(cell: Option<&Cell>, default: f64) -> Parsed<f64> {
    match cell.and_then(parse_number) {
        Some(n) => Parsed::Value(n),
        None => Parsed::Default(default),
    }
}

/// Integer only when the cell holds a whole number ("3", 3.0), else `None`
pub fn whole_number(cell: Option<&Cell>) -> Option<i64> {
    let n = cell.and_then(parse_number)?;
    (n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
}

fn excel_serial(n: f64) -> Option<NaiveDateTime> {
    if !(1.0..=EXCEL_MAX_SERIAL).contains(&n) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
    let seconds = (n * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Date value from a date cell, an ISO / day-first string or an Excel serial
pub fn date_or(cell: Option<&Cell>, default: Option<NaiveDateTime>) -> Parsed<Option<NaiveDateTime>> {
    let parsed = match cell {
        Some(Cell::Date(dt)) => Some(*dt),
        Some(Cell::Number(n)) => excel_serial(*n),
        Some(Cell::Text(s)) => parse_date_text(s),
        _ => None,
    };
    match parsed {
        Some(dt) => Parsed::Value(Some(dt)),
        None => Parsed::Default(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_int_or() {
        assert_eq!(int_or(Some(&t(" 4 ")), 0), Parsed::Value(4));
        assert_eq!(int_or(Some(&Cell::Number(2.7)), 0), Parsed::Value(2));
        assert_eq!(int_or(Some(&t("dos")), 1), Parsed::Default(1));
        assert_eq!(int_or(None, 1), Parsed::Default(1));
        assert!(int_or(Some(&Cell::Missing), 0).is_default());
    }

    #[test]
    fn test_float_or_accepts_decimal_comma() {
        assert_eq!(float_or(Some(&t("1,5")), 0.0), Parsed::Value(1.5));
        assert_eq!(float_or(Some(&t("n/a")), 0.0).into_inner(), 0.0);
    }

    #[test]
    fn test_whole_number() {
        assert_eq!(whole_number(Some(&t("3"))), Some(3));
        assert_eq!(whole_number(Some(&Cell::Number(3.0))), Some(3));
        assert_eq!(whole_number(Some(&t("3.5"))), None);
        assert_eq!(whole_number(Some(&t("REPUESTOS"))), None);
        assert_eq!(whole_number(None), None);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(date_or(Some(&t("2024-01-05")), None), Parsed::Value(Some(ymd(2024, 1, 5))));
        assert_eq!(date_or(Some(&t("05/01/2024")), None), Parsed::Value(Some(ymd(2024, 1, 5))));
        assert_eq!(date_or(Some(&t("05-01-2024")), None), Parsed::Value(Some(ymd(2024, 1, 5))));
        assert_eq!(date_or(Some(&Cell::Number(45296.0)), None), Parsed::Value(Some(ymd(2024, 1, 5))));
        assert_eq!(date_or(Some(&Cell::Date(ymd(2023, 3, 1))), None).into_inner(), Some(ymd(2023, 3, 1)));
    }

    #[test]
    fn test_date_fallback() {
        let now = ymd(2025, 6, 1);
        assert_eq!(date_or(Some(&t("mañana")), Some(now)), Parsed::Default(Some(now)));
        assert_eq!(date_or(None, None), Parsed::Default(None));
        assert_eq!(date_or(Some(&Cell::Number(-4.0)), None), Parsed::Default(None));
    }
}
