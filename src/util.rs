// Utility helpers for parsing and display formatting.
//
// This module centralizes all the "dirty" cell/number/date handling so the
// rest of the code can assume clean, typed values.
use crate::types::CellValue;
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok()
}

pub fn parse_date_safe(s: &str) -> Option<NaiveDate> {
    // Workbook text dates come in either ISO or day-first form.
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

/// Read a cell as an integer for the Likelihood/Severity arithmetic.
///
/// Numbers with a fractional part and unparseable text count as missing,
/// never as zero.
pub fn cell_as_int(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        CellValue::Text(s) => {
            let v = parse_f64_safe(s)?;
            if v.fract() == 0.0 {
                Some(v as i64)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Read a cell as a calendar date, coercing text values where possible.
pub fn cell_as_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_date_safe(s),
        _ => None,
    }
}

/// Display label for a categorical cell.
///
/// Whole numbers render without the trailing `.0` so a numeric Severity
/// groups as "3" rather than "3.0". Empty cells yield `None` and are
/// excluded from distributions.
pub fn cell_to_label(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        CellValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
        CellValue::Number(n) => Some(format!("{}", n)),
        CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        CellValue::Empty => None,
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative();
    let abs_n = n.abs();
    // First, format to a plain fixed-decimal string like `1234567.89`.
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // Use `num-format` to insert commas into the integer portion.
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    } else if decimals > 0 {
        res.push('.');
        res.push_str(&"0".repeat(decimals));
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `1,024 rows loaded`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_both_date_forms() {
        let expect = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date_safe("2025-03-14"), Some(expect));
        assert_eq!(parse_date_safe("14/03/2025"), Some(expect));
        assert_eq!(parse_date_safe("next week"), None);
        assert_eq!(parse_date_safe(""), None);
    }

    #[test]
    fn int_coercion_rejects_fractions_and_words() {
        assert_eq!(cell_as_int(&CellValue::Number(4.0)), Some(4));
        assert_eq!(cell_as_int(&CellValue::Number(4.5)), None);
        assert_eq!(cell_as_int(&CellValue::Text("3".into())), Some(3));
        assert_eq!(cell_as_int(&CellValue::Text("high".into())), None);
        assert_eq!(cell_as_int(&CellValue::Empty), None);
    }

    #[test]
    fn labels_drop_trailing_zero() {
        assert_eq!(cell_to_label(&CellValue::Number(3.0)).unwrap(), "3");
        assert_eq!(
            cell_to_label(&CellValue::Text("  Open ".into())).unwrap(),
            "Open"
        );
        assert_eq!(cell_to_label(&CellValue::Empty), None);
    }

    #[test]
    fn number_formatting_groups_thousands() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-42.0, 2), "-42.00");
        assert_eq!(format_int(9855i64), "9,855");
    }
}
