//! School class naming conventions.
//!
//! Both rules here are legacy conventions kept bit-for-bit: the track is read
//! from the third character of a class name (`10E1` is IELTS, `10V1` VSTEP),
//! and class labels that Excel turned into numbers (`10E1` read as `100`) are
//! folded back into `<digits>E<exponent-1>` form.

use crate::models::ClassType;
use crate::sheet::Cell;

/// Fragile: depends entirely on the `<grade><track letter><n>` naming scheme.
pub fn infer_class_type(class_name: &str) -> ClassType {
    match class_name.chars().nth(2) {
        Some('E') | Some('e') => ClassType::Ielts,
        _ => ClassType::Vstep,
    }
}

/// Numeric or all-digit cells become the short code; everything else is
/// returned untouched.
pub fn shorten_class_code(value: &Cell) -> Cell {
    let integer = match value {
        Cell::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
        Cell::Text(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse::<i64>().ok()
        }
        _ => None,
    };
    match integer.and_then(exponential_code) {
        Some(code) => Cell::Text(code),
        None => value.clone(),
    }
}

/// `digit * 10^(exponent-1)` rendered as `"<digits>E<exponent-1>"`, e.g.
/// `100 -> "10E1"`, `1100 -> "11E2"`. Zero has no logarithm and yields `None`.
pub fn exponential_code(value: i64) -> Option<String> {
    if value == 0 {
        return None;
    }
    let exponent = (value.abs() as f64).log10() as i32;
    let base = value as f64 / 10f64.powi(exponent);
    Some(format!("{}E{}", (base * 10.0) as i64, exponent - 1))
}
