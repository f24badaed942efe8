use crate::sheet::Cell;

/// Free-text durations (`H:MM` or `H:MM:SS`) to whole minutes. Seconds are
/// ignored; numeric cells pass through. Anything else is zero.
pub fn parse_duration(value: &Cell) -> f64 {
    match value {
        Cell::Number(n) if n.is_nan() => 0.0,
        Cell::Number(n) => *n,
        Cell::Text(text) => parse_duration_text(text).map(|m| m as f64).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Minutes from `H:MM[:SS...]`; `None` when the text has fewer than two
/// parts or any part is not an integer.
pub fn parse_duration_text(text: &str) -> Option<i64> {
    let parts = text
        .split(':')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    if parts.len() < 2 {
        return None;
    }
    Some(parts[0] * 60 + parts[1])
}

/// Finite float or `default`.
pub fn to_safe_float(value: &Cell, default: f64) -> f64 {
    match value.as_number() {
        Some(n) if n.is_finite() => n,
        _ => default,
    }
}

/// Same contract as [`to_safe_float`] for values that are already floats.
pub fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// One-decimal rounding, ties to even, after forcing a finite value.
pub fn round1(value: f64) -> f64 {
    let rounded = (finite_or(value, 0.0) * 10.0).round_ties_even() / 10.0;
    finite_or(rounded, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn durations_parse_to_minutes() {
        assert_eq!(parse_duration(&text("1:30")), 90.0);
        assert_eq!(parse_duration(&text("1:30:45")), 90.0);
        assert_eq!(parse_duration(&text("0:05:59")), 5.0);
        assert_eq!(parse_duration(&text("")), 0.0);
        assert_eq!(parse_duration(&Cell::Empty), 0.0);
        assert_eq!(parse_duration(&Cell::Number(45.0)), 45.0);
        assert_eq!(parse_duration(&Cell::Number(f64::NAN)), 0.0);
    }

    #[test]
    fn malformed_durations_are_zero() {
        assert_eq!(parse_duration(&text("90")), 0.0);
        assert_eq!(parse_duration(&text("1h30")), 0.0);
        assert_eq!(parse_duration(&text("1:3x")), 0.0);
        assert_eq!(parse_duration(&Cell::Bool(true)), 0.0);
    }

    #[test]
    fn safe_float_rejects_non_finite_and_text() {
        assert_eq!(to_safe_float(&Cell::Number(f64::NAN), 7.0), 7.0);
        assert_eq!(to_safe_float(&Cell::Number(f64::INFINITY), 7.0), 7.0);
        assert_eq!(to_safe_float(&text("abc"), 0.0), 0.0);
        assert_eq!(to_safe_float(&text("3.5"), 0.0), 3.5);
        assert_eq!(to_safe_float(&text("inf"), 1.0), 1.0);
        assert_eq!(to_safe_float(&Cell::Empty, 2.0), 2.0);
    }

    #[test]
    fn round1_is_always_finite() {
        assert_eq!(round1(3.333), 3.3);
        assert_eq!(round1(2.25), 2.2);
        assert_eq!(round1(0.25), 0.2);
        assert_eq!(round1(f64::NAN), 0.0);
        assert_eq!(round1(f64::NEG_INFINITY), 0.0);
    }
}
