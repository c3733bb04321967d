//! Unit constants and number formatting
//!
//! Handles the metric/imperial constant and the canonical text form of the
//! numbers written into G-code words.

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Decimal places written for coordinates and other word values
pub const COORDINATE_PRECISION: usize = 4;

/// Format a word value in canonical form
///
/// Rounds to `precision` decimal places, then trims trailing zeros and a
/// trailing decimal point. Negative zero is written as `0`.
///
/// * `value` - Number to format
/// * `precision` - Maximum number of decimal places
pub fn format_number(value: f64, precision: usize) -> String {
    let mut text = format!("{:.*}", precision, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Format a coordinate with [`COORDINATE_PRECISION`]
pub fn format_coordinate(value: f64) -> String {
    format_number(value, COORDINATE_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_trims_trailing_zeros() {
        assert_eq!(format_coordinate(10.0), "10");
        assert_eq!(format_coordinate(10.5), "10.5");
        assert_eq!(format_coordinate(-0.125), "-0.125");
        assert_eq!(format_coordinate(100.0), "100");
    }

    #[test]
    fn test_format_rounds_to_precision() {
        assert_eq!(format_coordinate(1.234_56), "1.2346");
        assert_eq!(format_coordinate(2.999_99), "3");
        assert_eq!(format_number(1.26, 1), "1.3");
    }

    #[test]
    fn test_format_negative_zero() {
        assert_eq!(format_coordinate(-0.0), "0");
        assert_eq!(format_coordinate(-0.000_01), "0");
    }
}
