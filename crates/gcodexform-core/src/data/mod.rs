//! Data models for positions and units
//!
//! This module provides:
//! - Machine units (MM, INCH) with conversion
//! - Axis identifiers for the six supported axes (X, Y, Z, A, B, C)
//! - Full positions carrying their unit system
//! - Partial positions for values that only name some axes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GcodeError, Result};
use crate::units::MM_PER_INCH;

/// Machine coordinate units (millimeters or inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Millimeters (metric)
    #[serde(rename = "mm")]
    MM,
    /// Inches (imperial)
    #[serde(rename = "inch")]
    INCH,
    /// Unknown or uninitialized
    #[serde(rename = "unknown")]
    Unknown,
}

impl Units {
    /// Scale factor that converts a value in `self` into `target`
    ///
    /// Returns `None` when either side is `Unknown` and the units differ.
    pub fn scale_to(self, target: Units) -> Option<f64> {
        match (self, target) {
            (from, to) if from == to => Some(1.0),
            (Units::MM, Units::INCH) => Some(1.0 / MM_PER_INCH),
            (Units::INCH, Units::MM) => Some(MM_PER_INCH),
            _ => None,
        }
    }

    /// Convert a value from one unit to another
    ///
    /// # Arguments
    /// * `value` - The value to convert
    /// * `from` - The unit of the input value
    /// * `to` - The target unit
    pub fn convert(value: f64, from: Units, to: Units) -> Result<f64> {
        from.scale_to(to)
            .map(|scale| value * scale)
            .ok_or(GcodeError::Unit { from, to })
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::MM
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::MM => write!(f, "mm"),
            Units::INCH => write!(f, "in"),
            Units::Unknown => write!(f, "unknown"),
        }
    }
}

/// A machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    A,
    B,
    C,
}

impl Axis {
    /// All axes in canonical output order
    pub const ALL: [Axis; 6] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// The G-code word letter for this axis
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::A => 'A',
            Axis::B => 'B',
            Axis::C => 'C',
        }
    }

    /// Look up an axis by its word letter (case-insensitive)
    pub fn from_letter(letter: char) -> Option<Axis> {
        match letter.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'A' => Some(Axis::A),
            'B' => Some(Axis::B),
            'C' => Some(Axis::C),
            _ => None,
        }
    }

    /// Whether this is a rotary axis (A, B, C)
    ///
    /// Rotary values are angles and are never unit-converted.
    pub fn is_rotary(self) -> bool {
        matches!(self, Axis::A | Axis::B | Axis::C)
    }

    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::A => 3,
            Axis::B => 4,
            Axis::C => 5,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Six-axis machine position with its unit system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
    /// A-axis (4th axis) position
    pub a: f64,
    /// B-axis (5th axis) position
    pub b: f64,
    /// C-axis (6th axis) position
    pub c: f64,
    /// Coordinate unit
    pub unit: Units,
}

impl Position {
    /// Create a position at the origin
    pub fn new(unit: Units) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            a: 0.0,
            b: 0.0,
            c: 0.0,
            unit,
        }
    }

    /// Create a position from X, Y, Z with rotary axes at zero
    pub fn xyz(x: f64, y: f64, z: f64, unit: Units) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::new(unit)
        }
    }

    /// Get the value of one axis
    pub fn get(&self, axis: Axis) -> f64 {
        self.as_array()[axis.index()]
    }

    /// Set the value of one axis
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::A => self.a = value,
            Axis::B => self.b = value,
            Axis::C => self.c = value,
        }
    }

    /// Copy of this position with one axis replaced
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    fn as_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.a, self.b, self.c]
    }

    /// Whether every axis is a finite number
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }

    /// Convert this position to another unit system
    ///
    /// Linear axes are scaled; rotary axes are angles and keep their value.
    pub fn position_in(&self, target: Units) -> Result<Position> {
        let scale = self.unit.scale_to(target).ok_or(GcodeError::Unit {
            from: self.unit,
            to: target,
        })?;

        Ok(Self {
            x: self.x * scale,
            y: self.y * scale,
            z: self.z * scale,
            a: self.a,
            b: self.b,
            c: self.c,
            unit: target,
        })
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(Units::MM)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X:{:.3} Y:{:.3} Z:{:.3} A:{:.3} B:{:.3} C:{:.3} ({})",
            self.x, self.y, self.z, self.a, self.b, self.c, self.unit
        )
    }
}

/// Partial position naming only some axes
///
/// Each axis is an `Option` where `None` means "not specified". Used both for
/// configuration values (a mirror center only needs the mirrored axis) and for
/// the axis words written in a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialPosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    /// Unit system of the specified values
    pub unit: Units,
}

impl PartialPosition {
    /// Create an empty partial position in the given units
    pub fn new(unit: Units) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    /// Partial position with only X set
    pub fn x_only(x: f64, unit: Units) -> Self {
        Self::new(unit).with(Axis::X, x)
    }

    /// Partial position with X and Y set
    pub fn xy(x: f64, y: f64, unit: Units) -> Self {
        Self::new(unit).with(Axis::X, x).with(Axis::Y, y)
    }

    /// Get one axis, if specified
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::A => self.a,
            Axis::B => self.b,
            Axis::C => self.c,
        }
    }

    /// Set one axis
    pub fn set(&mut self, axis: Axis, value: f64) {
        let slot = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
            Axis::A => &mut self.a,
            Axis::B => &mut self.b,
            Axis::C => &mut self.c,
        };
        *slot = Some(value);
    }

    /// Builder form of [`PartialPosition::set`]
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    /// Axes that carry a value, in canonical order
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        Axis::ALL.into_iter().filter(|axis| self.get(*axis).is_some())
    }

    /// Whether the given axis is specified
    pub fn contains(&self, axis: Axis) -> bool {
        self.get(axis).is_some()
    }

    /// Count how many axes are set
    pub fn axis_count(&self) -> usize {
        self.axes().count()
    }

    /// Check if no axis is set
    pub fn is_empty(&self) -> bool {
        self.axis_count() == 0
    }

    /// Convert the specified values to another unit system
    pub fn position_in(&self, target: Units) -> Result<PartialPosition> {
        let scale = self.unit.scale_to(target).ok_or(GcodeError::Unit {
            from: self.unit,
            to: target,
        })?;

        let mut converted = PartialPosition::new(target);
        for axis in self.axes() {
            if let Some(value) = self.get(axis) {
                let value = if axis.is_rotary() { value } else { value * scale };
                converted.set(axis, value);
            }
        }
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_convert_between_mm_and_inch() {
        assert_eq!(Units::convert(25.4, Units::MM, Units::INCH).unwrap(), 1.0);
        assert_eq!(Units::convert(2.0, Units::INCH, Units::MM).unwrap(), 50.8);
        assert_eq!(Units::convert(3.0, Units::MM, Units::MM).unwrap(), 3.0);
    }

    #[test]
    fn test_unknown_units_cannot_convert() {
        let err = Units::convert(1.0, Units::Unknown, Units::MM).unwrap_err();
        assert!(matches!(
            err,
            GcodeError::Unit {
                from: Units::Unknown,
                to: Units::MM
            }
        ));
        assert_eq!(Units::Unknown.scale_to(Units::Unknown), Some(1.0));
    }

    #[test]
    fn test_position_in_keeps_rotary_axes() {
        let mut pos = Position::xyz(25.4, 50.8, -12.7, Units::MM);
        pos.a = 90.0;

        let inches = pos.position_in(Units::INCH).unwrap();
        assert!((inches.x - 1.0).abs() < 1e-12);
        assert!((inches.y - 2.0).abs() < 1e-12);
        assert!((inches.z + 0.5).abs() < 1e-12);
        assert_eq!(inches.a, 90.0);
        assert_eq!(inches.unit, Units::INCH);
    }

    #[test]
    fn test_position_get_set_by_axis() {
        let mut pos = Position::default();
        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            pos.set(axis, i as f64);
        }
        assert_eq!(pos.get(Axis::X), 0.0);
        assert_eq!(pos.get(Axis::C), 5.0);
        assert_eq!(pos.with(Axis::Y, 9.0).y, 9.0);
    }

    #[test]
    fn test_partial_position_axis_count() {
        let center = PartialPosition::x_only(1.0, Units::INCH);
        assert_eq!(center.axis_count(), 1);
        assert!(!center.is_empty());
        assert!(PartialPosition::new(Units::MM).is_empty());
    }

    #[test]
    fn test_axis_letters_round_trip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_letter(axis.letter()), Some(axis));
        }
        assert_eq!(Axis::from_letter('y'), Some(Axis::Y));
        assert_eq!(Axis::from_letter('I'), None);
    }

    #[test]
    fn test_partial_position_deserializes_with_defaults() {
        let parsed: PartialPosition =
            serde_json::from_str(r#"{ "x": 5.0, "unit": "inch" }"#).unwrap();
        assert_eq!(parsed.x, Some(5.0));
        assert_eq!(parsed.y, None);
        assert_eq!(parsed.unit, Units::INCH);
    }
}
