//! Modal state tracking
//!
//! [`GcodeState`] is the machine's running interpretation of the program:
//! motion mode, plane, distance modes, units, and the current point. The
//! parser reads it to resolve omitted fields and never mutates it; the
//! pipeline advances it once per input command with [`GcodeState::update`].

use gcodexform_core::{Axis, Position, Units};
use serde::{Deserialize, Serialize};

use crate::command::{GCode, ParsedCommand};

/// Motion mode - Group 1 (G0, G1, G2, G3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    Rapid,
    Linear,
    ArcClockwise,
    ArcCounterClockwise,
}

impl MotionMode {
    /// The motion mode selected by a G code, if it is a motion code
    pub fn from_gcode(code: GCode) -> Option<MotionMode> {
        match code {
            GCode::RAPID => Some(MotionMode::Rapid),
            GCode::LINEAR => Some(MotionMode::Linear),
            GCode::ARC_CW => Some(MotionMode::ArcClockwise),
            GCode::ARC_CCW => Some(MotionMode::ArcCounterClockwise),
            _ => None,
        }
    }

    pub fn gcode(self) -> GCode {
        match self {
            MotionMode::Rapid => GCode::RAPID,
            MotionMode::Linear => GCode::LINEAR,
            MotionMode::ArcClockwise => GCode::ARC_CW,
            MotionMode::ArcCounterClockwise => GCode::ARC_CCW,
        }
    }

    pub fn is_arc(self) -> bool {
        matches!(
            self,
            MotionMode::ArcClockwise | MotionMode::ArcCounterClockwise
        )
    }
}

/// Plane selection - Group 2 (G17, G18, G19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    XY,
    ZX,
    YZ,
}

impl Plane {
    /// The two in-plane axes and the perpendicular (helical) axis
    ///
    /// In-plane axes are ordered so that counterclockwise is positive when
    /// looking down the perpendicular axis.
    pub fn axes(self) -> (Axis, Axis, Axis) {
        match self {
            Plane::XY => (Axis::X, Axis::Y, Axis::Z),
            Plane::ZX => (Axis::Z, Axis::X, Axis::Y),
            Plane::YZ => (Axis::Y, Axis::Z, Axis::X),
        }
    }
}

/// Distance mode - Group 3 (G90/G91, and G90.1/G91.1 for arc centers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    Absolute,
    Incremental,
}

/// Feed rate mode - Group 5 (G93, G94, G95)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedRateMode {
    InverseTime,
    UnitsPerMinute,
    UnitsPerRevolution,
}

/// Machine defaults used to initialise the state at stream start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineDefaults {
    /// Units active before any G20/G21
    pub units: Units,
    /// Distance mode active before any G90/G91
    pub distance_mode: DistanceMode,
    /// Active plane before any G17/G18/G19
    pub plane: Plane,
    /// Machine position at stream start, in `units`
    pub start: [f64; 3],
}

impl Default for MachineDefaults {
    fn default() -> Self {
        Self {
            units: Units::MM,
            distance_mode: DistanceMode::Absolute,
            plane: Plane::XY,
            start: [0.0; 3],
        }
    }
}

/// G-Code execution state
///
/// Tracks the modal groups and the current point needed to interpret a
/// command that omits fields:
/// - Motion group (G0, G1, G2, G3; cleared by G80)
/// - Plane selection group (G17, G18, G19)
/// - Distance mode group (G90, G91) and arc distance mode (G90.1, G91.1)
/// - Feed rate mode group (G93, G94, G95)
/// - Units group (G20, G21)
/// - Coordinate system group (G54-G59)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GcodeState {
    /// Active motion mode, `None` after G80
    pub motion_mode: Option<MotionMode>,
    pub plane: Plane,
    pub distance_mode: DistanceMode,
    /// How I/J/K are interpreted
    pub arc_distance_mode: DistanceMode,
    pub feed_rate_mode: FeedRateMode,
    pub units: Units,
    /// Work coordinate system number (54-59)
    pub coordinate_system: u8,
    /// Current point, always expressed in `units`
    pub current_point: Position,
    /// Current feed rate (F value)
    pub feed_rate: f64,
    /// Current spindle speed (S value)
    pub spindle_speed: f64,
    /// Tool number (T value)
    pub tool_number: u32,
}

impl Default for GcodeState {
    fn default() -> Self {
        Self::from_defaults(&MachineDefaults::default())
    }
}

impl GcodeState {
    /// Create a state with machine defaults (G0 G17 G90 G91.1 G94 G21 G54)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the stream-start state from machine defaults
    pub fn from_defaults(defaults: &MachineDefaults) -> Self {
        let [x, y, z] = defaults.start;
        Self {
            motion_mode: Some(MotionMode::Rapid),
            plane: defaults.plane,
            distance_mode: defaults.distance_mode,
            arc_distance_mode: DistanceMode::Incremental,
            feed_rate_mode: FeedRateMode::UnitsPerMinute,
            units: defaults.units,
            coordinate_system: 54,
            current_point: Position::xyz(x, y, z, defaults.units),
            feed_rate: 0.0,
            spindle_speed: 0.0,
            tool_number: 0,
        }
    }

    /// Current point
    pub fn current_point(&self) -> &Position {
        &self.current_point
    }

    /// Whether axis words are absolute positions
    pub fn is_absolute(&self) -> bool {
        self.distance_mode == DistanceMode::Absolute
    }

    /// Advance to the state after a fully interpreted command
    pub fn update(&mut self, command: &ParsedCommand) {
        *self = command.state;
    }

    /// Apply the modal effect of a non-motion G code
    ///
    /// Codes outside the groups tracked here leave the state unchanged.
    pub fn apply_modal(&mut self, code: GCode) {
        match code {
            GCode::PLANE_XY => self.plane = Plane::XY,
            GCode::PLANE_ZX => self.plane = Plane::ZX,
            GCode::PLANE_YZ => self.plane = Plane::YZ,
            GCode::INCHES => self.units = Units::INCH,
            GCode::MILLIMETERS => self.units = Units::MM,
            GCode::ABSOLUTE => self.distance_mode = DistanceMode::Absolute,
            GCode::INCREMENTAL => self.distance_mode = DistanceMode::Incremental,
            GCode::ABSOLUTE_ARC => self.arc_distance_mode = DistanceMode::Absolute,
            GCode::INCREMENTAL_ARC => self.arc_distance_mode = DistanceMode::Incremental,
            GCode::CANCEL_MOTION => self.motion_mode = None,
            _ => match code.major() {
                93 => self.feed_rate_mode = FeedRateMode::InverseTime,
                94 => self.feed_rate_mode = FeedRateMode::UnitsPerMinute,
                95 => self.feed_rate_mode = FeedRateMode::UnitsPerRevolution,
                54..=59 if code.is_whole() => {
                    self.coordinate_system = code.major() as u8;
                }
                _ => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: f64) -> GCode {
        GCode::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let state = GcodeState::new();
        assert_eq!(state.motion_mode, Some(MotionMode::Rapid));
        assert_eq!(state.plane, Plane::XY);
        assert!(state.is_absolute());
        assert_eq!(state.arc_distance_mode, DistanceMode::Incremental);
        assert_eq!(state.units, Units::MM);
        assert_eq!(state.coordinate_system, 54);
        assert_eq!(*state.current_point(), Position::new(Units::MM));
    }

    #[test]
    fn test_from_machine_defaults() {
        let defaults = MachineDefaults {
            units: Units::INCH,
            distance_mode: DistanceMode::Incremental,
            plane: Plane::ZX,
            start: [1.0, 2.0, 3.0],
        };
        let state = GcodeState::from_defaults(&defaults);
        assert_eq!(state.units, Units::INCH);
        assert!(!state.is_absolute());
        assert_eq!(state.plane, Plane::ZX);
        assert_eq!(state.current_point, Position::xyz(1.0, 2.0, 3.0, Units::INCH));
    }

    #[test]
    fn test_apply_modal_groups() {
        let mut state = GcodeState::new();
        state.apply_modal(code(20.0));
        state.apply_modal(code(91.0));
        state.apply_modal(code(90.1));
        state.apply_modal(code(19.0));
        state.apply_modal(code(93.0));
        state.apply_modal(code(56.0));
        state.apply_modal(code(80.0));

        assert_eq!(state.units, Units::INCH);
        assert_eq!(state.distance_mode, DistanceMode::Incremental);
        assert_eq!(state.arc_distance_mode, DistanceMode::Absolute);
        assert_eq!(state.plane, Plane::YZ);
        assert_eq!(state.feed_rate_mode, FeedRateMode::InverseTime);
        assert_eq!(state.coordinate_system, 56);
        assert_eq!(state.motion_mode, None);
    }

    #[test]
    fn test_sub_codes_do_not_change_coordinate_system() {
        let mut state = GcodeState::new();
        state.apply_modal(code(59.1));
        assert_eq!(state.coordinate_system, 54);
    }

    #[test]
    fn test_plane_axes() {
        assert_eq!(Plane::XY.axes(), (Axis::X, Axis::Y, Axis::Z));
        assert_eq!(Plane::ZX.axes(), (Axis::Z, Axis::X, Axis::Y));
        assert_eq!(Plane::YZ.axes(), (Axis::Y, Axis::Z, Axis::X));
    }
}
