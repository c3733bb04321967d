//! G-Code command types
//!
//! A raw line is decoded into a [`ParsedCommand`]: typed codes, the axis
//! words that were written, arc parameters, and the positions the command
//! moves between. Stages exchange plain text; a [`CommandBatch`] is what one
//! stage produces from one input command.

use gcodexform_core::{format_coordinate, Axis, GcodeError, PartialPosition, Position, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{GcodeState, MotionMode};

/// Ordered commands produced by one stage from one input command
///
/// May be empty (command dropped) or hold the input unchanged (pass-through).
pub type CommandBatch = Vec<String>;

/// Every G code the parser accepts, in tenths (`G38.2` is `382`)
const KNOWN_GCODES: &[u16] = &[
    0, 10, 20, 30, 40, 100, 170, 180, 190, 200, 210, 280, 281, 300, 301, 382, 383, 384, 385, 400,
    410, 420, 430, 431, 490, 530, 540, 550, 560, 570, 580, 590, 591, 592, 593, 610, 611, 640, 800,
    810, 820, 830, 840, 850, 860, 870, 880, 890, 900, 901, 910, 911, 920, 921, 922, 923, 930, 940,
    950,
];

/// A recognised G code, stored in tenths so `G38.2` and `G90.1` are exact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GCode(u16);

impl GCode {
    pub const RAPID: GCode = GCode(0);
    pub const LINEAR: GCode = GCode(10);
    pub const ARC_CW: GCode = GCode(20);
    pub const ARC_CCW: GCode = GCode(30);
    pub const DWELL: GCode = GCode(40);
    pub const PLANE_XY: GCode = GCode(170);
    pub const PLANE_ZX: GCode = GCode(180);
    pub const PLANE_YZ: GCode = GCode(190);
    pub const INCHES: GCode = GCode(200);
    pub const MILLIMETERS: GCode = GCode(210);
    pub const CANCEL_MOTION: GCode = GCode(800);
    pub const ABSOLUTE: GCode = GCode(900);
    pub const ABSOLUTE_ARC: GCode = GCode(901);
    pub const INCREMENTAL: GCode = GCode(910);
    pub const INCREMENTAL_ARC: GCode = GCode(911);
    pub const SET_OFFSET: GCode = GCode(920);

    /// Look up the code for a `G` word value
    pub fn from_value(value: f64) -> Result<GCode> {
        let tenths = (value * 10.0).round();
        let exact = (value * 10.0 - tenths).abs() < 1e-6;
        if !exact || !(0.0..=f64::from(u16::MAX)).contains(&tenths) {
            return Err(GcodeError::UnknownCode {
                code: format!("G{}", value),
            });
        }

        let code = GCode(tenths as u16);
        if KNOWN_GCODES.contains(&code.0) {
            Ok(code)
        } else {
            Err(GcodeError::UnknownCode {
                code: code.to_string(),
            })
        }
    }

    /// Integer part of the code (`38` for `G38.2`)
    pub fn major(self) -> u16 {
        self.0 / 10
    }

    /// Whether the code has no decimal part (`G59` but not `G59.1`)
    pub fn is_whole(self) -> bool {
        self.0 % 10 == 0
    }

    /// Codes that consume the line's axis words for something other than motion
    pub fn consumes_axes(self) -> bool {
        matches!(self.major(), 10 | 28 | 30 | 38 | 53 | 92)
    }
}

impl fmt::Display for GCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "G{}", self.0 / 10)
        } else {
            write!(f, "G{}.{}", self.0 / 10, self.0 % 10)
        }
    }
}

/// A single letter/value word such as `F300` or `M3`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub letter: char,
    pub value: f64,
}

impl Word {
    pub fn new(letter: char, value: f64) -> Self {
        Self { letter, value }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, format_coordinate(self.value))
    }
}

/// Arc center words (I, J, K) as written
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArcOffsets {
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
}

impl ArcOffsets {
    /// Offset word letter paired with an axis
    pub fn letter_for(axis: Axis) -> Option<char> {
        match axis {
            Axis::X => Some('I'),
            Axis::Y => Some('J'),
            Axis::Z => Some('K'),
            _ => None,
        }
    }

    /// Offset along the given linear axis
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.i,
            Axis::Y => self.j,
            Axis::Z => self.k,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.i.is_none() && self.j.is_none() && self.k.is_none()
    }

    /// Words in I, J, K order
    pub fn words(&self) -> Vec<Word> {
        [('I', self.i), ('J', self.j), ('K', self.k)]
            .into_iter()
            .filter_map(|(letter, value)| value.map(|v| Word::new(letter, v)))
            .collect()
    }
}

/// The decoded form of one G-Code line
///
/// Fields left out of the text are resolved against the state the line was
/// parsed with: `motion` may be inherited, and `start`/`end` are absolute
/// positions in the units active after the line's own modal codes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// The line as given to the parser
    pub text: String,
    /// Line number word (N), if present
    pub line_number: Option<u32>,
    /// Motion mode in effect for this line (explicit or inherited)
    pub motion: Option<MotionMode>,
    /// Whether the motion code was written on this line
    pub explicit_motion: bool,
    /// Non-motion G codes in the order written
    pub modal_codes: Vec<GCode>,
    /// Axis words exactly as written (absent is distinct from zero)
    pub axes: PartialPosition,
    /// Arc center words
    pub offsets: ArcOffsets,
    /// Arc radius word (R)
    pub radius: Option<f64>,
    /// Feed rate word (F)
    pub feed_rate: Option<f64>,
    /// Remaining words (M, S, T, P, ...) in the order written
    pub words: Vec<Word>,
    /// Position before the command
    pub start: Position,
    /// Position after the command
    pub end: Position,
    /// Modal state after the command
    pub state: GcodeState,
}

impl ParsedCommand {
    /// Whether this line physically moves the machine
    ///
    /// A motion code alone (`G1 F500`) only changes modal state.
    pub fn is_motion(&self) -> bool {
        match self.motion {
            Some(mode) if mode.is_arc() => {
                !self.axes.is_empty() || !self.offsets.is_empty() || self.radius.is_some()
            }
            Some(_) => !self.axes.is_empty(),
            None => false,
        }
    }

    /// Whether this line is a circular or helical move
    pub fn is_arc(&self) -> bool {
        self.is_motion() && self.motion.is_some_and(MotionMode::is_arc)
    }

    /// The G code of the effective motion, if any
    pub fn motion_code(&self) -> Option<GCode> {
        self.motion.map(MotionMode::gcode)
    }

    /// Whether the line carries no words at all (blank or comment only)
    pub fn is_empty(&self) -> bool {
        self.line_number.is_none()
            && self.motion.is_none()
            && !self.explicit_motion
            && self.modal_codes.is_empty()
            && self.axes.is_empty()
            && self.offsets.is_empty()
            && self.radius.is_none()
            && self.feed_rate.is_none()
            && self.words.is_empty()
    }
}
