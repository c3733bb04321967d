//! Arc Expander
//!
//! Converts G2/G3 arc commands to linear segments for controllers without arc
//! support, and for transforms that do not map arcs onto arcs.
//!
//! The geometry is split into pure functions ([`arc_center_from_radius`],
//! [`sweep_angle`], [`segment_count`]) that take plain numbers, so they can be
//! tested without a command stream.

use gcodexform_core::{Axis, GcodeError, Position, Result, Units};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::command::{CommandBatch, GCode, ParsedCommand};
use crate::parser::{parse, render_command, render_rewritten, rewritten_axes};
use crate::state::{DistanceMode, GcodeState, MotionMode, Plane};

/// Default maximum chord deviation, in millimeters
pub const DEFAULT_ARC_TOLERANCE_MM: f64 = 0.01;

/// Default maximum segment length, in millimeters
pub const DEFAULT_SEGMENT_LENGTH_MM: f64 = 0.5;

/// Full circles are never approximated by fewer segments than this
pub const MIN_FULL_CIRCLE_SEGMENTS: usize = 3;

/// Upper bound on the segments produced for a single arc
pub const MAX_ARC_SEGMENTS: usize = 1_000_000;

const RADIUS_MISMATCH_MM: f64 = 0.005;
const RADIUS_MISMATCH_RATIO: f64 = 0.001;
const FULL_TURN_EPSILON: f64 = 1e-9;

/// How the number of segments per arc is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcSegmentation {
    /// Fewest segments whose chords stay within the tolerance
    #[default]
    ChordTolerance,
    /// Chord tolerance, and additionally no segment longer than `segment_length`
    SegmentLength,
}

/// Arc expansion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcExpanderConfig {
    /// Maximum distance between the true arc and a segment, in millimeters
    pub tolerance: f64,
    /// Segment count strategy
    pub segmentation: ArcSegmentation,
    /// Maximum segment length for [`ArcSegmentation::SegmentLength`], in millimeters
    pub segment_length: f64,
}

impl Default for ArcExpanderConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_ARC_TOLERANCE_MM,
            segmentation: ArcSegmentation::ChordTolerance,
            segment_length: DEFAULT_SEGMENT_LENGTH_MM,
        }
    }
}

impl ArcExpanderConfig {
    /// Chord-tolerance configuration with the given tolerance in millimeters
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}

/// Center of an R-format arc, as an offset from the start point
///
/// `dx`/`dy` is the chord from start to end in plane coordinates. A negative
/// radius selects the arc longer than a semicircle. A radius short of half the
/// chord by less than a small slack is treated as exactly half the chord.
///
/// # Errors
/// Returns a geometry error for a zero radius, coincident endpoints, or a
/// radius too small to span the chord.
pub fn arc_center_from_radius(dx: f64, dy: f64, radius: f64, clockwise: bool) -> Result<(f64, f64)> {
    if radius == 0.0 {
        return Err(GcodeError::geometry("Arc radius is zero"));
    }
    let chord = dx.hypot(dy);
    if chord == 0.0 {
        return Err(GcodeError::geometry(
            "R-format arc with identical start and end points",
        ));
    }

    let mut discriminant = 4.0 * radius * radius - chord * chord;
    if discriminant < 0.0 {
        let slack = 1e-4 * radius.abs().max(1.0);
        if chord - 2.0 * radius.abs() > slack {
            return Err(GcodeError::geometry(format!(
                "Arc radius {} is too small for a chord of {}",
                radius.abs(),
                chord
            )));
        }
        discriminant = 0.0;
    }

    // Distance from the chord midpoint to the center, scaled by 2/chord
    let mut h = -discriminant.sqrt() / chord;
    if !clockwise {
        h = -h;
    }
    if radius < 0.0 {
        h = -h;
    }

    Ok((0.5 * (dx - dy * h), 0.5 * (dy + dx * h)))
}

/// Signed angle swept from `start_angle` to `end_angle`
///
/// Clockwise sweeps are negative. With `full_turn` the sweep is a whole
/// revolution in the direction of motion.
pub fn sweep_angle(start_angle: f64, end_angle: f64, clockwise: bool, full_turn: bool) -> f64 {
    if full_turn {
        return if clockwise { -TAU } else { TAU };
    }

    let mut sweep = end_angle - start_angle;
    if clockwise {
        if sweep >= 0.0 {
            sweep -= TAU;
        }
    } else if sweep <= 0.0 {
        sweep += TAU;
    }
    sweep
}

/// Fewest segments that keep every chord within `tolerance` of the arc
///
/// A chord spanning angle `φ` deviates from the arc by `r·(1 − cos(φ/2))`, so
/// each segment may span at most `2·acos(1 − tolerance/r)`. Always at least 1.
pub fn segment_count(radius: f64, sweep: f64, tolerance: f64) -> usize {
    let ratio = (1.0 - tolerance / radius.abs()).clamp(-1.0, 1.0);
    let max_step = 2.0 * ratio.acos();
    let count = (sweep.abs() / max_step).ceil();
    if count.is_nan() {
        return 1;
    }
    (count as usize).max(1)
}

/// Fewest segments no longer than `segment_length` along the arc
pub fn length_segment_count(radius: f64, sweep: f64, segment_length: f64) -> usize {
    let count = (radius.abs() * sweep.abs() / segment_length).ceil();
    if count.is_nan() {
        return 1;
    }
    (count as usize).max(1)
}

/// Resolved geometry of one arc command in its plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    /// Plane the arc lies in
    pub plane: Plane,
    /// Center in the plane's first and second axes, absolute
    pub center: (f64, f64),
    pub radius: f64,
    /// Angle of the start point around the center
    pub start_angle: f64,
    /// Signed sweep, negative for clockwise
    pub sweep: f64,
    /// Start and end coincide in the plane
    pub full_turn: bool,
}

impl ArcGeometry {
    /// Resolve the center, radius, and sweep of a parsed arc
    ///
    /// # Errors
    /// Returns a geometry error when the command is not an arc, gives both or
    /// neither of R and I/J/K, or describes an impossible circle.
    pub fn from_command(command: &ParsedCommand) -> Result<Self> {
        let clockwise = match command.motion {
            Some(MotionMode::ArcClockwise) => true,
            Some(MotionMode::ArcCounterClockwise) => false,
            _ => return Err(GcodeError::geometry("Command is not an arc")),
        };

        let plane = command.state.plane;
        let (u, v, _) = plane.axes();
        let (su, sv) = (command.start.get(u), command.start.get(v));
        let (eu, ev) = (command.end.get(u), command.end.get(v));
        let full_turn = (eu - su).abs() < FULL_TURN_EPSILON && (ev - sv).abs() < FULL_TURN_EPSILON;

        let (cu, cv) = match (command.radius, command.offsets.is_empty()) {
            (Some(_), false) => {
                return Err(GcodeError::geometry(
                    "Arc specifies both a radius and center offsets",
                ))
            }
            (None, true) => {
                return Err(GcodeError::geometry(
                    "Arc specifies neither a radius nor center offsets",
                ))
            }
            (Some(radius), true) => {
                let (i, j) = arc_center_from_radius(eu - su, ev - sv, radius, clockwise)?;
                (su + i, sv + j)
            }
            (None, false) => {
                let center = |axis: Axis, start: f64| {
                    let offset = command.offsets.get(axis);
                    match command.state.arc_distance_mode {
                        DistanceMode::Incremental => start + offset.unwrap_or(0.0),
                        DistanceMode::Absolute => offset.unwrap_or(start),
                    }
                };
                (center(u, su), center(v, sv))
            }
        };

        let radius = (su - cu).hypot(sv - cv);
        if radius == 0.0 || !radius.is_finite() {
            return Err(GcodeError::geometry("Arc radius is zero"));
        }

        if command.radius.is_none() {
            let end_radius = (eu - cu).hypot(ev - cv);
            let mismatch = (end_radius - radius).abs();
            let limit = Units::convert(RADIUS_MISMATCH_MM, Units::MM, command.end.unit)?;
            if mismatch > limit && mismatch > RADIUS_MISMATCH_RATIO * radius {
                return Err(GcodeError::geometry(format!(
                    "Arc end radius {:.4} differs from start radius {:.4}",
                    end_radius, radius
                )));
            }
        }

        let start_angle = (sv - cv).atan2(su - cu);
        let end_angle = (ev - cv).atan2(eu - cu);

        Ok(Self {
            plane,
            center: (cu, cv),
            radius,
            start_angle,
            sweep: sweep_angle(start_angle, end_angle, clockwise, full_turn),
            full_turn,
        })
    }
}

/// Converts arc commands to line segments
#[derive(Debug, Clone, Default)]
pub struct ArcExpander {
    config: ArcExpanderConfig,
}

impl ArcExpander {
    /// Create a new arc expander
    pub fn new(config: ArcExpanderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArcExpanderConfig {
        &self.config
    }

    /// Expander for arcs about to pass through a transform that lengthens
    /// distances by up to `stretch`
    ///
    /// Tolerance and segment length are divided by `stretch`, so chord error
    /// measured after the transform stays within the configured tolerance.
    /// A stretch of 1 or less returns an identical expander.
    pub fn tightened(&self, stretch: f64) -> ArcExpander {
        if !(stretch > 1.0 && stretch.is_finite()) {
            return self.clone();
        }
        ArcExpander::new(ArcExpanderConfig {
            tolerance: self.config.tolerance / stretch,
            segment_length: self.config.segment_length / stretch,
            ..self.config.clone()
        })
    }

    /// Number of segments used for an arc, in command units
    fn segments_for(&self, arc: &ArcGeometry, units: Units) -> Result<usize> {
        let tolerance = Units::convert(self.config.tolerance, Units::MM, units)?;
        let mut count = segment_count(arc.radius, arc.sweep, tolerance);
        if self.config.segmentation == ArcSegmentation::SegmentLength {
            let length = Units::convert(self.config.segment_length, Units::MM, units)?;
            count = count.max(length_segment_count(arc.radius, arc.sweep, length));
        }
        if arc.full_turn {
            count = count.max(MIN_FULL_CIRCLE_SEGMENTS);
        }
        if count > MAX_ARC_SEGMENTS {
            return Err(GcodeError::geometry(format!(
                "Arc would need {} segments (limit {})",
                count, MAX_ARC_SEGMENTS
            )));
        }
        Ok(count)
    }

    /// Expand an arc into the end points of its segments
    ///
    /// Axes outside the arc plane (helical axis, rotary axes) move linearly.
    /// The last point is exactly the command's end point.
    pub fn expand(&self, command: &ParsedCommand) -> Result<Vec<Position>> {
        let arc = ArcGeometry::from_command(command)?;
        let count = self.segments_for(&arc, command.end.unit)?;
        let (u, v, _) = arc.plane.axes();
        let (cu, cv) = arc.center;
        let (start, end) = (&command.start, &command.end);

        let mut points = Vec::with_capacity(count);
        for step in 1..count {
            let fraction = step as f64 / count as f64;
            let angle = arc.start_angle + arc.sweep * fraction;

            let mut point = *start;
            for axis in Axis::ALL {
                let value = start.get(axis) + (end.get(axis) - start.get(axis)) * fraction;
                point.set(axis, value);
            }
            point.set(u, cu + arc.radius * angle.cos());
            point.set(v, cv + arc.radius * angle.sin());
            points.push(point);
        }
        points.push(*end);

        Ok(points)
    }

    /// Expand an arc into G1 lines
    ///
    /// `state` is the modal state before the command.
    pub fn expand_to_lines(&self, command: &ParsedCommand, state: &GcodeState) -> Result<CommandBatch> {
        self.expand_to_lines_with(command, state, |point| Ok(*point))
    }

    /// Expand an arc into G1 lines, mapping every point through `transform`
    ///
    /// The first line carries the command's line number, modal codes, feed
    /// rate, and other words. Each line is normalized against the state left
    /// by the previous one so incremental deltas do not accumulate rounding;
    /// a line that fails to normalize is kept as rendered.
    pub fn expand_to_lines_with<F>(
        &self,
        command: &ParsedCommand,
        state: &GcodeState,
        transform: F,
    ) -> Result<CommandBatch>
    where
        F: Fn(&Position) -> Result<Position>,
    {
        let points = self.expand(command)?;
        let (u, v, _) = command.state.plane.axes();
        let units = command.end.unit;

        let mut previous = transform(&command.start)?;
        let mut frame = *state;
        frame.current_point = previous.position_in(state.units)?;

        let mut lines = Vec::with_capacity(points.len());
        for (index, point) in points.iter().enumerate() {
            let target = transform(point)?;
            let forced = if index == 0 {
                rewritten_axes(command, [u, v], &target)
            } else {
                vec![u, v]
            };
            let text = render_rewritten(
                command,
                GCode::LINEAR,
                &previous,
                &target,
                forced,
                Vec::new(),
                index == 0,
            );

            match parse(&text, &frame).and_then(|parsed| Ok((render_command(&parsed)?, parsed))) {
                Ok((normalized, parsed)) => {
                    frame = parsed.state;
                    previous = parsed.end.position_in(units)?;
                    lines.push(normalized);
                }
                Err(e) => {
                    tracing::debug!("Keeping segment '{}' as rendered: {}", text, e);
                    frame = command.state;
                    frame.motion_mode = Some(MotionMode::Linear);
                    frame.current_point = target;
                    previous = target;
                    lines.push(text);
                }
            }
        }

        Ok(lines)
    }
}
