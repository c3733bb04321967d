//! Geometric transform processors
//!
//! A [`GeometricTransform`] maps machine positions. [`TransformProcessor`]
//! applies one to every motion command of a stream: lines are re-rendered
//! between the transformed endpoints, arcs are re-centered when the transform
//! keeps them circular and expanded into lines otherwise. Non-motion commands
//! pass through verbatim.

use gcodexform_core::{Axis, PartialPosition, Position, Result, Units};
use serde::{Deserialize, Serialize};

use crate::arc_expander::{ArcExpander, ArcExpanderConfig, ArcGeometry};
use crate::command::{ArcOffsets, CommandBatch, GCode, ParsedCommand, Word};
use crate::parser::{render_rewritten, rewritten_axes, try_normalize};
use crate::pipeline::CommandProcessor;
use crate::state::{DistanceMode, GcodeState, Plane};

/// A mapping of machine positions
pub trait GeometricTransform: Send + Sync {
    /// Processor name used in pipeline listings and errors
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Map one position
    ///
    /// The result is in the same units as `point`; transform parameters are
    /// converted first, and a unit error is returned if that is impossible.
    fn apply(&self, point: &Position) -> Result<Position>;

    /// Whether circular arcs in `plane` map to circular arcs of the same direction
    fn preserves_arcs(&self, plane: Plane) -> bool;

    /// Upper bound on how much distances in `plane` grow under the transform
    fn max_stretch(&self, _plane: Plane) -> f64 {
        1.0
    }
}

/// Applies a [`GeometricTransform`] to a command stream
#[derive(Debug, Clone)]
pub struct TransformProcessor<T> {
    transform: T,
    expander: ArcExpander,
}

impl<T: GeometricTransform> TransformProcessor<T> {
    /// Create a processor expanding arcs with the default tolerance
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            expander: ArcExpander::default(),
        }
    }

    /// Builder form setting how arcs are expanded
    pub fn with_arc_config(mut self, config: ArcExpanderConfig) -> Self {
        self.expander = ArcExpander::new(config);
        self
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Normalize rendered text against the stage state, keeping it raw on failure
    fn finish(&self, text: String, state: &GcodeState, start: &Position) -> Result<CommandBatch> {
        let mut frame = *state;
        frame.current_point = start.position_in(state.units)?;
        match try_normalize(&text, &frame) {
            Ok(normalized) => Ok(vec![normalized]),
            Err(e) => {
                tracing::debug!("{}: keeping '{}' as rendered: {}", self.transform.name(), text, e);
                Ok(vec![text])
            }
        }
    }

    fn transform_arc(
        &self,
        command: &ParsedCommand,
        code: GCode,
        state: &GcodeState,
    ) -> Result<CommandBatch> {
        let arc = ArcGeometry::from_command(command)?;
        let (u, v, _) = arc.plane.axes();
        let (cu, cv) = arc.center;

        let start = self.transform.apply(&command.start)?;
        let end = self.transform.apply(&command.end)?;
        let center = self
            .transform
            .apply(&command.start.with(u, cu).with(v, cv))?;

        let mut arc_words: Vec<Word> = [u, v]
            .into_iter()
            .filter_map(|axis| {
                let letter = ArcOffsets::letter_for(axis)?;
                let value = match command.state.arc_distance_mode {
                    DistanceMode::Incremental => center.get(axis) - start.get(axis),
                    DistanceMode::Absolute => center.get(axis),
                };
                Some(Word::new(letter, value))
            })
            .collect();
        arc_words.sort_by_key(|word| word.letter);

        let text = render_rewritten(
            command,
            code,
            &start,
            &end,
            rewritten_axes(command, command.axes.axes(), &end),
            arc_words,
            true,
        );
        self.finish(text, state, &start)
    }
}

impl<T: GeometricTransform> CommandProcessor for TransformProcessor<T> {
    fn name(&self) -> &str {
        self.transform.name()
    }

    fn description(&self) -> &str {
        self.transform.description()
    }

    fn process(&self, command: &str, state: &GcodeState) -> Result<CommandBatch> {
        let parsed = crate::parser::parse(command, state)?;
        let code = match parsed.motion_code() {
            Some(code) if parsed.is_motion() => code,
            _ => return Ok(vec![command.to_string()]),
        };

        if parsed.is_arc() {
            if self.transform.preserves_arcs(parsed.state.plane) {
                return self.transform_arc(&parsed, code, state);
            }
            return self
                .expander
                .tightened(self.transform.max_stretch(parsed.state.plane))
                .expand_to_lines_with(&parsed, state, |point| self.transform.apply(point));
        }

        let start = self.transform.apply(&parsed.start)?;
        let end = self.transform.apply(&parsed.end)?;
        let text = render_rewritten(
            &parsed,
            code,
            &start,
            &end,
            rewritten_axes(&parsed, parsed.axes.axes(), &end),
            Vec::new(),
            true,
        );
        self.finish(text, state, &start)
    }
}

/// Reflection across the plane `axis = center`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mirror {
    axis: Axis,
    center: PartialPosition,
}

impl Mirror {
    /// Mirror `axis` about the matching coordinate of `center`
    ///
    /// A center that omits `axis` mirrors about zero.
    pub fn new(axis: Axis, center: PartialPosition) -> Self {
        Self { axis, center }
    }

    /// Mirror X about the line `X = x`
    pub fn about_x(x: f64, unit: Units) -> Self {
        Self::new(Axis::X, PartialPosition::x_only(x, unit))
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl GeometricTransform for Mirror {
    fn name(&self) -> &str {
        "mirror"
    }

    fn description(&self) -> &str {
        "Mirrors motion across a plane perpendicular to one axis"
    }

    fn apply(&self, point: &Position) -> Result<Position> {
        let center = self
            .center
            .position_in(point.unit)?
            .get(self.axis)
            .unwrap_or(0.0);
        Ok(point.with(self.axis, 2.0 * center - point.get(self.axis)))
    }

    /// A reflection reverses arc direction, so arcs are always expanded
    fn preserves_arcs(&self, _plane: Plane) -> bool {
        false
    }
}

/// Counterclockwise rotation in the XY plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotate {
    center: PartialPosition,
    angle_degrees: f64,
}

impl Rotate {
    /// Rotate about the X/Y of `center` (missing coordinates are zero)
    pub fn new(center: PartialPosition, angle_degrees: f64) -> Self {
        Self {
            center,
            angle_degrees,
        }
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }
}

impl GeometricTransform for Rotate {
    fn name(&self) -> &str {
        "rotate"
    }

    fn description(&self) -> &str {
        "Rotates motion counterclockwise about a point in the XY plane"
    }

    fn apply(&self, point: &Position) -> Result<Position> {
        let center = self.center.position_in(point.unit)?;
        let (cx, cy) = (center.x.unwrap_or(0.0), center.y.unwrap_or(0.0));
        let (sin, cos) = self.angle_degrees.to_radians().sin_cos();
        let (dx, dy) = (point.x - cx, point.y - cy);

        Ok(Position {
            x: cx + dx * cos - dy * sin,
            y: cy + dx * sin + dy * cos,
            ..*point
        })
    }

    fn preserves_arcs(&self, plane: Plane) -> bool {
        plane == Plane::XY
    }
}

/// Per-axis scale factors for the linear axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl ScaleFactors {
    /// The same factor on X, Y, and Z
    pub fn uniform(factor: f64) -> Self {
        Self {
            x: factor,
            y: factor,
            z: factor,
        }
    }

    /// Factor for an axis (rotary axes are not scaled)
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            _ => 1.0,
        }
    }
}

/// Scaling of the linear axes about a center point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    center: PartialPosition,
    factors: ScaleFactors,
}

impl Scale {
    pub fn new(center: PartialPosition, factors: ScaleFactors) -> Self {
        Self { center, factors }
    }

    pub fn factors(&self) -> ScaleFactors {
        self.factors
    }
}

impl GeometricTransform for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn description(&self) -> &str {
        "Scales motion about a center point"
    }

    fn apply(&self, point: &Position) -> Result<Position> {
        let center = self.center.position_in(point.unit)?;
        let mut scaled = *point;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let c = center.get(axis).unwrap_or(0.0);
            scaled.set(axis, c + self.factors.get(axis) * (point.get(axis) - c));
        }
        Ok(scaled)
    }

    fn preserves_arcs(&self, plane: Plane) -> bool {
        let (u, v, _) = plane.axes();
        let (fu, fv) = (self.factors.get(u), self.factors.get(v));
        fu == fv && fu > 0.0
    }

    fn max_stretch(&self, plane: Plane) -> f64 {
        let (u, v, _) = plane.axes();
        self.factors.get(u).abs().max(self.factors.get(v).abs())
    }
}

/// Translation by a fixed offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translate {
    offset: PartialPosition,
}

impl Translate {
    /// Translate by `offset` (missing axes do not move)
    pub fn new(offset: PartialPosition) -> Self {
        Self { offset }
    }
}

impl GeometricTransform for Translate {
    fn name(&self) -> &str {
        "translate"
    }

    fn description(&self) -> &str {
        "Translates motion by a fixed offset"
    }

    fn apply(&self, point: &Position) -> Result<Position> {
        let offset = self.offset.position_in(point.unit)?;
        let mut moved = *point;
        for axis in offset.axes() {
            if let Some(delta) = offset.get(axis) {
                moved.set(axis, point.get(axis) + delta);
            }
        }
        Ok(moved)
    }

    fn preserves_arcs(&self, _plane: Plane) -> bool {
        true
    }
}

pub type MirrorProcessor = TransformProcessor<Mirror>;
pub type RotateProcessor = TransformProcessor<Rotate>;
pub type ScaleProcessor = TransformProcessor<Scale>;
pub type TranslateProcessor = TransformProcessor<Translate>;
