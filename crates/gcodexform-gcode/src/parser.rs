//! G-Code parser, renderer, and normalizer
//!
//! [`parse`] decodes one line against the current modal state without
//! changing it. [`render`] writes a motion back out as canonical text, and
//! [`normalize`] round-trips a line through both.

use gcodexform_core::{format_coordinate, Axis, GcodeError, PartialPosition, Position, Result};
use regex::Regex;
use std::sync::OnceLock;

use crate::command::{ArcOffsets, GCode, ParsedCommand, Word};
use crate::state::{DistanceMode, GcodeState, MotionMode};

/// Stateful convenience wrapper that parses lines in sequence
///
/// Each successfully parsed line advances the wrapped state, the same way
/// the pipeline advances its tracker.
#[derive(Debug, Clone, Default)]
pub struct GcodeParser {
    current_state: GcodeState,
}

impl GcodeParser {
    /// Create a parser at the machine default state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser starting from the given state
    pub fn with_state(state: GcodeState) -> Self {
        Self {
            current_state: state,
        }
    }

    /// Parse a line and advance the modal state
    ///
    /// On error the state is left as it was.
    pub fn parse_line(&mut self, line: &str) -> Result<ParsedCommand> {
        let command = parse(line, &self.current_state)?;
        self.current_state.update(&command);
        Ok(command)
    }

    /// Get current GcodeState
    pub fn get_state(&self) -> GcodeState {
        self.current_state
    }

    /// Set current GcodeState
    pub fn set_state(&mut self, state: GcodeState) {
        self.current_state = state;
    }
}

/// Remove comments from a G-Code line
///
/// Handles parenthesised comments (an unclosed one runs to end of line),
/// semicolon comments, and the `%` tape marker.
pub fn strip_comments(line: &str) -> String {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COMMENT_REGEX
        .get_or_init(|| Regex::new(r"\([^)]*\)?|;.*").expect("invalid regex pattern"));

    let stripped = regex.replace_all(line, "");
    if stripped.trim() == "%" {
        String::new()
    } else {
        stripped.into_owned()
    }
}

/// Split comment-free text into words
///
/// Whitespace is insignificant and letters are case-insensitive. Every
/// letter must be followed by a number.
pub fn tokenize(text: &str) -> Result<Vec<Word>> {
    static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    let number_regex = NUMBER_REGEX
        .get_or_init(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("invalid regex pattern"));

    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut words = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        if !ch.is_ascii_alphabetic() {
            return Err(GcodeError::syntax(format!("Unexpected character '{}'", ch)));
        }
        let letter = ch.to_ascii_uppercase();
        if letter == 'O' {
            return Err(GcodeError::syntax(
                "Program and subroutine words (O) are not supported",
            ));
        }

        index += 1;
        let start = index;
        while index < chars.len() && matches!(chars[index], '0'..='9' | '.' | '+' | '-') {
            index += 1;
        }

        let number: String = chars[start..index].iter().collect();
        let malformed = || GcodeError::MalformedNumber {
            letter,
            text: number.clone(),
        };
        if !number_regex.is_match(&number) {
            return Err(malformed());
        }
        let value = number.parse::<f64>().map_err(|_| malformed())?;
        if !value.is_finite() {
            return Err(malformed());
        }
        words.push(Word::new(letter, value));
    }

    Ok(words)
}

fn set_once(slot: &mut Option<f64>, word: Word) -> Result<()> {
    if slot.replace(word.value).is_some() {
        return Err(GcodeError::syntax(format!(
            "Duplicate '{}' word",
            word.letter
        )));
    }
    Ok(())
}

fn line_number(word: Word) -> Result<u32> {
    if word.value < 0.0 || word.value.fract() != 0.0 || word.value > f64::from(u32::MAX) {
        return Err(GcodeError::syntax(format!(
            "Invalid line number N{}",
            word.value
        )));
    }
    Ok(word.value as u32)
}

/// Parse a G-Code line against the current modal state
///
/// Fields omitted from the text are resolved from `state`: a line with axis
/// words but no motion code inherits the active motion mode, and incremental
/// axis words are added to the current point. The state itself is not
/// changed; the state after the line is returned in [`ParsedCommand::state`].
///
/// # Errors
/// Returns a parse error for unknown G codes, malformed numbers, duplicate
/// words, or axis words with no active motion mode.
pub fn parse(text: &str, state: &GcodeState) -> Result<ParsedCommand> {
    let words = tokenize(&strip_comments(text))?;

    let mut line = None;
    let mut explicit_motion: Option<MotionMode> = None;
    let mut modal_codes = Vec::new();
    let mut axes = PartialPosition::default();
    let mut offsets = ArcOffsets::default();
    let mut radius = None;
    let mut feed_rate = None;
    let mut others = Vec::new();

    for word in words {
        match word.letter {
            'G' => {
                let code = GCode::from_value(word.value)?;
                match MotionMode::from_gcode(code) {
                    Some(mode) => {
                        if explicit_motion.replace(mode).is_some() {
                            return Err(GcodeError::syntax("More than one motion code on a line"));
                        }
                    }
                    None => modal_codes.push(code),
                }
            }
            'N' => line = Some(line_number(word)?),
            'I' => set_once(&mut offsets.i, word)?,
            'J' => set_once(&mut offsets.j, word)?,
            'K' => set_once(&mut offsets.k, word)?,
            'R' => set_once(&mut radius, word)?,
            'F' => set_once(&mut feed_rate, word)?,
            letter => match Axis::from_letter(letter) {
                Some(axis) => {
                    if axes.contains(axis) {
                        return Err(GcodeError::syntax(format!("Duplicate '{}' word", letter)));
                    }
                    axes.set(axis, word.value);
                }
                None => others.push(word),
            },
        }
    }

    // Modal codes take effect before the motion on the same line
    let mut next = *state;
    for code in &modal_codes {
        next.apply_modal(*code);
    }
    let start = state.current_point.position_in(next.units)?;
    axes.unit = next.units;

    if let Some(mode) = explicit_motion {
        next.motion_mode = Some(mode);
    }

    let consumes_axes = modal_codes.iter().any(|code| code.consumes_axes());
    let motion = if consumes_axes {
        None
    } else if explicit_motion.is_some() {
        explicit_motion
    } else if axes.is_empty() {
        None
    } else {
        match next.motion_mode {
            Some(mode) => Some(mode),
            None => {
                return Err(GcodeError::syntax(
                    "Axis words without an active motion mode",
                ))
            }
        }
    };

    let mut end = start;
    if motion.is_some() {
        for axis in Axis::ALL {
            if let Some(value) = axes.get(axis) {
                let target = match next.distance_mode {
                    DistanceMode::Absolute => value,
                    DistanceMode::Incremental => start.get(axis) + value,
                };
                end.set(axis, target);
            }
        }
    } else if modal_codes.contains(&GCode::SET_OFFSET) {
        // G92 redefines the current point in work coordinates
        for axis in Axis::ALL {
            if let Some(value) = axes.get(axis) {
                end.set(axis, value);
            }
        }
    }

    next.current_point = end;
    if let Some(feed) = feed_rate {
        next.feed_rate = feed;
    }
    for word in &others {
        match word.letter {
            'S' => next.spindle_speed = word.value,
            'T' => next.tool_number = word.value.max(0.0) as u32,
            _ => {}
        }
    }

    Ok(ParsedCommand {
        text: text.to_string(),
        line_number: line,
        motion,
        explicit_motion: explicit_motion.is_some(),
        modal_codes,
        axes,
        offsets,
        radius,
        feed_rate,
        words: others,
        start,
        end,
        state: next,
    })
}

/// Optional parts of a rendered motion command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderExtras {
    /// Axes written even when their value does not change
    pub forced_axes: Vec<Axis>,
    /// Words appended after the axis words
    pub words: Vec<Word>,
}

/// Render a motion from `start` to `end` as canonical text
///
/// Writes the code followed by an axis word for every axis that changes (at
/// output precision) or is forced by `extras`. Absolute mode writes end
/// coordinates; incremental mode writes deltas. When no axis would be written
/// the X axis is written so the line remains a move. `start` and `end` must
/// be in the same units.
pub fn render(
    code: GCode,
    start: &Position,
    end: &Position,
    mode: DistanceMode,
    extras: Option<&RenderExtras>,
) -> String {
    let forced: &[Axis] = extras.map_or(&[], |extras| extras.forced_axes.as_slice());

    let axis_value = |axis: Axis| -> (String, bool) {
        match mode {
            DistanceMode::Absolute => {
                let text = format_coordinate(end.get(axis));
                let changed = text != format_coordinate(start.get(axis));
                (text, changed)
            }
            DistanceMode::Incremental => {
                let text = format_coordinate(end.get(axis) - start.get(axis));
                let changed = text != "0";
                (text, changed)
            }
        }
    };

    let mut parts = vec![code.to_string()];
    for axis in Axis::ALL {
        let (text, changed) = axis_value(axis);
        if changed || forced.contains(&axis) {
            parts.push(format!("{}{}", axis.letter(), text));
        }
    }
    if parts.len() == 1 {
        let (text, _) = axis_value(Axis::X);
        parts.push(format!("X{}", text));
    }

    if let Some(extras) = extras {
        parts.extend(extras.words.iter().map(ToString::to_string));
    }
    parts.join(" ")
}

fn context_prefix(command: &ParsedCommand) -> Vec<String> {
    command
        .line_number
        .map(|n| format!("N{}", n))
        .into_iter()
        .chain(command.modal_codes.iter().map(ToString::to_string))
        .collect()
}

/// Render a rewritten motion for a parsed command
///
/// `with_context` carries the command's line number, modal codes, feed rate,
/// and remaining words onto the output; stages that split one command into
/// several lines set it only for the first.
pub(crate) fn render_rewritten(
    command: &ParsedCommand,
    code: GCode,
    start: &Position,
    end: &Position,
    forced_axes: Vec<Axis>,
    arc_words: Vec<Word>,
    with_context: bool,
) -> String {
    let mut words = arc_words;
    if with_context {
        words.extend(command.feed_rate.map(|feed| Word::new('F', feed)));
        words.extend(command.words.iter().copied());
    }

    let extras = RenderExtras { forced_axes, words };
    let body = render(code, start, end, command.state.distance_mode, Some(&extras));

    let prefix = if with_context {
        context_prefix(command)
    } else {
        Vec::new()
    };
    if prefix.is_empty() {
        body
    } else {
        format!("{} {}", prefix.join(" "), body)
    }
}

/// Axes to write when `command` is rewritten to end at `target`
///
/// Always includes `base`. In absolute mode it also includes every axis where
/// `target` differs from the command's untransformed start, since an output
/// stream that never wrote that axis leaves the machine at the source
/// coordinate.
pub(crate) fn rewritten_axes(
    command: &ParsedCommand,
    base: impl IntoIterator<Item = Axis>,
    target: &Position,
) -> Vec<Axis> {
    let mut axes: Vec<Axis> = base.into_iter().collect();
    if command.state.distance_mode == DistanceMode::Absolute {
        for axis in Axis::ALL {
            let moved = format_coordinate(target.get(axis))
                != format_coordinate(command.start.get(axis));
            if moved && !axes.contains(&axis) {
                axes.push(axis);
            }
        }
    }
    axes
}

/// Render a parsed command in canonical form
///
/// Order: line number, modal codes, motion code, axes (XYZABC), arc words,
/// feed rate, remaining words.
pub fn render_command(command: &ParsedCommand) -> Result<String> {
    if !command.start.is_finite() || !command.end.is_finite() {
        return Err(GcodeError::Render {
            reason: format!("non-finite coordinate in '{}'", command.text.trim()),
        });
    }

    let mut arc_words = command.offsets.words();
    arc_words.extend(command.radius.map(|r| Word::new('R', r)));

    if let (true, Some(code)) = (command.is_motion(), command.motion_code()) {
        return Ok(render_rewritten(
            command,
            code,
            &command.start,
            &command.end,
            command.axes.axes().collect(),
            arc_words,
            true,
        ));
    }

    let mut parts = context_prefix(command);
    if command.explicit_motion {
        if let Some(mode) = command.state.motion_mode {
            parts.push(mode.gcode().to_string());
        }
    }
    for axis in command.axes.axes() {
        if let Some(value) = command.axes.get(axis) {
            parts.push(format!("{}{}", axis.letter(), format_coordinate(value)));
        }
    }
    parts.extend(arc_words.iter().map(ToString::to_string));
    parts.extend(command.feed_rate.map(|feed| Word::new('F', feed).to_string()));
    parts.extend(command.words.iter().map(ToString::to_string));

    Ok(parts.join(" "))
}

/// Normalize a line, reporting why it could not be normalized
pub fn try_normalize(text: &str, state: &GcodeState) -> Result<String> {
    render_command(&parse(text, state)?)
}

/// Normalize a line to canonical form
///
/// Best effort: if the line cannot be parsed or rendered the original text
/// is returned unchanged.
pub fn normalize(text: &str, state: &GcodeState) -> String {
    match try_normalize(text, state) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::debug!("Keeping '{}' as written: {}", text, e);
            text.to_string()
        }
    }
}
