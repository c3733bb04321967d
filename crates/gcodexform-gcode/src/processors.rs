//! Structural command processors
//!
//! Processors that reshape the command stream without moving the toolpath.

use gcodexform_core::GcodeError;

use crate::arc_expander::{ArcExpander, ArcExpanderConfig};
use crate::command::CommandBatch;
use crate::parser::{normalize, parse, strip_comments};
use crate::pipeline::CommandProcessor;
use crate::state::GcodeState;

/// Removes leading and trailing whitespace from G-code commands
///
/// Lines that are empty after trimming are dropped. This is typically the
/// first processor in the pipeline.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceProcessor;

impl WhitespaceProcessor {
    /// Create a new whitespace processor
    pub fn new() -> Self {
        Self
    }
}

impl CommandProcessor for WhitespaceProcessor {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn description(&self) -> &str {
        "Removes leading and trailing whitespace from G-code commands"
    }

    fn process(&self, command: &str, _state: &GcodeState) -> Result<CommandBatch, GcodeError> {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![trimmed.to_string()])
        }
    }
}

/// Removes G-code comments from commands
///
/// Comments in G-code can be:
/// - Parentheses: (this is a comment)
/// - Semicolon: G01 X10 ; move to X10
/// - Tape markers: % on a line by itself
///
/// Lines left empty are dropped.
#[derive(Debug, Clone, Default)]
pub struct CommentProcessor;

impl CommentProcessor {
    /// Create a new comment processor
    pub fn new() -> Self {
        Self
    }
}

impl CommandProcessor for CommentProcessor {
    fn name(&self) -> &str {
        "comment"
    }

    fn description(&self) -> &str {
        "Removes G-code comments (parentheses and semicolon style)"
    }

    fn process(&self, command: &str, _state: &GcodeState) -> Result<CommandBatch, GcodeError> {
        let stripped = strip_comments(command);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![trimmed.to_string()])
        }
    }
}

/// Rewrites commands in canonical form
///
/// Commands that cannot be parsed are kept as written. Commands with no words
/// left (comment-only lines) are dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizeProcessor;

impl NormalizeProcessor {
    /// Create a new normalize processor
    pub fn new() -> Self {
        Self
    }
}

impl CommandProcessor for NormalizeProcessor {
    fn name(&self) -> &str {
        "normalize"
    }

    fn description(&self) -> &str {
        "Rewrites G-code commands in canonical form"
    }

    fn process(&self, command: &str, state: &GcodeState) -> Result<CommandBatch, GcodeError> {
        let normalized = normalize(command, state);
        if normalized.trim().is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![normalized])
        }
    }
}

/// Arc Expander Processor
///
/// Expands arc commands (G2, G3) into linear segments. This is useful for
/// controllers that don't support arc commands natively. Other commands pass
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ArcExpanderProcessor {
    expander: ArcExpander,
}

impl ArcExpanderProcessor {
    /// Create a new arc expander processor
    pub fn new(config: ArcExpanderConfig) -> Self {
        Self {
            expander: ArcExpander::new(config),
        }
    }

    pub fn expander(&self) -> &ArcExpander {
        &self.expander
    }
}

impl CommandProcessor for ArcExpanderProcessor {
    fn name(&self) -> &str {
        "arc_expander"
    }

    fn description(&self) -> &str {
        "Expands arc commands (G2/G3) into linear segments"
    }

    fn process(&self, command: &str, state: &GcodeState) -> Result<CommandBatch, GcodeError> {
        let parsed = parse(command, state)?;
        if !parsed.is_arc() {
            return Ok(vec![command.to_string()]);
        }
        self.expander.expand_to_lines(&parsed, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GcodeState {
        GcodeState::new()
    }

    #[test]
    fn test_whitespace_processor() {
        let processor = WhitespaceProcessor::new();
        assert_eq!(
            processor.process("  G1 X10  ", &state()).unwrap(),
            vec!["G1 X10"]
        );
        assert!(processor.process("   ", &state()).unwrap().is_empty());
    }

    #[test]
    fn test_comment_processor() {
        let processor = CommentProcessor::new();
        assert_eq!(
            processor.process("G1 X10 ; move", &state()).unwrap(),
            vec!["G1 X10"]
        );
        assert_eq!(
            processor.process("(start) M3 S1000", &state()).unwrap(),
            vec!["M3 S1000"]
        );
        assert!(processor.process("(only a comment)", &state()).unwrap().is_empty());
        assert!(processor.process("%", &state()).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_processor() {
        let processor = NormalizeProcessor::new();
        assert_eq!(
            processor.process("g01 x1.500 y2", &state()).unwrap(),
            vec!["G1 X1.5 Y2"]
        );
        assert_eq!(
            processor.process("G1 X1Y", &state()).unwrap(),
            vec!["G1 X1Y"]
        );
        assert!(processor.process("; note", &state()).unwrap().is_empty());
    }

    #[test]
    fn test_arc_expander_passes_non_arcs_through() {
        let processor = ArcExpanderProcessor::default();
        assert_eq!(
            processor.process("g1 x5 ; keep", &state()).unwrap(),
            vec!["g1 x5 ; keep"]
        );
        assert_eq!(processor.process("G2 F100", &state()).unwrap(), vec!["G2 F100"]);
    }

    #[test]
    fn test_arc_expander_expands_arcs() {
        let processor = ArcExpanderProcessor::new(ArcExpanderConfig::with_tolerance(0.1));
        let lines = processor.process("G2 X10 Y0 I5 J0", &state()).unwrap();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines.last().unwrap(), "G1 X10 Y0");
    }

    #[test]
    fn test_arc_expander_reports_geometry_errors() {
        let processor = ArcExpanderProcessor::default();
        assert!(matches!(
            processor.process("G2 X10 Y0 R1", &state()),
            Err(GcodeError::Geometry { .. })
        ));
    }
}
