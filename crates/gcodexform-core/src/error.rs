//! Error handling for gcodexform
//!
//! Provides the error types shared by every stage of the pipeline:
//! - G-Code errors (parsing, arc geometry, unit conversion, rendering)
//! - Pipeline errors (a G-Code error located at an input line and stage)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

use crate::data::Units;

/// Broad classification of a [`GcodeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unrecognized command text
    Parse,
    /// Degenerate or inconsistent arc
    Geometry,
    /// No conversion between two unit systems
    Unit,
    /// A command could not be re-serialized
    Render,
}

/// G-Code error type
///
/// Represents errors raised while interpreting or rewriting a single command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// Invalid G-Code syntax
    #[error("Invalid syntax: {reason}")]
    InvalidSyntax {
        /// The reason for the syntax error.
        reason: String,
    },

    /// A word letter without a valid number
    #[error("Malformed number for word '{letter}': '{text}'")]
    MalformedNumber {
        /// The word letter.
        letter: char,
        /// The text that followed the letter.
        text: String,
    },

    /// Unknown G-Code command
    #[error("Unknown G-Code: {code}")]
    UnknownCode {
        /// The unknown G-Code command.
        code: String,
    },

    /// Degenerate or inconsistent arc
    #[error("Geometry error: {reason}")]
    Geometry {
        /// The reason the geometry is invalid.
        reason: String,
    },

    /// Position requested in a unit system with no defined conversion
    #[error("Cannot convert from {from} to {to}")]
    Unit {
        /// The source unit.
        from: Units,
        /// The requested unit.
        to: Units,
    },

    /// A transformed command cannot be re-serialized
    #[error("Render error: {reason}")]
    Render {
        /// The reason rendering failed.
        reason: String,
    },
}

impl GcodeError {
    /// Create a syntax error from a message
    pub fn syntax(reason: impl Into<String>) -> Self {
        GcodeError::InvalidSyntax {
            reason: reason.into(),
        }
    }

    /// Create a geometry error from a message
    pub fn geometry(reason: impl Into<String>) -> Self {
        GcodeError::Geometry {
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GcodeError::InvalidSyntax { .. }
            | GcodeError::MalformedNumber { .. }
            | GcodeError::UnknownCode { .. } => ErrorKind::Parse,
            GcodeError::Geometry { .. } => ErrorKind::Geometry,
            GcodeError::Unit { .. } => ErrorKind::Unit,
            GcodeError::Render { .. } => ErrorKind::Render,
        }
    }

    /// Check if this is a parse error
    pub fn is_parse_error(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }
}

/// Pipeline error type
///
/// Either a command failure located at its 1-based input line and the stage
/// that raised it, or an invalid pipeline configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A command failed in a stage
    #[error("Line {line_number} failed in stage '{stage}': {source} (\"{line}\")")]
    Command {
        /// 1-based position of the offending line in the input stream.
        line_number: usize,
        /// The offending input line.
        line: String,
        /// The stage that failed (`parser` for input parse failures).
        stage: String,
        /// The underlying error.
        #[source]
        source: GcodeError,
    },

    /// The pipeline configuration is invalid
    #[error("Invalid pipeline configuration: {reason}")]
    Config {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl PipelineError {
    /// Create a configuration error from a message
    pub fn config(reason: impl Into<String>) -> Self {
        PipelineError::Config {
            reason: reason.into(),
        }
    }

    /// Line number of a located command error
    pub fn line_number(&self) -> Option<usize> {
        match self {
            PipelineError::Command { line_number, .. } => Some(*line_number),
            PipelineError::Config { .. } => None,
        }
    }

    /// The underlying G-Code error of a located command error
    pub fn gcode_error(&self) -> Option<&GcodeError> {
        match self {
            PipelineError::Command { source, .. } => Some(source),
            PipelineError::Config { .. } => None,
        }
    }
}

/// Result type using GcodeError
pub type Result<T> = std::result::Result<T, GcodeError>;
