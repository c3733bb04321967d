//! # gcodexform Core
//!
//! Core types and utilities for gcodexform.
//! Provides positions, unit handling, and the error types shared by the
//! G-code pipeline crates.

pub mod data;
pub mod error;
pub mod units;

pub use data::{Axis, PartialPosition, Position, Units};
pub use error::{ErrorKind, GcodeError, PipelineError, Result};
pub use units::{format_coordinate, format_number, COORDINATE_PRECISION, MM_PER_INCH};
