//! # gcodexform
//!
//! A streaming G-code transformer. Each input line is parsed against the
//! running modal state, passed through a configurable chain of processors,
//! and written out as zero or more commands:
//! - Comment and whitespace cleanup, canonical normalization
//! - Arc expansion into line segments within a chord tolerance
//! - Mirror, rotate, scale, and translate transforms
//!
//! ## Architecture
//!
//! 1. **gcodexform-core** - Positions, units, and error types
//! 2. **gcodexform-gcode** - Parser, modal state, arc expander, transforms, pipeline
//! 3. **gcodexform-settings** - Config file loading and validation
//! 4. **gcodexform** - Command-line binary and logging setup

use std::io::{BufRead, Write};

use anyhow::Context;

pub use gcodexform_core::{
    Axis, GcodeError, PartialPosition, PipelineError, Position, Result, Units,
};
pub use gcodexform_gcode::{
    run_pipeline, ArcExpanderConfig, CommandProcessor, ErrorPolicy, GcodeParser, GcodeState,
    PipelineConfig, PipelineOutput, PipelineRun, ProcessorPipeline, StageConfig,
};
pub use gcodexform_settings::{Config, LoggingSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Logs go to stderr so G-code on stdout stays clean. `RUST_LOG` overrides
/// `level` when set.
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_line_number(true),
            )
            .try_init()?;
    }

    Ok(())
}

/// Counters for one processed stream
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub lines_in: usize,
    pub lines_out: usize,
    /// Commands skipped under a skip policy
    pub skipped: Vec<PipelineError>,
}

/// Stream `reader` through `pipeline`, writing each output command to `writer`
///
/// Output is written as it is produced, so an aborting error leaves every
/// command emitted before the failing line in `writer`.
pub fn process_stream<R: BufRead, W: Write>(
    pipeline: &ProcessorPipeline,
    initial: GcodeState,
    reader: R,
    mut writer: W,
) -> anyhow::Result<StreamSummary> {
    let mut run = pipeline.start(initial);
    let mut lines_out = 0;

    for line in reader.lines() {
        let line = line.context("failed to read input")?;
        match run.process_line(&line) {
            Ok(batch) => {
                for command in batch {
                    writeln!(writer, "{}", command).context("failed to write output")?;
                    lines_out += 1;
                }
            }
            Err(e) => {
                writer.flush().context("failed to write output")?;
                return Err(e.into());
            }
        }
    }

    writer.flush().context("failed to write output")?;
    let lines_in = run.line_number();
    let (_, skipped) = run.finish();
    tracing::info!(lines_in, lines_out, skipped = skipped.len(), "stream complete");

    Ok(StreamSummary {
        lines_in,
        lines_out,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror_pipeline(policy: ErrorPolicy) -> ProcessorPipeline {
        let config = PipelineConfig {
            stages: vec![StageConfig::Mirror {
                axis: Axis::X,
                center: PartialPosition::x_only(5.0, Units::MM),
                arc: ArcExpanderConfig::default(),
            }],
            error_policy: policy,
            ..PipelineConfig::default()
        };
        ProcessorPipeline::from_config(&config).unwrap()
    }

    #[test]
    fn test_process_stream_writes_commands() {
        let pipeline = mirror_pipeline(ErrorPolicy::Abort);
        let mut out = Vec::new();
        let summary =
            process_stream(&pipeline, GcodeState::new(), "G1 X10 Y0\nM30\n".as_bytes(), &mut out)
                .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "G1 X0 Y0\nM30\n");
        assert_eq!(summary.lines_in, 2);
        assert_eq!(summary.lines_out, 2);
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_process_stream_keeps_output_before_abort() {
        let pipeline = mirror_pipeline(ErrorPolicy::Abort);
        let mut out = Vec::new();
        let err = process_stream(
            &pipeline,
            GcodeState::new(),
            "G1 X2\nG1 X1Y\nG1 X3\n".as_bytes(),
            &mut out,
        )
        .unwrap_err();

        assert_eq!(String::from_utf8(out).unwrap(), "G1 X8\n");
        let err = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(err.line_number(), Some(2));
    }

    #[test]
    fn test_process_stream_reports_skipped() {
        let pipeline = mirror_pipeline(ErrorPolicy::SkipDrop);
        let mut out = Vec::new();
        let summary = process_stream(
            &pipeline,
            GcodeState::new(),
            "G1 X2\nG1 X1Y\nG1 X3\n".as_bytes(),
            &mut out,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "G1 X8\nG1 X7\n");
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.lines_in, 3);
    }
}
