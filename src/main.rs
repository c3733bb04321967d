use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use gcodexform::{
    init_logging, process_stream, ArcExpanderConfig, Axis, Config, ErrorPolicy, PartialPosition,
    ProcessorPipeline, StageConfig, Units, BUILD_DATE, VERSION,
};

/// Error handling on a failing command
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnError {
    /// Stop at the first failing line
    Abort,
    /// Skip the line but pass its original text through
    EmitOriginal,
    /// Skip the line and emit nothing for it
    Drop,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => ErrorPolicy::Abort,
            OnError::EmitOriginal => ErrorPolicy::SkipEmitOriginal,
            OnError::Drop => ErrorPolicy::SkipDrop,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gcodexform")]
#[command(version)]
#[command(about = "Streaming G-code transformer")]
#[command(long_about = None)]
struct Args {
    /// Input G-code file (stdin when omitted or "-")
    input: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Pipeline config file (.toml or .json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured error policy
    #[arg(long, value_enum)]
    on_error: Option<OnError>,

    /// Append a mirror across the line X = value, in mm
    #[arg(long, value_name = "X", allow_hyphen_values = true)]
    mirror_x: Option<f64>,

    /// Chord tolerance in mm for arcs expanded by --mirror-x
    #[arg(long, value_name = "MM")]
    tolerance: Option<f64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;

    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    init_logging(&level, args.json || config.logging.json)?;
    info!(version = VERSION, build_date = BUILD_DATE, "gcodexform starting");

    if let Some(policy) = args.on_error {
        config.pipeline.error_policy = policy.into();
    }
    if let Some(x) = args.mirror_x {
        let arc = args
            .tolerance
            .map(ArcExpanderConfig::with_tolerance)
            .unwrap_or_default();
        config.pipeline.stages.push(StageConfig::Mirror {
            axis: Axis::X,
            center: PartialPosition::x_only(x, Units::MM),
            arc,
        });
    } else if args.tolerance.is_some() {
        warn!("--tolerance has no effect without --mirror-x");
    }

    let pipeline = ProcessorPipeline::from_config(&config.pipeline)?;
    info!(
        stages = pipeline.processor_count(),
        policy = ?pipeline.error_policy(),
        "pipeline ready"
    );

    let reader: Box<dyn io::BufRead> = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        _ => Box::new(io::stdin().lock()),
    };
    let writer: Box<dyn io::Write> = match args.output.as_deref() {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    process_stream(&pipeline, config.pipeline.initial_state(), reader, writer)?;
    Ok(())
}
