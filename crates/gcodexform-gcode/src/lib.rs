//! # gcodexform G-Code
//!
//! Streaming G-code processing for gcodexform.
//! Includes the parser and normalizer, modal state tracking, arc expansion,
//! geometric transforms, and the processor pipeline that chains them.

pub mod arc_expander;
pub mod command;
pub mod parser;
pub mod pipeline;
pub mod processors;
pub mod state;
pub mod transforms;

pub use arc_expander::{
    arc_center_from_radius, segment_count, sweep_angle, ArcExpander, ArcExpanderConfig,
    ArcGeometry, ArcSegmentation, DEFAULT_ARC_TOLERANCE_MM,
};
pub use command::{ArcOffsets, CommandBatch, GCode, ParsedCommand, Word};
pub use parser::{
    normalize, parse, render, render_command, strip_comments, try_normalize, GcodeParser,
    RenderExtras,
};
pub use pipeline::{
    run_pipeline, CommandProcessor, ErrorPolicy, PipelineConfig, PipelineOutput, PipelineRun,
    ProcessorHandle, ProcessorPipeline, StageConfig, PARSER_STAGE,
};
pub use processors::{
    ArcExpanderProcessor, CommentProcessor, NormalizeProcessor, WhitespaceProcessor,
};
pub use state::{DistanceMode, FeedRateMode, GcodeState, MachineDefaults, MotionMode, Plane};
pub use transforms::{
    GeometricTransform, Mirror, MirrorProcessor, Rotate, RotateProcessor, Scale, ScaleFactors,
    ScaleProcessor, TransformProcessor, Translate, TranslateProcessor,
};
