//! G-Code processor pipeline
//!
//! Stages implement [`CommandProcessor`] and are applied in registration
//! order. A [`PipelineRun`] feeds one input line at a time through every
//! stage, keeps the modal state, and applies the [`ErrorPolicy`] when a stage
//! fails.

use gcodexform_core::{Axis, GcodeError, PartialPosition, PipelineError, Units};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::arc_expander::ArcExpanderConfig;
use crate::command::{CommandBatch, ParsedCommand};
use crate::parser::parse;
use crate::processors::{
    ArcExpanderProcessor, CommentProcessor, NormalizeProcessor, WhitespaceProcessor,
};
use crate::state::{GcodeState, MachineDefaults};
use crate::transforms::{Mirror, Rotate, Scale, ScaleFactors, TransformProcessor, Translate};

/// Stage name reported for failures to parse an input line
pub const PARSER_STAGE: &str = "parser";

/// Trait for G-Code command processors
///
/// Processors implement transformations of G-Code commands. They are applied
/// in a pipeline; each receives the commands produced by the previous stage.
///
/// # Examples
/// - Comment removal
/// - Whitespace normalization
/// - Arc expansion to line segments
/// - Mirroring, rotation, scaling, translation
pub trait CommandProcessor: Send + Sync {
    /// Get the name/identifier of this processor
    fn name(&self) -> &str;

    /// Get a description of what this processor does
    fn description(&self) -> &str;

    /// Process a single G-Code command
    ///
    /// # Arguments
    /// * `command` - The command text as produced by the previous stage
    /// * `state` - Modal state before `command`, as seen by this stage
    ///
    /// # Returns
    /// The commands that replace `command`. Most processors return a single
    /// command, arc expansion returns many, and an empty batch drops it.
    fn process(&self, command: &str, state: &GcodeState) -> Result<CommandBatch, GcodeError>;

    /// Check if this processor is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Arc-wrapped processor for thread-safe sharing
pub type ProcessorHandle = Arc<dyn CommandProcessor>;

/// What the runner does when a command fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Stop the stream at the failing command
    #[default]
    #[serde(rename = "abort-stream")]
    Abort,
    /// Emit the failing command as written and continue
    #[serde(rename = "skip-command-emit-original")]
    SkipEmitOriginal,
    /// Drop the failing command and continue
    #[serde(rename = "skip-command-drop")]
    SkipDrop,
}

fn default_mirror_axis() -> Axis {
    Axis::X
}

/// Serializable description of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Whitespace,
    Comment,
    Normalize,
    ArcExpander(ArcExpanderConfig),
    Mirror {
        #[serde(default = "default_mirror_axis")]
        axis: Axis,
        center: PartialPosition,
        #[serde(default)]
        arc: ArcExpanderConfig,
    },
    Rotate {
        #[serde(default)]
        center: PartialPosition,
        angle_degrees: f64,
        #[serde(default)]
        arc: ArcExpanderConfig,
    },
    Scale {
        #[serde(default)]
        center: PartialPosition,
        #[serde(default)]
        factors: ScaleFactors,
        #[serde(default)]
        arc: ArcExpanderConfig,
    },
    Translate {
        offset: PartialPosition,
    },
}

impl StageConfig {
    /// Name of the processor this stage builds
    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::Whitespace => "whitespace",
            StageConfig::Comment => "comment",
            StageConfig::Normalize => "normalize",
            StageConfig::ArcExpander(_) => "arc_expander",
            StageConfig::Mirror { .. } => "mirror",
            StageConfig::Rotate { .. } => "rotate",
            StageConfig::Scale { .. } => "scale",
            StageConfig::Translate { .. } => "translate",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            StageConfig::Whitespace | StageConfig::Comment | StageConfig::Normalize => Ok(()),
            StageConfig::ArcExpander(arc) => validate_arc(arc),
            StageConfig::Mirror { axis, center, arc } => {
                validate_arc(arc)?;
                validate_units(center, "center")?;
                if !center.contains(*axis) {
                    return Err(format!("mirror center does not give the {} axis", axis));
                }
                Ok(())
            }
            StageConfig::Rotate {
                center,
                angle_degrees,
                arc,
            } => {
                validate_arc(arc)?;
                validate_units(center, "center")?;
                if !angle_degrees.is_finite() {
                    return Err("rotation angle must be finite".to_string());
                }
                Ok(())
            }
            StageConfig::Scale {
                center,
                factors,
                arc,
            } => {
                validate_arc(arc)?;
                validate_units(center, "center")?;
                for factor in [factors.x, factors.y, factors.z] {
                    if factor == 0.0 || !factor.is_finite() {
                        return Err(format!("scale factor {} must be finite and non-zero", factor));
                    }
                }
                Ok(())
            }
            StageConfig::Translate { offset } => validate_units(offset, "offset"),
        }
    }

    /// Build the processor for this stage
    pub fn build(&self) -> ProcessorHandle {
        match self {
            StageConfig::Whitespace => Arc::new(WhitespaceProcessor::new()),
            StageConfig::Comment => Arc::new(CommentProcessor::new()),
            StageConfig::Normalize => Arc::new(NormalizeProcessor::new()),
            StageConfig::ArcExpander(arc) => Arc::new(ArcExpanderProcessor::new(arc.clone())),
            StageConfig::Mirror { axis, center, arc } => Arc::new(
                TransformProcessor::new(Mirror::new(*axis, *center)).with_arc_config(arc.clone()),
            ),
            StageConfig::Rotate {
                center,
                angle_degrees,
                arc,
            } => Arc::new(
                TransformProcessor::new(Rotate::new(*center, *angle_degrees))
                    .with_arc_config(arc.clone()),
            ),
            StageConfig::Scale {
                center,
                factors,
                arc,
            } => Arc::new(
                TransformProcessor::new(Scale::new(*center, *factors)).with_arc_config(arc.clone()),
            ),
            StageConfig::Translate { offset } => {
                Arc::new(TransformProcessor::new(Translate::new(*offset)))
            }
        }
    }
}

fn validate_arc(arc: &ArcExpanderConfig) -> Result<(), String> {
    if !(arc.tolerance > 0.0 && arc.tolerance.is_finite()) {
        return Err(format!("arc tolerance {} must be positive", arc.tolerance));
    }
    if !(arc.segment_length > 0.0 && arc.segment_length.is_finite()) {
        return Err(format!(
            "arc segment length {} must be positive",
            arc.segment_length
        ));
    }
    Ok(())
}

fn validate_units(value: &PartialPosition, field: &str) -> Result<(), String> {
    if value.unit == Units::Unknown && !value.is_empty() {
        return Err(format!("{} has unknown units", field));
    }
    Ok(())
}

/// Serializable pipeline description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stages in application order
    pub stages: Vec<StageConfig>,
    pub error_policy: ErrorPolicy,
    /// Modal state at stream start
    pub machine: MachineDefaults,
}

impl PipelineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.machine.units == Units::Unknown {
            return Err(PipelineError::config("machine units must be mm or inch"));
        }
        if self.machine.start.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::config("machine start position must be finite"));
        }
        for (index, stage) in self.stages.iter().enumerate() {
            stage.validate().map_err(|reason| {
                PipelineError::config(format!("stage {} ({}): {}", index + 1, stage.name(), reason))
            })?;
        }
        Ok(())
    }

    /// Modal state at stream start
    pub fn initial_state(&self) -> GcodeState {
        GcodeState::from_defaults(&self.machine)
    }
}

/// Result of running a whole stream
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Output commands in order
    pub commands: Vec<String>,
    /// Commands skipped under a skip policy
    pub skipped: Vec<PipelineError>,
    /// Modal state after the last input command
    pub final_state: GcodeState,
}

/// G-Code command processor pipeline
///
/// Manages a sequence of command processors that are applied to G-Code commands
/// in order. Each processor can transform the command, drop it, or expand it
/// into multiple commands.
///
/// # Example
/// ```ignore
/// let mut pipeline = ProcessorPipeline::new();
/// pipeline.register(Arc::new(CommentProcessor::new()));
/// pipeline.register(Arc::new(TransformProcessor::new(Mirror::about_x(5.0, Units::MM))));
///
/// let output = pipeline.run(input, GcodeState::new())?;
/// ```
pub struct ProcessorPipeline {
    processors: Vec<ProcessorHandle>,
    error_policy: ErrorPolicy,
}

impl ProcessorPipeline {
    /// Create a new empty processor pipeline
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Builder form setting the error policy
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Build a pipeline from a validated configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let mut pipeline = Self::new().with_error_policy(config.error_policy);
        pipeline.register_all(config.stages.iter().map(StageConfig::build).collect());
        Ok(pipeline)
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Register a processor in the pipeline
    ///
    /// Processors are applied in the order they are registered.
    pub fn register(&mut self, processor: ProcessorHandle) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Register multiple processors at once
    pub fn register_all(&mut self, processors: Vec<ProcessorHandle>) -> &mut Self {
        self.processors.extend(processors);
        self
    }

    /// Get the number of registered processors
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Get a reference to a processor by name
    pub fn get_processor_by_name(&self, name: &str) -> Option<&ProcessorHandle> {
        self.processors.iter().find(|p| p.name() == name)
    }

    /// List all registered processors
    pub fn list_processors(&self) -> Vec<(&str, &str, bool)> {
        self.processors
            .iter()
            .map(|p| (p.name(), p.description(), p.is_enabled()))
            .collect()
    }

    /// Clear all processors from the pipeline
    pub fn clear(&mut self) {
        self.processors.clear();
    }

    /// Begin a stream at the given modal state
    pub fn start(&self, initial: GcodeState) -> PipelineRun<'_> {
        PipelineRun {
            pipeline: self,
            state: initial,
            stage_states: vec![initial; self.processors.len()],
            line_number: 0,
            skipped: Vec::new(),
        }
    }

    /// Run a whole input text, one command per line
    pub fn run(&self, input: &str, initial: GcodeState) -> Result<PipelineOutput, PipelineError> {
        let mut run = self.start(initial);
        let mut commands = Vec::new();
        for line in input.lines() {
            commands.extend(run.process_line(line)?);
        }

        info!(
            "Processed {} lines into {} commands ({} skipped)",
            run.line_number(),
            commands.len(),
            run.skipped().len()
        );

        let (final_state, skipped) = run.finish();
        Ok(PipelineOutput {
            commands,
            skipped,
            final_state,
        })
    }
}

impl Default for ProcessorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// One stream flowing through a [`ProcessorPipeline`]
///
/// Holds the modal state of the input stream and, for every stage, the state
/// of the stream that stage receives. A stage's state advances by parsing
/// the commands given to it, so a stage after an arc expander interprets
/// incremental moves relative to the expanded segments.
pub struct PipelineRun<'a> {
    pipeline: &'a ProcessorPipeline,
    state: GcodeState,
    stage_states: Vec<GcodeState>,
    line_number: usize,
    skipped: Vec<PipelineError>,
}

impl PipelineRun<'_> {
    /// Modal state after the last processed input line
    pub fn state(&self) -> &GcodeState {
        &self.state
    }

    /// Number of input lines seen so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Failures skipped so far under a skip policy
    pub fn skipped(&self) -> &[PipelineError] {
        &self.skipped
    }

    /// End the stream, returning the final state and skipped failures
    pub fn finish(self) -> (GcodeState, Vec<PipelineError>) {
        (self.state, self.skipped)
    }

    /// Process one input line through every enabled stage
    ///
    /// # Errors
    /// Under [`ErrorPolicy::Abort`] a failing line is returned as a
    /// [`PipelineError::Command`] naming the line and stage; the state is
    /// left as it was before the line.
    pub fn process_line(&mut self, line: &str) -> Result<CommandBatch, PipelineError> {
        self.line_number += 1;

        let parsed = match parse(line, &self.state) {
            Ok(parsed) => parsed,
            Err(source) => return self.fail(line, PARSER_STAGE, source, None),
        };

        let mut stage_states = self.stage_states.clone();
        match self.run_stages(line, &mut stage_states) {
            Ok(batch) => {
                self.state.update(&parsed);
                self.stage_states = stage_states;
                Ok(batch)
            }
            Err((stage, source)) => self.fail(line, &stage, source, Some(&parsed)),
        }
    }

    fn run_stages(
        &self,
        line: &str,
        stage_states: &mut [GcodeState],
    ) -> Result<CommandBatch, (String, GcodeError)> {
        let mut batch = vec![line.to_string()];

        for (processor, frame) in self.pipeline.processors.iter().zip(stage_states.iter_mut()) {
            if !processor.is_enabled() {
                continue;
            }

            let mut next = Vec::new();
            for command in &batch {
                let output = processor
                    .process(command, frame)
                    .map_err(|e| (processor.name().to_string(), e))?;
                advance(frame, command);
                next.extend(output);
            }
            batch = next;

            if batch.is_empty() {
                break;
            }
        }

        Ok(batch)
    }

    fn fail(
        &mut self,
        line: &str,
        stage: &str,
        source: GcodeError,
        parsed: Option<&ParsedCommand>,
    ) -> Result<CommandBatch, PipelineError> {
        let error = PipelineError::Command {
            line_number: self.line_number,
            line: line.to_string(),
            stage: stage.to_string(),
            source,
        };

        match self.pipeline.error_policy {
            ErrorPolicy::Abort => Err(error),
            ErrorPolicy::SkipEmitOriginal => {
                warn!("Emitting original command: {}", error);
                if let Some(parsed) = parsed {
                    self.state.update(parsed);
                    for frame in &mut self.stage_states {
                        advance(frame, line);
                    }
                }
                self.skipped.push(error);
                Ok(vec![line.to_string()])
            }
            ErrorPolicy::SkipDrop => {
                warn!("Dropping command: {}", error);
                self.skipped.push(error);
                Ok(Vec::new())
            }
        }
    }
}

/// Move a stage state past a command it received
///
/// Text the stage cannot parse (a raw fallback) leaves the state unchanged.
fn advance(state: &mut GcodeState, command: &str) {
    match parse(command, state) {
        Ok(parsed) => state.update(&parsed),
        Err(e) => debug!("Stage state not advanced past '{}': {}", command, e),
    }
}

/// Run a whole input text through the pipeline a configuration describes
///
/// # Errors
/// Returns a configuration error for an invalid `config`, or the first
/// failing command under [`ErrorPolicy::Abort`].
pub fn run_pipeline(input: &str, config: &PipelineConfig) -> Result<Vec<String>, PipelineError> {
    let pipeline = ProcessorPipeline::from_config(config)?;
    pipeline
        .run(input, config.initial_state())
        .map(|output| output.commands)
}
