//! End-to-end tests for the processor pipeline

use gcodexform_core::{Axis, GcodeError, PartialPosition, PipelineError, Units};
use gcodexform_gcode::{
    parse, run_pipeline, ArcExpanderConfig, ErrorPolicy, GcodeParser, GcodeState,
    PipelineConfig, ProcessorPipeline, ScaleFactors, StageConfig, PARSER_STAGE,
};

fn mirror_x(center: f64) -> StageConfig {
    StageConfig::Mirror {
        axis: Axis::X,
        center: PartialPosition::x_only(center, Units::MM),
        arc: ArcExpanderConfig::with_tolerance(0.1),
    }
}

fn config(stages: Vec<StageConfig>) -> PipelineConfig {
    PipelineConfig {
        stages,
        ..PipelineConfig::default()
    }
}

/// Replay output commands from `state`, returning every end point
fn replay(lines: &[String], state: GcodeState) -> Vec<(f64, f64)> {
    let mut parser = GcodeParser::with_state(state);
    lines
        .iter()
        .map(|line| {
            let command = parser.parse_line(line).unwrap();
            (command.end.x, command.end.y)
        })
        .collect()
}

#[test]
fn test_mirror_linear_move_about_x5() {
    let output = run_pipeline("G1 X10 Y0", &config(vec![mirror_x(5.0)])).unwrap();
    assert_eq!(output, vec!["G1 X0 Y0"]);
}

#[test]
fn test_first_moves_reach_transformed_points() {
    let output = run_pipeline("G1 Y5", &config(vec![mirror_x(5.0)])).unwrap();
    assert_eq!(replay(&output, GcodeState::new()), vec![(10.0, 5.0)]);

    let translate = StageConfig::Translate {
        offset: PartialPosition::xy(3.0, 4.0, Units::MM),
    };
    let output = run_pipeline("G1 X10\nG1 Y10", &config(vec![translate])).unwrap();
    assert_eq!(output, vec!["G1 X13 Y4", "G1 X13 Y14"]);
    assert_eq!(
        replay(&output, GcodeState::new()),
        vec![(13.0, 4.0), (13.0, 14.0)]
    );
}

#[test]
fn test_arc_expansion_within_tolerance() {
    let stages = vec![StageConfig::ArcExpander(ArcExpanderConfig::with_tolerance(0.1))];
    let output = run_pipeline("G2 X10 Y0 I5 J0", &config(stages)).unwrap();

    assert!(output.len() > 1);
    assert_eq!(output.last().unwrap(), "G1 X10 Y0");

    let mut previous = (0.0, 0.0);
    for (x, y) in replay(&output, GcodeState::new()) {
        // Every vertex on the circle, every chord midpoint within tolerance
        assert!(((x - 5.0_f64).hypot(y) - 5.0).abs() < 1e-3);
        let (mx, my) = ((previous.0 + x) / 2.0, (previous.1 + y) / 2.0);
        assert!(5.0 - (mx - 5.0_f64).hypot(my) <= 0.1 + 1e-3);
        previous = (x, y);
    }
}

#[test]
fn test_malformed_line_aborts_stream() {
    let pipeline = ProcessorPipeline::from_config(&config(vec![mirror_x(5.0)])).unwrap();
    let mut run = pipeline.start(GcodeState::new());
    let mut emitted = Vec::new();
    let mut failure = None;

    for line in ["G1 X2", "G1 X1Y", "G1 X3"] {
        match run.process_line(line) {
            Ok(batch) => emitted.extend(batch),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    assert_eq!(emitted, vec!["G1 X8"]);
    match failure {
        Some(PipelineError::Command {
            line_number,
            stage,
            source,
            ..
        }) => {
            assert_eq!(line_number, 2);
            assert_eq!(stage, PARSER_STAGE);
            assert!(source.is_parse_error());
        }
        other => panic!("expected a located parse error, got {:?}", other),
    }
}

#[test]
fn test_run_pipeline_abort_returns_parse_error() {
    let err = run_pipeline("G0 X0\nG1 X1Y\nG1 X2", &config(vec![mirror_x(5.0)])).unwrap_err();
    assert_eq!(err.line_number(), Some(2));
    assert!(matches!(
        err.gcode_error(),
        Some(GcodeError::MalformedNumber { letter: 'Y', .. })
    ));
}

#[test]
fn test_non_motion_commands_pass_every_transform() {
    let stages = vec![
        StageConfig::ArcExpander(ArcExpanderConfig::default()),
        mirror_x(5.0),
        StageConfig::Rotate {
            center: PartialPosition::default(),
            angle_degrees: 30.0,
            arc: ArcExpanderConfig::default(),
        },
        StageConfig::Scale {
            center: PartialPosition::default(),
            factors: ScaleFactors::uniform(2.0),
            arc: ArcExpanderConfig::default(),
        },
        StageConfig::Translate {
            offset: PartialPosition::xy(1.0, 2.0, Units::MM),
        },
    ];
    let input = "M3 S12000\nT1 M6\nG4 P0.5\nm5";
    let output = run_pipeline(input, &config(stages)).unwrap();
    assert_eq!(output, vec!["M3 S12000", "T1 M6", "G4 P0.5", "m5"]);
}

#[test]
fn test_full_circle_expands_to_whole_turn() {
    let stages = vec![StageConfig::ArcExpander(ArcExpanderConfig::with_tolerance(0.05))];
    let output = run_pipeline("G0 X0 Y0\nG3 X0 Y0 I5 J0", &config(stages)).unwrap();

    let segments = &output[1..];
    assert!(segments.len() >= 3);
    assert_eq!(segments.last().unwrap(), "G1 X0 Y0");

    let points = replay(segments, GcodeState::new());
    let max_x = points.iter().map(|p| p.0).fold(f64::MIN, f64::max);
    let max_y = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    let min_y = points.iter().map(|p| p.1).fold(f64::MAX, f64::min);
    assert!(max_x > 9.9);
    assert!(max_y > 4.9);
    assert!(min_y < -4.9);
}

#[test]
fn test_skip_policies_on_geometry_error() {
    let input = "G1 X1\nG2 X10 Y0 R1\nG1 X2";
    let stages = vec![StageConfig::ArcExpander(ArcExpanderConfig::default())];

    let emit = PipelineConfig {
        error_policy: ErrorPolicy::SkipEmitOriginal,
        ..config(stages.clone())
    };
    assert_eq!(
        run_pipeline(input, &emit).unwrap(),
        vec!["G1 X1", "G2 X10 Y0 R1", "G1 X2"]
    );

    let drop = PipelineConfig {
        error_policy: ErrorPolicy::SkipDrop,
        ..config(stages)
    };
    let pipeline = ProcessorPipeline::from_config(&drop).unwrap();
    let output = pipeline.run(input, drop.initial_state()).unwrap();
    assert_eq!(output.commands, vec!["G1 X1", "G1 X2"]);
    assert_eq!(output.skipped.len(), 1);
    assert_eq!(output.skipped[0].line_number(), Some(2));
    assert!(matches!(
        output.skipped[0].gcode_error(),
        Some(GcodeError::Geometry { .. })
    ));
}

#[test]
fn test_incremental_arc_then_mirror() {
    let stages = vec![
        StageConfig::ArcExpander(ArcExpanderConfig::with_tolerance(0.1)),
        mirror_x(0.0),
    ];
    let output = run_pipeline("G91\nG2 X10 Y0 I5 J0", &config(stages)).unwrap();
    assert_eq!(output[0], "G91");

    let points = replay(&output[1..], {
        let mut parser = GcodeParser::new();
        parser.parse_line("G91").unwrap();
        parser.get_state()
    });
    let (x, y) = *points.last().unwrap();
    assert!((x + 10.0).abs() < 1e-3, "ended at x={}", x);
    assert!(y.abs() < 1e-3);
}

#[test]
fn test_inch_program_with_mm_mirror_center() {
    let output = run_pipeline("G20\nG1 X1", &config(vec![mirror_x(5.0)])).unwrap();
    assert_eq!(output, vec!["G20", "G1 X-0.6063"]);
}

#[test]
fn test_structural_stages_then_normalize() {
    let stages = vec![
        StageConfig::Whitespace,
        StageConfig::Comment,
        StageConfig::Normalize,
    ];
    let input = "  %\n(header)\n g00 x1.000 y2 ; rapid \n\nY3\nm30";
    let output = run_pipeline(input, &config(stages)).unwrap();
    assert_eq!(output, vec!["G0 X1 Y2", "G0 Y3", "M30"]);
}

#[test]
fn test_machine_defaults_set_initial_state() {
    let mut pipeline_config = config(vec![StageConfig::Normalize]);
    pipeline_config.machine.units = Units::INCH;
    pipeline_config.machine.start = [1.0, 1.0, 0.0];

    let pipeline = ProcessorPipeline::from_config(&pipeline_config).unwrap();
    let output = pipeline
        .run("G91 X0.5", pipeline_config.initial_state())
        .unwrap();
    assert_eq!(output.final_state.units, Units::INCH);
    assert_eq!(output.final_state.current_point.x, 1.5);
}

#[test]
fn test_invalid_config_is_rejected() {
    let bad = config(vec![StageConfig::ArcExpander(ArcExpanderConfig::with_tolerance(-1.0))]);
    assert!(matches!(
        run_pipeline("G1 X1", &bad),
        Err(PipelineError::Config { .. })
    ));
}

#[test]
fn test_independent_runs_share_a_pipeline() {
    let pipeline = ProcessorPipeline::from_config(&config(vec![mirror_x(0.0)])).unwrap();
    let mut first = pipeline.start(GcodeState::new());
    let mut second = pipeline.start(GcodeState::new());

    first.process_line("G91").unwrap();
    assert_eq!(first.process_line("G1 X1").unwrap(), vec!["G1 X-1"]);
    assert_eq!(second.process_line("G1 X1").unwrap(), vec!["G1 X-1"]);

    first.process_line("X1").unwrap();
    assert_eq!(first.state().current_point.x, 2.0);
    assert_eq!(second.state().current_point.x, 1.0);
    assert!(parse("G1 X1", second.state()).is_ok());
}
