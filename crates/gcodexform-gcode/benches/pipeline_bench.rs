//! Pipeline throughput benchmark
//!
//! Measures:
//! - Normalizing a single command
//! - Expanding one arc at the default tolerance
//! - A full mirror + arc expansion run over a generated program

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use gcodexform_core::{Axis, PartialPosition, Units};
use gcodexform_gcode::{
    normalize, parse, ArcExpander, ArcExpanderConfig, GcodeState, PipelineConfig,
    ProcessorPipeline, StageConfig,
};

fn sample_program(lines: usize) -> String {
    let mut program = String::from("G21 G90 G17\nG0 X0 Y0 Z5\nG1 Z-1 F300\n");
    for i in 0..lines {
        let x = (i % 100) as f64 * 0.5;
        if i % 10 == 0 {
            program.push_str(&format!("G1 X{} Y0\nG2 X{} Y0 I2.5 J0\n", x, x + 5.0));
        } else {
            program.push_str(&format!("G1 X{} Y{}\n", x, (i % 7) as f64));
        }
    }
    program.push_str("M5\nM30\n");
    program
}

fn bench_normalize(c: &mut Criterion) {
    let state = GcodeState::new();
    c.bench_function("normalize_line", |b| {
        b.iter(|| normalize(black_box("n10 g01 x10.500 y-2.25 f1200 (cut)"), &state))
    });
}

fn bench_arc_expansion(c: &mut Criterion) {
    let command = parse("G2 X10 Y0 I5 J0", &GcodeState::new()).unwrap();
    let expander = ArcExpander::new(ArcExpanderConfig::default());
    c.bench_function("expand_semicircle", |b| {
        b.iter(|| expander.expand(black_box(&command)).unwrap())
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let config = PipelineConfig {
        stages: vec![
            StageConfig::Comment,
            StageConfig::ArcExpander(ArcExpanderConfig::with_tolerance(0.05)),
            StageConfig::Mirror {
                axis: Axis::X,
                center: PartialPosition::x_only(25.0, Units::MM),
                arc: ArcExpanderConfig::default(),
            },
        ],
        ..PipelineConfig::default()
    };
    let pipeline = ProcessorPipeline::from_config(&config).unwrap();
    let program = sample_program(1_000);

    c.bench_function("pipeline_1000_lines", |b| {
        b.iter(|| {
            pipeline
                .run(black_box(&program), config.initial_state())
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_normalize, bench_arc_expansion, bench_pipeline);
criterion_main!(benches);
