//! Criterion benchmarks for scene derivation and reply interpretation.
//!
//! Run with:
//!   cargo bench -p ikviz
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ikviz::grid::{generate, GridSpec};
use ikviz::model::{SceneModel, Solution, SolverOutcome};
use ikviz::profile::ScaleProfile;
use ikviz::protocol::{Reply, ResponseInterpreter};
use ikviz::render::ViewportRenderer;

fn solved(profile: &ScaleProfile) -> SceneModel {
    let mut model = SceneModel::new(profile);
    let id = model.peek_request_id();
    model.commit_request(id);
    model.apply(Reply {
        request_id: None,
        outcome: SolverOutcome::Success(Solution {
            theta_deg: [12.5, -3.2, 45.0],
            chain: Some(vec![
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 400.0],
                [-100.0, 600.0, 300.0],
                [-149.09, 848.2, 20.23],
            ]),
        }),
    });
    model
}

/// Full scene derivation per profile.
fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive");

    for name in ["robot_mm", "unit_cube"] {
        let profile = match ScaleProfile::builtin(name) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        };
        let model = solved(&profile);
        group.bench_with_input(BenchmarkId::from_parameter(name), &model, |b, model| {
            let renderer = ViewportRenderer::new(&profile);
            b.iter(|| black_box(renderer.derive(model).primitives.len()));
        });
    }

    group.finish();
}

/// Tick generation with growing tick counts.
fn bench_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("ticks");

    for count in [20u64, 200, 2000] {
        let spec = GridSpec {
            min: 0.0,
            max: (count - 1) as f64,
            step: 1.0,
        };
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &spec, |b, spec| {
            b.iter(|| black_box(generate(spec).count()));
        });
    }

    group.finish();
}

fn bench_interpret(c: &mut Criterion) {
    let interpreter = ResponseInterpreter::new(true);
    let reply = r#"{"theta1_deg": 12.5, "theta2_deg": -3.2, "theta3_deg": 45.0,
        "coords_0_1": [0, 0, 0], "coords_0_2": [0, 0, 400],
        "coords_0_3": [-100, 600, 300], "coords_0_4": [-149.09, 848.2, 20.23]}"#;

    c.bench_function("interpret_success", |b| {
        b.iter(|| black_box(interpreter.interpret(black_box(reply)).is_ok()))
    });
}

criterion_group!(benches, bench_derive, bench_ticks, bench_interpret);
criterion_main!(benches);
