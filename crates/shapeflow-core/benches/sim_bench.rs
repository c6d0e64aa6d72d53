//! Criterion benchmarks for the shapeflow simulation loop.
//!
//! Two benchmark groups:
//! - `chains`: many independent Source -> ... -> Output lines ticking together
//! - `blueprint`: serializing and rebuilding a large factory

use criterion::{criterion_group, criterion_main, Criterion};
use shapeflow_core::factory::Factory;
use shapeflow_core::machine::MachineKind;
use shapeflow_core::test_utils::*;

// ===========================================================================
// Factory builders
// ===========================================================================

const STAGES: [MachineKind; 6] = [
    MachineKind::Conveyor,
    MachineKind::Painter,
    MachineKind::Rotator,
    MachineKind::Looper,
    MachineKind::Packer,
    MachineKind::Unpacker,
];

/// `lines` parallel chains, one per grid row, each running every stage.
fn build_factory(lines: i32) -> Factory {
    let mut factory = Factory::new();
    for row in 0..lines {
        let mut prev = add(&mut factory, MachineKind::Source, 0, row);
        for (i, kind) in STAGES.iter().enumerate() {
            let next = add(&mut factory, *kind, 2 * (i as i32 + 1), row);
            factory.connect(prev, next).unwrap();
            prev = next;
        }
        let out = add(&mut factory, MachineKind::Output, 2 * (STAGES.len() as i32 + 1), row);
        factory.connect(prev, out).unwrap();
    }
    factory
}

/// Run long enough that every stage holds items.
fn warmed(lines: i32) -> Factory {
    let mut factory = build_factory(lines);
    factory.start();
    run(&mut factory, 200);
    factory.drain_events();
    factory
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("chains");
    group.sample_size(50);

    let mut small = warmed(10);
    group.bench_function("10_lines_tick", |b| {
        b.iter(|| {
            small.tick(quarter());
            small.drain_events();
        });
    });

    let mut large = warmed(200);
    group.bench_function("200_lines_tick", |b| {
        b.iter(|| {
            large.tick(quarter());
            large.drain_events();
        });
    });

    group.finish();
}

fn bench_blueprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("blueprint");
    let factory = build_factory(200);

    group.bench_function("serialize_200_lines", |b| {
        b.iter(|| factory.to_json().unwrap());
    });

    let json = factory.to_json().unwrap();
    group.bench_function("load_200_lines", |b| {
        b.iter(|| {
            let mut restored = Factory::new();
            restored.load_json(&json).unwrap();
            restored
        });
    });

    group.finish();
}

criterion_group!(benches, bench_chains, bench_blueprint);
criterion_main!(benches);
