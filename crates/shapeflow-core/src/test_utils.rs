//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::SimConfig;
use crate::factory::Factory;
use crate::fixed::{Fixed64, Seconds};
use crate::id::{GridPosition, MachineId};
use crate::machine::{Machine, MachineConfig, MachineKind};
use crate::shape::{Color, Item, Shape, ShapeKind, ShapeSpec};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Tick length used throughout the tests. Sums of quarters are exact.
pub fn quarter() -> Seconds {
    Seconds::from_num(0.25)
}

// ===========================================================================
// Shape constructors
// ===========================================================================

pub fn shape(kind: ShapeKind, color: Color) -> Shape {
    Shape::new(kind, color)
}

pub fn white_circle() -> Shape {
    shape(ShapeKind::Circle, Color::White)
}

pub fn red_circle() -> Shape {
    shape(ShapeKind::Circle, Color::Red)
}

pub fn blue_circle() -> Shape {
    shape(ShapeKind::Circle, Color::Blue)
}

pub fn item(kind: ShapeKind, color: Color) -> Item {
    Item::Shape(shape(kind, color))
}

// ===========================================================================
// Machine constructors
// ===========================================================================

pub fn at(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

pub fn add(factory: &mut Factory, kind: MachineKind, x: i32, y: i32) -> MachineId {
    factory
        .create_machine(kind, at(x, y))
        .expect("cell should be free")
}

pub fn add_with(factory: &mut Factory, kind: MachineKind, x: i32, y: i32, config: MachineConfig) -> MachineId {
    let machine = Machine::with_config(kind, at(x, y), &config, factory.config());
    factory.add_machine(machine).expect("cell should be free")
}

pub fn source_config(kind: ShapeKind, color: Color) -> MachineConfig {
    MachineConfig {
        shape_type: Some(kind),
        color: Some(color),
        ..Default::default()
    }
}

pub fn output_config(kind: ShapeKind, color: Color, count: u32) -> MachineConfig {
    MachineConfig {
        target: Some(ShapeSpec::new(kind, color)),
        required_count: Some(count),
        ..Default::default()
    }
}

pub fn splitter_config(condition: &str) -> MachineConfig {
    MachineConfig {
        condition: Some(condition.to_string()),
        ..Default::default()
    }
}

// ===========================================================================
// Factory builders
// ===========================================================================

/// Source(circle, white) -> Output(circle/white x `count`).
pub fn make_source_to_output(count: u32) -> (Factory, MachineId, MachineId) {
    let mut factory = Factory::new();
    let src = add_with(&mut factory, MachineKind::Source, 1, 3, source_config(ShapeKind::Circle, Color::White));
    let out = add_with(&mut factory, MachineKind::Output, 3, 3, output_config(ShapeKind::Circle, Color::White, count));
    factory.connect(src, out).expect("both machines exist");
    (factory, src, out)
}

/// A linear chain Source -> `stages`... -> Output with the given config.
pub fn make_chain(stages: &[MachineKind], sim: SimConfig) -> (Factory, Vec<MachineId>) {
    let mut factory = Factory::with_config(sim);
    let mut ids = vec![add(&mut factory, MachineKind::Source, 0, 0)];
    for (i, kind) in stages.iter().enumerate() {
        ids.push(add(&mut factory, *kind, 2 * (i as i32 + 1), 0));
    }
    ids.push(add(&mut factory, MachineKind::Output, 2 * (stages.len() as i32 + 1), 0));
    for pair in ids.windows(2) {
        factory.connect(pair[0], pair[1]).expect("both machines exist");
    }
    (factory, ids)
}

/// Run `ticks` quarter-second ticks.
pub fn run(factory: &mut Factory, ticks: usize) {
    for _ in 0..ticks {
        factory.tick(quarter());
    }
}

pub fn success_count(factory: &Factory, output: MachineId) -> u32 {
    factory
        .machine(output)
        .and_then(|m| m.as_output())
        .map_or(0, |o| o.success_count)
}

pub fn collected_count(factory: &Factory, output: MachineId) -> usize {
    factory
        .machine(output)
        .and_then(|m| m.as_output())
        .map_or(0, |o| o.collected.len())
}
