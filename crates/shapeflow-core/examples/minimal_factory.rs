//! Minimal factory example: a source feeding a painter feeding an output.
//!
//! Builds the graph by hand, installs a goal, and runs quarter-second ticks
//! until the goal is reached, printing what happens along the way.
//!
//! Run with: `cargo run -p shapeflow-core --example minimal_factory`

use shapeflow_core::config::SimConfig;
use shapeflow_core::event::FactoryEvent;
use shapeflow_core::fixed::{fixed64_to_f64, Seconds};
use shapeflow_core::goal::{GoalPolicy, LevelSession};
use shapeflow_core::id::GridPosition;
use shapeflow_core::machine::MachineKind;
use shapeflow_core::shape::{Color, ShapeKind, ShapeSpec};

fn main() {
    // Goal: three red circles.
    let goal = GoalPolicy::single(ShapeSpec::new(ShapeKind::Circle, Color::Red), 3);
    let mut session = LevelSession::new(goal, SimConfig::default());

    // --- Step 1: default layout (source at (1, 3), output at (10, 3)) ---

    let (source, output) = session.setup().expect("empty factory");

    // --- Step 2: put a painter in between ---

    let factory = session.factory_mut();
    let painter = factory
        .create_machine(MachineKind::Painter, GridPosition::new(5, 3))
        .expect("cell is free");
    factory.connect(source, painter).expect("machines exist");
    factory.connect(painter, output).expect("machines exist");

    // --- Step 3: run ---

    session.start();
    let dt = Seconds::from_num(0.25);
    for _ in 0..200 {
        let reached = session.update(dt);
        for event in session.factory_mut().drain_events() {
            match event {
                FactoryEvent::ShapeSpawned { at, .. } => {
                    println!("[{:>5.2}s] spawned a shape", fixed64_to_f64(at));
                }
                FactoryEvent::ItemCollected { matched, at, .. } => {
                    println!("[{:>5.2}s] output collected (matched: {matched})", fixed64_to_f64(at));
                }
                _ => {}
            }
        }
        if reached {
            break;
        }
    }

    match session.completed_at() {
        Some(at) => println!(
            "goal reached at {:.2}s -> {} star(s)",
            fixed64_to_f64(at),
            session.stars()
        ),
        None => println!("goal not reached"),
    }
}
