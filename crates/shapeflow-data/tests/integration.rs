//! Bundled levels played with script solutions, and levels loaded from disk.

use shapeflow_core::config::SimConfig;
use shapeflow_core::goal::{LevelSession, TargetDescriptor};
use shapeflow_core::test_utils::quarter;
use shapeflow_data::{builtin_levels, load_levels, load_sim_config, DataLoadError};
use shapeflow_script::templates::template;
use shapeflow_script::{build_factory, Parser};
use std::fs;
use std::path::PathBuf;

// ===========================================================================
// Helpers
// ===========================================================================

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shapeflow_levels_test_{suffix}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Build `program` into a session for `level_id`, then play until the goal
/// is reached or `max_ticks` pass. Returns the ticks taken.
fn play(level_id: &str, program: &str, max_ticks: usize) -> (LevelSession, Option<usize>) {
    let catalog = builtin_levels().unwrap();
    let level = catalog.get(level_id).unwrap();
    let mut session = level.session(SimConfig::default());

    let parsed = Parser::new().parse(program);
    build_factory(&parsed, session.factory_mut()).unwrap();
    assert!(session.apply_goal() > 0, "{level_id}: no output received a target");
    session.start();

    for tick in 1..=max_ticks {
        if session.update(quarter()) {
            return (session, Some(tick));
        }
    }
    (session, None)
}

// ===========================================================================
// Bundled levels
// ===========================================================================

#[test]
fn starter_templates_solve_the_basics() {
    for id in ["basics_01", "basics_02", "basics_03"] {
        let (session, ticks) = play(id, template(id), 200);
        assert!(ticks.is_some(), "{id} was not completed");
        assert_eq!(session.stars(), 3, "{id}");
    }
}

#[test]
fn later_levels_have_script_solutions() {
    let solutions = [
        (
            "variables_01",
            "src = Source('square', 'white')\npaint = Painter('green')\nout = Output()\nsrc.connect(paint)\npaint.connect(out)",
        ),
        (
            "conditionals_01",
            "reds = Source('circle', 'red')\nblues = Source('circle', 'blue')\nred = Output()\nblue = Output()\nreds.connect(red)\nblues.connect(blue)",
        ),
        (
            "loops_01",
            "src = Source('circle', 'red')\nloop = Looper(3)\nout = Output()\nsrc.connect(loop)\nloop.connect(out)",
        ),
        (
            "functions_01",
            "src = Source()\nf = Function('make_red', 'painter')\nout = Output()\nsrc.connect(f)\nf.connect(out)",
        ),
    ];
    for (id, program) in solutions {
        let (_, ticks) = play(id, program, 400);
        assert!(ticks.is_some(), "{id} was not completed");
    }
}

#[test]
fn named_level_is_not_solved_by_one_output() {
    let (session, ticks) = play(
        "conditionals_01",
        "reds = Source('circle', 'red')\nred = Output()\nreds.connect(red)",
        200,
    );
    assert!(ticks.is_none());
    assert!(matches!(session.policy().descriptor(), TargetDescriptor::Named(_)));
}

#[test]
fn wrong_program_never_completes() {
    let (session, ticks) = play("basics_02", template("basics_01"), 200);
    assert!(ticks.is_none());
    assert_eq!(session.stars(), 0);
}

// ===========================================================================
// Loading from disk
// ===========================================================================

#[test]
fn toml_levels_and_config_from_directory() {
    let dir = make_test_dir("toml");
    fs::write(
        dir.join("levels.toml"),
        r#"
[[levels]]
id = "custom_01"
category = "custom"
title = "Stars"
source = { kind = "star", color = "yellow" }
target = { single = { shape = { kind = "star", color = "yellow" }, count = 2 } }

[[levels]]
id = "custom_02"
category = "custom"
title = "Purple stars"
order = 2
target = { single = { shape = { kind = "star", color = "purple" } } }
"#,
    )
    .unwrap();
    fs::write(dir.join("sim.json"), r#"{"spawn_interval": 1.0}"#).unwrap();

    let catalog = load_levels(&dir).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.next_after("custom_01").unwrap().id, "custom_02");

    let config = load_sim_config(&dir).unwrap();
    assert_eq!(config.spawn_interval, 1.0);

    let mut session = catalog.get("custom_01").unwrap().session(config);
    let (source, output) = session.setup().unwrap();
    session.factory_mut().connect(source, output).unwrap();
    session.start();
    let mut done = false;
    for _ in 0..40 {
        done |= session.update(quarter());
    }
    assert!(done);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_levels_file_is_reported() {
    let dir = make_test_dir("missing");
    assert!(matches!(load_levels(&dir), Err(DataLoadError::MissingRequired { .. })));
    let _ = fs::remove_dir_all(&dir);
}
