//! Play a bundled level with a script.
//!
//! Loads the bundled catalog, parses the level's starter program (or the
//! program in the file given as the second argument), builds it and ticks
//! until the goal is reached or a minute of simulated time passes.
//!
//! Run with: `cargo run -p shapeflow-data --example play_level -- basics_02 [program.txt]`

use shapeflow_core::config::SimConfig;
use shapeflow_core::fixed::{fixed64_to_f64, Seconds};
use shapeflow_data::builtin_levels;
use shapeflow_script::templates::template;
use shapeflow_script::{build_factory, Parser};

fn main() {
    let mut args = std::env::args().skip(1);
    let level_id = args.next().unwrap_or_else(|| "basics_01".to_string());
    let catalog = builtin_levels().expect("bundled levels parse");
    let Some(level) = catalog.get(&level_id) else {
        let ids: Vec<&str> = catalog.iter().map(|l| l.id.as_str()).collect();
        eprintln!("unknown level '{level_id}', try one of: {}", ids.join(", "));
        std::process::exit(1);
    };

    let program = match args.next() {
        Some(path) => std::fs::read_to_string(&path).expect("program file is readable"),
        None => template(&level.id).to_string(),
    };

    println!("{} -- {}", level.title, level.description);
    for hint in &level.hints {
        println!("  hint: {hint}");
    }

    let parsed = Parser::new().parse(&program);
    let mut session = level.session(SimConfig::default());
    if let Err(e) = build_factory(&parsed, session.factory_mut()) {
        eprintln!("{e}");
        std::process::exit(1);
    }
    session.apply_goal();
    session.start();

    let dt = Seconds::from_num(0.25);
    for _ in 0..240 {
        if session.update(dt) {
            break;
        }
    }

    for progress in session.policy().progress(session.factory()) {
        println!(
            "  {}: {}/{}",
            progress.name.as_deref().unwrap_or("output"),
            progress.success_count,
            progress.required_count
        );
    }
    match session.completed_at() {
        Some(at) => println!("completed at {:.2}s -> {} star(s)", fixed64_to_f64(at), session.stars()),
        None => println!("not completed"),
    }
}
