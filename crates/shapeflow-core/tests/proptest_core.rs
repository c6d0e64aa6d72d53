//! Property-based tests for the shapeflow core.
//!
//! Uses proptest to generate random shapes, expressions and edit sequences,
//! then verify structural invariants hold.

use proptest::prelude::*;
use shapeflow_core::expr::Expr;
use shapeflow_core::factory::Factory;
use shapeflow_core::machine::MachineKind;
use shapeflow_core::shape::{Color, Shape, ShapeKind};
use shapeflow_core::test_utils::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_kind() -> impl Strategy<Value = ShapeKind> {
    prop::sample::select(ShapeKind::ALL.to_vec())
}

fn arb_color() -> impl Strategy<Value = Color> {
    prop::sample::select(Color::ALL.to_vec())
}

fn arb_machine_kind() -> impl Strategy<Value = MachineKind> {
    prop::sample::select(MachineKind::ALL.to_vec())
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    (arb_kind(), arb_color(), -720i32..720).prop_map(|(k, c, r)| {
        let mut s = Shape::new(k, c);
        s.rotate(r);
        s
    })
}

/// Edit operations applied to a factory.
#[derive(Debug, Clone)]
enum EditOp {
    Add(MachineKind, i32, i32),
    Remove(usize),
    Connect(usize, usize),
    Disconnect(usize, usize),
    Tick(u8),
}

fn arb_edits(max_ops: usize) -> impl Strategy<Value = Vec<EditOp>> {
    let op = prop_oneof![
        3 => (arb_machine_kind(), 0..6i32, 0..4i32).prop_map(|(k, x, y)| EditOp::Add(k, x, y)),
        1 => (0..16usize).prop_map(EditOp::Remove),
        2 => (0..16usize, 0..16usize).prop_map(|(a, b)| EditOp::Connect(a, b)),
        1 => (0..16usize, 0..16usize).prop_map(|(a, b)| EditOp::Disconnect(a, b)),
        1 => (1..12u8).prop_map(EditOp::Tick),
    ];
    proptest::collection::vec(op, 1..max_ops)
}

fn apply_edits(ops: &[EditOp]) -> Factory {
    let mut factory = Factory::new();
    factory.start();
    for op in ops {
        let ids = factory.machine_ids().to_vec();
        let pick = |i: usize| (!ids.is_empty()).then(|| ids[i % ids.len()]);
        match op {
            EditOp::Add(kind, x, y) => {
                let _ = factory.create_machine(*kind, at(*x, *y));
            }
            EditOp::Remove(i) => {
                if let Some(id) = pick(*i) {
                    factory.remove_machine(id).unwrap();
                }
            }
            EditOp::Connect(a, b) => {
                if let (Some(a), Some(b)) = (pick(*a), pick(*b)) {
                    factory.connect(a, b).unwrap();
                }
            }
            EditOp::Disconnect(a, b) => {
                if let (Some(a), Some(b)) = (pick(*a), pick(*b)) {
                    factory.disconnect(a, b);
                }
            }
            EditOp::Tick(n) => run(&mut factory, *n as usize),
        }
    }
    factory
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn rotation_stays_normalized(turns in proptest::collection::vec(-100_000i32..100_000, 0..20)) {
        let mut shape = white_circle();
        for t in &turns {
            shape.rotate(*t);
        }
        let expected = turns.iter().map(|t| i64::from(*t)).sum::<i64>().rem_euclid(360);
        prop_assert!(shape.rotation() < 360);
        prop_assert_eq!(i64::from(shape.rotation()), expected);
    }

    #[test]
    fn rotate_and_back_is_identity(shape in arb_shape(), deg in -100_000i32..100_000) {
        let mut turned = shape.clone();
        turned.rotate(deg).rotate(-deg);
        prop_assert!(turned.matches(&shape));
    }

    #[test]
    fn clone_always_matches(shape in arb_shape(), top in arb_shape()) {
        let mut stacked = shape.clone();
        stacked.stack(&top);
        prop_assert!(stacked.matches(&stacked.clone()));
        prop_assert!(!stacked.matches(&shape));
    }

    #[test]
    fn expressions_never_panic(src in "[a-z_.()'=<>! 0-9]{0,40}", shape in arb_shape()) {
        let expr = Expr::lenient(&src);
        let _ = expr.test(&shape);
        let _ = expr.transform(&shape);
    }

    #[test]
    fn color_condition_agrees_with_shape(shape in arb_shape(), color in arb_color()) {
        let expr = Expr::parse(&format!("shape.color == '{color}'")).unwrap();
        prop_assert_eq!(expr.test(&shape).unwrap(), shape.color == color);
    }

    #[test]
    fn grid_and_adjacency_stay_consistent(ops in arb_edits(40)) {
        let factory = apply_edits(&ops);

        for (id, machine) in factory.machines() {
            prop_assert_eq!(factory.machine_at(machine.position.x, machine.position.y), Some(id));
            for cid in machine.outputs() {
                prop_assert_eq!(factory.connection(*cid).map(|c| c.from), Some(id));
            }
            for cid in machine.inputs() {
                prop_assert_eq!(factory.connection(*cid).map(|c| c.to), Some(id));
            }
        }
        for (cid, c) in factory.connections() {
            let from = factory.machine(c.from);
            let to = factory.machine(c.to);
            prop_assert!(from.is_some_and(|m| m.outputs().contains(&cid)));
            prop_assert!(to.is_some_and(|m| m.inputs().contains(&cid)));
        }
    }

    #[test]
    fn blueprint_round_trip(ops in arb_edits(30)) {
        let factory = apply_edits(&ops);
        let blueprint = factory.serialize();
        let json = blueprint.to_json().unwrap();

        let mut restored = Factory::new();
        restored.load_json(&json).unwrap();
        prop_assert_eq!(restored.machine_count(), factory.machine_count());
        prop_assert_eq!(restored.connection_count(), factory.connection_count());
        prop_assert_eq!(restored.serialize(), blueprint);
    }
}
