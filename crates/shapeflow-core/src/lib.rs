//! Shapeflow Core -- the simulation engine behind the shape factory.
//!
//! A factory is a grid of machines joined by timed connections. Shapes (and
//! packages/dicts of shapes) are spawned by sources, transformed by machines
//! while they travel, and collected by outputs that are checked against a
//! level's target.
//!
//! # Tick Pipeline
//!
//! Each call to [`factory::Factory::tick`] scales `dt` by the speed
//! multiplier and then, for every machine in insertion order:
//!
//! 1. **Process** -- a busy machine accumulates time and, once its processing
//!    time is reached, runs its [`machine::Processor`] and emits the results.
//! 2. **Intake** -- an idle machine pulls the oldest buffered item.
//! 3. **Transit** -- the machine's outgoing connections advance and deliver
//!    arrivals to the downstream input buffers.
//! 4. **Spawn** -- sources accumulate their spawn timer and emit fresh shapes.
//!
//! # Key Types
//!
//! - [`shape::Shape`] -- the value flowing through the factory.
//! - [`expr::Expr`] -- sandboxed condition/transform expressions.
//! - [`machine::Machine`] and [`machine::Processor`] -- the 14 machine kinds.
//! - [`connection::Connection`] -- timed edge with in-flight items.
//! - [`factory::Factory`] -- owns the graph and drives simulation time.
//! - [`goal::GoalPolicy`] -- level completion against a target descriptor.
//! - [`blueprint::FactoryBlueprint`] -- JSON-compatible save format.

pub mod blueprint;
pub mod config;
pub mod connection;
pub mod event;
pub mod expr;
pub mod factory;
pub mod fixed;
pub mod goal;
pub mod id;
pub mod machine;
pub mod shape;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
