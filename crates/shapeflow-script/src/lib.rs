//! Shapeflow Script -- the mini-language that builds factories.
//!
//! A program is a list of lines, each either an assignment that declares a
//! machine or a `.connect()` that wires two declared machines together:
//!
//! ```text
//! source = Source("circle", "white")
//! painter = Painter("red")
//! output = Output("circle", "red", 3)
//! source.connect(painter)
//! painter.connect(output)
//! ```
//!
//! [`parser::Parser`] turns source text into a [`parser::ParseResult`];
//! [`build::build_factory`] rebuilds a [`shapeflow_core::factory::Factory`]
//! from a successful result. [`templates`] holds the starter programs.

pub mod build;
pub mod parser;
pub mod templates;

pub use build::{build_factory, BuildError};
pub use parser::{LayoutConfig, MachineDeclaration, ParseError, ParseErrorKind, ParseResult, Parser};
