//! Turning a parse result into a running factory graph.

use crate::parser::{ParseError, ParseResult};
use shapeflow_core::factory::{Factory, FactoryError};
use shapeflow_core::id::MachineId;
use shapeflow_core::machine::Machine;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("program has errors: {0}")]
    Parse(#[from] ParseError),
    #[error("connection {connection} refers to declaration {index}, but only {declared} were declared")]
    DeclarationIndex {
        connection: usize,
        index: usize,
        declared: usize,
    },
    #[error(transparent)]
    Factory(#[from] FactoryError),
}

/// Replace the factory's contents with the parsed program.
///
/// Every declaration becomes a machine named after its identifier (shadowed
/// declarations included), then connections are added in source order. The
/// graph is built aside and swapped in only on success, so any error leaves
/// the factory untouched. Returns the new machine ids, parallel to
/// `parsed.machines`.
pub fn build_factory(parsed: &ParseResult, factory: &mut Factory) -> Result<Vec<MachineId>, BuildError> {
    if let Some(error) = &parsed.error {
        return Err(error.clone().into());
    }
    let declared = parsed.machines.len();
    for (connection, &(from, to)) in parsed.connections.iter().enumerate() {
        if let Some(index) = [from, to].into_iter().find(|i| *i >= declared) {
            return Err(BuildError::DeclarationIndex {
                connection,
                index,
                declared,
            });
        }
    }

    let mut built = Factory::with_config(factory.config().clone());
    built.set_speed(factory.speed());
    let mut ids = Vec::with_capacity(declared);
    for decl in &parsed.machines {
        let machine =
            Machine::with_config(decl.kind, decl.position, &decl.config, built.config()).named(decl.identifier.as_str());
        ids.push(built.add_machine(machine)?);
    }
    for &(from, to) in &parsed.connections {
        built.connect(ids[from], ids[to])?;
    }
    *factory = built;

    debug!(machines = ids.len(), connections = parsed.connections.len(), "built factory from program");
    Ok(ids)
}
