//! Save format for a factory's topology.
//!
//! A blueprint is an ordered machine list (kind, cell, kind-specific config)
//! plus connections expressed as index pairs into that list. Runtime state
//! (buffers, timers, in-flight items) is never saved. The JSON form is the
//! persistence contract with the outside world.

use crate::config::SimConfig;
use crate::factory::{Factory, FactoryError};
use crate::fixed::{checked_f64_to_fixed64, fixed64_to_f64, Fixed64};
use crate::id::{GridPosition, InPort, MachineId, OutPort};
use crate::machine::{Machine, MachineConfig, MachineKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current blueprint format version. Increment when breaking the layout.
pub const BLUEPRINT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("blueprint JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("blueprint from future version {0} (this build supports up to {BLUEPRINT_VERSION})")]
    FutureVersion(u32),
    #[error("connection {connection} refers to machine index {index}, but only {machines} machines exist")]
    ConnectionIndex {
        connection: usize,
        index: usize,
        machines: usize,
    },
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },
    #[error(transparent)]
    Factory(#[from] FactoryError),
}

fn checked_time(field: &'static str, value: f64) -> Result<Fixed64, BlueprintError> {
    checked_f64_to_fixed64(value).ok_or(BlueprintError::OutOfRange { field, value })
}

// ---------------------------------------------------------------------------
// Blueprint types
// ---------------------------------------------------------------------------

fn current_version() -> u32 {
    BLUEPRINT_VERSION
}

fn yes() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEntry {
    #[serde(rename = "type")]
    pub kind: MachineKind,
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "yes", skip_serializing_if = "is_true")]
    pub enabled: bool,
    /// Only set when it differs from the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub config: MachineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub from_port: OutPort,
    #[serde(default)]
    pub to_port: InPort,
    /// Only set when it differs from the configured default speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryBlueprint {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub machines: Vec<MachineEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

impl Default for FactoryBlueprint {
    fn default() -> Self {
        Self {
            version: BLUEPRINT_VERSION,
            machines: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl FactoryBlueprint {
    pub fn to_json(&self) -> Result<String, BlueprintError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BlueprintError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Factory <-> blueprint
// ---------------------------------------------------------------------------

impl Factory {
    /// Snapshot the topology and settings, in machine insertion order.
    pub fn serialize(&self) -> FactoryBlueprint {
        let config = self.config();
        let index: HashMap<MachineId, usize> = self
            .machine_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let machines = self
            .machines()
            .map(|(_, m)| {
                let kind = m.kind();
                MachineEntry {
                    kind,
                    x: m.position.x,
                    y: m.position.y,
                    name: m.name.clone(),
                    enabled: m.enabled,
                    processing_time: (m.processing_time != kind.default_processing_time(config))
                        .then(|| fixed64_to_f64(m.processing_time)),
                    config: m.processor.config(),
                }
            })
            .collect();

        let mut connections: Vec<(usize, ConnectionEntry)> = Vec::new();
        for (_, c) in self.connections() {
            let (Some(&from), Some(&to)) = (index.get(&c.from), index.get(&c.to)) else {
                continue;
            };
            connections.push((
                from,
                ConnectionEntry {
                    from,
                    to,
                    from_port: c.from_port,
                    to_port: c.to_port,
                    speed: (c.speed != config.connection_speed()).then(|| fixed64_to_f64(c.speed)),
                },
            ));
        }
        // Stable by source machine so output does not depend on slot reuse.
        connections.sort_by_key(|(from, _)| *from);

        FactoryBlueprint {
            version: BLUEPRINT_VERSION,
            machines,
            connections: connections.into_iter().map(|(_, c)| c).collect(),
        }
    }

    /// Replace this factory's contents with the blueprint. On error the
    /// factory is left untouched. Returns the new ids in blueprint order.
    pub fn deserialize(&mut self, blueprint: &FactoryBlueprint) -> Result<Vec<MachineId>, BlueprintError> {
        let (factory, ids) = Self::from_blueprint(blueprint, self.config().clone())?;
        *self = factory;
        Ok(ids)
    }

    pub fn from_blueprint(
        blueprint: &FactoryBlueprint,
        config: SimConfig,
    ) -> Result<(Factory, Vec<MachineId>), BlueprintError> {
        if blueprint.version > BLUEPRINT_VERSION {
            return Err(BlueprintError::FutureVersion(blueprint.version));
        }

        let mut factory = Factory::with_config(config);
        let mut ids = Vec::with_capacity(blueprint.machines.len());
        for entry in &blueprint.machines {
            if let Some(interval) = entry.config.spawn_interval {
                checked_time("spawn_interval", interval)?;
            }
            let mut machine = Machine::with_config(
                entry.kind,
                GridPosition::new(entry.x, entry.y),
                &entry.config,
                factory.config(),
            );
            machine.name = entry.name.clone();
            machine.enabled = entry.enabled;
            if let Some(t) = entry.processing_time {
                machine.processing_time = checked_time("processing_time", t)?;
            }
            ids.push(factory.add_machine(machine)?);
        }

        for (n, entry) in blueprint.connections.iter().enumerate() {
            let lookup = |index: usize| {
                ids.get(index).copied().ok_or(BlueprintError::ConnectionIndex {
                    connection: n,
                    index,
                    machines: ids.len(),
                })
            };
            let (from, to) = (lookup(entry.from)?, lookup(entry.to)?);
            let speed = entry.speed.map(|s| checked_time("speed", s)).transpose()?;
            let cid = factory.connect_ports(from, to, entry.from_port, entry.to_port)?;
            if let (Some(speed), Some(c)) = (speed, factory.connection_mut(cid)) {
                c.speed = speed;
            }
        }

        Ok((factory, ids))
    }

    pub fn to_json(&self) -> Result<String, BlueprintError> {
        self.serialize().to_json()
    }

    /// Replace this factory's contents from a JSON blueprint.
    pub fn load_json(&mut self, json: &str) -> Result<Vec<MachineId>, BlueprintError> {
        let blueprint = FactoryBlueprint::from_json(json)?;
        self.deserialize(&blueprint)
    }
}
