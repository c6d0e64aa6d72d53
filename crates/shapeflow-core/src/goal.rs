//! Level completion: target descriptors, the goal policy that installs and
//! checks them, and a level session that ties a factory to a goal.

use crate::config::SimConfig;
use crate::event::FactoryEvent;
use crate::factory::{Factory, FactoryError};
use crate::fixed::Seconds;
use crate::id::{GridPosition, MachineId};
use crate::machine::{Machine, MachineConfig, MachineKind};
use crate::shape::ShapeSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Default level layout: source on the left, output on the right.
pub const DEFAULT_SOURCE_CELL: GridPosition = GridPosition { x: 1, y: 3 };
pub const DEFAULT_OUTPUT_CELL: GridPosition = GridPosition { x: 10, y: 3 };

fn one() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Target descriptors
// ---------------------------------------------------------------------------

/// A shape to deliver and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub shape: ShapeSpec,
    #[serde(default = "one")]
    pub count: u32,
}

impl Target {
    pub fn new(shape: ShapeSpec, count: u32) -> Self {
        Self { shape, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDescriptor {
    /// Every Output gets the target; any one of them completing wins.
    Single(Target),
    /// Outputs are matched by the name they were declared under; all must
    /// complete.
    Named(BTreeMap<String, Target>),
}

// ---------------------------------------------------------------------------
// Goal policy
// ---------------------------------------------------------------------------

/// Progress of one Output machine toward its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputProgress {
    pub machine: MachineId,
    pub name: Option<String>,
    pub success_count: u32,
    pub required_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalPolicy {
    descriptor: TargetDescriptor,
}

impl GoalPolicy {
    pub fn new(descriptor: TargetDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn single(shape: ShapeSpec, count: u32) -> Self {
        Self::new(TargetDescriptor::Single(Target::new(shape, count)))
    }

    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    fn target_for(&self, machine: &Machine) -> Option<&Target> {
        match &self.descriptor {
            TargetDescriptor::Single(target) => Some(target),
            TargetDescriptor::Named(targets) => machine.name.as_deref().and_then(|n| targets.get(n)),
        }
    }

    /// Install targets on the factory's Output machines. Returns how many
    /// Outputs received one.
    pub fn apply(&self, factory: &mut Factory) -> usize {
        let mut installed = 0;
        for id in factory.machine_ids().to_vec() {
            let Some(machine) = factory.machine_mut(id) else {
                continue;
            };
            let Some(target) = self.target_for(machine).cloned() else {
                continue;
            };
            if let Some(output) = machine.as_output_mut() {
                output.target = Some(target.shape.build());
                output.required_count = target.count;
                installed += 1;
            }
        }
        installed
    }

    pub fn is_complete(&self, factory: &Factory) -> bool {
        match &self.descriptor {
            TargetDescriptor::Single(_) => factory
                .machines()
                .filter_map(|(_, m)| m.as_output())
                .any(|o| o.is_satisfied()),
            TargetDescriptor::Named(targets) => {
                !targets.is_empty()
                    && targets.keys().all(|name| {
                        factory.machines().any(|(_, m)| {
                            m.name.as_deref() == Some(name.as_str())
                                && m.as_output().is_some_and(|o| o.is_satisfied())
                        })
                    })
            }
        }
    }

    /// Per-Output progress, in machine order.
    pub fn progress(&self, factory: &Factory) -> Vec<OutputProgress> {
        factory
            .machines()
            .filter(|(_, m)| self.target_for(m).is_some())
            .filter_map(|(id, m)| {
                m.as_output().map(|o| OutputProgress {
                    machine: id,
                    name: m.name.clone(),
                    success_count: o.success_count,
                    required_count: o.required_count,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Level session
// ---------------------------------------------------------------------------

/// Star rating for a completion time: one for finishing, one more under a
/// minute, one more under thirty seconds.
pub fn stars_for(completed_at: Seconds) -> u8 {
    1 + u8::from(completed_at < Seconds::from_num(60)) + u8::from(completed_at < Seconds::from_num(30))
}

/// A factory being played against a goal.
#[derive(Debug, Clone)]
pub struct LevelSession {
    factory: Factory,
    policy: GoalPolicy,
    source: ShapeSpec,
    completed_at: Option<Seconds>,
}

impl LevelSession {
    pub fn new(policy: GoalPolicy, config: SimConfig) -> Self {
        Self {
            factory: Factory::with_config(config),
            policy,
            source: ShapeSpec::default(),
            completed_at: None,
        }
    }

    /// Shape spawned by the default source placed by [`LevelSession::setup`].
    pub fn with_source(mut self, source: ShapeSpec) -> Self {
        self.source = source;
        self
    }

    /// Replace the factory with the default layout (a source and an output)
    /// and install the goal.
    pub fn setup(&mut self) -> Result<(MachineId, MachineId), FactoryError> {
        self.factory.clear();
        self.completed_at = None;
        let source_cfg = MachineConfig {
            shape_type: Some(self.source.kind),
            color: Some(self.source.color),
            ..Default::default()
        };
        let source = Machine::with_config(
            MachineKind::Source,
            DEFAULT_SOURCE_CELL,
            &source_cfg,
            self.factory.config(),
        );
        let output = Machine::with_config(
            MachineKind::Output,
            DEFAULT_OUTPUT_CELL,
            &MachineConfig::default(),
            self.factory.config(),
        );
        let source = self.factory.add_machine(source)?;
        let output = self.factory.add_machine(output)?;
        self.policy.apply(&mut self.factory);
        Ok((source, output))
    }

    /// Re-install the goal after the factory was rebuilt from a script or
    /// blueprint.
    pub fn apply_goal(&mut self) -> usize {
        self.completed_at = None;
        self.policy.apply(&mut self.factory)
    }

    pub fn start(&mut self) {
        self.factory.start();
    }

    pub fn stop(&mut self) {
        self.factory.stop();
    }

    pub fn reset(&mut self) {
        self.factory.reset();
        self.completed_at = None;
    }

    /// Tick the factory, then poll the goal. Returns `true` on the tick the
    /// goal is first reached.
    pub fn update(&mut self, dt: Seconds) -> bool {
        self.factory.tick(dt);
        if self.completed_at.is_some() || !self.policy.is_complete(&self.factory) {
            return false;
        }
        let at = self.factory.elapsed();
        self.completed_at = Some(at);
        self.factory.record(FactoryEvent::GoalReached { at });
        info!(at = %at, stars = stars_for(at), "goal reached");
        true
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Simulated time at which the goal was reached.
    pub fn completed_at(&self) -> Option<Seconds> {
        self.completed_at
    }

    /// 0 until completed, then 1 to 3.
    pub fn stars(&self) -> u8 {
        self.completed_at.map_or(0, stars_for)
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut Factory {
        &mut self.factory
    }

    pub fn policy(&self) -> &GoalPolicy {
        &self.policy
    }
}
