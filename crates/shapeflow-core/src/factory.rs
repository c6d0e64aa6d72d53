use crate::config::SimConfig;
use crate::connection::Connection;
use crate::event::{EventLog, FactoryEvent};
use crate::fixed::{f64_to_fixed64, Seconds};
use crate::id::{ConnectionId, GridPosition, InPort, MachineId, OutPort};
use crate::machine::{Machine, MachineKind};
use crate::shape::Item;
use slotmap::SlotMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural errors raised by factory edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("cell {position} is already occupied")]
    CellOccupied {
        position: GridPosition,
        occupant: MachineId,
    },
    #[error("machine not found: {0:?}")]
    MachineNotFound(MachineId),
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Owns the machine graph and drives simulation time.
///
/// Machines update in insertion order. `grid` is the exact inverse of the
/// machines' positions: at most one machine per cell.
#[derive(Debug, Clone)]
pub struct Factory {
    machines: SlotMap<MachineId, Machine>,
    connections: SlotMap<ConnectionId, Connection>,
    order: Vec<MachineId>,
    grid: BTreeMap<GridPosition, MachineId>,
    running: bool,
    speed: f64,
    elapsed: Seconds,
    config: SimConfig,
    events: EventLog,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            machines: SlotMap::with_key(),
            connections: SlotMap::with_key(),
            order: Vec::new(),
            grid: BTreeMap::new(),
            running: false,
            speed: 1.0,
            elapsed: Seconds::ZERO,
            events: EventLog::new(config.event_capacity),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    // -- Graph edits --

    /// Place a machine. Fails without touching the factory if its cell is
    /// taken.
    pub fn add_machine(&mut self, mut machine: Machine) -> Result<MachineId, FactoryError> {
        if let Some(&occupant) = self.grid.get(&machine.position) {
            return Err(FactoryError::CellOccupied {
                position: machine.position,
                occupant,
            });
        }
        machine.inputs.clear();
        machine.outputs.clear();
        let position = machine.position;
        let kind = machine.kind();
        let id = self.machines.insert(machine);
        self.grid.insert(position, id);
        self.order.push(id);
        debug!(?id, %kind, %position, "machine added");
        Ok(id)
    }

    /// Build a machine of `kind` with this factory's timing defaults and
    /// place it.
    pub fn create_machine(&mut self, kind: MachineKind, position: GridPosition) -> Result<MachineId, FactoryError> {
        let machine = Machine::with_config(kind, position, &Default::default(), &self.config);
        self.add_machine(machine)
    }

    /// Remove a machine together with every connection touching it.
    pub fn remove_machine(&mut self, id: MachineId) -> Result<Machine, FactoryError> {
        let mut machine = self.machines.remove(id).ok_or(FactoryError::MachineNotFound(id))?;
        for cid in machine.outputs.drain(..).chain(machine.inputs.drain(..)).collect::<Vec<_>>() {
            self.remove_connection(cid);
        }
        self.grid.remove(&machine.position);
        self.order.retain(|m| *m != id);
        debug!(?id, position = %machine.position, "machine removed");
        Ok(machine)
    }

    /// Connect `from`'s default output to `to`'s default input.
    pub fn connect(&mut self, from: MachineId, to: MachineId) -> Result<ConnectionId, FactoryError> {
        self.connect_ports(from, to, OutPort::Output, InPort::Input)
    }

    /// Connect two machines of this factory. Cycles and duplicates are
    /// allowed.
    pub fn connect_ports(
        &mut self,
        from: MachineId,
        to: MachineId,
        from_port: OutPort,
        to_port: InPort,
    ) -> Result<ConnectionId, FactoryError> {
        for id in [from, to] {
            if !self.machines.contains_key(id) {
                return Err(FactoryError::MachineNotFound(id));
            }
        }
        let connection = Connection::new(from, to, from_port, to_port, self.config.connection_speed());
        let cid = self.connections.insert(connection);
        if let Some(m) = self.machines.get_mut(from) {
            m.outputs.push(cid);
        }
        if let Some(m) = self.machines.get_mut(to) {
            m.inputs.push(cid);
        }
        debug!(?from, ?to, ?from_port, ?to_port, "connected");
        Ok(cid)
    }

    /// Remove every connection from `from` to `to`. Returns how many were
    /// removed.
    pub fn disconnect(&mut self, from: MachineId, to: MachineId) -> usize {
        let doomed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| c.from == from && c.to == to)
            .map(|(cid, _)| cid)
            .collect();
        for cid in &doomed {
            self.remove_connection(*cid);
        }
        doomed.len()
    }

    /// Remove one connection and detach it from both endpoints. In-flight
    /// items are discarded.
    pub fn remove_connection(&mut self, cid: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(cid)?;
        if let Some(m) = self.machines.get_mut(connection.from) {
            m.outputs.retain(|c| *c != cid);
        }
        if let Some(m) = self.machines.get_mut(connection.to) {
            m.inputs.retain(|c| *c != cid);
        }
        Some(connection)
    }

    // -- Queries --

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn machine_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.get_mut(id)
    }

    pub fn machine_at(&self, x: i32, y: i32) -> Option<MachineId> {
        self.grid.get(&GridPosition::new(x, y)).copied()
    }

    /// Machines in insertion order.
    pub fn machines(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.order
            .iter()
            .filter_map(|id| self.machines.get(*id).map(|m| (*id, m)))
    }

    pub fn machine_ids(&self) -> &[MachineId] {
        &self.order
    }

    /// The most recently added machine declared under `name`.
    pub fn find_by_name(&self, name: &str) -> Option<MachineId> {
        self.order
            .iter()
            .rev()
            .copied()
            .find(|id| self.machines.get(*id).and_then(|m| m.name.as_deref()) == Some(name))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    // -- Run control --

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
        info!(machines = self.machines.len(), "factory started");
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!(elapsed = %self.elapsed, "factory stopped");
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the speed multiplier, clamped to the configured range.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = self.config.clamp_speed(speed);
    }

    /// Simulated seconds since the last reset, after speed scaling.
    pub fn elapsed(&self) -> Seconds {
        self.elapsed
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<FactoryEvent> {
        self.events.drain()
    }

    pub(crate) fn record(&mut self, event: FactoryEvent) {
        self.events.push(event);
    }

    /// Stop and return to the just-built state. Topology and settings
    /// survive; buffers, timers, counters and in-flight items do not.
    pub fn reset(&mut self) {
        self.running = false;
        self.elapsed = Seconds::ZERO;
        for machine in self.machines.values_mut() {
            machine.reset();
        }
        for connection in self.connections.values_mut() {
            connection.clear();
        }
        self.events.clear();
        info!("factory reset");
    }

    /// Remove every machine and connection and stop.
    pub fn clear(&mut self) {
        self.running = false;
        self.elapsed = Seconds::ZERO;
        self.machines.clear();
        self.connections.clear();
        self.order.clear();
        self.grid.clear();
        self.events.clear();
        info!("factory cleared");
    }

    // -- Simulation --

    /// Advance by a frame time given in seconds. Negative and NaN frame times
    /// count as zero; huge ones saturate.
    pub fn tick_secs(&mut self, dt: f64) {
        self.tick(f64_to_fixed64(dt.max(0.0)));
    }

    /// Advance every machine by `dt` scaled by the speed multiplier.
    /// Does nothing while stopped.
    pub fn tick(&mut self, dt: Seconds) {
        if !self.running {
            return;
        }
        let dt = dt.saturating_mul(f64_to_fixed64(self.speed));
        self.elapsed = self.elapsed.saturating_add(dt);
        for i in 0..self.order.len() {
            let id = self.order[i];
            self.update_machine(id, dt);
        }
    }

    fn update_machine(&mut self, id: MachineId, dt: Seconds) {
        let at = self.elapsed;
        let Some(machine) = self.machines.get_mut(id) else {
            return;
        };
        if !machine.enabled {
            return;
        }

        // Process + intake.
        let collected_before = machine.as_output().map(|o| o.success_count);
        let finished = machine.step(dt);
        let collected_after = machine.as_output().map(|o| o.success_count);
        if let Some(emitted) = finished {
            if let (Some(before), Some(after)) = (collected_before, collected_after) {
                self.record(FactoryEvent::ItemCollected {
                    machine: id,
                    matched: after > before,
                    at,
                });
            }
            self.record(FactoryEvent::ItemProcessed {
                machine: id,
                emitted: emitted.len(),
                at,
            });
            for (port, item) in emitted {
                self.emit(id, port, item);
            }
        }

        // Transit.
        let outgoing = self.machines.get(id).map(|m| m.outputs.clone()).unwrap_or_default();
        for cid in outgoing {
            let Some(connection) = self.connections.get_mut(cid) else {
                continue;
            };
            let arrived = connection.advance(dt);
            let (to, to_port) = (connection.to, connection.to_port);
            for item in arrived {
                if let Some(target) = self.machines.get_mut(to) {
                    debug!(?cid, ?to, item = %item, "item delivered");
                    target.receive(item, to_port);
                    self.events.push(FactoryEvent::ItemDelivered {
                        connection: cid,
                        to,
                        at,
                    });
                }
            }
        }

        // Spawn.
        if let Some(shape) = self.machines.get_mut(id).and_then(|m| m.spawn(dt)) {
            debug!(?id, shape = %shape, "shape spawned");
            self.record(FactoryEvent::ShapeSpawned { machine: id, at });
            self.emit(id, OutPort::Output, shape.into());
        }
    }

    /// Route an emitted item. Without any outgoing connection it stays in the
    /// machine's output buffer; otherwise every connection on `port` gets its
    /// own copy. Conditional ports fall back to the default port.
    fn emit(&mut self, id: MachineId, port: OutPort, item: Item) {
        let Some(machine) = self.machines.get_mut(id) else {
            return;
        };
        if machine.outputs.is_empty() {
            machine.output_buffer.push(item);
            return;
        }

        let on_port = |p: OutPort| -> Vec<ConnectionId> {
            machine
                .outputs
                .iter()
                .copied()
                .filter(|cid| self.connections.get(*cid).is_some_and(|c| c.from_port == p))
                .collect()
        };
        let mut targets = on_port(port);
        if targets.is_empty() && port != OutPort::Output {
            targets = on_port(OutPort::Output);
        }

        let Some((&last, rest)) = targets.split_last() else {
            debug!(?id, ?port, item = %item, "no connection on port, item dropped");
            self.record(FactoryEvent::ItemDropped {
                machine: id,
                port,
                at: self.elapsed,
            });
            return;
        };
        for cid in rest {
            if let Some(connection) = self.connections.get_mut(*cid) {
                connection.send(item.clone());
            }
        }
        if let Some(connection) = self.connections.get_mut(last) {
            connection.send(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{MachineConfig, Processor};
    use crate::shape::{Color, Shape, ShapeKind};

    fn pos(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    fn quarter() -> Seconds {
        Seconds::from_num(0.25)
    }

    #[test]
    fn occupied_cell_is_rejected_without_mutation() {
        let mut factory = Factory::new();
        let a = factory.create_machine(MachineKind::Conveyor, pos(2, 2)).unwrap();
        let err = factory.create_machine(MachineKind::Painter, pos(2, 2)).unwrap_err();
        assert_eq!(
            err,
            FactoryError::CellOccupied {
                position: pos(2, 2),
                occupant: a
            }
        );
        assert_eq!(factory.machine_count(), 1);
        assert_eq!(factory.machine_at(2, 2), Some(a));
    }

    #[test]
    fn remove_frees_cell_and_incident_connections() {
        let mut factory = Factory::new();
        let a = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        let b = factory.create_machine(MachineKind::Conveyor, pos(1, 0)).unwrap();
        let c = factory.create_machine(MachineKind::Output, pos(2, 0)).unwrap();
        factory.connect(a, b).unwrap();
        factory.connect(b, c).unwrap();

        factory.remove_machine(b).unwrap();
        assert_eq!(factory.connection_count(), 0);
        assert!(factory.machine(a).unwrap().outputs().is_empty());
        assert!(factory.machine(c).unwrap().inputs().is_empty());
        assert_eq!(factory.machine_at(1, 0), None);

        let again = factory.create_machine(MachineKind::Painter, pos(1, 0)).unwrap();
        assert_eq!(factory.machine_at(1, 0), Some(again));
        assert_eq!(factory.remove_machine(b).unwrap_err(), FactoryError::MachineNotFound(b));
    }

    #[test]
    fn connect_requires_known_machines() {
        let mut factory = Factory::new();
        let a = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        let b = factory.create_machine(MachineKind::Output, pos(1, 0)).unwrap();
        factory.remove_machine(b).unwrap();
        assert_eq!(factory.connect(a, b).unwrap_err(), FactoryError::MachineNotFound(b));
        // Self loops are allowed.
        assert!(factory.connect(a, a).is_ok());
    }

    #[test]
    fn disconnect_removes_all_parallel_edges() {
        let mut factory = Factory::new();
        let a = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        let b = factory.create_machine(MachineKind::Output, pos(1, 0)).unwrap();
        factory.connect(a, b).unwrap();
        factory.connect(a, b).unwrap();
        factory.connect(b, a).unwrap();
        assert_eq!(factory.disconnect(a, b), 2);
        assert_eq!(factory.connection_count(), 1);
    }

    #[test]
    fn tick_is_noop_while_stopped() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        for _ in 0..20 {
            factory.tick(quarter());
        }
        assert_eq!(factory.elapsed(), Seconds::ZERO);
        assert!(factory.machine(src).unwrap().output_buffer().is_empty());
    }

    #[test]
    fn unconnected_source_fills_output_buffer() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        factory.start();
        for _ in 0..16 {
            factory.tick(quarter());
        }
        assert_eq!(factory.elapsed(), Seconds::from_num(4));
        assert_eq!(factory.machine(src).unwrap().output_buffer().len(), 2);
    }

    #[test]
    fn tick_secs_tolerates_unrepresentable_frame_times() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        factory.start();
        factory.tick_secs(f64::NAN);
        factory.tick_secs(-1.0);
        assert_eq!(factory.elapsed(), Seconds::ZERO);
        factory.tick_secs(1e300);
        factory.tick_secs(1e300);
        assert_eq!(factory.elapsed(), Seconds::MAX);
        assert_eq!(factory.machine(src).unwrap().output_buffer().len(), 2);
    }

    #[test]
    fn speed_multiplier_scales_time_and_is_clamped() {
        let mut factory = Factory::new();
        factory.set_speed(100.0);
        assert_eq!(factory.speed(), 4.0);
        factory.set_speed(0.0);
        assert_eq!(factory.speed(), 0.25);
        factory.set_speed(2.0);
        factory.start();
        factory.tick(quarter());
        assert_eq!(factory.elapsed(), Seconds::from_num(0.5));
    }

    #[test]
    fn fan_out_sends_independent_copies() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        let a = factory.create_machine(MachineKind::Conveyor, pos(1, 0)).unwrap();
        let b = factory.create_machine(MachineKind::Conveyor, pos(1, 1)).unwrap();
        factory.connect(src, a).unwrap();
        factory.connect(src, b).unwrap();
        factory.start();
        // Spawn at t=2, arrive one second later.
        for _ in 0..12 {
            factory.tick(quarter());
        }
        let a_seen = factory.machine(a).unwrap();
        let b_seen = factory.machine(b).unwrap();
        assert!(a_seen.is_processing() || !a_seen.output_buffer().is_empty());
        assert!(b_seen.is_processing() || !b_seen.output_buffer().is_empty());
    }

    #[test]
    fn splitter_drops_when_neither_port_is_wired() {
        let mut factory = Factory::new();
        let splitter = factory.create_machine(MachineKind::Splitter, pos(0, 0)).unwrap();
        let sink = factory.create_machine(MachineKind::Conveyor, pos(1, 0)).unwrap();
        factory
            .connect_ports(splitter, sink, OutPort::OutputTrue, InPort::Input)
            .unwrap();
        factory
            .machine_mut(splitter)
            .unwrap()
            .receive(Shape::new(ShapeKind::Circle, Color::Blue).into(), InPort::Input);
        factory.start();
        for _ in 0..4 {
            factory.tick(quarter());
        }
        assert!(factory.events().iter().any(|e| matches!(
            e,
            FactoryEvent::ItemDropped {
                port: OutPort::OutputFalse,
                ..
            }
        )));
        let (_, conn) = factory.connections().next().unwrap();
        assert_eq!(conn.in_flight().len(), 0);
    }

    #[test]
    fn splitter_falls_back_to_default_port() {
        let mut factory = Factory::new();
        let splitter = factory.create_machine(MachineKind::Splitter, pos(0, 0)).unwrap();
        let sink = factory.create_machine(MachineKind::Conveyor, pos(1, 0)).unwrap();
        factory.connect(splitter, sink).unwrap();
        factory
            .machine_mut(splitter)
            .unwrap()
            .receive(Shape::new(ShapeKind::Circle, Color::Blue).into(), InPort::Input);
        factory.start();
        for _ in 0..4 {
            factory.tick(quarter());
        }
        let (_, conn) = factory.connections().next().unwrap();
        assert_eq!(conn.in_flight().len(), 1);
    }

    #[test]
    fn disabled_machine_is_frozen() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        factory.machine_mut(src).unwrap().enabled = false;
        factory.start();
        for _ in 0..16 {
            factory.tick(quarter());
        }
        let Processor::Source(p) = &factory.machine(src).unwrap().processor else {
            panic!("not a source")
        };
        assert_eq!(p.spawn_timer, Seconds::ZERO);
    }

    #[test]
    fn reset_keeps_topology_and_clears_state() {
        let mut factory = Factory::new();
        let src = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        let out = factory.create_machine(MachineKind::Output, pos(1, 0)).unwrap();
        factory.connect(src, out).unwrap();
        factory.start();
        for _ in 0..20 {
            factory.tick(quarter());
        }
        assert!(!factory.machine(out).unwrap().as_output().unwrap().collected.is_empty());

        factory.reset();
        assert!(!factory.is_running());
        assert_eq!(factory.elapsed(), Seconds::ZERO);
        assert_eq!(factory.connection_count(), 1);
        assert!(factory.machine(out).unwrap().as_output().unwrap().collected.is_empty());
        assert!(factory.connections().all(|(_, c)| c.in_flight().len() == 0));
    }

    #[test]
    fn clear_removes_everything() {
        let mut factory = Factory::new();
        let a = factory.create_machine(MachineKind::Source, pos(0, 0)).unwrap();
        factory.connect(a, a).unwrap();
        factory.start();
        factory.clear();
        assert!(factory.is_empty());
        assert_eq!(factory.connection_count(), 0);
        assert!(!factory.is_running());
        assert_eq!(factory.machine_at(0, 0), None);
    }

    #[test]
    fn find_by_name_prefers_latest() {
        let mut factory = Factory::new();
        let first = Machine::with_config(
            MachineKind::Output,
            pos(0, 0),
            &MachineConfig::default(),
            factory.config(),
        )
        .named("out");
        let second = Machine::new(MachineKind::Output, pos(1, 0)).named("out");
        factory.add_machine(first).unwrap();
        let b = factory.add_machine(second).unwrap();
        assert_eq!(factory.find_by_name("out"), Some(b));
        assert_eq!(factory.find_by_name("missing"), None);
    }
}
