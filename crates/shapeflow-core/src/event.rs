//! Simulation events with a bounded ring-buffer log.
//!
//! The factory records what happened during a tick (spawns, deliveries,
//! drops, collections) so a front end can animate or report it. The log is
//! drained by the caller; when it overflows the oldest events are
//! overwritten and counted as dropped.

use crate::fixed::Seconds;
use crate::id::{ConnectionId, MachineId, OutPort};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. `at` is the factory's elapsed simulated time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryEvent {
    ShapeSpawned {
        machine: MachineId,
        at: Seconds,
    },
    /// A machine finished processing and emitted `emitted` items.
    ItemProcessed {
        machine: MachineId,
        emitted: usize,
        at: Seconds,
    },
    ItemDelivered {
        connection: ConnectionId,
        to: MachineId,
        at: Seconds,
    },
    /// An emitted item found no connection on its port.
    ItemDropped {
        machine: MachineId,
        port: OutPort,
        at: Seconds,
    },
    ItemCollected {
        machine: MachineId,
        matched: bool,
        at: Seconds,
    },
    GoalReached {
        at: Seconds,
    },
}

impl FactoryEvent {
    pub fn at(&self) -> Seconds {
        match self {
            FactoryEvent::ShapeSpawned { at, .. }
            | FactoryEvent::ItemProcessed { at, .. }
            | FactoryEvent::ItemDelivered { at, .. }
            | FactoryEvent::ItemDropped { at, .. }
            | FactoryEvent::ItemCollected { at, .. }
            | FactoryEvent::GoalReached { at } => *at,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Fixed-capacity event log. When full, pushing overwrites the oldest entry.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<FactoryEvent>,
    capacity: usize,
    total_written: u64,
    overflowed: u64,
}

impl EventLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
            overflowed: 0,
        }
    }

    pub fn push(&mut self, event: FactoryEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.overflowed += 1;
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events written since creation, including overwritten ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events lost to overflow since creation. Draining does not count.
    pub fn dropped_count(&self) -> u64 {
        self.overflowed
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &FactoryEvent> {
        self.events.iter()
    }

    /// Remove and return everything currently stored, oldest first.
    pub fn drain(&mut self) -> Vec<FactoryEvent> {
        self.events.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
