use crate::fixed::{Fixed64, Seconds};
use crate::id::{InPort, MachineId, OutPort};
use crate::shape::Item;
use std::collections::VecDeque;

/// An item travelling along a connection. `progress` is in `[0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    pub item: Item,
    pub progress: Fixed64,
}

/// A timed edge from one machine's output port to another's input port.
///
/// Each item needs `1 / speed` seconds to cross.
#[derive(Debug, Clone)]
pub struct Connection {
    pub from: MachineId,
    pub to: MachineId,
    pub from_port: OutPort,
    pub to_port: InPort,
    pub speed: Fixed64,
    in_flight: VecDeque<InFlight>,
}

impl Connection {
    pub fn new(from: MachineId, to: MachineId, from_port: OutPort, to_port: InPort, speed: Fixed64) -> Self {
        Self {
            from,
            to,
            from_port,
            to_port,
            speed,
            in_flight: VecDeque::new(),
        }
    }

    /// Put an item on the connection at progress zero.
    pub fn send(&mut self, item: Item) {
        self.in_flight.push_back(InFlight {
            item,
            progress: Fixed64::ZERO,
        });
    }

    /// Move every item forward by `dt * speed`. Returns the items that
    /// reached the far end, in the order they were sent.
    pub fn advance(&mut self, dt: Seconds) -> Vec<Item> {
        let step = dt.saturating_mul(self.speed);
        let mut arrived = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.in_flight.len());
        for mut entry in self.in_flight.drain(..) {
            entry.progress = entry.progress.saturating_add(step);
            if entry.progress >= Fixed64::ONE {
                arrived.push(entry.item);
            } else {
                remaining.push_back(entry);
            }
        }
        self.in_flight = remaining;
        arrived
    }

    pub fn in_flight(&self) -> impl ExactSizeIterator<Item = &InFlight> {
        self.in_flight.iter()
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Color, Shape, ShapeKind};
    use slotmap::SlotMap;

    fn connection(speed: f64) -> Connection {
        let mut ids: SlotMap<MachineId, ()> = SlotMap::with_key();
        let a = ids.insert(());
        let b = ids.insert(());
        Connection::new(a, b, OutPort::Output, InPort::Input, Fixed64::from_num(speed))
    }

    fn item(color: Color) -> Item {
        Shape::new(ShapeKind::Circle, color).into()
    }

    #[test]
    fn delivers_after_one_over_speed_seconds() {
        let mut conn = connection(1.0);
        conn.send(item(Color::Red));
        let half = Seconds::from_num(0.5);
        assert!(conn.advance(half).is_empty());
        assert_eq!(conn.in_flight().next().unwrap().progress, Fixed64::from_num(0.5));
        assert_eq!(conn.advance(half).len(), 1);
        assert_eq!(conn.in_flight().len(), 0);
    }

    #[test]
    fn faster_connection_delivers_sooner() {
        let mut conn = connection(2.0);
        conn.send(item(Color::Red));
        assert_eq!(conn.advance(Seconds::from_num(0.5)).len(), 1);
    }

    #[test]
    fn arrivals_keep_send_order() {
        let mut conn = connection(1.0);
        conn.send(item(Color::Red));
        conn.advance(Seconds::from_num(0.5));
        conn.send(item(Color::Blue));
        let first = conn.advance(Seconds::from_num(0.5));
        assert_eq!(first, vec![item(Color::Red)]);
        conn.send(item(Color::Green));
        let second = conn.advance(Seconds::from_num(1));
        assert_eq!(second, vec![item(Color::Blue), item(Color::Green)]);
    }

    #[test]
    fn clear_discards_in_flight() {
        let mut conn = connection(1.0);
        conn.send(item(Color::Red));
        conn.clear();
        assert!(conn.advance(Seconds::from_num(5)).is_empty());
    }
}
