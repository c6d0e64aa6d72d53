//! Simulation tuning knobs.
//!
//! Values are plain `f64` seconds so config files stay readable; the factory
//! converts them to [`Fixed64`](crate::fixed::Fixed64) when machines are
//! built.

use crate::fixed::{f64_to_fixed64, Fixed64};
use serde::{Deserialize, Serialize};

/// Timing defaults used when machines and connections are created, plus the
/// speed clamp and event log capacity of a factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Processing time of every machine except conveyors.
    pub processing_time: f64,
    pub conveyor_processing_time: f64,
    /// Seconds between two spawns of a source.
    pub spawn_interval: f64,
    /// Progress per second of a new connection (1.0 = one second per hop).
    pub connection_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            processing_time: 0.5,
            conveyor_processing_time: 0.2,
            spawn_interval: 2.0,
            connection_speed: 1.0,
            min_speed: 0.25,
            max_speed: 4.0,
            event_capacity: 256,
        }
    }
}

impl SimConfig {
    pub fn processing_time(&self) -> Fixed64 {
        f64_to_fixed64(self.processing_time)
    }

    pub fn conveyor_processing_time(&self) -> Fixed64 {
        f64_to_fixed64(self.conveyor_processing_time)
    }

    pub fn spawn_interval(&self) -> Fixed64 {
        f64_to_fixed64(self.spawn_interval)
    }

    pub fn connection_speed(&self) -> Fixed64 {
        f64_to_fixed64(self.connection_speed)
    }

    /// Clamp a speed multiplier into `[min_speed, max_speed]`.
    /// A `max_speed` below `min_speed` counts as `min_speed`. NaN becomes 1.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        let speed = if speed.is_nan() { 1.0 } else { speed };
        speed.clamp(self.min_speed, self.max_speed.max(self.min_speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.processing_time(), Fixed64::from_num(0.5));
        assert_eq!(cfg.spawn_interval(), Fixed64::from_num(2));
        assert_eq!(cfg.conveyor_processing_time, 0.2);
    }

    #[test]
    fn speed_is_clamped() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.clamp_speed(10.0), 4.0);
        assert_eq!(cfg.clamp_speed(0.0), 0.25);
        assert_eq!(cfg.clamp_speed(2.0), 2.0);
        assert_eq!(cfg.clamp_speed(f64::NAN), 1.0);
    }

    #[test]
    fn inverted_speed_bounds_do_not_panic() {
        let cfg = SimConfig {
            min_speed: 2.0,
            max_speed: 0.5,
            ..Default::default()
        };
        assert_eq!(cfg.clamp_speed(f64::NAN), 2.0);
        assert_eq!(cfg.clamp_speed(10.0), 2.0);
        assert_eq!(cfg.clamp_speed(0.1), 2.0);
    }

    #[test]
    fn huge_durations_saturate() {
        let cfg = SimConfig {
            spawn_interval: 1e300,
            processing_time: f64::NAN,
            ..Default::default()
        };
        assert_eq!(cfg.spawn_interval(), Fixed64::MAX);
        assert_eq!(cfg.processing_time(), Fixed64::ZERO);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"spawn_interval": 1.0}"#).unwrap();
        assert_eq!(cfg.spawn_interval, 1.0);
        assert_eq!(cfg.processing_time, 0.5);
        assert_eq!(cfg.event_capacity, 256);
    }
}
