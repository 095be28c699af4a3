use serde::{Deserialize, Serialize};

/// A geographic coordinate with optional altitude above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    pub fn with_altitude(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: Some(altitude),
        }
    }
}

/// One position observation from the sensor.
///
/// Immutable once produced; the tracker consumes each fix exactly once.
/// The timestamp is the sensor's wall-clock time of the observation, which
/// may be arbitrarily far in the past for a cached last-known fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Observation time, epoch milliseconds.
    pub timestamp_ms: i64,
    pub coordinate: Coordinate,
    /// Device-reported horizontal uncertainty radius, meters.
    pub horizontal_accuracy_m: Option<f64>,
    /// Ground speed as reported by the sensor, m/s.
    pub ground_speed_mps: Option<f64>,
}

impl PositionFix {
    pub fn new(timestamp_ms: i64, coordinate: Coordinate) -> Self {
        Self {
            timestamp_ms,
            coordinate,
            horizontal_accuracy_m: None,
            ground_speed_mps: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.horizontal_accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_ground_speed(mut self, speed_mps: f64) -> Self {
        self.ground_speed_mps = Some(speed_mps);
        self
    }
}

/// Read-only snapshot of the metrics derived from a session so far.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Metrics {
    pub distance_m: f64,
    pub duration_ms: u64,
    pub current_speed_mps: f64,
    pub average_speed_mps: f64,
    pub altitude_gain_m: f64,
    /// Accumulated altitude loss, stored signed: always <= 0.
    pub altitude_loss_m: f64,
}
