//! Simulated time for qlink agents.

use crate::error::EnvError;

/// Signal speed along a link in km/s (speed of light).
pub const SIGNAL_SPEED_KM_S: f64 = 2.998e5;

/// Default duration of one transmitted pulse: a 10 ps photon pulse.
pub const DEFAULT_PULSE_LENGTH: f64 = 10e-12;

/// Returns the one-way propagation delay in seconds for a link of `length_km`.
pub fn propagation_delay(length_km: f64) -> f64 {
    length_km / SIGNAL_SPEED_KM_S
}

/// Checks that a link length is usable.
pub fn validate_length(length_km: f64) -> Result<f64, EnvError> {
    if !length_km.is_finite() || length_km < 0.0 {
        return Err(EnvError::invalid(format!(
            "link length must be finite and >= 0 km, got {length_km}"
        )));
    }
    Ok(length_km)
}

/// Checks that a pulse length is usable.
pub fn validate_pulse_length(pulse_length: f64) -> Result<f64, EnvError> {
    if !pulse_length.is_finite() || pulse_length <= 0.0 {
        return Err(EnvError::invalid(format!(
            "pulse length must be finite and > 0 s, got {pulse_length}"
        )));
    }
    Ok(pulse_length)
}

/// A per-agent logical clock, in simulated seconds.
///
/// The clock only moves forward:
/// - Emitting items advances it by the time spent on the wire
///   (`pulses × pulse_length`).
/// - Receiving an item joins it with the item's arrival time, so an agent
///   never ends up "before" information it has just received.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogicalClock {
    now: f64,
}

impl LogicalClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulated time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advances the clock by the emission time of `pulses` pulses.
    ///
    /// Returns the new time.
    pub fn emit(&mut self, pulses: usize, pulse_length: f64) -> f64 {
        self.now += pulses as f64 * pulse_length;
        self.now
    }

    /// Joins the clock with an observed arrival time.
    ///
    /// Returns the new time, which is `max(now, arrival)`.
    pub fn observe(&mut self, arrival: f64) -> f64 {
        if arrival > self.now {
            self.now = arrival;
        }
        self.now
    }
}
