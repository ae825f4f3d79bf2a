//! Exponential moving-average filter for noisy temperature probes.

use crate::error::{ControlError, ControlResult};

/// First-order low-pass with time constant `tau_s`.
///
/// A non-positive time constant disables filtering entirely.
#[derive(Clone, Copy, Debug)]
pub struct EmaFilter {
    tau_s: f64,
}

impl EmaFilter {
    pub fn new(tau_s: f64) -> ControlResult<Self> {
        if !tau_s.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "tau_s must be finite",
            });
        }
        Ok(Self { tau_s })
    }

    pub fn is_enabled(&self) -> bool {
        self.tau_s > 0.0
    }

    /// Blend a raw reading into the running value.
    ///
    /// The raw value passes through when filtering is disabled or no
    /// previous value exists. `dt_s <= 0` holds the previous value.
    pub fn apply(&self, previous: Option<f64>, raw: f64, dt_s: f64) -> f64 {
        if !self.is_enabled() {
            return raw;
        }
        let Some(prev) = previous else {
            return raw;
        };
        if dt_s <= 0.0 {
            return prev;
        }
        let alpha = dt_s / (self.tau_s + dt_s);
        alpha * raw + (1.0 - alpha) * prev
    }
}

impl Default for EmaFilter {
    fn default() -> Self {
        Self { tau_s: 600.0 }
    }
}
