//! Display rounding with hysteresis.
//!
//! Room thermostats report temperature on a coarse grid. Quantizing the
//! filtered value directly makes the display flicker between adjacent
//! steps when the reading sits near a midpoint; holding the previous
//! value until the raw reading clears the midpoint by a margin removes
//! the flicker without hiding real changes.

use crate::error::{ControlError, ControlResult};

/// Dead-banded quantizer for reported temperatures.
#[derive(Clone, Copy, Debug)]
pub struct DisplayRounding {
    step: f64,
    margin: f64,
}

impl DisplayRounding {
    pub fn new(step: f64, margin: f64) -> ControlResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "step must be positive and finite",
            });
        }
        if !margin.is_finite() || margin < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "margin must be non-negative and finite",
            });
        }
        Ok(Self { step, margin })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    fn quantize(&self, value: f64) -> f64 {
        (value / self.step).round() * self.step
    }

    /// Pick the value to report given the raw reading and what is
    /// currently displayed.
    ///
    /// The display moves only when the raw reading clears the midpoint
    /// between steps by at least the margin, in the direction of travel.
    /// A restored display value works as the anchor even if it is off
    /// the grid.
    pub fn apply(&self, previous: Option<f64>, raw: f64) -> f64 {
        let Some(prev) = previous else {
            return self.quantize(raw);
        };
        let half = self.step / 2.0;
        let diff = raw - prev;
        if diff.abs() < half {
            return prev;
        }
        if diff > 0.0 && raw >= prev + half + self.margin {
            return self.quantize(raw);
        }
        if diff < 0.0 && raw <= prev - half - self.margin {
            return self.quantize(raw);
        }
        prev
    }
}

impl Default for DisplayRounding {
    /// 0.1 K grid with a 0.03 K dead-band margin.
    fn default() -> Self {
        Self {
            step: 0.1,
            margin: 0.03,
        }
    }
}
