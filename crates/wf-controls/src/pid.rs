//! Duty-cycle PID regulator.
//!
//! The regulator maps a temperature error onto a valve duty cycle in
//! percent of an observation period. It is a pure function of the prior
//! snapshot and the current inputs: callers own the snapshot, the
//! regulator owns only its gains. This keeps replay, persistence, and
//! testing trivial.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// State of the regulator after one calculation.
///
/// There is no snapshot before the first calculation; absence is
/// explicit (`Option<PidState>`) and never stands in for zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PidState {
    pub error: f64,
    pub p_term: f64,
    pub i_term: f64,
    pub d_term: f64,
    /// Clamped controller output in percent, 0..=100.
    pub duty_cycle: f64,
}

/// PID regulator with a clamped integral accumulator.
///
/// The integral accumulator IS the i-term: it is clamped into
/// `[integral_min, integral_max]` at every step, which bounds wind-up
/// without a separate back-calculation pass.
#[derive(Clone, Copy, Debug)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral_min: f64,
    integral_max: f64,
}

impl Default for PidController {
    /// Field-proven gains for screed underfloor loops: a strong
    /// proportional band with a slow integral and no derivative.
    fn default() -> Self {
        Self {
            kp: 50.0,
            ki: 0.001,
            kd: 0.0,
            integral_min: 0.0,
            integral_max: 100.0,
        }
    }
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64) -> ControlResult<Self> {
        if !kp.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "kp must be finite",
            });
        }
        if !ki.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "ki must be finite",
            });
        }
        if !kd.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "kd must be finite",
            });
        }
        Ok(Self {
            kp,
            ki,
            kd,
            ..Self::default()
        })
    }

    /// Replace the integral clamp range.
    pub fn with_integral_range(mut self, min: f64, max: f64) -> ControlResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "integral range must be finite",
            });
        }
        if min > max {
            return Err(ControlError::InvalidArg {
                what: "integral_min must not exceed integral_max",
            });
        }
        self.integral_min = min;
        self.integral_max = max;
        Ok(self)
    }

    pub fn kp(&self) -> f64 {
        self.kp
    }

    pub fn ki(&self) -> f64 {
        self.ki
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }

    /// Run one calculation step.
    ///
    /// `dt_s <= 0` performs no calculation and returns the prior
    /// snapshot unchanged (None stays None). With no prior snapshot the
    /// integral starts from zero and the derivative term is zero.
    pub fn update(
        &self,
        prior: Option<&PidState>,
        setpoint: f64,
        measurement: f64,
        dt_s: f64,
    ) -> Option<PidState> {
        if dt_s <= 0.0 {
            return prior.cloned();
        }

        let error = setpoint - measurement;
        let p_term = self.kp * error;

        let prior_i = prior.map_or(0.0, |s| s.i_term);
        let i_term = (prior_i + self.ki * error * dt_s).clamp(self.integral_min, self.integral_max);

        let d_term = match prior {
            Some(s) => self.kd * (error - s.error) / dt_s,
            None => 0.0,
        };

        let duty_cycle = (p_term + i_term + d_term).clamp(0.0, 100.0);

        Some(PidState {
            error,
            p_term,
            i_term,
            d_term,
            duty_cycle,
        })
    }

    /// Prepare a restored snapshot for use as the prior state.
    ///
    /// The stored integral may come from a run with a different clamp
    /// range; it is pulled into this regulator's range so the next step
    /// starts from a legal accumulator.
    pub fn adopt_state(&self, mut state: PidState) -> PidState {
        state.i_term = state.i_term.clamp(self.integral_min, self.integral_max);
        state
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn duty_cycle_stays_within_percent_range(
            setpoint in -10.0..40.0f64,
            measurement in -10.0..40.0f64,
            dt_s in 0.001..7200.0f64,
            prior_error in -50.0..50.0f64,
            prior_i in 0.0..100.0f64,
        ) {
            let pid = PidController::default();
            let prior = PidState {
                error: prior_error,
                p_term: 0.0,
                i_term: prior_i,
                d_term: 0.0,
                duty_cycle: 0.0,
            };
            let out = pid.update(Some(&prior), setpoint, measurement, dt_s).unwrap();
            prop_assert!((0.0..=100.0).contains(&out.duty_cycle));
            prop_assert!((0.0..=100.0).contains(&out.i_term));
        }
    }
}
