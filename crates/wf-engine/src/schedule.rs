//! Quota-based valve scheduling.
//!
//! Each zone earns a valve-open quota per observation period from its
//! PID duty cycle. Requested quota is budgeted over the full period
//! while used quota accrues over the elapsed portion only, so demand
//! runs early in each period. Decisions preserve minimum run times,
//! freeze near period boundaries, and yield to the secondary heat
//! source on regular circuits.

use chrono::{DateTime, Utc};

use crate::actions::{ValveState, ZoneDecision};
use crate::config::{CircuitType, TimingConfig};

/// Fraction of the detection window a valve must read open before its
/// zone may call for heat.
pub const VALVE_OPEN_THRESHOLD: f64 = 0.85;

/// Scheduler inputs for a single zone.
#[derive(Debug, Clone, Copy)]
pub struct ZoneInputs {
    pub enabled: bool,
    pub circuit: CircuitType,
    pub valve_state: ValveState,
    pub requested_duration_s: f64,
    pub used_duration_s: f64,
}

/// Controller-wide inputs shared by every zone this tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub period_elapsed_s: f64,
    pub dhw_active: bool,
    /// Resolved flush request, see [`compute_flush_request`].
    pub flush_active: bool,
}

/// Seconds of valve-open time a duty cycle earns over a full period.
///
/// A regulator that has not produced a duty cycle yet earns nothing.
pub fn calculate_requested_duration(duty_cycle: Option<f64>, observation_period_s: f64) -> f64 {
    match duty_cycle {
        Some(duty) => duty / 100.0 * observation_period_s,
        None => 0.0,
    }
}

/// Seconds of valve-open time consumed so far this period.
pub fn calculate_used_duration(period_open_ratio: f64, period_elapsed_s: f64) -> f64 {
    period_open_ratio * period_elapsed_s
}

/// Decide what one zone's valve should do this tick.
pub fn evaluate_zone(zone: &ZoneInputs, ctx: &TickContext, timing: &TimingConfig) -> ZoneDecision {
    // Disabled zones are driven to a known-off state.
    if !zone.enabled {
        return if zone.valve_state.is_off() {
            ZoneDecision::StayOff
        } else {
            ZoneDecision::TurnOff
        };
    }

    // Flush circuits jump the quota queue while a flush is requested.
    if zone.circuit == CircuitType::Flush && ctx.flush_active {
        return if zone.valve_state.is_on() {
            ZoneDecision::StayOn
        } else {
            ZoneDecision::TurnOn
        };
    }

    // Too little time left in the period to honor a minimum run: hold
    // whatever is running rather than cycle valves at the boundary.
    let period_remaining_s = timing.observation_period_s - ctx.period_elapsed_s;
    if period_remaining_s < timing.min_run_time_s {
        return if zone.valve_state.is_on() {
            ZoneDecision::StayOn
        } else {
            ZoneDecision::StayOff
        };
    }

    // Quota met: drive off. An uncertain valve is commanded off too.
    if zone.used_duration_s >= zone.requested_duration_s {
        return if zone.valve_state.is_off() {
            ZoneDecision::StayOff
        } else {
            ZoneDecision::TurnOff
        };
    }

    // Running zones run until their quota is spent.
    if zone.valve_state.is_on() {
        return ZoneDecision::StayOn;
    }

    let remaining_quota_s = zone.requested_duration_s - zone.used_duration_s;
    if remaining_quota_s < timing.min_run_time_s {
        return ZoneDecision::StayOff;
    }

    // New regular-circuit starts wait for the secondary source.
    if ctx.dhw_active && zone.circuit == CircuitType::Regular {
        return ZoneDecision::StayOff;
    }

    ZoneDecision::TurnOn
}

/// Whether the flush window is open: during DHW activity, or in the
/// tail period after it ends.
pub fn flush_window_active(
    dhw_active: bool,
    flush_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    dhw_active || flush_until.is_some_and(|until| now < until)
}

/// Whether flush circuits should run this tick.
///
/// `any_regular_on` is taken from this tick's resolved regular-circuit
/// decisions: a running regular loop already dissipates boiler heat,
/// so the flush circuit stands down.
pub fn compute_flush_request(
    flush_enabled: bool,
    dhw_active: bool,
    flush_until: Option<DateTime<Utc>>,
    any_regular_on: bool,
    now: DateTime<Utc>,
) -> bool {
    flush_enabled && flush_window_active(dhw_active, flush_until, now) && !any_regular_on
}

/// Whether a zone should call for heat from the primary source.
///
/// Requires a confirmed-open valve (`open_ratio` over the detection
/// window at or above [`VALVE_OPEN_THRESHOLD`]) and enough remaining
/// quota that the valve is not about to close on a cold loop.
pub fn should_request_heat(zone: &ZoneInputs, open_ratio: f64, timing: &TimingConfig) -> bool {
    if !zone.valve_state.is_on() || !zone.enabled {
        return false;
    }
    if open_ratio < VALVE_OPEN_THRESHOLD {
        return false;
    }
    let remaining_quota_s = zone.requested_duration_s - zone.used_duration_s;
    remaining_quota_s >= timing.closing_warning_duration_s
}
