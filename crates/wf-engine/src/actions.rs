//! Valve decisions and device command planning.
//!
//! The scheduler produces a *decision* per zone; this module turns
//! decisions into the minimal set of *commands* the caller must apply.
//! TURN decisions always command. STAY decisions normally command
//! nothing, with two exceptions: the tracked device state disagrees
//! with the decision (resync), or the periodic refresh is due so
//! dead-man-switch receivers see a command at least once per
//! observation period.

use serde::{Deserialize, Serialize};
use wf_core::ZoneId;

use crate::modes::SecondaryMode;

/// Last reported state of a zone valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValveState {
    On,
    Off,
    Unknown,
    Unavailable,
}

impl ValveState {
    pub fn is_on(self) -> bool {
        self == ValveState::On
    }

    pub fn is_off(self) -> bool {
        self == ValveState::Off
    }

    /// Unknown and unavailable read as "not confirmed".
    pub fn is_confirmed(self) -> bool {
        matches!(self, ValveState::On | ValveState::Off)
    }
}

impl Default for ValveState {
    fn default() -> Self {
        ValveState::Unknown
    }
}

/// Outcome of evaluating one zone for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneDecision {
    TurnOn,
    TurnOff,
    StayOn,
    StayOff,
}

impl ZoneDecision {
    /// Whether the zone's valve is meant to be open after this tick.
    pub fn resolves_on(self) -> bool {
        matches!(self, ZoneDecision::TurnOn | ZoneDecision::StayOn)
    }
}

/// A single valve command for the caller to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValveCommand {
    pub zone: ZoneId,
    pub on: bool,
}

/// Everything the caller must apply after one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerActions {
    pub valve_commands: Vec<ValveCommand>,
    /// Present only on change or refresh.
    pub heat_request: Option<bool>,
    /// Present only on change.
    pub secondary_mode: Option<SecondaryMode>,
}

impl ControllerActions {
    pub fn is_empty(&self) -> bool {
        self.valve_commands.is_empty()
            && self.heat_request.is_none()
            && self.secondary_mode.is_none()
    }
}

/// Decide whether a decision needs a command against the tracked valve
/// state. Returns the on/off payload to send, or None.
pub fn plan_valve_command(
    decision: ZoneDecision,
    tracked: ValveState,
    refresh_due: bool,
) -> Option<bool> {
    match decision {
        ZoneDecision::TurnOn => Some(true),
        ZoneDecision::TurnOff => Some(false),
        ZoneDecision::StayOn => {
            if !tracked.is_on() || refresh_due {
                Some(true)
            } else {
                None
            }
        }
        ZoneDecision::StayOff => {
            if !tracked.is_off() || refresh_due {
                Some(false)
            } else {
                None
            }
        }
    }
}
