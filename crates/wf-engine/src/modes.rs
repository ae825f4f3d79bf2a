//! Controller operating modes.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// How the controller drives the zone valves.
///
/// Every consumer matches exhaustively; adding a mode is a compile
/// error until each match site handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Quota scheduling from the per-zone PID duty cycles.
    Auto,
    /// Every valve open, heat requested.
    AllOn,
    /// Every valve closed, no heat.
    AllOff,
    /// Every valve open without firing the heat source.
    Flush,
    /// Commissioning walk: one zone at a time on an hourly rota.
    Cycle,
    /// Controller inert; nothing is commanded, nothing advances.
    Disabled,
}

impl OperationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationMode::Auto => "auto",
            OperationMode::AllOn => "all_on",
            OperationMode::AllOff => "all_off",
            OperationMode::Flush => "flush",
            OperationMode::Cycle => "cycle",
            OperationMode::Disabled => "disabled",
        }
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        OperationMode::Auto
    }
}

/// Command for the secondary heat source selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryMode {
    Winter,
    Summer,
    /// The secondary source manages itself; commanded while any zone is
    /// in fail-safe so a broken controller cannot strand it.
    Auto,
}

/// Number of slots in the commissioning rota (one rest slot plus seven
/// zone slots).
pub const CYCLE_SLOTS: u32 = 8;

/// Rota slot for the commissioning walk: slot 0 rests, slot `k` runs
/// zone `k - 1` (mod the zone count).
pub fn cycle_slot(now: DateTime<Utc>) -> u32 {
    now.hour() % CYCLE_SLOTS
}
