//! Multi-zone underfloor heating control engine.
//!
//! This crate turns temperature readings and valve feedback into valve
//! commands, a heat request, and a secondary-source mode, one tick at a
//! time. Zones earn valve-open quotas from their PID duty cycles and a
//! scheduler spends those quotas over fixed observation periods, so
//! heat demand spreads across the day instead of chattering valves.
//!
//! # Architecture
//!
//! - [`config`]: configuration schema, defaults, and validation
//! - [`controller`]: the tick pipeline and controller state
//! - [`zone`]: per-zone runtime (filter, regulator, display, health)
//! - [`schedule`]: quota accounting and valve decisions
//! - [`modes`]: operating modes and the commissioning rota
//! - [`actions`]: decisions, commands, and command planning
//! - [`health`]: zone and controller health state machines
//! - [`history`]: the seam to historical device state
//!
//! # Design Principles
//!
//! - The caller owns the clock: every entry point takes `now` and
//!   `dt_s`, so behavior is a pure function of inputs and prior state.
//! - No I/O anywhere in this crate; devices and storage live behind
//!   the caller and the [`history::HistoryProvider`] seam.
//! - Failures degrade zones individually; one broken sensor never
//!   takes down the rest of the house.

pub mod actions;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod history;
pub mod modes;
pub mod schedule;
pub mod zone;

pub use actions::{plan_valve_command, ControllerActions, ValveCommand, ValveState, ZoneDecision};
pub use config::{
    validate_config, CircuitType, ControllerConfig, PidSettings, SetpointLimits, TimingConfig,
    ValidationError, ZoneConfig,
};
pub use controller::{ControllerCore, ControllerReport, TickInputs, ZoneReport};
pub use error::{EngineError, EngineResult};
pub use health::{aggregate_status, ControllerHealth, HealthStatus, HealthTransition, ZoneHealth};
pub use history::{HistoryError, HistoryProvider};
pub use modes::{cycle_slot, OperationMode, SecondaryMode, CYCLE_SLOTS};
pub use schedule::{
    calculate_requested_duration, calculate_used_duration, compute_flush_request, evaluate_zone,
    flush_window_active, should_request_heat, TickContext, ZoneInputs, VALVE_OPEN_THRESHOLD,
};
pub use zone::{ZoneRestore, ZoneRuntime};
