//! Per-zone runtime state.

use chrono::{DateTime, Utc};
use wf_controls::{DisplayRounding, EmaFilter, PidController, PidState};

use crate::actions::ValveState;
use crate::config::{SetpointLimits, ZoneConfig};
use crate::error::{EngineError, EngineResult};
use crate::health::{HealthStatus, ZoneHealth};
use crate::schedule::ZoneInputs;

/// Live state for one configured zone.
///
/// The controller core owns these and drives them each tick; nothing
/// here reads a clock or touches a device.
#[derive(Debug, Clone)]
pub struct ZoneRuntime {
    config: ZoneConfig,
    pid: PidController,
    filter: EmaFilter,
    display: DisplayRounding,

    pub(crate) setpoint_c: f64,
    pub(crate) enabled: bool,
    pub(crate) preset: Option<String>,
    pub(crate) temperature_c: Option<f64>,
    pub(crate) display_temp_c: Option<f64>,
    pub(crate) pid_state: Option<PidState>,
    pub(crate) valve_state: ValveState,
    pub(crate) health: ZoneHealth,

    // Derived each tick.
    pub(crate) requested_duration_s: f64,
    pub(crate) used_duration_s: f64,
    pub(crate) open_ratio: f64,
    pub(crate) window_recently_open: bool,
}

/// State carried over from a snapshot; absent fields start fresh.
#[derive(Debug, Clone, Default)]
pub struct ZoneRestore {
    pub pid_state: Option<PidState>,
    pub temperature_c: Option<f64>,
    pub display_temp_c: Option<f64>,
    pub status: Option<HealthStatus>,
    pub last_successful_update: Option<DateTime<Utc>>,
    pub setpoint_c: Option<f64>,
    pub enabled: Option<bool>,
    pub preset: Option<String>,
}

impl ZoneRuntime {
    pub fn new(config: ZoneConfig, now: DateTime<Utc>) -> EngineResult<Self> {
        let pid = config.pid.build()?;
        let filter = EmaFilter::new(config.ema_tau_s)?;
        let display = DisplayRounding::default();
        let setpoint_c = config.setpoint_c;
        Ok(Self {
            pid,
            filter,
            display,
            setpoint_c,
            enabled: true,
            preset: None,
            temperature_c: None,
            display_temp_c: None,
            pid_state: None,
            valve_state: ValveState::Unknown,
            health: ZoneHealth::new(now),
            requested_duration_s: 0.0,
            used_duration_s: 0.0,
            open_ratio: 0.0,
            window_recently_open: false,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn display_name(&self) -> &str {
        self.config.display_name()
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn setpoint_c(&self) -> f64 {
        self.setpoint_c
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.temperature_c
    }

    pub fn display_temp_c(&self) -> Option<f64> {
        self.display_temp_c
    }

    pub fn pid_state(&self) -> Option<&PidState> {
        self.pid_state.as_ref()
    }

    pub fn valve_state(&self) -> ValveState {
        self.valve_state
    }

    pub fn status(&self) -> HealthStatus {
        self.health.status()
    }

    pub fn last_successful_update(&self) -> Option<DateTime<Utc>> {
        self.health.last_successful_update()
    }

    /// Manually change the setpoint. Clears any active preset.
    pub fn set_setpoint(&mut self, value_c: f64, limits: &SetpointLimits) -> EngineResult<f64> {
        if !value_c.is_finite() {
            return Err(EngineError::InvalidArg {
                what: "setpoint must be finite",
            });
        }
        self.setpoint_c = limits.clamp(value_c);
        self.preset = None;
        Ok(self.setpoint_c)
    }

    /// Select a named preset and record it.
    pub fn apply_preset(&mut self, name: &str, limits: &SetpointLimits) -> EngineResult<f64> {
        let Some(value) = self.config.presets.get(name).copied() else {
            return Err(EngineError::UnknownPreset {
                name: name.to_string(),
            });
        };
        self.setpoint_c = limits.clamp(value);
        self.preset = Some(name.to_string());
        Ok(self.setpoint_c)
    }

    /// Fold a raw temperature reading into the filtered and displayed
    /// values. Non-finite and absent readings leave both untouched.
    pub(crate) fn ingest_temperature(&mut self, raw_c: Option<f64>, dt_s: f64) {
        let Some(raw) = raw_c.filter(|v| v.is_finite()) else {
            return;
        };
        let filtered = self.filter.apply(self.temperature_c, raw, dt_s);
        self.temperature_c = Some(filtered);
        self.display_temp_c = Some(self.display.apply(self.display_temp_c, filtered));
    }

    /// Advance the regulator one step against the filtered temperature.
    pub(crate) fn advance_pid(&mut self, dt_s: f64) {
        if let Some(temp) = self.temperature_c {
            self.pid_state = self
                .pid
                .update(self.pid_state.as_ref(), self.setpoint_c, temp, dt_s);
        }
    }

    /// Reinstate state from a snapshot.
    pub fn restore(&mut self, restore: ZoneRestore) {
        if let Some(state) = restore.pid_state {
            self.pid_state = Some(self.pid.adopt_state(state));
        }
        if let Some(temp) = restore.temperature_c.filter(|v| v.is_finite()) {
            self.temperature_c = Some(temp);
        }
        if let Some(display) = restore.display_temp_c.filter(|v| v.is_finite()) {
            self.display_temp_c = Some(display);
        }
        if let Some(status) = restore.status {
            self.health.restore(status, restore.last_successful_update);
        }
        if let Some(setpoint) = restore.setpoint_c.filter(|v| v.is_finite()) {
            self.setpoint_c = setpoint;
        }
        if let Some(enabled) = restore.enabled {
            self.enabled = enabled;
        }
        if restore.preset.is_some() {
            self.preset = restore.preset;
        }
    }

    pub(crate) fn schedule_inputs(&self) -> ZoneInputs {
        ZoneInputs {
            enabled: self.enabled,
            circuit: self.config.circuit,
            valve_state: self.valve_state,
            requested_duration_s: self.requested_duration_s,
            used_duration_s: self.used_duration_s,
        }
    }
}
