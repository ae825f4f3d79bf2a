//! Controller configuration schema and validation.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use wf_controls::{ControlResult, PidController};

/// Type of heating circuit a zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitType {
    /// Normal room loop scheduled by quota.
    Regular,
    /// Loop used to dissipate residual heat from the secondary source.
    Flush,
}

impl Default for CircuitType {
    fn default() -> Self {
        CircuitType::Regular
    }
}

/// Scheduling and health durations, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    #[serde(default = "default_observation_period_s")]
    pub observation_period_s: f64,
    #[serde(default = "default_min_run_time_s")]
    pub min_run_time_s: f64,
    #[serde(default = "default_valve_open_time_s")]
    pub valve_open_time_s: f64,
    #[serde(default = "default_closing_warning_duration_s")]
    pub closing_warning_duration_s: f64,
    #[serde(default = "default_window_block_time_s")]
    pub window_block_time_s: f64,
    #[serde(default = "default_flush_duration_s")]
    pub flush_duration_s: f64,
    #[serde(default = "default_loop_interval_s")]
    pub loop_interval_s: f64,
    #[serde(default = "default_initializing_timeout_s")]
    pub initializing_timeout_s: f64,
    #[serde(default = "default_fail_safe_timeout_s")]
    pub fail_safe_timeout_s: f64,
}

fn default_observation_period_s() -> f64 {
    7200.0
}

fn default_min_run_time_s() -> f64 {
    540.0
}

fn default_valve_open_time_s() -> f64 {
    210.0
}

fn default_closing_warning_duration_s() -> f64 {
    240.0
}

fn default_window_block_time_s() -> f64 {
    600.0
}

fn default_flush_duration_s() -> f64 {
    480.0
}

fn default_loop_interval_s() -> f64 {
    60.0
}

fn default_initializing_timeout_s() -> f64 {
    120.0
}

fn default_fail_safe_timeout_s() -> f64 {
    3600.0
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            observation_period_s: default_observation_period_s(),
            min_run_time_s: default_min_run_time_s(),
            valve_open_time_s: default_valve_open_time_s(),
            closing_warning_duration_s: default_closing_warning_duration_s(),
            window_block_time_s: default_window_block_time_s(),
            flush_duration_s: default_flush_duration_s(),
            loop_interval_s: default_loop_interval_s(),
            initializing_timeout_s: default_initializing_timeout_s(),
            fail_safe_timeout_s: default_fail_safe_timeout_s(),
        }
    }
}

/// PID gains and integral clamp for one zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PidSettings {
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default)]
    pub integral_min: f64,
    #[serde(default = "default_integral_max")]
    pub integral_max: f64,
}

fn default_kp() -> f64 {
    50.0
}

fn default_ki() -> f64 {
    0.001
}

fn default_integral_max() -> f64 {
    100.0
}

impl Default for PidSettings {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: default_ki(),
            kd: 0.0,
            integral_min: 0.0,
            integral_max: default_integral_max(),
        }
    }
}

impl PidSettings {
    pub fn build(&self) -> ControlResult<PidController> {
        PidController::new(self.kp, self.ki, self.kd)?
            .with_integral_range(self.integral_min, self.integral_max)
    }
}

/// Bounds for user-facing setpoints, in degrees Celsius.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetpointLimits {
    #[serde(default = "default_setpoint_min_c")]
    pub min_c: f64,
    #[serde(default = "default_setpoint_max_c")]
    pub max_c: f64,
    /// Display granularity; the engine clamps but does not snap.
    #[serde(default = "default_setpoint_step_c")]
    pub step_c: f64,
}

fn default_setpoint_min_c() -> f64 {
    16.0
}

fn default_setpoint_max_c() -> f64 {
    28.0
}

fn default_setpoint_step_c() -> f64 {
    0.5
}

impl Default for SetpointLimits {
    fn default() -> Self {
        Self {
            min_c: default_setpoint_min_c(),
            max_c: default_setpoint_max_c(),
            step_c: default_setpoint_step_c(),
        }
    }
}

impl SetpointLimits {
    pub fn clamp(&self, value_c: f64) -> f64 {
        value_c.clamp(self.min_c, self.max_c)
    }
}

/// One heating zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub circuit: CircuitType,
    /// Time constant of the temperature filter; 0 disables filtering.
    #[serde(default = "default_ema_tau_s")]
    pub ema_tau_s: f64,
    #[serde(default)]
    pub pid: PidSettings,
    #[serde(default = "default_setpoint_c")]
    pub setpoint_c: f64,
    #[serde(default)]
    pub window_sensors: Vec<String>,
    /// Named setpoints selectable at run time.
    #[serde(default = "default_presets")]
    pub presets: BTreeMap<String, f64>,
}

fn default_ema_tau_s() -> f64 {
    600.0
}

fn default_setpoint_c() -> f64 {
    21.0
}

fn default_presets() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("comfort".to_string(), 22.0),
        ("eco".to_string(), 19.0),
        ("away".to_string(), 16.0),
        ("boost".to_string(), 25.0),
    ])
}

impl ZoneConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            circuit: CircuitType::default(),
            ema_tau_s: default_ema_tau_s(),
            pid: PidSettings::default(),
            setpoint_c: default_setpoint_c(),
            window_sensors: Vec::new(),
            presets: default_presets(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Complete controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub name: String,
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub setpoint_limits: SetpointLimits,
    /// Consecutive failed ticks before the notification flag raises.
    #[serde(default = "default_failure_notification_threshold")]
    pub failure_notification_threshold: u32,
    #[serde(default)]
    pub flush_enabled: bool,
}

fn default_failure_notification_threshold() -> u32 {
    3
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub fn validate_config(config: &ControllerConfig) -> Result<(), ValidationError> {
    if config.zones.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "zones".to_string(),
            value: "[]".to_string(),
            reason: "at least one zone is required".to_string(),
        });
    }

    let mut zone_ids = HashSet::new();
    for zone in &config.zones {
        if zone.id.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "zone id".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if !zone_ids.insert(&zone.id) {
            return Err(ValidationError::DuplicateId {
                id: zone.id.clone(),
                context: "zones".to_string(),
            });
        }
        validate_zone(zone, &config.setpoint_limits)?;
    }

    validate_timing(&config.timing)?;
    validate_setpoint_limits(&config.setpoint_limits)?;

    if config.failure_notification_threshold == 0 {
        return Err(ValidationError::InvalidValue {
            field: "failure_notification_threshold".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_zone(zone: &ZoneConfig, limits: &SetpointLimits) -> Result<(), ValidationError> {
    let zone_ctx = format!("zone '{}'", zone.id);
    validate_non_negative_finite("ema_tau_s", zone.ema_tau_s, &zone_ctx)?;

    if !zone.pid.kp.is_finite() || !zone.pid.ki.is_finite() || !zone.pid.kd.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: format!("zone '{}' pid gains", zone.id),
            value: format!("kp={} ki={} kd={}", zone.pid.kp, zone.pid.ki, zone.pid.kd),
            reason: "must be finite".to_string(),
        });
    }
    if !zone.pid.integral_min.is_finite()
        || !zone.pid.integral_max.is_finite()
        || zone.pid.integral_min > zone.pid.integral_max
    {
        return Err(ValidationError::InvalidValue {
            field: format!("zone '{}' pid integral range", zone.id),
            value: format!("[{}, {}]", zone.pid.integral_min, zone.pid.integral_max),
            reason: "must be finite with min <= max".to_string(),
        });
    }

    if !zone.setpoint_c.is_finite()
        || zone.setpoint_c < limits.min_c
        || zone.setpoint_c > limits.max_c
    {
        return Err(ValidationError::InvalidValue {
            field: format!("zone '{}' setpoint_c", zone.id),
            value: zone.setpoint_c.to_string(),
            reason: format!("must be within [{}, {}]", limits.min_c, limits.max_c),
        });
    }

    for (name, value) in &zone.presets {
        if !value.is_finite() || *value < limits.min_c || *value > limits.max_c {
            return Err(ValidationError::InvalidValue {
                field: format!("zone '{}' preset '{}'", zone.id, name),
                value: value.to_string(),
                reason: format!("must be within [{}, {}]", limits.min_c, limits.max_c),
            });
        }
    }

    let mut sensors = HashSet::new();
    for sensor in &zone.window_sensors {
        if sensor.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("zone '{}' window_sensors", zone.id),
                value: String::new(),
                reason: "sensor id must not be empty".to_string(),
            });
        }
        if !sensors.insert(sensor) {
            return Err(ValidationError::DuplicateId {
                id: sensor.clone(),
                context: format!("zone '{}' window_sensors", zone.id),
            });
        }
    }

    Ok(())
}

fn validate_timing(timing: &TimingConfig) -> Result<(), ValidationError> {
    validate_positive_finite("observation_period_s", timing.observation_period_s, "timing")?;
    validate_positive_finite("min_run_time_s", timing.min_run_time_s, "timing")?;
    validate_positive_finite("valve_open_time_s", timing.valve_open_time_s, "timing")?;
    validate_positive_finite(
        "closing_warning_duration_s",
        timing.closing_warning_duration_s,
        "timing",
    )?;
    validate_positive_finite("window_block_time_s", timing.window_block_time_s, "timing")?;
    validate_positive_finite("flush_duration_s", timing.flush_duration_s, "timing")?;
    validate_positive_finite("loop_interval_s", timing.loop_interval_s, "timing")?;
    validate_positive_finite(
        "initializing_timeout_s",
        timing.initializing_timeout_s,
        "timing",
    )?;
    validate_positive_finite("fail_safe_timeout_s", timing.fail_safe_timeout_s, "timing")?;

    if timing.min_run_time_s >= timing.observation_period_s {
        return Err(ValidationError::InvalidValue {
            field: "timing min_run_time_s".to_string(),
            value: timing.min_run_time_s.to_string(),
            reason: "must be shorter than observation_period_s".to_string(),
        });
    }

    Ok(())
}

fn validate_setpoint_limits(limits: &SetpointLimits) -> Result<(), ValidationError> {
    if !limits.min_c.is_finite() || !limits.max_c.is_finite() || limits.min_c >= limits.max_c {
        return Err(ValidationError::InvalidValue {
            field: "setpoint_limits".to_string(),
            value: format!("[{}, {}]", limits.min_c, limits.max_c),
            reason: "min_c must be below max_c".to_string(),
        });
    }
    validate_positive_finite("step_c", limits.step_c, "setpoint_limits")?;
    Ok(())
}

fn validate_positive_finite(
    field: &str,
    value: f64,
    context: &str,
) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{} {}", context, field),
            value: value.to_string(),
            reason: "must be positive and finite".to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative_finite(
    field: &str,
    value: f64,
    context: &str,
) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{} {}", context, field),
            value: value.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }
    Ok(())
}
