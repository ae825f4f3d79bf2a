//! Scenario definitions for closed-loop simulation runs.
//!
//! A scenario pairs a controller configuration with scripted inputs:
//! per-zone temperature profiles, hot-water intervals, window openings
//! and timed operator actions. Everything is expressed in seconds from
//! the scenario start so runs are reproducible.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wf_engine::{validate_config, ControllerConfig, OperationMode};

use crate::error::{SimError, SimResult};

/// One point of a piecewise-linear temperature profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempPoint {
    pub at_s: f64,
    pub value_c: f64,
}

/// Half-open time interval `[start_s, end_s)` relative to scenario start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start_s: f64,
    pub end_s: f64,
}

impl Interval {
    pub fn contains(&self, t_s: f64) -> bool {
        t_s >= self.start_s && t_s < self.end_s
    }
}

/// Operator action applied at a scheduled time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioAction {
    SetMode(OperationMode),
    SetSetpoint { zone: String, value_c: f64 },
    SetPreset { zone: String, preset: String },
    SetZoneEnabled { zone: String, enabled: bool },
    SetFlushEnabled(bool),
}

/// A [`ScenarioAction`] with its trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub at_s: f64,
    pub action: ScenarioAction,
}

/// Complete description of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDef {
    #[serde(default)]
    pub name: String,

    /// Wall-clock start of the run, RFC 3339. Period boundaries and the
    /// cycle schedule depend on this, so it is part of the scenario.
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// Simulated duration in seconds.
    pub duration_s: f64,

    pub controller: ControllerConfig,

    /// Scripted room temperatures, keyed by zone id. A zone without a
    /// profile reports no reading, which exercises the failure paths.
    #[serde(default)]
    pub temperatures: BTreeMap<String, Vec<TempPoint>>,

    /// Intervals during which the hot-water system claims the boiler.
    #[serde(default)]
    pub dhw_intervals: Vec<Interval>,

    /// Intervals during which a window sensor reads open.
    #[serde(default)]
    pub window_intervals: BTreeMap<String, Vec<Interval>>,

    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

fn default_start_time() -> String {
    "2026-01-01T00:00:00Z".to_string()
}

impl ScenarioDef {
    /// Scenario start parsed to UTC.
    pub fn start(&self) -> SimResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| SimError::Scenario {
                what: format!("start_time '{}' is not RFC 3339: {}", self.start_time, e),
            })
    }

    /// Scripted temperature for a zone at `t_s`, linearly interpolated.
    ///
    /// Returns `None` when the zone has no profile, so the run feeds the
    /// controller a missing reading.
    pub fn temperature_at(&self, zone_id: &str, t_s: f64) -> Option<f64> {
        let points = self.temperatures.get(zone_id)?;
        let first = points.first()?;
        if t_s <= first.at_s {
            return Some(first.value_c);
        }
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t_s < b.at_s {
                let frac = (t_s - a.at_s) / (b.at_s - a.at_s);
                return Some(a.value_c + frac * (b.value_c - a.value_c));
            }
        }
        points.last().map(|p| p.value_c)
    }

    pub fn dhw_active_at(&self, t_s: f64) -> bool {
        self.dhw_intervals.iter().any(|i| i.contains(t_s))
    }

    /// Check internal consistency against the embedded controller config.
    pub fn validate(&self) -> SimResult<()> {
        validate_config(&self.controller).map_err(|e| SimError::Scenario {
            what: format!("controller config: {}", e),
        })?;
        self.start()?;

        if !self.duration_s.is_finite() || self.duration_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "duration_s must be positive and finite",
            });
        }

        let zone_ids: HashSet<&str> = self.controller.zones.iter().map(|z| z.id.as_str()).collect();
        let sensor_ids: HashSet<&str> = self
            .controller
            .zones
            .iter()
            .flat_map(|z| z.window_sensors.iter().map(String::as_str))
            .collect();

        for (zone_id, points) in &self.temperatures {
            if !zone_ids.contains(zone_id.as_str()) {
                return Err(SimError::Scenario {
                    what: format!("temperature profile for unknown zone '{}'", zone_id),
                });
            }
            validate_points(zone_id, points)?;
        }

        for (i, interval) in self.dhw_intervals.iter().enumerate() {
            validate_interval(&format!("dhw_intervals[{}]", i), interval)?;
        }
        for (sensor_id, intervals) in &self.window_intervals {
            if !sensor_ids.contains(sensor_id.as_str()) {
                return Err(SimError::Scenario {
                    what: format!("window intervals for unknown sensor '{}'", sensor_id),
                });
            }
            for (i, interval) in intervals.iter().enumerate() {
                validate_interval(&format!("window '{}' interval {}", sensor_id, i), interval)?;
            }
        }

        for event in &self.events {
            if !event.at_s.is_finite() || event.at_s < 0.0 || event.at_s > self.duration_s {
                return Err(SimError::Scenario {
                    what: format!("event at {} s falls outside the run", event.at_s),
                });
            }
            let zone_ref = match &event.action {
                ScenarioAction::SetSetpoint { zone, .. }
                | ScenarioAction::SetPreset { zone, .. }
                | ScenarioAction::SetZoneEnabled { zone, .. } => Some(zone),
                ScenarioAction::SetMode(_) | ScenarioAction::SetFlushEnabled(_) => None,
            };
            if let Some(zone) = zone_ref {
                if !zone_ids.contains(zone.as_str()) {
                    return Err(SimError::Scenario {
                        what: format!("event targets unknown zone '{}'", zone),
                    });
                }
            }
        }

        Ok(())
    }
}

fn validate_points(zone_id: &str, points: &[TempPoint]) -> SimResult<()> {
    for point in points {
        if !point.at_s.is_finite() || point.at_s < 0.0 || !point.value_c.is_finite() {
            return Err(SimError::Scenario {
                what: format!("temperature profile for '{}' has an invalid point", zone_id),
            });
        }
    }
    for pair in points.windows(2) {
        if pair[1].at_s <= pair[0].at_s {
            return Err(SimError::Scenario {
                what: format!(
                    "temperature profile for '{}' must be strictly increasing in time",
                    zone_id
                ),
            });
        }
    }
    Ok(())
}

fn validate_interval(context: &str, interval: &Interval) -> SimResult<()> {
    if !interval.start_s.is_finite()
        || !interval.end_s.is_finite()
        || interval.start_s < 0.0
        || interval.end_s <= interval.start_s
    {
        return Err(SimError::Scenario {
            what: format!("{} must satisfy 0 <= start < end", context),
        });
    }
    Ok(())
}

/// Load and validate a scenario from a YAML file.
pub fn load_scenario(path: impl AsRef<Path>) -> SimResult<ScenarioDef> {
    let content = std::fs::read_to_string(path)?;
    let scenario: ScenarioDef = serde_yaml::from_str(&content)?;
    scenario.validate()?;
    Ok(scenario)
}
