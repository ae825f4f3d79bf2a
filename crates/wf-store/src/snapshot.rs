//! Snapshot schema and conversion to and from live controller state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wf_controls::PidState;
use wf_engine::{ControllerCore, HealthStatus, OperationMode, ZoneRestore, ZoneRuntime};

use crate::migrate::LATEST_VERSION;

/// Persisted controller state.
///
/// A file without a `version` field reads as version 0 and is migrated
/// on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_mode: Option<OperationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_enabled: Option<bool>,
    #[serde(default)]
    pub zones: BTreeMap<String, ZoneSnapshot>,
}

/// Persisted per-zone state. Every field is optional so partial or
/// older snapshots still restore what they can.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_term: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_term: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_term: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty_cycle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_status: Option<HealthStatus>,
    /// RFC 3339 timestamp of the last good update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_mode: Option<String>,
}

impl ZoneSnapshot {
    /// The regulator state, if the snapshot carries all of it.
    fn pid_state(&self) -> Option<PidState> {
        Some(PidState {
            error: self.error?,
            p_term: self.p_term?,
            i_term: self.i_term?,
            d_term: self.d_term?,
            duty_cycle: self.duty_cycle?,
        })
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_successful_update
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

fn zone_snapshot(zone: &ZoneRuntime) -> ZoneSnapshot {
    let pid = zone.pid_state();
    ZoneSnapshot {
        error: pid.map(|s| s.error),
        p_term: pid.map(|s| s.p_term),
        i_term: pid.map(|s| s.i_term),
        d_term: pid.map(|s| s.d_term),
        duty_cycle: pid.map(|s| s.duty_cycle),
        temperature: zone.temperature_c(),
        display_temp: zone.display_temp_c(),
        zone_status: Some(zone.status()),
        last_successful_update: zone.last_successful_update().map(|t| t.to_rfc3339()),
        setpoint: Some(zone.setpoint_c()),
        enabled: Some(zone.enabled()),
        preset_mode: zone.preset().map(str::to_string),
    }
}

/// Capture everything worth carrying across a restart.
pub fn capture_snapshot(core: &ControllerCore) -> Snapshot {
    Snapshot {
        version: LATEST_VERSION,
        controller_mode: Some(core.mode()),
        flush_enabled: Some(core.flush_enabled()),
        zones: core
            .zones()
            .map(|z| (z.id().to_string(), zone_snapshot(z)))
            .collect(),
    }
}

/// Apply a migrated snapshot to a freshly built controller.
///
/// Absent fields leave a zone at its configured defaults. Zones the
/// configuration no longer knows are skipped and their ids returned so
/// the caller can mention them.
pub fn apply_snapshot(core: &mut ControllerCore, snapshot: &Snapshot) -> Vec<String> {
    if let Some(mode) = snapshot.controller_mode {
        core.set_mode(mode);
    }
    if let Some(flush) = snapshot.flush_enabled {
        core.set_flush_enabled(flush);
    }
    let mut skipped = Vec::new();
    for (id, zone) in &snapshot.zones {
        let restore = ZoneRestore {
            pid_state: zone.pid_state(),
            temperature_c: zone.temperature,
            display_temp_c: zone.display_temp,
            status: zone.zone_status,
            last_successful_update: zone.last_update(),
            setpoint_c: zone.setpoint,
            enabled: zone.enabled,
            preset: zone.preset_mode.clone(),
        };
        if core.restore_zone(id, restore).is_err() {
            skipped.push(id.clone());
        }
    }
    skipped
}
