//! Closed-loop simulation driver.
//!
//! Runs a [`ScenarioDef`] against a real controller: scripted
//! temperatures go in, valve commands come out and are applied to the
//! simulated valves immediately, and the resulting state history feeds
//! back into the controller's own usage queries.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wf_engine::{
    ControllerCore, HealthStatus, OperationMode, SecondaryMode, TickInputs, ValveState,
};

use crate::error::{SimError, SimResult};
use crate::hash::compute_run_id;
use crate::history::MemoryHistory;
use crate::scenario::{ScenarioAction, ScenarioDef};

/// Options controlling a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Seconds of simulated time between controller ticks.
    pub loop_interval_s: f64,
    /// Overrides the scenario duration when set.
    #[serde(default)]
    pub t_end_s: Option<f64>,
    /// Upper bound on the step passed to the controller.
    pub max_dt_s: f64,
    /// Record every Nth tick (1 = record all). The final tick is always
    /// recorded.
    pub record_every: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            loop_interval_s: 60.0,
            t_end_s: None,
            max_dt_s: 300.0,
            record_every: 1,
        }
    }
}

/// One recorded controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimRecord {
    pub t_s: f64,
    pub time: String,
    pub mode: OperationMode,
    pub status: HealthStatus,
    pub heat_request: bool,
    pub secondary_mode: Option<SecondaryMode>,
    pub flush_active: bool,
    pub dhw_active: bool,
    pub zones: BTreeMap<String, ZoneRecord>,
}

/// Per-zone slice of a [`SimRecord`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRecord {
    pub temperature_c: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub valve_on: bool,
    pub status: HealthStatus,
}

/// Identity and shape of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub scenario_name: String,
    pub started_at: String,
    pub duration_s: f64,
    pub ticks: usize,
}

/// A completed simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimRun {
    pub manifest: RunManifest,
    pub records: Vec<SimRecord>,
}

/// Run a scenario to completion.
pub fn run_scenario(scenario: &ScenarioDef, options: &SimOptions) -> SimResult<SimRun> {
    validate_options(options)?;
    scenario.validate()?;
    let start = scenario.start()?;
    let duration_s = options.t_end_s.unwrap_or(scenario.duration_s);
    let run_id = compute_run_id(scenario, options);

    info!(
        scenario = %scenario.name,
        run_id = %run_id,
        duration_s,
        "starting simulation run"
    );

    let mut core = ControllerCore::new(scenario.controller.clone(), start)?;
    let mut history = MemoryHistory::new();

    // Valves start closed; windows follow their scripted intervals,
    // which are known up front and can be seeded as events.
    let mut valve_on: HashMap<String, bool> = HashMap::new();
    for zone in &scenario.controller.zones {
        valve_on.insert(zone.id.clone(), false);
        history.record_valve(&zone.id, start, false);
    }
    for (sensor_id, intervals) in &scenario.window_intervals {
        for interval in intervals {
            history.record_window(sensor_id, start + offset(interval.start_s), true);
            history.record_window(sensor_id, start + offset(interval.end_s), false);
        }
    }

    let mut events = scenario.events.clone();
    events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
    let mut next_event = 0;

    let dt_s = options.loop_interval_s.min(options.max_dt_s);
    let mut records = Vec::new();
    let mut pending: Option<SimRecord> = None;
    let mut ticks = 0usize;
    let mut t_s = 0.0;

    while t_s < duration_s {
        while next_event < events.len() && events[next_event].at_s <= t_s {
            debug!(at_s = events[next_event].at_s, "applying scenario event");
            apply_action(&mut core, &events[next_event].action)?;
            next_event += 1;
        }

        let now = start + offset(t_s);
        let dhw_active = scenario.dhw_active_at(t_s);

        let mut temperatures = HashMap::new();
        for zone in &scenario.controller.zones {
            if let Some(value) = scenario.temperature_at(&zone.id, t_s) {
                temperatures.insert(zone.id.clone(), value);
            }
        }
        let valve_states: HashMap<String, ValveState> = valve_on
            .iter()
            .map(|(id, on)| {
                let state = if *on { ValveState::On } else { ValveState::Off };
                (id.clone(), state)
            })
            .collect();

        let inputs = TickInputs {
            now,
            dt_s,
            dhw_active,
            temperatures: &temperatures,
            valve_states: &valve_states,
        };
        let actions = core.tick(&inputs, &history);

        // Commands take effect in the simulated house immediately.
        for command in &actions.valve_commands {
            if let Some(id) = core.zone_id_str(command.zone) {
                valve_on.insert(id.to_string(), command.on);
                history.record_valve(id, now, command.on);
            }
        }

        ticks += 1;
        let record = make_record(t_s, now, &core, dhw_active, &valve_on);
        if ticks % options.record_every == 0 {
            records.push(record);
            pending = None;
        } else {
            pending = Some(record);
        }

        t_s += dt_s;
    }

    if let Some(record) = pending {
        records.push(record);
    }

    info!(run_id = %run_id, ticks, "simulation run complete");

    Ok(SimRun {
        manifest: RunManifest {
            run_id,
            scenario_name: scenario.name.clone(),
            started_at: scenario.start_time.clone(),
            duration_s,
            ticks,
        },
        records,
    })
}

fn validate_options(options: &SimOptions) -> SimResult<()> {
    if !options.loop_interval_s.is_finite() || options.loop_interval_s <= 0.0 {
        return Err(SimError::InvalidArg {
            what: "loop_interval_s must be positive and finite",
        });
    }
    if !options.max_dt_s.is_finite() || options.max_dt_s <= 0.0 {
        return Err(SimError::InvalidArg {
            what: "max_dt_s must be positive and finite",
        });
    }
    if let Some(t_end_s) = options.t_end_s {
        if !t_end_s.is_finite() || t_end_s <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "t_end_s must be positive and finite",
            });
        }
    }
    if options.record_every == 0 {
        return Err(SimError::InvalidArg {
            what: "record_every must be at least 1",
        });
    }
    Ok(())
}

fn apply_action(core: &mut ControllerCore, action: &ScenarioAction) -> SimResult<()> {
    match action {
        ScenarioAction::SetMode(mode) => core.set_mode(*mode),
        ScenarioAction::SetSetpoint { zone, value_c } => {
            core.set_setpoint(zone, *value_c)?;
        }
        ScenarioAction::SetPreset { zone, preset } => {
            core.apply_preset(zone, preset)?;
        }
        ScenarioAction::SetZoneEnabled { zone, enabled } => {
            core.set_zone_enabled(zone, *enabled)?;
        }
        ScenarioAction::SetFlushEnabled(enabled) => core.set_flush_enabled(*enabled),
    }
    Ok(())
}

fn offset(t_s: f64) -> Duration {
    Duration::milliseconds((t_s * 1000.0) as i64)
}

fn make_record(
    t_s: f64,
    now: DateTime<Utc>,
    core: &ControllerCore,
    dhw_active: bool,
    valve_on: &HashMap<String, bool>,
) -> SimRecord {
    let report = core.report();
    let zones = report
        .zones
        .iter()
        .map(|(id, zone)| {
            let record = ZoneRecord {
                temperature_c: zone.temperature_c,
                duty_cycle: zone.duty_cycle,
                valve_on: valve_on.get(id).copied().unwrap_or(false),
                status: zone.status,
            };
            (id.clone(), record)
        })
        .collect();

    SimRecord {
        t_s,
        time: now.to_rfc3339(),
        mode: report.mode,
        status: report.status,
        heat_request: report.heat_request.unwrap_or(false),
        secondary_mode: report.secondary_mode,
        flush_active: report.flush_active,
        dhw_active,
        zones,
    }
}
