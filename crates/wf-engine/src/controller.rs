//! The controller core: one `tick` turns sensor inputs into device
//! commands.
//!
//! The core is deliberately inert between ticks. The caller owns the
//! clock and the devices; it reads sensors, calls [`ControllerCore::tick`]
//! with an explicit `now` and `dt_s`, and applies the returned
//! [`ControllerActions`]. Nothing in here sleeps, spawns, or reads a
//! wall clock, which keeps every scenario replayable in tests and in
//! the simulator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use wf_core::{period_start, seconds_between, ZoneId};

use crate::actions::{
    plan_valve_command, ControllerActions, ValveCommand, ValveState, ZoneDecision,
};
use crate::config::{
    validate_config, CircuitType, ControllerConfig, SetpointLimits, TimingConfig,
};
use crate::error::{EngineError, EngineResult};
use crate::health::{aggregate_status, ControllerHealth, HealthStatus};
use crate::history::HistoryProvider;
use crate::modes::{cycle_slot, OperationMode, SecondaryMode};
use crate::schedule::{
    calculate_requested_duration, calculate_used_duration, compute_flush_request, evaluate_zone,
    should_request_heat, TickContext,
};
use crate::zone::{ZoneRestore, ZoneRuntime};

/// External observations for one tick.
///
/// Zones absent from `temperatures` simply have no reading this tick;
/// zones absent from `valve_states` count as unavailable.
#[derive(Debug, Clone, Copy)]
pub struct TickInputs<'a> {
    pub now: DateTime<Utc>,
    /// Seconds since the previous tick.
    pub dt_s: f64,
    /// Whether the secondary source is currently heating domestic water.
    pub dhw_active: bool,
    pub temperatures: &'a HashMap<String, f64>,
    pub valve_states: &'a HashMap<String, ValveState>,
}

/// Multi-zone heating controller.
pub struct ControllerCore {
    name: String,
    timing: TimingConfig,
    setpoint_limits: SetpointLimits,
    failure_notification_threshold: u32,

    zones: Vec<ZoneRuntime>,
    index: HashMap<String, usize>,

    mode: OperationMode,
    flush_enabled: bool,
    dhw_active: bool,
    flush_until: Option<DateTime<Utc>>,
    flush_active: bool,

    period_start: Option<DateTime<Utc>>,
    period_elapsed_s: f64,
    refresh_done: bool,

    last_heat_request: Option<bool>,
    last_secondary: Option<SecondaryMode>,
    health: ControllerHealth,
}

impl ControllerCore {
    /// Build a controller from a validated configuration.
    pub fn new(config: ControllerConfig, now: DateTime<Utc>) -> EngineResult<Self> {
        validate_config(&config)?;

        let ControllerConfig {
            name,
            zones: zone_configs,
            timing,
            setpoint_limits,
            failure_notification_threshold,
            flush_enabled,
        } = config;

        let mut zones = Vec::with_capacity(zone_configs.len());
        let mut index = HashMap::with_capacity(zone_configs.len());
        for (i, zone_config) in zone_configs.into_iter().enumerate() {
            index.insert(zone_config.id.clone(), i);
            zones.push(ZoneRuntime::new(zone_config, now)?);
        }

        Ok(Self {
            name,
            timing,
            setpoint_limits,
            failure_notification_threshold,
            zones,
            index,
            mode: OperationMode::default(),
            flush_enabled,
            dhw_active: false,
            flush_until: None,
            flush_active: false,
            period_start: None,
            period_elapsed_s: 0.0,
            refresh_done: false,
            last_heat_request: None,
            last_secondary: None,
            health: ControllerHealth::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Switch operating mode. Leaving for `Disabled` also forgets the
    /// edge-trigger state, so a later re-enable re-commands every
    /// device instead of assuming it kept our last word.
    pub fn set_mode(&mut self, mode: OperationMode) {
        if self.mode == mode {
            return;
        }
        info!(
            from = self.mode.as_str(),
            to = mode.as_str(),
            "operation mode changed"
        );
        self.mode = mode;
        if mode == OperationMode::Disabled {
            self.last_heat_request = None;
            self.last_secondary = None;
            self.refresh_done = false;
        }
    }

    pub fn flush_enabled(&self) -> bool {
        self.flush_enabled
    }

    pub fn set_flush_enabled(&mut self, enabled: bool) {
        if self.flush_enabled != enabled {
            info!(enabled, "flush circuit toggled");
            self.flush_enabled = enabled;
        }
    }

    /// Whether flush circuits were requested to run on the last tick.
    pub fn flush_active(&self) -> bool {
        self.flush_active
    }

    pub fn status(&self) -> HealthStatus {
        self.health.status()
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn setpoint_limits(&self) -> &SetpointLimits {
        &self.setpoint_limits
    }

    pub fn zones(&self) -> impl Iterator<Item = &ZoneRuntime> {
        self.zones.iter()
    }

    pub fn zone(&self, zone_id: &str) -> Option<&ZoneRuntime> {
        self.index.get(zone_id).map(|&i| &self.zones[i])
    }

    /// Resolve a [`ValveCommand`]'s zone back to its configured id.
    pub fn zone_id_str(&self, id: ZoneId) -> Option<&str> {
        self.zones.get(id.index() as usize).map(|z| z.id())
    }

    fn zone_mut(&mut self, zone_id: &str) -> EngineResult<&mut ZoneRuntime> {
        let Some(&i) = self.index.get(zone_id) else {
            return Err(EngineError::UnknownZone {
                id: zone_id.to_string(),
            });
        };
        Ok(&mut self.zones[i])
    }

    pub fn set_setpoint(&mut self, zone_id: &str, value_c: f64) -> EngineResult<f64> {
        let limits = self.setpoint_limits.clone();
        let applied = self.zone_mut(zone_id)?.set_setpoint(value_c, &limits)?;
        info!(zone = zone_id, setpoint_c = applied, "setpoint changed");
        Ok(applied)
    }

    pub fn apply_preset(&mut self, zone_id: &str, preset: &str) -> EngineResult<f64> {
        let limits = self.setpoint_limits.clone();
        let applied = self.zone_mut(zone_id)?.apply_preset(preset, &limits)?;
        info!(zone = zone_id, preset, setpoint_c = applied, "preset applied");
        Ok(applied)
    }

    pub fn set_zone_enabled(&mut self, zone_id: &str, enabled: bool) -> EngineResult<()> {
        let zone = self.zone_mut(zone_id)?;
        if zone.enabled != enabled {
            zone.enabled = enabled;
            info!(zone = zone_id, enabled, "zone toggled");
        }
        Ok(())
    }

    /// Reinstate one zone's state from a snapshot.
    pub fn restore_zone(&mut self, zone_id: &str, restore: ZoneRestore) -> EngineResult<()> {
        self.zone_mut(zone_id)?.restore(restore);
        Ok(())
    }

    /// Run one control step.
    ///
    /// In `Disabled` mode nothing is read and nothing advances; the
    /// returned actions are empty.
    pub fn tick(
        &mut self,
        inputs: &TickInputs<'_>,
        history: &dyn HistoryProvider,
    ) -> ControllerActions {
        if self.mode == OperationMode::Disabled {
            return ControllerActions::default();
        }

        let now = inputs.now;
        let timing = self.timing.clone();
        let mode = self.mode;

        // The flush tail window arms when domestic hot water production
        // ends, so residual boiler heat has somewhere to go.
        if self.dhw_active && !inputs.dhw_active {
            let until = now + duration_s(timing.flush_duration_s);
            debug!(until = %until, "dhw ended, flush tail armed");
            self.flush_until = Some(until);
        }
        self.dhw_active = inputs.dhw_active;

        // Period bookkeeping. A new period re-arms the refresh so every
        // device hears a command at least once per period.
        let p_start = period_start(now, timing.observation_period_s);
        if self.period_start != Some(p_start) {
            self.period_start = Some(p_start);
            self.refresh_done = false;
        }
        let period_elapsed_s = seconds_between(p_start, now);
        self.period_elapsed_s = period_elapsed_s;
        let refresh_due = !self.refresh_done;

        // Per-zone inputs: valve state, temperature, history queries,
        // regulator step, health.
        let mut skip_valve = vec![false; self.zones.len()];
        let mut any_failure = false;
        for (i, zone) in self.zones.iter_mut().enumerate() {
            let mut failed = false;

            let reported = inputs
                .valve_states
                .get(zone.id())
                .copied()
                .unwrap_or(ValveState::Unavailable);
            if reported == ValveState::Unavailable {
                failed = true;
            }
            zone.valve_state = reported;

            let raw_temp = inputs.temperatures.get(zone.id()).copied();
            let temp_missing = raw_temp.filter(|v| v.is_finite()).is_none();
            if temp_missing {
                failed = true;
            }
            zone.ingest_temperature(raw_temp, inputs.dt_s);

            // An open window pauses the regulator, never the valve; a
            // sensor gap reads as closed.
            let window_start = now - duration_s(timing.window_block_time_s);
            let mut window_ratio: f64 = 0.0;
            for sensor in &zone.config().window_sensors {
                match history.window_open_ratio(sensor, window_start, now) {
                    Ok(ratio) => window_ratio = window_ratio.max(ratio),
                    Err(err) => {
                        debug!(
                            zone = zone.id(),
                            sensor = sensor.as_str(),
                            error = %err,
                            "window history unavailable, assuming closed"
                        );
                    }
                }
            }
            zone.window_recently_open = window_ratio > 0.0;

            let pid_paused = mode != OperationMode::Auto
                || !zone.enabled
                || zone.window_recently_open
                || temp_missing;
            if !pid_paused {
                zone.advance_pid(inputs.dt_s);
            }
            zone.requested_duration_s = calculate_requested_duration(
                zone.pid_state().map(|s| s.duty_cycle),
                timing.observation_period_s,
            );

            // Quota accounting needs the period open ratio. Without it
            // the zone cannot be scheduled safely, so its valve is left
            // alone this tick.
            match history.valve_open_ratio(zone.id(), p_start, now) {
                Ok(ratio) => {
                    zone.used_duration_s = calculate_used_duration(ratio, period_elapsed_s);
                }
                Err(err) => {
                    warn!(
                        zone = zone.id(),
                        error = %err,
                        "period history unavailable, holding valve"
                    );
                    zone.used_duration_s = 0.0;
                    failed = true;
                    skip_valve[i] = true;
                }
            }

            // The heat-request gate wants the short detection window;
            // a gap falls back to the instantaneous state.
            let detect_start = now - duration_s(timing.valve_open_time_s);
            zone.open_ratio = match history.valve_open_ratio(zone.id(), detect_start, now) {
                Ok(ratio) => ratio,
                Err(_) => {
                    if reported.is_on() {
                        1.0
                    } else {
                        0.0
                    }
                }
            };

            let transition = if failed {
                any_failure = true;
                zone.health.record_failure(now, &timing)
            } else {
                zone.health.record_success(now)
            };
            if let Some(t) = transition {
                if t.to == HealthStatus::Normal {
                    info!(zone = zone.id(), from = t.from.as_str(), "zone recovered");
                } else {
                    warn!(
                        zone = zone.id(),
                        from = t.from.as_str(),
                        to = t.to.as_str(),
                        "zone health changed"
                    );
                }
            }
        }

        let statuses: Vec<HealthStatus> = self.zones.iter().map(|z| z.status()).collect();
        let controller_status = aggregate_status(&statuses);
        if let Some(t) = self.health.set_status(controller_status) {
            warn!(
                from = t.from.as_str(),
                to = t.to.as_str(),
                "controller health changed"
            );
        }
        if self
            .health
            .record_tick(any_failure, self.failure_notification_threshold)
        {
            warn!(
                failures = self.health.consecutive_failures(),
                "repeated update failures"
            );
        }

        let (decisions, heat, secondary) = self.decide(now, &skip_valve);

        // A controller with every zone in fail-safe must not fire the
        // heat source; the secondary falls back to managing itself
        // whenever any zone is in fail-safe.
        let heat = heat && !controller_status.is_fail_safe();
        let secondary = if statuses.iter().any(|s| s.is_fail_safe()) {
            SecondaryMode::Auto
        } else {
            secondary
        };

        let mut actions = ControllerActions::default();
        for (i, zone) in self.zones.iter().enumerate() {
            if skip_valve[i] && !zone.status().is_fail_safe() {
                continue;
            }
            let Some(on) = plan_valve_command(decisions[i], zone.valve_state(), refresh_due) else {
                continue;
            };
            if !zone.valve_state().is_confirmed() {
                warn!(zone = zone.id(), state = ?zone.valve_state(), "commanding unconfirmed valve");
            }
            actions.valve_commands.push(ValveCommand {
                zone: ZoneId::from_index(i as u32),
                on,
            });
        }

        if self.last_heat_request != Some(heat) || refresh_due {
            actions.heat_request = Some(heat);
        }
        self.last_heat_request = Some(heat);

        if self.last_secondary != Some(secondary) {
            actions.secondary_mode = Some(secondary);
        }
        self.last_secondary = Some(secondary);

        self.refresh_done = true;
        actions
    }

    /// Resolve per-zone decisions plus the heat request and secondary
    /// mode for the current operating mode.
    fn decide(
        &mut self,
        now: DateTime<Utc>,
        skip_valve: &[bool],
    ) -> (Vec<ZoneDecision>, bool, SecondaryMode) {
        let n = self.zones.len();
        let mut decisions = vec![ZoneDecision::StayOff; n];

        match self.mode {
            OperationMode::Auto => {
                let regular_ctx = TickContext {
                    period_elapsed_s: self.period_elapsed_s,
                    dhw_active: self.dhw_active,
                    flush_active: false,
                };
                // Regular circuits resolve first; flush circuits then
                // see whether any of them ended up running.
                for (i, zone) in self.zones.iter().enumerate() {
                    if zone.config().circuit == CircuitType::Regular {
                        decisions[i] = self.zone_decision(zone, skip_valve[i], &regular_ctx);
                    }
                }
                let any_regular_on = self
                    .zones
                    .iter()
                    .zip(&decisions)
                    .any(|(z, d)| z.config().circuit == CircuitType::Regular && d.resolves_on());
                self.flush_active = compute_flush_request(
                    self.flush_enabled,
                    self.dhw_active,
                    self.flush_until,
                    any_regular_on,
                    now,
                );
                let flush_ctx = TickContext {
                    flush_active: self.flush_active,
                    ..regular_ctx
                };
                for (i, zone) in self.zones.iter().enumerate() {
                    if zone.config().circuit == CircuitType::Flush {
                        decisions[i] = self.zone_decision(zone, skip_valve[i], &flush_ctx);
                    }
                }

                let heat = self.zones.iter().any(|z| {
                    !z.status().is_fail_safe()
                        && should_request_heat(&z.schedule_inputs(), z.open_ratio, &self.timing)
                });
                let secondary = if heat {
                    SecondaryMode::Winter
                } else {
                    SecondaryMode::Summer
                };
                (decisions, heat, secondary)
            }
            OperationMode::AllOn => {
                for (i, zone) in self.zones.iter().enumerate() {
                    decisions[i] = forced(zone, true);
                }
                self.flush_active = false;
                (decisions, true, SecondaryMode::Winter)
            }
            OperationMode::AllOff => {
                for (i, zone) in self.zones.iter().enumerate() {
                    decisions[i] = forced(zone, false);
                }
                self.flush_active = false;
                (decisions, false, SecondaryMode::Summer)
            }
            OperationMode::Flush => {
                for (i, zone) in self.zones.iter().enumerate() {
                    decisions[i] = forced(zone, true);
                }
                self.flush_active = false;
                (decisions, false, SecondaryMode::Summer)
            }
            OperationMode::Cycle => {
                let slot = cycle_slot(now) as usize;
                for (i, zone) in self.zones.iter().enumerate() {
                    let active = slot != 0 && (slot - 1) % n == i;
                    decisions[i] = forced(zone, active);
                }
                self.flush_active = false;
                (decisions, false, SecondaryMode::Summer)
            }
            // tick() returns before deciding in this mode.
            OperationMode::Disabled => (decisions, false, SecondaryMode::Summer),
        }
    }

    fn zone_decision(&self, zone: &ZoneRuntime, skipped: bool, ctx: &TickContext) -> ZoneDecision {
        if zone.status().is_fail_safe() {
            return forced_off(zone.valve_state());
        }
        if skipped {
            return hold_current(zone.valve_state());
        }
        evaluate_zone(&zone.schedule_inputs(), ctx, &self.timing)
    }

    /// Snapshot of everything a caller may want to show or persist.
    pub fn report(&self) -> ControllerReport {
        let zones = self
            .zones
            .iter()
            .map(|z| (z.id().to_string(), zone_report(z)))
            .collect();
        ControllerReport {
            name: self.name.clone(),
            mode: self.mode,
            status: self.health.status(),
            heat_request: self.last_heat_request,
            secondary_mode: self.last_secondary,
            flush_enabled: self.flush_enabled,
            flush_active: self.flush_active,
            dhw_active: self.dhw_active,
            period_elapsed_s: self.period_elapsed_s,
            consecutive_failures: self.health.consecutive_failures(),
            notification_raised: self.health.notification_raised(),
            zones,
        }
    }
}

/// Force a zone toward the given state, honoring fail-safe.
fn forced(zone: &ZoneRuntime, on: bool) -> ZoneDecision {
    if on && !zone.status().is_fail_safe() {
        force_on(zone.valve_state())
    } else {
        forced_off(zone.valve_state())
    }
}

fn force_on(valve: ValveState) -> ZoneDecision {
    if valve.is_on() {
        ZoneDecision::StayOn
    } else {
        ZoneDecision::TurnOn
    }
}

fn forced_off(valve: ValveState) -> ZoneDecision {
    if valve.is_off() {
        ZoneDecision::StayOff
    } else {
        ZoneDecision::TurnOff
    }
}

fn hold_current(valve: ValveState) -> ZoneDecision {
    if valve.is_on() {
        ZoneDecision::StayOn
    } else {
        ZoneDecision::StayOff
    }
}

fn duration_s(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0) as i64)
}

/// Point-in-time controller state for callers.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerReport {
    pub name: String,
    pub mode: OperationMode,
    pub status: HealthStatus,
    /// Last commanded heat request, if any tick has run.
    pub heat_request: Option<bool>,
    pub secondary_mode: Option<SecondaryMode>,
    pub flush_enabled: bool,
    pub flush_active: bool,
    pub dhw_active: bool,
    pub period_elapsed_s: f64,
    pub consecutive_failures: u32,
    pub notification_raised: bool,
    pub zones: BTreeMap<String, ZoneReport>,
}

/// Point-in-time zone state for callers.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneReport {
    pub name: String,
    pub status: HealthStatus,
    pub enabled: bool,
    pub setpoint_c: f64,
    pub preset: Option<String>,
    pub temperature_c: Option<f64>,
    pub display_temp_c: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub valve_state: ValveState,
    pub requested_duration_s: f64,
    pub used_duration_s: f64,
    pub window_recently_open: bool,
    /// RFC 3339, or absent before the first good tick.
    pub last_successful_update: Option<String>,
}

fn zone_report(zone: &ZoneRuntime) -> ZoneReport {
    ZoneReport {
        name: zone.display_name().to_string(),
        status: zone.status(),
        enabled: zone.enabled(),
        setpoint_c: zone.setpoint_c(),
        preset: zone.preset().map(str::to_string),
        temperature_c: zone.temperature_c(),
        display_temp_c: zone.display_temp_c(),
        duty_cycle: zone.pid_state().map(|s| s.duty_cycle),
        valve_state: zone.valve_state(),
        requested_duration_s: zone.requested_duration_s,
        used_duration_s: zone.used_duration_s,
        window_recently_open: zone.window_recently_open,
        last_successful_update: zone.last_successful_update().map(|t| t.to_rfc3339()),
    }
}
