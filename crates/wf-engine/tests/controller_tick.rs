use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use wf_engine::{
    CircuitType, ControllerActions, ControllerConfig, ControllerCore, HistoryError,
    HistoryProvider, OperationMode, SecondaryMode, SetpointLimits, TickInputs, TimingConfig,
    ValveState, ZoneConfig,
};

/// Scripted history: fixed open ratios per zone and window sensor.
///
/// The engine asks for two valve windows with the default timing: the
/// detection window spans exactly 210 s, the period window spans the
/// elapsed observation period. Tests pick tick times where the two
/// spans differ.
#[derive(Default)]
struct ScriptedHistory {
    period_open: HashMap<String, f64>,
    detect_open: HashMap<String, f64>,
    window_open: HashMap<String, f64>,
}

impl ScriptedHistory {
    fn with_period(mut self, zone: &str, ratio: f64) -> Self {
        self.period_open.insert(zone.to_string(), ratio);
        self
    }

    fn with_detect(mut self, zone: &str, ratio: f64) -> Self {
        self.detect_open.insert(zone.to_string(), ratio);
        self
    }

    fn with_window(mut self, sensor: &str, ratio: f64) -> Self {
        self.window_open.insert(sensor.to_string(), ratio);
        self
    }
}

impl HistoryProvider for ScriptedHistory {
    fn valve_open_ratio(
        &self,
        zone_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, HistoryError> {
        let span_s = (end - start).num_seconds();
        let map = if span_s == 210 {
            &self.detect_open
        } else {
            &self.period_open
        };
        Ok(map.get(zone_id).copied().unwrap_or(0.0))
    }

    fn window_open_ratio(
        &self,
        sensor_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<f64, HistoryError> {
        Ok(self.window_open.get(sensor_id).copied().unwrap_or(0.0))
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 18, h, m, s).unwrap()
}

fn config(zones: Vec<ZoneConfig>, flush_enabled: bool) -> ControllerConfig {
    ControllerConfig {
        name: "house".to_string(),
        zones,
        timing: TimingConfig::default(),
        setpoint_limits: SetpointLimits::default(),
        failure_notification_threshold: 3,
        flush_enabled,
    }
}

fn two_rooms() -> ControllerConfig {
    config(
        vec![ZoneConfig::new("living_room"), ZoneConfig::new("bedroom")],
        false,
    )
}

fn rooms_with_flush() -> ControllerConfig {
    let mut hallway = ZoneConfig::new("hallway");
    hallway.circuit = CircuitType::Flush;
    config(vec![ZoneConfig::new("living_room"), hallway], true)
}

fn temps(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn valves(entries: &[(&str, ValveState)]) -> HashMap<String, ValveState> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn commands_by_zone(core: &ControllerCore, actions: &ControllerActions) -> HashMap<String, bool> {
    actions
        .valve_commands
        .iter()
        .filter_map(|c| core.zone_id_str(c.zone).map(|id| (id.to_string(), c.on)))
        .collect()
}

#[test]
fn cold_zones_open_and_then_call_for_heat() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    let history = ScriptedHistory::default()
        .with_period("living_room", 0.05)
        .with_detect("living_room", 1.0);

    // Both rooms below setpoint, valves closed.
    let t = temps(&[("living_room", 19.0), ("bedroom", 19.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let first = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    // Full proportional demand opens both valves.
    let cmds = commands_by_zone(&core, &first);
    assert_eq!(cmds.get("living_room"), Some(&true));
    assert_eq!(cmds.get("bedroom"), Some(&true));
    let report = core.report();
    assert_eq!(report.zones["living_room"].duty_cycle, Some(100.0));
    assert_eq!(report.zones["living_room"].requested_duration_s, 7200.0);

    // No valve is confirmed open yet, so no heat is requested.
    assert_eq!(first.heat_request, Some(false));
    assert_eq!(first.secondary_mode, Some(SecondaryMode::Summer));

    // Next tick the living room valve reads open over the detection
    // window: the controller calls for heat and flips to winter.
    let v = valves(&[
        ("living_room", ValveState::On),
        ("bedroom", ValveState::Off),
    ]);
    let second = core.tick(
        &TickInputs {
            now: at(12, 31, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );
    assert!(commands_by_zone(&core, &second).get("living_room").is_none());
    assert_eq!(second.heat_request, Some(true));
    assert_eq!(second.secondary_mode, Some(SecondaryMode::Winter));
}

#[test]
fn spent_quota_closes_the_valve() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    // Warm rooms: duty 0, so any consumed time exceeds the request.
    let t = temps(&[("living_room", 23.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::On),
        ("bedroom", ValveState::Off),
    ]);
    let history = ScriptedHistory::default().with_period("living_room", 0.5);

    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    let cmds = commands_by_zone(&core, &actions);
    assert_eq!(cmds.get("living_room"), Some(&false));
    let report = core.report();
    assert_eq!(report.zones["living_room"].used_duration_s, 900.0);
    assert_eq!(report.zones["living_room"].requested_duration_s, 0.0);
}

#[test]
fn steady_state_commands_nothing() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    let t = temps(&[("living_room", 23.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let history = ScriptedHistory::default();

    let input = |now| TickInputs {
        now,
        dt_s: 60.0,
        dhw_active: false,
        temperatures: &t,
        valve_states: &v,
    };

    // First tick of the period carries the refresh.
    let first = core.tick(&input(at(12, 30, 0)), &history);
    assert_eq!(first.valve_commands.len(), 2);
    assert_eq!(first.heat_request, Some(false));

    // After that, a settled house stays quiet.
    let second = core.tick(&input(at(12, 31, 0)), &history);
    assert!(second.is_empty());
    let third = core.tick(&input(at(12, 32, 0)), &history);
    assert!(third.is_empty());
}

#[test]
fn new_period_refreshes_every_device() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    let t = temps(&[("living_room", 23.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let history = ScriptedHistory::default();

    let input = |now| TickInputs {
        now,
        dt_s: 60.0,
        dhw_active: false,
        temperatures: &t,
        valve_states: &v,
    };

    core.tick(&input(at(12, 30, 0)), &history);
    assert!(core.tick(&input(at(12, 31, 0)), &history).is_empty());

    // Crossing 14:00 starts a fresh observation period.
    let refreshed = core.tick(&input(at(14, 0, 30)), &history);
    assert_eq!(refreshed.valve_commands.len(), 2);
    assert!(refreshed.valve_commands.iter().all(|c| !c.on));
    assert_eq!(refreshed.heat_request, Some(false));
    // Secondary mode is edge-triggered only; no change, no command.
    assert!(refreshed.secondary_mode.is_none());
}

#[test]
fn dhw_holds_regulars_and_runs_the_flush_circuit() {
    let mut core = ControllerCore::new(rooms_with_flush(), at(12, 0, 0)).unwrap();
    // Living room wants heat but DHW is being produced.
    let t = temps(&[("living_room", 19.0), ("hallway", 22.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("hallway", ValveState::Off),
    ]);
    let history = ScriptedHistory::default();

    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: true,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    let cmds = commands_by_zone(&core, &actions);
    assert_eq!(cmds.get("living_room"), Some(&false));
    assert_eq!(cmds.get("hallway"), Some(&true));
    assert!(core.flush_active());
    assert_eq!(actions.heat_request, Some(false));
}

#[test]
fn flush_tail_runs_after_dhw_then_closes() {
    let mut core = ControllerCore::new(rooms_with_flush(), at(12, 0, 0)).unwrap();
    // Warm house: no regular circuit competes with the flush loop.
    let t = temps(&[("living_room", 23.0), ("hallway", 23.0)]);
    let history = ScriptedHistory::default().with_period("hallway", 0.01);

    let v = valves(&[
        ("living_room", ValveState::Off),
        ("hallway", ValveState::Off),
    ]);
    core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: true,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );
    assert!(core.flush_active());

    // DHW ends; the tail window keeps the flush loop open.
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("hallway", ValveState::On),
    ]);
    let during_tail = core.tick(
        &TickInputs {
            now: at(12, 31, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );
    assert!(core.flush_active());
    assert!(commands_by_zone(&core, &during_tail).get("hallway").is_none());

    // 480 s after the falling edge the window has passed.
    let after_tail = core.tick(
        &TickInputs {
            now: at(12, 40, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );
    assert!(!core.flush_active());
    assert_eq!(
        commands_by_zone(&core, &after_tail).get("hallway"),
        Some(&false)
    );
}

#[test]
fn running_regular_circuit_preempts_the_flush_loop() {
    let mut core = ControllerCore::new(rooms_with_flush(), at(12, 0, 0)).unwrap();
    // Living room is mid-run; DHW cannot stop a running circuit.
    let t = temps(&[("living_room", 19.0), ("hallway", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::On),
        ("hallway", ValveState::On),
    ]);
    let history = ScriptedHistory::default()
        .with_period("living_room", 0.1)
        .with_period("hallway", 0.02);

    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: true,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    assert!(!core.flush_active());
    let cmds = commands_by_zone(&core, &actions);
    assert_eq!(cmds.get("hallway"), Some(&false));
    assert_eq!(cmds.get("living_room"), Some(&true));
}

#[test]
fn open_window_pauses_the_regulator_not_the_valve() {
    let mut zone = ZoneConfig::new("living_room");
    zone.window_sensors = vec!["window_living".to_string()];
    let mut core =
        ControllerCore::new(config(vec![zone, ZoneConfig::new("bedroom")], false), at(12, 0, 0))
            .unwrap();

    let t = temps(&[("living_room", 19.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let history = ScriptedHistory::default().with_window("window_living", 0.4);

    core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    // The regulator never ran, so the cold room requests nothing.
    let report = core.report();
    assert!(report.zones["living_room"].window_recently_open);
    assert_eq!(report.zones["living_room"].duty_cycle, None);
    assert_eq!(report.zones["living_room"].requested_duration_s, 0.0);

    // Window closes: the regulator picks up on the next tick.
    let history = ScriptedHistory::default();
    core.tick(
        &TickInputs {
            now: at(12, 31, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );
    let report = core.report();
    assert!(!report.zones["living_room"].window_recently_open);
    assert_eq!(report.zones["living_room"].duty_cycle, Some(100.0));
}

#[test]
fn disabled_zone_is_parked_off_and_unregulated() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    core.set_zone_enabled("living_room", false).unwrap();

    let t = temps(&[("living_room", 17.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::On),
        ("bedroom", ValveState::Off),
    ]);
    let history = ScriptedHistory::default();

    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &history,
    );

    let cmds = commands_by_zone(&core, &actions);
    assert_eq!(cmds.get("living_room"), Some(&false));
    let report = core.report();
    assert!(!report.zones["living_room"].enabled);
    assert_eq!(report.zones["living_room"].duty_cycle, None);
}

#[test]
fn all_on_opens_everything_and_fires_the_boiler() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    core.set_mode(OperationMode::AllOn);

    let t = temps(&[("living_room", 23.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &ScriptedHistory::default(),
    );

    assert!(actions.valve_commands.iter().all(|c| c.on));
    assert_eq!(actions.valve_commands.len(), 2);
    assert_eq!(actions.heat_request, Some(true));
    assert_eq!(actions.secondary_mode, Some(SecondaryMode::Winter));
}

#[test]
fn flush_mode_opens_everything_without_heat() {
    let mut core = ControllerCore::new(two_rooms(), at(12, 0, 0)).unwrap();
    core.set_mode(OperationMode::Flush);

    let t = temps(&[("living_room", 23.0), ("bedroom", 23.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
    ]);
    let actions = core.tick(
        &TickInputs {
            now: at(12, 30, 0),
            dt_s: 60.0,
            dhw_active: false,
            temperatures: &t,
            valve_states: &v,
        },
        &ScriptedHistory::default(),
    );

    assert!(actions.valve_commands.iter().all(|c| c.on));
    assert_eq!(actions.heat_request, Some(false));
    assert_eq!(actions.secondary_mode, Some(SecondaryMode::Summer));
}

#[test]
fn cycle_mode_walks_one_zone_per_hour() {
    let zones = vec![
        ZoneConfig::new("living_room"),
        ZoneConfig::new("bedroom"),
        ZoneConfig::new("bath"),
    ];
    let mut core = ControllerCore::new(config(zones, false), at(0, 0, 0)).unwrap();
    core.set_mode(OperationMode::Cycle);

    let t = temps(&[("living_room", 21.0), ("bedroom", 21.0), ("bath", 21.0)]);
    let v = valves(&[
        ("living_room", ValveState::Off),
        ("bedroom", ValveState::Off),
        ("bath", ValveState::Off),
    ]);
    let history = ScriptedHistory::default();

    let walk = |core: &mut ControllerCore, now| {
        let actions = core.tick(
            &TickInputs {
                now,
                dt_s: 60.0,
                dhw_active: false,
                temperatures: &t,
                valve_states: &v,
            },
            &history,
        );
        commands_by_zone(core, &actions)
    };

    // Slot 0 rests every zone.
    let cmds = walk(&mut core, at(0, 30, 0));
    assert!(cmds.values().all(|on| !on));

    // Slot 1 runs the first zone.
    let cmds = walk(&mut core, at(1, 30, 0));
    assert_eq!(cmds.get("living_room"), Some(&true));

    // Slot 3 runs the third zone.
    let cmds = walk(&mut core, at(3, 30, 0));
    assert_eq!(cmds.get("bath"), Some(&true));
    assert_eq!(cmds.get("living_room"), Some(&false));

    // Slot 4 wraps back to the first zone.
    let cmds = walk(&mut core, at(4, 30, 0));
    assert_eq!(cmds.get("living_room"), Some(&true));
}
