//! Closed-loop scenario runs covering a heating day.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use wf_engine::{
    CircuitType, ControllerConfig, HealthStatus, OperationMode, SecondaryMode, ZoneConfig,
};
use wf_sim::{
    load_scenario, run_scenario, Interval, ScenarioAction, ScenarioDef, ScenarioEvent, SimOptions,
    SimRecord, SimRun, TempPoint,
};

static TEST_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_path(tag: &str, ext: &str) -> PathBuf {
    let sequence = TEST_FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "wf_sim_{}_{}_{}.{}",
        tag,
        std::process::id(),
        sequence,
        ext
    ))
}

fn scenario(zones: Vec<ZoneConfig>, duration_s: f64) -> ScenarioDef {
    ScenarioDef {
        name: "day_cycle".to_string(),
        start_time: "2026-01-18T00:00:00Z".to_string(),
        duration_s,
        controller: ControllerConfig {
            name: "house".to_string(),
            zones,
            timing: Default::default(),
            setpoint_limits: Default::default(),
            failure_notification_threshold: 3,
            flush_enabled: false,
        },
        temperatures: BTreeMap::new(),
        dhw_intervals: vec![],
        window_intervals: BTreeMap::new(),
        events: vec![],
    }
}

fn flat(value_c: f64) -> Vec<TempPoint> {
    vec![TempPoint { at_s: 0.0, value_c }]
}

fn record_at(run: &SimRun, t_s: f64) -> &SimRecord {
    run.records
        .iter()
        .find(|r| r.t_s == t_s)
        .unwrap_or_else(|| panic!("no record at {} s", t_s))
}

#[test]
fn cold_morning_warms_the_house_and_the_boiler_idles() {
    let mut scenario = scenario(vec![ZoneConfig::new("living_room")], 28800.0);
    scenario.temperatures.insert(
        "living_room".to_string(),
        vec![
            TempPoint {
                at_s: 0.0,
                value_c: 17.0,
            },
            TempPoint {
                at_s: 21600.0,
                value_c: 22.5,
            },
        ],
    );

    let run = run_scenario(&scenario, &SimOptions::default()).unwrap();
    assert_eq!(run.manifest.ticks, 480);
    assert_eq!(run.records.len(), 480);

    // The cold zone opens on the first tick, but the heat request waits
    // for the valve to be verifiably open.
    assert!(run.records[0].zones["living_room"].valve_on);
    assert!(!run.records[0].heat_request);
    let first_heat = run
        .records
        .iter()
        .find(|r| r.heat_request)
        .expect("boiler never fired");
    assert_eq!(first_heat.t_s, 180.0);
    assert_eq!(first_heat.secondary_mode, Some(SecondaryMode::Winter));

    // Once the room overshoots the setpoint the duty collapses, the
    // valve closes and the boiler idles for the rest of the run.
    let last = run.records.last().unwrap();
    assert!(!last.zones["living_room"].valve_on);
    assert!(!last.heat_request);
    assert_eq!(last.secondary_mode, Some(SecondaryMode::Summer));
    assert_eq!(last.zones["living_room"].duty_cycle, Some(0.0));

    // Sensors delivered every tick, so health stays clean throughout.
    assert_eq!(last.status, HealthStatus::Normal);
    assert!(run
        .records
        .iter()
        .all(|r| r.zones["living_room"].status != HealthStatus::FailSafe));
}

#[test]
fn hot_water_diverts_into_the_flush_loop() {
    let mut hallway = ZoneConfig::new("hallway");
    hallway.circuit = CircuitType::Flush;
    let mut scenario = scenario(vec![ZoneConfig::new("living_room"), hallway], 9000.0);
    scenario.controller.flush_enabled = true;
    scenario
        .temperatures
        .insert("living_room".to_string(), flat(22.5));
    scenario
        .temperatures
        .insert("hallway".to_string(), flat(23.0));
    scenario.dhw_intervals = vec![Interval {
        start_s: 3600.0,
        end_s: 5400.0,
    }];

    let run = run_scenario(&scenario, &SimOptions::default()).unwrap();

    // Warm house: no regular circuit runs and the boiler stays off for
    // the whole run.
    assert!(run.records.iter().all(|r| !r.heat_request));
    assert!(run
        .records
        .iter()
        .all(|r| !r.zones["living_room"].valve_on));

    // The flush loop opens with hot-water production, runs through the
    // tail window after it ends, then closes.
    assert!(!record_at(&run, 3540.0).zones["hallway"].valve_on);
    let during = record_at(&run, 3600.0);
    assert!(during.dhw_active);
    assert!(during.flush_active);
    assert!(during.zones["hallway"].valve_on);

    let tail = record_at(&run, 5820.0);
    assert!(!tail.dhw_active);
    assert!(tail.flush_active);
    assert!(tail.zones["hallway"].valve_on);

    let after = record_at(&run, 5880.0);
    assert!(!after.flush_active);
    assert!(!after.zones["hallway"].valve_on);
}

#[test]
fn operator_events_steer_the_run() {
    let mut scenario = scenario(vec![ZoneConfig::new("living_room")], 10800.0);
    scenario
        .temperatures
        .insert("living_room".to_string(), flat(20.0));
    scenario.events = vec![
        ScenarioEvent {
            at_s: 3600.0,
            action: ScenarioAction::SetSetpoint {
                zone: "living_room".to_string(),
                value_c: 16.0,
            },
        },
        ScenarioEvent {
            at_s: 7200.0,
            action: ScenarioAction::SetMode(OperationMode::AllOff),
        },
    ];

    let run = run_scenario(&scenario, &SimOptions::default()).unwrap();

    // Below setpoint the zone runs its quota.
    assert!(record_at(&run, 3540.0).zones["living_room"].valve_on);
    assert_eq!(record_at(&run, 3540.0).mode, OperationMode::Auto);

    // Dropping the setpoint below the room temperature closes the valve
    // on the very tick the event applies.
    assert!(!record_at(&run, 3600.0).zones["living_room"].valve_on);

    // The mode change takes over at its scheduled time.
    let parked = record_at(&run, 7200.0);
    assert_eq!(parked.mode, OperationMode::AllOff);
    assert!(!parked.zones["living_room"].valve_on);
    assert!(!parked.heat_request);
    let last = run.records.last().unwrap();
    assert_eq!(last.mode, OperationMode::AllOff);
}

#[test]
fn identical_runs_produce_identical_records() {
    let mut scenario = scenario(vec![ZoneConfig::new("living_room")], 1800.0);
    scenario
        .temperatures
        .insert("living_room".to_string(), flat(18.0));

    let options = SimOptions::default();
    let first = run_scenario(&scenario, &options).unwrap();
    let second = run_scenario(&scenario, &options).unwrap();
    assert_eq!(first.manifest, second.manifest);
    assert_eq!(first, second);
}

#[test]
fn yaml_scenario_runs_end_to_end() {
    let yaml = "\
name: yaml_smoke
start_time: \"2026-01-18T00:00:00Z\"
duration_s: 600
controller:
  name: house
  zones:
    - id: living_room
      setpoint_c: 22.0
temperatures:
  living_room:
    - { at_s: 0, value_c: 18.0 }
";
    let path = temp_path("scenario", "yaml");
    fs::write(&path, yaml).unwrap();

    let scenario = load_scenario(&path).unwrap();
    assert_eq!(scenario.name, "yaml_smoke");
    let run = run_scenario(&scenario, &SimOptions::default()).unwrap();
    assert_eq!(run.manifest.scenario_name, "yaml_smoke");
    assert_eq!(run.manifest.ticks, 10);
    assert!(run.records.last().unwrap().zones["living_room"].valve_on);

    let _ = fs::remove_file(&path);
}
