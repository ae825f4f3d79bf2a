//! In-memory device history for simulations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use wf_core::seconds_between;
use wf_engine::{HistoryError, HistoryProvider};

/// Event-sourced device history.
///
/// The simulator appends valve and window state changes as they happen,
/// and the controller queries time-weighted open ratios over arbitrary
/// windows. This is the same contract a recorder database serves in a
/// live deployment, backed by a plain event list.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    valve_events: HashMap<String, Vec<(DateTime<Utc>, bool)>>,
    window_events: HashMap<String, Vec<(DateTime<Utc>, bool)>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a valve state change for a zone.
    pub fn record_valve(&mut self, zone_id: &str, at: DateTime<Utc>, on: bool) {
        push_event(
            self.valve_events.entry(zone_id.to_string()).or_default(),
            at,
            on,
        );
    }

    /// Record a window sensor state change.
    pub fn record_window(&mut self, sensor_id: &str, at: DateTime<Utc>, open: bool) {
        push_event(
            self.window_events.entry(sensor_id.to_string()).or_default(),
            at,
            open,
        );
    }
}

fn push_event(events: &mut Vec<(DateTime<Utc>, bool)>, at: DateTime<Utc>, value: bool) {
    events.push((at, value));
    let n = events.len();
    if n > 1 && events[n - 2].0 > at {
        events.sort_by_key(|(at, _)| *at);
    }
}

/// Time-weighted fraction of `[start, end)` the device spent on.
///
/// The state entering the window comes from the last event at or before
/// `start`; a device with no recorded events reads as off.
fn open_ratio(events: &[(DateTime<Utc>, bool)], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let total_s = seconds_between(start, end);
    if total_s <= 0.0 {
        return 0.0;
    }

    let mut state = events
        .iter()
        .take_while(|(at, _)| *at <= start)
        .last()
        .map(|(_, on)| *on)
        .unwrap_or(false);
    let mut cursor = start;
    let mut open_s = 0.0;

    for (at, on) in events.iter().filter(|(at, _)| *at > start && *at < end) {
        if state {
            open_s += seconds_between(cursor, *at);
        }
        cursor = *at;
        state = *on;
    }
    if state {
        open_s += seconds_between(cursor, end);
    }

    (open_s / total_s).clamp(0.0, 1.0)
}

impl HistoryProvider for MemoryHistory {
    fn valve_open_ratio(
        &self,
        zone_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, HistoryError> {
        let events = self
            .valve_events
            .get(zone_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(open_ratio(events, start, end))
    }

    fn window_open_ratio(
        &self,
        sensor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, HistoryError> {
        let events = self
            .window_events
            .get(sensor_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(open_ratio(events, start, end))
    }
}
