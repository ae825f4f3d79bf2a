//! Zone and controller health tracking.
//!
//! Every tick each zone either succeeds (all inputs served) or fails.
//! Failures are tolerated for a while, then the zone falls back to a
//! safe state. How long "a while" is depends on whether the zone has
//! ever worked: a zone that never produced a good tick gets the short
//! initializing timeout, a proven zone gets the long fail-safe timeout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wf_core::seconds_between;

use crate::config::TimingConfig;

/// Health state shared by zones and the controller aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No successful update yet.
    Initializing,
    Normal,
    /// Recent failures, still operating on last known data.
    Degraded,
    /// Failures outlasted the timeout; the zone valve is forced off.
    FailSafe,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Initializing => "initializing",
            HealthStatus::Normal => "normal",
            HealthStatus::Degraded => "degraded",
            HealthStatus::FailSafe => "fail_safe",
        }
    }

    pub fn is_fail_safe(self) -> bool {
        self == HealthStatus::FailSafe
    }
}

/// Status change produced by a health update, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthStatus,
    pub to: HealthStatus,
}

/// Per-zone health bookkeeping.
#[derive(Debug, Clone)]
pub struct ZoneHealth {
    status: HealthStatus,
    last_successful_update: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    started_at: DateTime<Utc>,
}

impl ZoneHealth {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus::Initializing,
            last_successful_update: None,
            consecutive_failures: 0,
            started_at: now,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn last_successful_update(&self) -> Option<DateTime<Utc>> {
        self.last_successful_update
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Reinstate state carried over from a snapshot.
    pub fn restore(&mut self, status: HealthStatus, last_success: Option<DateTime<Utc>>) {
        self.status = status;
        self.last_successful_update = last_success;
    }

    /// Record a fully successful tick.
    pub fn record_success(&mut self, now: DateTime<Utc>) -> Option<HealthTransition> {
        self.last_successful_update = Some(now);
        self.consecutive_failures = 0;
        self.transition_to(HealthStatus::Normal)
    }

    /// Record a failed tick and apply the relevant timeout.
    pub fn record_failure(
        &mut self,
        now: DateTime<Utc>,
        timing: &TimingConfig,
    ) -> Option<HealthTransition> {
        self.consecutive_failures += 1;

        let (reference, timeout_s) = match self.last_successful_update {
            Some(last) => (last, timing.fail_safe_timeout_s),
            None => (self.started_at, timing.initializing_timeout_s),
        };

        if seconds_between(reference, now) > timeout_s {
            return self.transition_to(HealthStatus::FailSafe);
        }

        if self.status == HealthStatus::Normal {
            return self.transition_to(HealthStatus::Degraded);
        }

        None
    }

    fn transition_to(&mut self, to: HealthStatus) -> Option<HealthTransition> {
        if self.status == to {
            return None;
        }
        let from = self.status;
        self.status = to;
        Some(HealthTransition { from, to })
    }
}

/// Controller-level failure bookkeeping.
#[derive(Debug, Clone)]
pub struct ControllerHealth {
    status: HealthStatus,
    consecutive_failures: u32,
    notification_raised: bool,
}

impl ControllerHealth {
    pub fn new() -> Self {
        Self {
            status: HealthStatus::Initializing,
            consecutive_failures: 0,
            notification_raised: false,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn notification_raised(&self) -> bool {
        self.notification_raised
    }

    /// Track one tick's outcome. Returns true when the notification
    /// flag newly raises.
    pub fn record_tick(&mut self, any_failure: bool, notification_threshold: u32) -> bool {
        if any_failure {
            self.consecutive_failures += 1;
            if !self.notification_raised && self.consecutive_failures >= notification_threshold {
                self.notification_raised = true;
                return true;
            }
        } else {
            self.consecutive_failures = 0;
            self.notification_raised = false;
        }
        false
    }

    pub fn set_status(&mut self, status: HealthStatus) -> Option<HealthTransition> {
        if self.status == status {
            return None;
        }
        let from = self.status;
        self.status = status;
        Some(HealthTransition { from, to: status })
    }
}

impl Default for ControllerHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold per-zone statuses into the controller status.
///
/// One broken zone among working zones degrades the controller; only a
/// controller with every zone in fail-safe is itself fail-safe.
pub fn aggregate_status(statuses: &[HealthStatus]) -> HealthStatus {
    if statuses.is_empty() {
        return HealthStatus::Initializing;
    }
    let fail_safe = statuses.iter().filter(|s| s.is_fail_safe()).count();
    if fail_safe == statuses.len() {
        return HealthStatus::FailSafe;
    }
    let degraded = statuses
        .iter()
        .filter(|s| **s == HealthStatus::Degraded)
        .count();
    if degraded > 0 || fail_safe > 0 {
        return HealthStatus::Degraded;
    }
    if statuses.contains(&HealthStatus::Normal) {
        HealthStatus::Normal
    } else {
        HealthStatus::Initializing
    }
}
