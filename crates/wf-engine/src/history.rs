//! Narrow interface to historical device state.
//!
//! The engine never talks to a recorder or database directly. The
//! caller hands in something that can answer time-weighted open-ratio
//! queries; everything else (connection handling, caching, retention)
//! stays on the caller's side of the seam.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History source unavailable: {what}")]
    Unavailable { what: String },

    #[error("History query failed: {what}")]
    QueryFailed { what: String },
}

/// Answers time-weighted averages over past device state.
pub trait HistoryProvider {
    /// Fraction of `[start, end)` the zone's valve spent on, in 0..=1.
    fn valve_open_ratio(
        &self,
        zone_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, HistoryError>;

    /// Fraction of `[start, end)` a window sensor spent open, in 0..=1.
    fn window_open_ratio(
        &self,
        sensor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, HistoryError>;
}
