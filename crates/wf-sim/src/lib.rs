//! Deterministic scenario harness for the heating controller.
//!
//! Provides:
//! - YAML scenario definitions: scripted temperatures, hot-water
//!   intervals, window openings and timed operator actions
//! - An in-memory device history that answers the controller's usage
//!   queries from the events the run itself produced
//! - A closed-loop driver that ticks a real controller through a
//!   scenario and records the resulting state
//! - Content-hashed run identifiers for reproducibility checks

// Internal modules
pub mod error;
pub mod hash;
pub mod history;
pub mod scenario;
pub mod sim;

// Re-exports for public API
pub use error::{SimError, SimResult};
pub use hash::compute_run_id;
pub use history::MemoryHistory;
pub use scenario::{
    load_scenario, Interval, ScenarioAction, ScenarioDef, ScenarioEvent, TempPoint,
};
pub use sim::{run_scenario, RunManifest, SimOptions, SimRecord, SimRun, ZoneRecord};
