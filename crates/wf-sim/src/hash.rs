//! Content-based run identifiers.

use sha2::{Digest, Sha256};

use crate::scenario::ScenarioDef;
use crate::sim::SimOptions;

/// Compute a stable identifier for a simulation run.
///
/// The id hashes the full scenario, the run options and the crate
/// version, so two runs with the same id produced the same records.
pub fn compute_run_id(scenario: &ScenarioDef, options: &SimOptions) -> String {
    let mut hasher = Sha256::new();

    let scenario_json = serde_json::to_string(scenario).unwrap_or_default();
    hasher.update(scenario_json.as_bytes());

    let options_json = serde_json::to_string(options).unwrap_or_default();
    hasher.update(options_json.as_bytes());

    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
