//! wf-store: configuration and snapshot persistence.
//!
//! Configuration lives in YAML and is validated on every load and
//! save. Runtime snapshots live in versioned JSON so regulator state,
//! filtered temperatures, and zone health survive a restart instead of
//! re-learning the house from scratch.

pub mod migrate;
pub mod snapshot;
pub mod store;

pub use migrate::{migrate_to_latest, LATEST_VERSION};
pub use snapshot::{apply_snapshot, capture_snapshot, Snapshot, ZoneSnapshot};
pub use store::SnapshotStore;

use wf_engine::{validate_config, ControllerConfig};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] wf_engine::ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },
}

pub fn load_config(path: &std::path::Path) -> StoreResult<ControllerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ControllerConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn save_config(path: &std::path::Path, config: &ControllerConfig) -> StoreResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
