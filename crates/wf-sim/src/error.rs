//! Error types for the simulation layer.

use thiserror::Error;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur while loading or running a scenario
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid simulation argument
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Scenario definition is inconsistent
    #[error("Scenario error: {what}")]
    Scenario { what: String },

    /// Controller rejected a scenario action
    #[error(transparent)]
    Engine(#[from] wf_engine::EngineError),

    /// I/O error reading a scenario file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error in a scenario file
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
