use thiserror::Error;

use crate::config::ValidationError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown zone: {id}")]
    UnknownZone { id: String },

    #[error("Unknown preset: {name}")]
    UnknownPreset { name: String },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Control(#[from] wf_controls::ControlError),
}
