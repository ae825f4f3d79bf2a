use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
