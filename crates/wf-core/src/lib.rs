//! wf-core: stable foundation for warmflow.
//!
//! Contains:
//! - ids (compact zone identifiers)
//! - period (observation-period clock math)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod period;

// Re-exports: nice ergonomics for downstream crates
pub use error::{WfError, WfResult};
pub use ids::*;
pub use period::*;
