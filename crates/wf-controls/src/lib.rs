//! wf-controls: pure signal primitives for the warmflow engine.
//!
//! # Architecture
//!
//! Three small building blocks, each a pure function of its inputs:
//!
//! - [`PidController`]: temperature error -> duty cycle in percent
//! - [`EmaFilter`]: raw probe readings -> smoothed temperature
//! - [`DisplayRounding`]: smoothed temperature -> flicker-free display
//!
//! # Design Principles
//!
//! - No clocks: the caller supplies `dt_s`; `dt_s <= 0` never advances
//!   state.
//! - No hidden state: regulators own gains, callers own snapshots.
//!   Everything needed to resume after a restart is in [`PidState`].
//! - Validated construction: bad parameters fail at build time with
//!   [`ControlError::InvalidArg`], not at run time.

pub mod display;
pub mod ema;
pub mod error;
pub mod pid;

pub use display::DisplayRounding;
pub use ema::EmaFilter;
pub use error::{ControlError, ControlResult};
pub use pid::{PidController, PidState};
