//! Tracking
//!
//! ## Responsibilities
//!
//! - Per-camera focus/tracking state machine (`TrackingContext`)
//! - Serialized per-camera dispatch with status, watchdog and delayed-home timers (`CameraWorker`)
//! - Event snapshot capture and publication

mod context;
mod state;
mod worker;

#[cfg(test)]
pub(crate) mod fixtures;

pub use context::*;
pub use state::*;
pub use worker::*;
