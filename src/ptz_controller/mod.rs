//! PTZ Controller Module
//!
//! Aim computation and smoothing for one camera:
//! pose types, per-axis PID, bearing geometry and the `AimController`.

pub mod geometry;
pub mod pid;
pub mod service;
pub mod types;

pub use geometry::AimGeometry;
pub use pid::{FeedbackController, PidState};
pub use service::{AimController, PRESET_SETTLE};
pub use types::*;
