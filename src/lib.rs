//! PTZ Tracker Library
//!
//! Points roadside PTZ cameras at a vehicle selected by an operator, using
//! the vehicle positions reported by a V2X sensor-fusion feed, and captures
//! snapshots of nearby traffic events.
//!
//! ## Architecture (9 Components)
//!
//! 1. ConfigStore - Fleet configuration file, validated camera profiles
//! 2. Geo - UTM projection of feed coordinates
//! 3. PtzController - Aim geometry, PID smoothing, AimController
//! 4. CameraDriver - Actuator capability, brand registry, vendor drivers
//! 5. V2xFeed - Vehicle and traffic event wire types
//! 6. Tracking - Per-camera state machine and dispatch worker
//! 7. Transport - MQTT commands/status/events, image upload
//! 8. CameraFleet - Camera registration and message routing
//! 9. Error - Crate error type
//!
//! ## Design Principles
//!
//! - Cameras are independent: one worker, one queue, no shared mutable state
//! - Vendor protocols stay behind the `Actuator` trait
//! - Configuration is immutable once loaded

pub mod camera_driver;
pub mod camera_fleet;
pub mod config_store;
pub mod error;
pub mod geo;
pub mod ptz_controller;
pub mod tracking;
pub mod transport;
pub mod v2x_feed;

pub use error::{Error, Result};
