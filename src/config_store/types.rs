//! ConfigStore data types
//!
//! Wire shape of the fleet configuration file and the validated,
//! immutable profiles built from it.

use crate::error::{Error, Result};
use crate::geo::Position3;
use serde::{Deserialize, Serialize};

/// Default MQTT broker when `connConfig.mqtt_addr` is empty
pub const DEFAULT_MQTT_ADDR: &str = "tcp://172.18.32.4:1883";
/// Default upload host when `connConfig.mqtt_cloud_addr` is empty
pub const DEFAULT_CLOUD_ADDR: &str = "172.18.32.32";

/// How the tracker corrects the aim while a target is inside the control radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// Zoom-only command from the lead-predicted position
    #[default]
    ZoomOnly,
    /// Full pan/tilt/zoom through the feedback controllers
    Smoothed,
}

/// Preset ids used by the tracking state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetPlan {
    /// Idle/home preset (`preset` in the camera entry)
    #[serde(skip)]
    pub home: u64,
    /// First close-in preset commanded when tracking starts
    #[serde(default = "default_track_entry")]
    pub track_entry: u64,
    /// Presets commanded once to cover the target from behind
    #[serde(default = "default_back_view")]
    pub back_view: Vec<u64>,
    /// Event preset when the event lies along the road direction
    #[serde(default = "default_event_oncoming")]
    pub event_oncoming: u64,
    /// Event preset when the event lies against the road direction
    #[serde(default = "default_event_departing")]
    pub event_departing: u64,
}

fn default_track_entry() -> u64 {
    100
}

fn default_back_view() -> Vec<u64> {
    vec![101, 102]
}

fn default_event_oncoming() -> u64 {
    102
}

fn default_event_departing() -> u64 {
    7
}

impl PresetPlan {
    /// Reference preset layout around the given home preset
    pub fn with_home(home: u64) -> Self {
        Self {
            home,
            track_entry: default_track_entry(),
            back_view: default_back_view(),
            event_oncoming: default_event_oncoming(),
            event_departing: default_event_departing(),
        }
    }
}

/// Angular biases applied on top of the computed bearing/elevation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBias {
    pub dp: f64,
    pub dt: f64,
    pub dp_back: f64,
    pub dt_back: f64,
}

/// Camera entry as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct CameraEntry {
    pub name: String,
    pub sn: String,
    pub brand: String,
    pub addr: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dp: f64,
    pub dt: f64,
    pub zoom: f64,
    #[serde(default)]
    pub dp_back: Option<f64>,
    #[serde(default)]
    pub dt_back: Option<f64>,
    #[serde(default)]
    pub zoom_back: Option<f64>,
    pub ctrl_dist: f64,
    #[serde(default)]
    pub slope: f64,
    pub preset: u64,
    pub ctrn: u64,
    #[serde(default)]
    pub presets: Option<PresetPlan>,
    #[serde(default)]
    pub correction: CorrectionMode,
}

/// Validated, immutable camera profile
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProfile {
    pub name: String,
    /// Device serial, the camera's identity on every channel
    pub sn: String,
    pub brand: String,
    pub addr: String,
    /// Mount position in the planar (UTM) grid, z in metres
    pub home: Position3,
    pub bias: ViewBias,
    /// Max zoom for the forward view
    pub zoom: f64,
    /// Max zoom for the back view
    pub zoom_back: f64,
    /// Control radius in metres
    pub ctrl_dist: f64,
    /// Terrain slope in degrees along the road
    pub slope: f64,
    /// Throttle factor: command on every Nth match
    pub ctrn: u64,
    pub presets: PresetPlan,
    pub correction: CorrectionMode,
}

impl TryFrom<CameraEntry> for CameraProfile {
    type Error = Error;

    fn try_from(entry: CameraEntry) -> Result<Self> {
        let sn = entry.sn.trim().to_string();
        if sn.is_empty() {
            return Err(Error::Config(format!(
                "camera '{}' has an empty sn",
                entry.name
            )));
        }
        if entry.addr.trim().is_empty() {
            return Err(Error::Config(format!("camera {} has an empty addr", sn)));
        }
        if entry.ctrn == 0 {
            return Err(Error::Config(format!("camera {}: ctrn must be >= 1", sn)));
        }
        if !(entry.ctrl_dist.is_finite() && entry.ctrl_dist > 0.0) {
            return Err(Error::Config(format!(
                "camera {}: ctrl_dist must be positive, got {}",
                sn, entry.ctrl_dist
            )));
        }

        let zoom_back = entry.zoom_back.unwrap_or(entry.zoom);
        for (field, zoom) in [("zoom", entry.zoom), ("zoom_back", zoom_back)] {
            if !(zoom.is_finite() && zoom >= 1.0) {
                return Err(Error::Config(format!(
                    "camera {}: {} must be >= 1, got {}",
                    sn, field, zoom
                )));
            }
        }

        let finite = [entry.x, entry.y, entry.z, entry.dp, entry.dt, entry.slope];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config(format!(
                "camera {}: position and bias values must be finite",
                sn
            )));
        }

        let mut presets = entry
            .presets
            .unwrap_or_else(|| PresetPlan::with_home(entry.preset));
        presets.home = entry.preset;

        Ok(Self {
            name: entry.name,
            sn,
            brand: entry.brand,
            addr: entry.addr,
            home: Position3::new(entry.x, entry.y, entry.z),
            bias: ViewBias {
                dp: entry.dp,
                dt: entry.dt,
                dp_back: entry.dp_back.unwrap_or(entry.dp),
                dt_back: entry.dt_back.unwrap_or(entry.dt),
            },
            zoom: entry.zoom,
            zoom_back,
            ctrl_dist: entry.ctrl_dist,
            slope: entry.slope,
            ctrn: entry.ctrn,
            presets,
            correction: entry.correction,
        })
    }
}

/// Fleet-wide PID gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "I")]
    pub i: f64,
    #[serde(rename = "D")]
    pub d: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            p: 1.0,
            i: 0.0,
            d: 0.0,
        }
    }
}

/// Network identity and credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub mqtt_addr: String,
    #[serde(default)]
    pub camera_username: String,
    #[serde(default, alias = "camera_passward")]
    pub camera_password: String,
    #[serde(default)]
    pub mqtt_cloud_addr: String,
    /// Edge device serial used in the event topic
    #[serde(default)]
    pub device_sn: Option<String>,
}

impl ConnectionConfig {
    pub fn mqtt_addr(&self) -> &str {
        if self.mqtt_addr.is_empty() {
            DEFAULT_MQTT_ADDR
        } else {
            &self.mqtt_addr
        }
    }

    pub fn cloud_addr(&self) -> &str {
        if self.mqtt_cloud_addr.is_empty() {
            DEFAULT_CLOUD_ADDR
        } else {
            &self.mqtt_cloud_addr
        }
    }

    pub fn camera_username(&self) -> &str {
        if self.camera_username.is_empty() {
            "admin"
        } else {
            &self.camera_username
        }
    }

    pub fn camera_password(&self) -> &str {
        if self.camera_password.is_empty() {
            "Ab123456"
        } else {
            &self.camera_password
        }
    }

    /// Device serial from config, then `DEVICE_SN`, then "Unknown"
    pub fn device_sn(&self) -> String {
        self.device_sn
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("DEVICE_SN").ok())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Topics carrying the V2X feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedTopics {
    #[serde(default = "default_vehicles_topic")]
    pub vehicles_topic: String,
    #[serde(default = "default_events_topic")]
    pub events_topic: String,
}

fn default_vehicles_topic() -> String {
    "/v2x/participants".to_string()
}

fn default_events_topic() -> String {
    "/v2x/events".to_string()
}

impl Default for FeedTopics {
    fn default() -> Self {
        Self {
            vehicles_topic: default_vehicles_topic(),
            events_topic: default_events_topic(),
        }
    }
}

/// Config file as written on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub cameras: Vec<CameraEntry>,
    #[serde(default)]
    pub pid_config: Option<PidGains>,
    #[serde(default)]
    pub conn_config: ConnectionConfig,
    #[serde(default, rename = "group_id")]
    pub group_id: Option<String>,
    #[serde(default, rename = "utm_zone")]
    pub utm_zone: Option<u8>,
    #[serde(default)]
    pub feed: FeedTopics,
}

/// Validated fleet configuration, immutable at runtime
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub cameras: Vec<CameraProfile>,
    pub pid: PidGains,
    pub connection: ConnectionConfig,
    pub group_id: Option<String>,
    pub utm_zone: Option<u8>,
    pub feed: FeedTopics,
}

/// Manual aim overrides given on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AimOverrides {
    /// Replaces the profile's pan bias (both views)
    pub pan_bias: Option<f64>,
    /// Replaces the profile's tilt bias (both views)
    pub tilt_bias: Option<f64>,
    /// Added to every computed zoom
    pub zoom_offset: f64,
}
