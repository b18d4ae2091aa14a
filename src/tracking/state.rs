//! Per-camera tracking state

use crate::error::{Error, Result};
use crate::v2x_feed::VehicleObservation;
use std::collections::HashMap;
use tokio::time::Instant;

/// Active focus criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    None,
    ByPlate,
    ByTrackId,
}

impl FocusMode {
    /// Wire code used by remote commands and status
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::ByPlate => 1,
            Self::ByTrackId => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::ByPlate),
            2 => Some(Self::ByTrackId),
            _ => None,
        }
    }

    /// Parse a focus target written as `plate://<plate>` or `track://<id>`
    pub fn parse_target(target: &str) -> Result<(Self, String)> {
        if let Some(plate) = target.strip_prefix("plate://") {
            if plate.is_empty() {
                return Err(Error::Validation("empty plate".to_string()));
            }
            return Ok((Self::ByPlate, plate.to_string()));
        }
        if let Some(id) = target.strip_prefix("track://") {
            let id: u64 = id
                .parse()
                .map_err(|_| Error::Validation(format!("invalid track id '{}'", id)))?;
            return Ok((Self::ByTrackId, id.to_string()));
        }
        Err(Error::Validation(format!(
            "focus must be plate://<plate> or track://<id>, got '{}'",
            target
        )))
    }
}

/// Observable phase of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    /// On the home preset with no focus
    Idle,
    /// Focus set, target not yet matched inside the control radius
    Focusing,
    Tracking,
    /// Tracking with the back-view presets already issued
    TrackingBackView,
}

/// Mutable decision state of one camera
#[derive(Debug, Clone)]
pub struct TrackingState {
    pub focus_mode: FocusMode,
    pub focus_value: String,
    pub tracking: bool,
    pub seen_back: bool,
    pub on_preset: bool,
    /// Travel direction of the road, seeded from the first nearby vehicle
    pub road_direction: (f64, f64),
    /// Matches since the last throttle reset
    pub match_counter: u64,
    pub last_control: Instant,
    pub last_snapshot: Option<Instant>,
    pub per_event_type: HashMap<u32, Instant>,
    /// Capture time of the last processed match, for redelivery detection
    pub last_matched_capture: Option<i64>,
}

impl TrackingState {
    pub fn new(now: Instant) -> Self {
        Self {
            focus_mode: FocusMode::None,
            focus_value: String::new(),
            tracking: false,
            seen_back: false,
            on_preset: true,
            road_direction: (0.0, 0.0),
            match_counter: 0,
            last_control: now,
            last_snapshot: None,
            per_event_type: HashMap::new(),
            last_matched_capture: None,
        }
    }

    pub fn phase(&self) -> TrackingPhase {
        match (self.tracking, self.seen_back, self.focus_mode) {
            (true, true, _) => TrackingPhase::TrackingBackView,
            (true, false, _) => TrackingPhase::Tracking,
            (false, _, FocusMode::None) => TrackingPhase::Idle,
            (false, _, _) => TrackingPhase::Focusing,
        }
    }

    /// Does `observation` satisfy the focus criterion
    pub fn matches(&self, observation: &VehicleObservation) -> bool {
        match self.focus_mode {
            FocusMode::None => false,
            FocusMode::ByPlate => observation.plate == self.focus_value,
            FocusMode::ByTrackId => observation.track_id.to_string() == self.focus_value,
        }
    }

    pub fn clear_focus(&mut self) {
        self.focus_mode = FocusMode::None;
        self.focus_value.clear();
        self.last_matched_capture = None;
    }
}
