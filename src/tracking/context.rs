//! TrackingContext
//!
//! Decision engine of one camera. Consumes remote commands, vehicle and
//! traffic event batches and timer ticks, and drives its `AimController`.
//! All methods take `&mut self`; the owning worker serializes them.

use super::state::{FocusMode, TrackingPhase, TrackingState};
use crate::config_store::{CameraProfile, CorrectionMode};
use crate::geo::{PlanarPoint, Position3, UtmProjection};
use crate::ptz_controller::{AimController, PtzPose};
use crate::transport::{CameraStatus, ImageUploader, Publisher, RemoteCommand};
use crate::v2x_feed::{EventBatch, GeoLocated, TrafficEvent, VehicleBatch, VehicleObservation};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Remote commands older than this on arrival are dropped
pub const COMMAND_MAX_AGE_MS: i64 = 10_000;
/// A vehicle this close may seed the road direction
pub const ROAD_SEED_RADIUS: f64 = 100.0;
const ROAD_DIRECTION_EPSILON: f64 = 1e-4;
/// Inside this radius the back-view presets take over
pub const CLOSE_RANGE: f64 = 50.0;
/// Seconds of velocity added to the observed position
pub const LEAD_TIME: f64 = 1.5;
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(20);
pub const HOME_DELAY: Duration = Duration::from_secs(10);
/// Minimum spacing between two event snapshots
pub const SNAPSHOT_COOLDOWN: Duration = Duration::from_secs(60);
/// Minimum spacing between two snapshots of the same event type
pub const EVENT_TYPE_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Per-camera decision engine
pub struct TrackingContext {
    profile: Arc<CameraProfile>,
    aim: AimController,
    state: TrackingState,
    projection: UtmProjection,
    publisher: Option<Arc<dyn Publisher>>,
    uploader: Arc<dyn ImageUploader>,
    /// Deadlines of pending delayed home moves, never cancelled
    home_timers: VecDeque<Instant>,
}

impl TrackingContext {
    pub fn new(
        aim: AimController,
        projection: UtmProjection,
        publisher: Option<Arc<dyn Publisher>>,
        uploader: Arc<dyn ImageUploader>,
    ) -> Self {
        Self {
            profile: aim.shared_profile(),
            aim,
            state: TrackingState::new(Instant::now()),
            projection,
            publisher,
            uploader,
            home_timers: VecDeque::new(),
        }
    }

    pub fn camera(&self) -> &str {
        &self.profile.sn
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn phase(&self) -> TrackingPhase {
        self.state.phase()
    }

    /// Select a new target; the camera goes home immediately
    pub async fn set_focus(&mut self, mode: FocusMode, value: &str) {
        tracing::info!(
            camera = %self.profile.sn,
            focus_type = mode.code(),
            focus = %value,
            "Focus set"
        );

        self.state.tracking = false;
        self.state.focus_mode = mode;
        self.state.focus_value = value.to_string();
        self.state.last_matched_capture = None;

        if let Err(e) = self.aim.goto_preset(self.profile.presets.home, false).await {
            tracing::warn!(camera = %self.profile.sn, error = %e, "Home preset failed");
        }

        self.state.seen_back = false;
        self.state.on_preset = true;
    }

    /// Apply `command` as received at `now_ms` (epoch milliseconds)
    pub async fn on_remote_command_at(&mut self, command: &RemoteCommand, now_ms: i64) {
        let age_ms = now_ms - command.ts;
        if age_ms > COMMAND_MAX_AGE_MS {
            tracing::warn!(camera = %self.profile.sn, age_ms, "Dropping stale remote command");
            return;
        }

        let Some(mode) = FocusMode::from_code(command.focus_type) else {
            tracing::warn!(
                camera = %self.profile.sn,
                focus_type = command.focus_type,
                "Dropping remote command with unknown focus type"
            );
            return;
        };

        self.set_focus(mode, &command.focus).await;
    }

    /// Follow the focused vehicle in `batch`, if present
    pub async fn on_vehicle_batch(&mut self, batch: &VehicleBatch) {
        if self.state.focus_mode == FocusMode::None {
            return;
        }

        let home = self.profile.home.planar();

        for observation in &batch.participants {
            let position = observation.project(&self.projection);
            let distance = position.distance_to(home);

            self.seed_road_direction(observation, distance);

            if !self.state.matches(observation) {
                continue;
            }

            if let (Some(captured), Some(last)) =
                (observation.timestamp, self.state.last_matched_capture)
            {
                if captured <= last {
                    tracing::debug!(
                        camera = %self.profile.sn,
                        captured,
                        last,
                        "Skipping redelivered observation"
                    );
                    continue;
                }
            }
            if observation.timestamp.is_some() {
                self.state.last_matched_capture = observation.timestamp;
            }

            self.state.match_counter += 1;
            if self.state.match_counter % self.profile.ctrn != 0 {
                tracing::trace!(
                    camera = %self.profile.sn,
                    match_counter = self.state.match_counter,
                    ctrn = self.profile.ctrn,
                    "Control throttled"
                );
                return;
            }

            tracing::info!(
                camera = %self.profile.sn,
                track_id = observation.track_id,
                plate = %observation.plate,
                distance,
                "Vehicle matched"
            );

            let now = Instant::now();
            if distance < self.profile.ctrl_dist {
                self.track(observation, position, distance, now).await;
            } else {
                self.return_to_idle(now);
            }
            return;
        }
    }

    fn seed_road_direction(&mut self, observation: &VehicleObservation, distance: f64) {
        let (rx, ry) = self.state.road_direction;
        if rx.hypot(ry) < ROAD_DIRECTION_EPSILON && distance < ROAD_SEED_RADIUS {
            self.state.road_direction = observation.velocity();
            tracing::debug!(
                camera = %self.profile.sn,
                direction = ?self.state.road_direction,
                "Road direction seeded"
            );
        }
    }

    async fn track(
        &mut self,
        observation: &VehicleObservation,
        position: PlanarPoint,
        distance: f64,
        now: Instant,
    ) {
        let presets = &self.profile.presets;

        if !self.state.tracking {
            tracing::info!(camera = %self.profile.sn, "Tracking started");
            if let Err(e) = self.aim.goto_preset(presets.track_entry, true).await {
                tracing::warn!(camera = %self.profile.sn, error = %e, "Track entry preset failed");
            }
        }
        self.state.tracking = true;

        let (dx, dy) = position.offset_from(self.profile.home.planar());
        let (vx, vy) = observation.velocity();
        let moving_away = dx * vx + dy * vy > 0.0;

        if distance < CLOSE_RANGE || (moving_away && !self.state.seen_back) {
            if !self.state.seen_back {
                tracing::info!(camera = %self.profile.sn, distance, moving_away, "Switching to back view");
                for preset in &presets.back_view {
                    if let Err(e) = self.aim.goto_preset(*preset, true).await {
                        tracing::warn!(camera = %self.profile.sn, preset, error = %e, "Back view preset failed");
                    }
                }
                self.state.seen_back = true;
                self.state.match_counter = 0;
            }
        } else {
            let lead = Position3::new(position.x + LEAD_TIME * vx, position.y + LEAD_TIME * vy, 0.0);
            let result = match self.profile.correction {
                CorrectionMode::ZoomOnly => self.aim.adjust_zoom_only(lead, (vx, vy)).await,
                CorrectionMode::Smoothed => self.aim.move_absolute_smoothed(lead, (vx, vy)).await,
            };
            if let Err(e) = result {
                tracing::warn!(camera = %self.profile.sn, error = %e, "Aim correction skipped");
            }
        }

        self.state.on_preset = false;
        self.state.last_control = now;
    }

    /// Leave tracking; a home move follows after [`HOME_DELAY`]
    ///
    /// The delayed move is not cancelled if tracking resumes before it fires.
    pub fn return_to_idle(&mut self, now: Instant) {
        if self.state.tracking {
            tracing::info!(camera = %self.profile.sn, "Tracking ended, home move scheduled");
            self.home_timers.push_back(now + HOME_DELAY);
        }
        self.state.seen_back = false;
        self.state.tracking = false;
        self.state.on_preset = true;
    }

    /// Deadline of the earliest pending home move
    pub fn next_home_timer(&self) -> Option<Instant> {
        self.home_timers.front().copied()
    }

    /// Run every home move due at `now`
    pub async fn fire_due_timers(&mut self, now: Instant) {
        while let Some(deadline) = self.home_timers.front().copied() {
            if deadline > now {
                break;
            }
            self.home_timers.pop_front();
            tracing::info!(camera = %self.profile.sn, "Delayed home move");
            if let Err(e) = self.aim.goto_preset(self.profile.presets.home, true).await {
                tracing::warn!(camera = %self.profile.sn, error = %e, "Home preset failed");
            }
        }
    }

    /// Reset to idle after [`IDLE_TIMEOUT`] without control while off-preset
    pub fn idle_watchdog(&mut self, now: Instant) {
        if now.duration_since(self.state.last_control) > IDLE_TIMEOUT && !self.state.on_preset {
            tracing::info!(camera = %self.profile.sn, "No control for too long, resetting to idle");
            self.return_to_idle(now);
            self.state.clear_focus();
            self.state.match_counter = 0;
        }
    }

    /// Snapshot and publish the first fresh, nearby traffic event
    pub async fn on_traffic_event_batch(&mut self, batch: &EventBatch) {
        if self.state.tracking {
            return;
        }
        let Some(publisher) = self.publisher.clone() else {
            return;
        };
        if batch.ihs_traffic_event_list.is_empty() {
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.state.last_snapshot {
            if now.duration_since(last) < SNAPSHOT_COOLDOWN {
                tracing::debug!(camera = %self.profile.sn, "Event batch inside snapshot cooldown");
                return;
            }
        }

        let home = self.profile.home.planar();
        let Some(event) = batch
            .ihs_traffic_event_list
            .iter()
            .find(|event| self.is_reportable(event, home, now))
        else {
            tracing::debug!(camera = %self.profile.sn, "No reportable event in batch");
            return;
        };

        let (dx, dy) = event.project(&self.projection).offset_from(home);
        let (rx, ry) = self.state.road_direction;
        let preset = if dx * rx + dy * ry >= 0.0 {
            self.profile.presets.event_oncoming
        } else {
            self.profile.presets.event_departing
        };

        tracing::info!(
            camera = %self.profile.sn,
            event_type = event.event_type,
            preset,
            "Capturing traffic event"
        );

        if let Err(e) = self.aim.goto_preset(preset, true).await {
            tracing::warn!(camera = %self.profile.sn, preset, error = %e, "Event preset failed");
        }

        let image = match self.aim.snapshot().await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(camera = %self.profile.sn, error = %e, "Event snapshot failed");
                return;
            }
        };

        let url = match self.uploader.upload(image).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(camera = %self.profile.sn, error = %e, "Event image upload failed");
                return;
            }
        };

        if let Err(e) = publisher
            .publish_event(EventBatch::single(event.with_image(&url)))
            .await
        {
            tracing::warn!(camera = %self.profile.sn, error = %e, "Event publish failed");
        }

        self.state.last_snapshot = Some(now);
        self.state.per_event_type.insert(event.event_type, now);
    }

    fn is_reportable(&self, event: &TrafficEvent, home: PlanarPoint, now: Instant) -> bool {
        if event.project(&self.projection).distance_to(home) > self.profile.ctrl_dist {
            return false;
        }
        match self.state.per_event_type.get(&event.event_type) {
            Some(last) => now.duration_since(*last) >= EVENT_TYPE_COOLDOWN,
            None => true,
        }
    }

    /// Publish the camera status, falling back to the last known pose
    pub async fn publish_status(&mut self) {
        let Some(publisher) = self.publisher.clone() else {
            return;
        };

        let pose = match self.aim.current_pose().await {
            Ok(pose) => pose,
            Err(e) => {
                tracing::debug!(camera = %self.profile.sn, error = %e, "Pose read failed, reporting last known");
                self.aim.last_pose().unwrap_or_else(|| PtzPose::new(0.0, 0.0, 1.0))
            }
        };

        let status = CameraStatus {
            device_serial: self.profile.sn.clone(),
            focus_type: self.state.focus_mode.code(),
            focus: self.state.focus_value.clone(),
            tracking: u8::from(self.state.tracking),
            p: pose.pan,
            t: pose.tilt,
            z: pose.zoom,
            ts: chrono::Utc::now().timestamp_millis(),
        };

        if let Err(e) = publisher.publish_status(status).await {
            tracing::warn!(camera = %self.profile.sn, error = %e, "Status publish failed");
        }
    }
}
