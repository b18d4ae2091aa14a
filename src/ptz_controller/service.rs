//! AimController
//!
//! Owns one camera's actuator handle and the three per-axis feedback
//! controllers. Turns planar target positions into pose commands.

use super::geometry::AimGeometry;
use super::pid::{FeedbackController, PidState};
use super::types::*;
use crate::camera_driver::Actuator;
use crate::config_store::{AimOverrides, CameraProfile, PidGains};
use crate::error::Result;
use crate::geo::{PlanarPoint, Position3};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Mechanical settle time after a blocking preset move
pub const PRESET_SETTLE: Duration = Duration::from_secs(1);

/// Per-camera aim computation and command issue
pub struct AimController {
    profile: Arc<CameraProfile>,
    actuator: Arc<dyn Actuator>,
    pan_pid: FeedbackController,
    tilt_pid: FeedbackController,
    zoom_pid: FeedbackController,
    overrides: AimOverrides,
    /// Last pose successfully read from the actuator
    last_pose: Option<PtzPose>,
}

impl AimController {
    pub fn new(
        profile: Arc<CameraProfile>,
        actuator: Arc<dyn Actuator>,
        gains: PidGains,
        overrides: AimOverrides,
    ) -> Self {
        Self {
            profile,
            actuator,
            pan_pid: FeedbackController::new(gains),
            tilt_pid: FeedbackController::new(gains),
            zoom_pid: FeedbackController::new(gains),
            overrides,
            last_pose: None,
        }
    }

    pub fn profile(&self) -> &CameraProfile {
        &self.profile
    }

    pub fn shared_profile(&self) -> Arc<CameraProfile> {
        self.profile.clone()
    }

    pub fn pid_states(&self) -> [&PidState; 3] {
        [self.pan_pid.state(), self.tilt_pid.state(), self.zoom_pid.state()]
    }

    /// Distance from the mount, negative when the target approaches
    pub fn signed_distance(&self, target: PlanarPoint, velocity: (f64, f64)) -> f64 {
        let (dx, dy) = target.offset_from(self.profile.home.planar());
        let distance = dx.hypot(dy);
        let heading = dx * velocity.0 + dy * velocity.1;
        if heading < 0.0 {
            -distance
        } else {
            distance
        }
    }

    /// Target height corrected for the road slope
    fn target_height(&self, z: f64, signed_distance: f64) -> f64 {
        z + signed_distance * self.profile.slope.to_radians().tan()
    }

    /// Pose needed to frame `target`, seen from the side given by the sign
    /// of `signed_distance`; pan/tilt fall back to `current` when degenerate
    pub fn compute_aim(&self, target: Position3, signed_distance: f64, current: PtzPose) -> PtzPose {
        let profile = &self.profile;
        let back_view = signed_distance < 0.0;

        let (dp, dt, max_zoom) = if back_view {
            (profile.bias.dp_back, profile.bias.dt_back, profile.zoom_back)
        } else {
            (profile.bias.dp, profile.bias.dt, profile.zoom)
        };

        let (pan, tilt) = match AimGeometry::bearing_elevation(
            target.x - profile.home.x,
            target.y - profile.home.y,
            profile.home.z - target.z,
        ) {
            Some((pan, tilt)) => (
                wrap_degrees(pan + self.overrides.pan_bias.unwrap_or(dp)),
                tilt + self.overrides.tilt_bias.unwrap_or(dt),
            ),
            None => (current.pan, current.tilt),
        };

        let zoom = (signed_distance.abs() / profile.ctrl_dist * max_zoom).clamp(1.0, max_zoom)
            + self.overrides.zoom_offset;

        PtzPose::new(pan, tilt, zoom)
    }

    /// Read the actuator pose, remembering it on success
    pub async fn current_pose(&mut self) -> Result<PtzPose> {
        let pose = self.actuator.get_pose().await?;
        self.last_pose = Some(pose);
        Ok(pose)
    }

    /// Last pose read from the actuator, if any
    pub fn last_pose(&self) -> Option<PtzPose> {
        self.last_pose
    }

    /// Absolute move; a successful write starts a new setpoint and drops the
    /// feedback history
    pub async fn move_absolute(&mut self, pose: PtzPose) -> Result<()> {
        tracing::info!(
            camera = %self.profile.sn,
            pan = pose.pan,
            tilt = pose.tilt,
            zoom = pose.zoom,
            "Absolute move"
        );
        self.actuator.set_pose(AimCommand::absolute(pose)).await?;
        self.reset_feedback();
        Ok(())
    }

    /// Feedback-smoothed move towards `target`
    ///
    /// A failed pose read skips the cycle without touching the controllers.
    pub async fn move_absolute_smoothed(
        &mut self,
        target: Position3,
        velocity: (f64, f64),
    ) -> Result<()> {
        let signed = self.signed_distance(target.planar(), velocity);
        let target = Position3::new(target.x, target.y, self.target_height(target.z, signed));

        let current = self.current_pose().await?;
        let needed = self.compute_aim(target, signed, current);

        let command = PtzPose::new(
            current.pan + self.pan_pid.calc(wrap_error(needed.pan - current.pan)),
            current.tilt + self.tilt_pid.calc(needed.tilt - current.tilt),
            current.zoom + self.zoom_pid.calc(needed.zoom - current.zoom),
        );

        tracing::debug!(
            camera = %self.profile.sn,
            needed = ?needed,
            current = ?current,
            command = ?command,
            "Smoothed correction"
        );

        self.actuator
            .set_pose(AimCommand {
                pan: Some(wrap_degrees(command.pan)),
                tilt: Some(command.tilt),
                zoom: Some(command.zoom),
            })
            .await
    }

    /// Zoom-only correction for `target`, pan/tilt untouched
    pub async fn adjust_zoom_only(&mut self, target: Position3, velocity: (f64, f64)) -> Result<()> {
        let signed = self.signed_distance(target.planar(), velocity);
        let target = Position3::new(target.x, target.y, self.target_height(target.z, signed));
        let needed = self.compute_aim(target, signed, PtzPose::default());

        tracing::debug!(camera = %self.profile.sn, zoom = needed.zoom, "Zoom correction");
        self.actuator.set_pose(AimCommand::zoom_only(needed.zoom)).await
    }

    /// Move to preset `id`; a blocking move waits for the camera to settle
    pub async fn goto_preset(&self, id: u64, blocking: bool) -> Result<()> {
        tracing::info!(camera = %self.profile.sn, preset = id, blocking, "Goto preset");
        self.actuator.goto_preset(id).await?;
        if blocking {
            sleep(PRESET_SETTLE).await;
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        self.actuator.snapshot().await
    }

    /// `(current - needed)` pan/tilt for a ground-level point, unbiased
    pub async fn calibrate(&mut self, x: f64, y: f64) -> Result<(f64, f64)> {
        let current = self.current_pose().await?;
        let (pan, tilt) = AimGeometry::solve(
            self.profile.home,
            Position3::new(x, y, 0.0),
            (current.pan, current.tilt),
        );
        Ok((current.pan - pan, current.tilt - tilt))
    }

    fn reset_feedback(&mut self) {
        self.pan_pid.reset();
        self.tilt_pid.reset();
        self.zoom_pid.reset();
    }
}
