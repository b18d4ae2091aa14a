//! In-memory actuator recording every call

use super::Actuator;
use crate::error::{Error, Result};
use crate::ptz_controller::{AimCommand, PtzPose};
use futures::future::BoxFuture;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    GetPose,
    SetPose(AimCommand),
    GotoPreset(u64),
    Snapshot,
}

pub struct RecordingActuator {
    pose: Mutex<PtzPose>,
    calls: Mutex<Vec<ActuatorCall>>,
    fail_get_pose: Mutex<bool>,
    fail_snapshot: Mutex<bool>,
    fail_set_pose: Mutex<bool>,
    get_pose_delay: Mutex<Option<Duration>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::with_pose(PtzPose::new(0.0, 0.0, 1.0))
    }

    pub fn with_pose(pose: PtzPose) -> Self {
        Self {
            pose: Mutex::new(pose),
            calls: Mutex::new(Vec::new()),
            fail_get_pose: Mutex::new(false),
            fail_snapshot: Mutex::new(false),
            fail_set_pose: Mutex::new(false),
            get_pose_delay: Mutex::new(None),
        }
    }

    pub fn set_current(&self, pose: PtzPose) {
        *self.pose.lock().unwrap() = pose;
    }

    pub fn fail_get_pose(&self, fail: bool) {
        *self.fail_get_pose.lock().unwrap() = fail;
    }

    pub fn fail_set_pose(&self, fail: bool) {
        *self.fail_set_pose.lock().unwrap() = fail;
    }

    pub fn fail_snapshot(&self, fail: bool) {
        *self.fail_snapshot.lock().unwrap() = fail;
    }

    /// Make every `get_pose` take `delay` before answering
    pub fn slow_get_pose(&self, delay: Duration) {
        *self.get_pose_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_poses(&self) -> Vec<AimCommand> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ActuatorCall::SetPose(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn presets(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ActuatorCall::GotoPreset(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ActuatorCall::Snapshot))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: ActuatorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Actuator for RecordingActuator {
    fn get_pose(&self) -> BoxFuture<'_, Result<PtzPose>> {
        Box::pin(async move {
            self.record(ActuatorCall::GetPose);
            let delay = *self.get_pose_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *self.fail_get_pose.lock().unwrap() {
                return Err(Error::actuator("mock", "get pose failed"));
            }
            Ok(*self.pose.lock().unwrap())
        })
    }

    fn set_pose(&self, command: AimCommand) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(ActuatorCall::SetPose(command));
            if *self.fail_set_pose.lock().unwrap() {
                return Err(Error::actuator("mock", "set pose failed"));
            }
            let mut pose = self.pose.lock().unwrap();
            if let Some((pan, tilt)) = command.pan_tilt() {
                pose.pan = pan;
                pose.tilt = tilt;
            }
            if let Some(zoom) = command.zoom {
                pose.zoom = zoom;
            }
            Ok(())
        })
    }

    fn goto_preset(&self, preset: u64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.record(ActuatorCall::GotoPreset(preset));
            Ok(())
        })
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            self.record(ActuatorCall::Snapshot);
            if *self.fail_snapshot.lock().unwrap() {
                return Err(Error::actuator("mock", "snapshot failed"));
            }
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        })
    }
}
