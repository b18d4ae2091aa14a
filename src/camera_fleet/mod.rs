//! CameraFleet - camera registration and message routing
//!
//! ## Responsibilities
//!
//! - Build one actuator, `AimController` and `TrackingContext` per configured camera
//! - Spawn a `CameraWorker` per camera
//! - Route decoded inbound messages to the camera inboxes

use crate::camera_driver::{DriverContext, DriverRegistry};
use crate::config_store::{AimOverrides, CameraProfile, FleetConfig};
use crate::error::Result;
use crate::geo::UtmProjection;
use crate::ptz_controller::AimController;
use crate::tracking::{CameraHandle, CameraMessage, CameraWorker, TrackingContext};
use crate::transport::{ImageUploader, Inbound, Publisher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Driver parameters for `profile`
pub fn driver_context(config: &FleetConfig, profile: &CameraProfile) -> DriverContext {
    DriverContext {
        camera: profile.sn.clone(),
        addr: profile.addr.clone(),
        username: config.connection.camera_username().to_string(),
        password: config.connection.camera_password().to_string(),
        max_zoom: profile.zoom.max(profile.zoom_back),
    }
}

/// Aim controller for one camera, with its driver
///
/// An unregistered brand is an error.
pub fn build_aim_controller(
    config: &FleetConfig,
    profile: &CameraProfile,
    registry: &DriverRegistry,
    overrides: AimOverrides,
) -> Result<AimController> {
    let actuator = registry.build(&profile.brand, &driver_context(config, profile))?;
    Ok(AimController::new(
        Arc::new(profile.clone()),
        actuator,
        config.pid,
        overrides,
    ))
}

/// Outbound services shared by every camera
#[derive(Clone)]
pub struct FleetServices {
    /// `None` disables status and event publication
    pub publisher: Option<Arc<dyn Publisher>>,
    pub uploader: Arc<dyn ImageUploader>,
}

/// Running set of camera workers
pub struct CameraFleet {
    handles: Vec<CameraHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl CameraFleet {
    /// Build every camera and spawn its worker
    ///
    /// Fails before spawning anything if any camera cannot be built.
    pub fn start(
        config: &FleetConfig,
        registry: &DriverRegistry,
        overrides: AimOverrides,
        services: FleetServices,
    ) -> Result<Self> {
        let projection = UtmProjection::from_config(config.utm_zone);

        let mut contexts = Vec::with_capacity(config.cameras.len());
        for profile in &config.cameras {
            let aim = build_aim_controller(config, profile, registry, overrides)?;
            contexts.push(TrackingContext::new(
                aim,
                projection,
                services.publisher.clone(),
                services.uploader.clone(),
            ));
            tracing::info!(
                camera = %profile.sn,
                name = %profile.name,
                brand = %profile.brand,
                addr = %profile.addr,
                "Camera registered"
            );
        }

        let mut handles = Vec::with_capacity(contexts.len());
        let mut tasks = Vec::with_capacity(contexts.len());
        for context in contexts {
            let (worker, handle) = CameraWorker::new(context);
            tasks.push(tokio::spawn(worker.run()));
            handles.push(handle);
        }

        tracing::info!(cameras = handles.len(), "Camera fleet started");
        Ok(Self { handles, tasks })
    }

    /// Serials of the managed cameras
    pub fn cameras(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.sn()).collect()
    }

    /// Route one inbound message; returns how many cameras accepted it
    ///
    /// A command naming a `device_serial` goes to that camera only.
    pub fn dispatch(&self, inbound: Inbound) -> usize {
        match inbound {
            Inbound::Command(command) => match command.device_serial.clone() {
                Some(sn) => {
                    let Some(handle) = self.handles.iter().find(|h| h.sn() == sn) else {
                        tracing::debug!(camera = %sn, "Command for a camera not managed here");
                        return 0;
                    };
                    usize::from(handle.deliver(CameraMessage::Command(command)))
                }
                None => self.broadcast(|| CameraMessage::Command(command.clone())),
            },
            Inbound::Vehicles(batch) => self.broadcast(|| CameraMessage::Vehicles(batch.clone())),
            Inbound::Events(batch) => self.broadcast(|| CameraMessage::Events(batch.clone())),
        }
    }

    fn broadcast(&self, message: impl Fn() -> CameraMessage) -> usize {
        self.handles
            .iter()
            .filter(|handle| handle.deliver(message()))
            .count()
    }

    /// Route messages from `inbound` until it closes, then wait for the workers
    pub async fn run(self, mut inbound: mpsc::Receiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            self.dispatch(message);
        }

        tracing::info!("Inbound channel closed, stopping camera workers");
        let Self { handles, tasks } = self;
        drop(handles);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Camera worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_driver::mock::RecordingActuator;
    use crate::camera_driver::Actuator;
    use crate::config_store::ConfigStore;
    use crate::error::Error;
    use crate::transport::mock::{RecordingPublisher, StubUploader};
    use crate::transport::RemoteCommand;
    use tokio::time::Duration;

    fn config(brand: &str) -> FleetConfig {
        let json = serde_json::json!({
            "cameras": [
                { "name": "north", "sn": "CAM-N", "brand": brand, "addr": "10.0.0.1",
                  "x": 500000.0, "y": 4316000.0, "z": 6.0, "dp": 0.0, "dt": 0.0,
                  "zoom": 20.0, "ctrl_dist": 300.0, "preset": 1, "ctrn": 1 },
                { "name": "south", "sn": "CAM-S", "brand": brand, "addr": "10.0.0.2",
                  "x": 500000.0, "y": 4315000.0, "z": 6.0, "dp": 0.0, "dt": 0.0,
                  "zoom": 20.0, "ctrl_dist": 300.0, "preset": 2, "ctrn": 1 }
            ],
            "pidConfig": { "P": 0.5, "I": 0.0, "D": 0.0 },
            "connConfig": { "mqtt_addr": "", "camera_username": "op", "camera_passward": "pw",
                            "mqtt_cloud_addr": "" },
            "utm_zone": 50
        });
        ConfigStore::from_json(&json.to_string())
            .unwrap()
            .config()
            .clone()
    }

    fn mock_driver(_ctx: &DriverContext) -> Result<Arc<dyn Actuator>> {
        Ok(Arc::new(RecordingActuator::new()))
    }

    fn registry() -> DriverRegistry {
        let mut registry = DriverRegistry::empty();
        registry.register("mock", mock_driver);
        registry
    }

    fn services(publisher: &Arc<RecordingPublisher>) -> FleetServices {
        FleetServices {
            publisher: Some(publisher.clone() as Arc<dyn Publisher>),
            uploader: Arc::new(StubUploader::new()),
        }
    }

    fn command(device_serial: Option<&str>) -> Inbound {
        Inbound::Command(RemoteCommand {
            focus_type: 1,
            focus: "ABC".to_string(),
            ts: chrono::Utc::now().timestamp_millis(),
            device_serial: device_serial.map(str::to_string),
        })
    }

    #[test]
    fn test_driver_context_uses_fleet_credentials() {
        let config = config("mock");
        let ctx = driver_context(&config, &config.cameras[0]);
        assert_eq!(ctx.camera, "CAM-N");
        assert_eq!(ctx.addr, "10.0.0.1");
        assert_eq!(ctx.username, "op");
        assert_eq!(ctx.password, "pw");
        assert_eq!(ctx.max_zoom, 20.0);
    }

    #[test]
    fn test_aim_controller_uses_fleet_gains() {
        let config = config("mock");
        let aim = build_aim_controller(&config, &config.cameras[1], &registry(), AimOverrides::default())
            .unwrap();
        assert_eq!(aim.profile().sn, "CAM-S");
    }

    #[tokio::test]
    async fn test_unknown_brand_is_fatal() {
        let publisher = Arc::new(RecordingPublisher::new());
        let result = CameraFleet::start(
            &config("acme"),
            &registry(),
            AimOverrides::default(),
            services(&publisher),
        );
        assert!(matches!(result, Err(Error::UnknownBrand(b)) if b == "acme"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_targeted_command_reaches_one_camera() {
        let publisher = Arc::new(RecordingPublisher::new());
        let fleet = CameraFleet::start(
            &config("mock"),
            &registry(),
            AimOverrides::default(),
            services(&publisher),
        )
        .unwrap();
        assert_eq!(fleet.cameras(), vec!["CAM-N", "CAM-S"]);

        assert_eq!(fleet.dispatch(command(Some("CAM-S"))), 1);
        assert_eq!(fleet.dispatch(command(Some("CAM-X"))), 0);
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let statuses = publisher.statuses();
        let last = |sn: &str| {
            statuses
                .iter()
                .rev()
                .find(|s| s.device_serial == sn)
                .cloned()
                .unwrap()
        };
        assert_eq!(last("CAM-S").focus_type, 1);
        assert_eq!(last("CAM-N").focus_type, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untargeted_messages_broadcast_and_run_drains() {
        let publisher = Arc::new(RecordingPublisher::new());
        let fleet = CameraFleet::start(
            &config("mock"),
            &registry(),
            AimOverrides::default(),
            services(&publisher),
        )
        .unwrap();

        assert_eq!(fleet.dispatch(command(None)), 2);

        let (tx, rx) = mpsc::channel(4);
        let runner = tokio::spawn(fleet.run(rx));
        tx.send(Inbound::Vehicles(Arc::default())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(tx);
        runner.await.unwrap();

        let statuses = publisher.statuses();
        for sn in ["CAM-N", "CAM-S"] {
            let last = statuses.iter().rev().find(|s| s.device_serial == sn).unwrap();
            assert_eq!(last.focus_type, 1);
        }
    }
}
