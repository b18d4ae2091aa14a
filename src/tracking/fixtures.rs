//! Shared bench for tracking tests

use super::{FocusMode, TrackingContext};
use crate::camera_driver::mock::RecordingActuator;
use crate::config_store::{AimOverrides, CameraProfile, CorrectionMode, PidGains, PresetPlan, ViewBias};
use crate::geo::{Position3, UtmProjection};
use crate::ptz_controller::AimController;
use crate::transport::mock::{RecordingPublisher, StubUploader};
use crate::transport::Publisher;
use crate::v2x_feed::{EventBatch, TrafficEvent, VehicleBatch, VehicleObservation};
use std::sync::Arc;

pub const LAT0: f64 = 39.0;
pub const LON0: f64 = 117.0;

pub struct Bench {
    pub ctx: TrackingContext,
    pub actuator: Arc<RecordingActuator>,
    pub publisher: Arc<RecordingPublisher>,
    pub uploader: Arc<StubUploader>,
}

pub fn projection() -> UtmProjection {
    UtmProjection::fixed(50)
}

/// Camera mounted at (LAT0, LON0), 100 m control radius, max zoom 20
pub fn profile(ctrn: u64, correction: CorrectionMode) -> CameraProfile {
    let home = projection().forward(LAT0, LON0);
    CameraProfile {
        name: "bench".to_string(),
        sn: "CAM1".to_string(),
        brand: "mock".to_string(),
        addr: "127.0.0.1".to_string(),
        home: Position3::new(home.x, home.y, 0.0),
        bias: ViewBias {
            dp: 0.0,
            dt: 0.0,
            dp_back: 0.0,
            dt_back: 0.0,
        },
        zoom: 20.0,
        zoom_back: 20.0,
        ctrl_dist: 100.0,
        slope: 0.0,
        ctrn,
        presets: PresetPlan::with_home(1),
        correction,
    }
}

pub fn bench_with(profile: CameraProfile, with_publisher: bool) -> Bench {
    let actuator = Arc::new(RecordingActuator::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let uploader = Arc::new(StubUploader::new());
    let aim = AimController::new(
        Arc::new(profile),
        actuator.clone(),
        PidGains { p: 1.0, i: 0.0, d: 0.0 },
        AimOverrides::default(),
    );
    let ctx = TrackingContext::new(
        aim,
        projection(),
        with_publisher.then(|| publisher.clone() as Arc<dyn Publisher>),
        uploader.clone(),
    );
    Bench {
        ctx,
        actuator,
        publisher,
        uploader,
    }
}

pub fn bench(ctrn: u64) -> Bench {
    bench_with(profile(ctrn, CorrectionMode::ZoomOnly), true)
}

/// Lat/lon of a point `east`/`north` metres from the camera
pub fn offset(east: f64, north: f64) -> (f64, f64) {
    let lat = LAT0 + north / 111_034.0;
    let lon = LON0 + east / (111_320.0 * LAT0.to_radians().cos());
    (lat, lon)
}

pub fn vehicle(plate: &str, east: f64, north: f64, v: (f64, f64), ts: i64) -> VehicleObservation {
    let (latitude, longitude) = offset(east, north);
    VehicleObservation {
        track_id: 42,
        plate: plate.to_string(),
        latitude,
        longitude,
        speed_x: v.0,
        speed_y: v.1,
        timestamp: Some(ts),
    }
}

pub fn batch(observations: Vec<VehicleObservation>) -> VehicleBatch {
    VehicleBatch {
        participants: observations,
    }
}

pub fn event(event_type: u32, east: f64, north: f64) -> TrafficEvent {
    let (latitude, longitude) = offset(east, north);
    TrafficEvent {
        event_type,
        latitude,
        longitude,
        timestamp: None,
        images: Vec::new(),
        extra: serde_json::Map::new(),
    }
}

pub fn events(list: Vec<TrafficEvent>) -> EventBatch {
    EventBatch {
        ihs_traffic_event_list: list,
    }
}

pub async fn focus_plate(b: &mut Bench, plate: &str) {
    b.ctx.set_focus(FocusMode::ByPlate, plate).await;
    b.actuator.clear();
}
