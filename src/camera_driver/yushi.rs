//! YuShi (Uniview) LAPI driver
//!
//! LAPI is a JSON-over-HTTP API protected by digest authentication.
//! Pan/tilt and zoom live behind separate endpoints and are written separately.

use super::{with_retries, Actuator, DigestClient, DriverContext, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::ptz_controller::{AimCommand, PtzPose};
use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ABSOLUTE_MOVE: &str = "/LAPI/V1.0/Channels/0/PTZ/AbsoluteMove";
const ABSOLUTE_ZOOM: &str = "/LAPI/V1.0/Channels/0/PTZ/AbsoluteZoom";
const SNAPSHOT: &str = "/LAPI/V1.0/Channels/0/Media/Video/Streams/0/Snapshot";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LapiEnvelope<T> {
    response: LapiResponse<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LapiResponse<T> {
    data: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PanTiltData {
    longitude: f64,
    latitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ZoomData {
    zoom_ratio: f64,
}

/// LAPI client for one YuShi dome camera
pub struct YushiLapiClient {
    camera: String,
    base_url: String,
    http: DigestClient,
}

impl YushiLapiClient {
    pub fn new(ctx: &DriverContext) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = if ctx.addr.contains("://") {
            ctx.addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", ctx.addr)
        };

        Ok(Self {
            camera: ctx.camera.clone(),
            base_url,
            http: DigestClient::new(client, &ctx.username, &ctx.password),
        })
    }

    /// Registry constructor
    pub fn construct(ctx: &DriverContext) -> Result<Arc<dyn Actuator>> {
        Ok(Arc::new(Self::new(ctx)?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self.http.send(Method::GET, &self.url(path), None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::actuator(
                &self.camera,
                format!("GET {} returned {}", path, status),
            ));
        }
        let envelope: LapiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("{}: {}", path, e)))?;
        Ok(envelope.response.data)
    }

    async fn put(&self, path: &str, body: Option<String>) -> Result<()> {
        let response = self
            .http
            .send(
                Method::PUT,
                &self.url(path),
                body.as_deref().map(|b| (b, "text/plain")),
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::actuator(
                &self.camera,
                format!("PUT {} returned {}", path, status),
            ));
        }
        Ok(())
    }

    async fn read_pose(&self) -> Result<PtzPose> {
        let pt: PanTiltData = self.get_json(ABSOLUTE_MOVE).await?;
        let zoom: ZoomData = self.get_json(ABSOLUTE_ZOOM).await?;
        Ok(PtzPose::new(pt.longitude, pt.latitude, zoom.zoom_ratio))
    }

    async fn write_pose(&self, command: AimCommand) -> Result<()> {
        tracing::info!(
            camera = %self.camera,
            pan = ?command.pan,
            tilt = ?command.tilt,
            zoom = ?command.zoom,
            "Setting absolute pose"
        );

        if let Some((pan, tilt)) = command.pan_tilt() {
            let body = serde_json::to_string(&PanTiltData {
                longitude: pan,
                latitude: tilt,
            })?;
            with_retries(&self.camera, "set pan/tilt", || {
                self.put(ABSOLUTE_MOVE, Some(body.clone()))
            })
            .await?;
        }

        if let Some(zoom) = command.zoom {
            let body = serde_json::to_string(&ZoomData { zoom_ratio: zoom })?;
            with_retries(&self.camera, "set zoom", || {
                self.put(ABSOLUTE_ZOOM, Some(body.clone()))
            })
            .await?;
        }

        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Vec<u8>> {
        let response = self.http.send(Method::GET, &self.url(SNAPSHOT), None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::actuator(
                &self.camera,
                format!("snapshot returned {}", status),
            ));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl Actuator for YushiLapiClient {
    fn get_pose(&self) -> BoxFuture<'_, Result<PtzPose>> {
        Box::pin(async move { with_retries(&self.camera, "get pose", || self.read_pose()).await })
    }

    fn set_pose(&self, command: AimCommand) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.write_pose(command))
    }

    fn goto_preset(&self, preset: u64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tracing::info!(camera = %self.camera, preset, "Moving to preset");
            let path = format!("/LAPI/V1.0/Channels/0/PTZ/Presets/{}/Goto", preset);
            with_retries(&self.camera, "goto preset", || self.put(&path, None)).await
        })
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            with_retries(&self.camera, "snapshot", || self.fetch_snapshot()).await
        })
    }
}
