//! ONVIF PTZ driver
//!
//! Absolute positioning over SOAP with WS-Security UsernameToken auth.
//! Used for Tapo/VIGI and other ONVIF Profile S domes.
//!
//! ONVIF uses normalized generic spaces; the driver maps them linearly:
//! pan `[0, 360)` <-> x `[-1, 1]`, tilt `[-90, 90]` <-> y `[-1, 1]`,
//! zoom `[1, max_zoom]` <-> `[0, 1]`.

use super::{with_retries, Actuator, DigestClient, DriverContext, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::ptz_controller::{AimCommand, PtzPose};
use base64::Engine;
use futures::future::BoxFuture;
use reqwest::{Client, Method};
use sha1::{Digest, Sha1};
use std::sync::Arc;

const PROFILE_TOKEN: &str = "profile_1";

/// ONVIF PTZ client for one camera
pub struct OnvifPtzClient {
    camera: String,
    /// Device service endpoint (e.g. http://192.168.x.x:2020/onvif/device_service)
    endpoint: String,
    username: String,
    password: String,
    max_zoom: f64,
    client: Client,
    snapshot_http: DigestClient,
}

impl OnvifPtzClient {
    pub fn new(ctx: &DriverContext) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let endpoint = if ctx.addr.contains("://") {
            ctx.addr.clone()
        } else {
            format!("http://{}/onvif/device_service", ctx.addr)
        };

        Ok(Self {
            camera: ctx.camera.clone(),
            endpoint,
            username: ctx.username.clone(),
            password: ctx.password.clone(),
            max_zoom: ctx.max_zoom,
            snapshot_http: DigestClient::new(client.clone(), &ctx.username, &ctx.password),
            client,
        })
    }

    /// Registry constructor
    pub fn construct(ctx: &DriverContext) -> Result<Arc<dyn Actuator>> {
        Ok(Arc::new(Self::new(ctx)?))
    }

    /// Service URL for `service` ("ptz", "media") next to the device service
    fn service_url(&self, service: &str) -> String {
        if self.endpoint.contains("/onvif/device_service") {
            self.endpoint
                .replace("/onvif/device_service", &format!("/onvif/{}_service", service))
        } else {
            let base = self.endpoint.trim_end_matches('/');
            match base.rfind('/') {
                Some(pos) if pos > base.find("://").map(|p| p + 2).unwrap_or(0) => {
                    format!("{}/{}_service", &base[..pos], service)
                }
                _ => format!("{}/onvif/{}_service", base, service),
            }
        }
    }

    fn zoom_to_space(&self, zoom: f64) -> f64 {
        if self.max_zoom <= 1.0 {
            return 0.0;
        }
        ((zoom - 1.0) / (self.max_zoom - 1.0)).clamp(0.0, 1.0)
    }

    fn zoom_from_space(&self, x: f64) -> f64 {
        1.0 + x.clamp(0.0, 1.0) * (self.max_zoom - 1.0).max(0.0)
    }

    fn security_header(&self) -> String {
        self.token_header(&UsernameToken::fresh())
    }

    fn token_header(&self, token: &UsernameToken) -> String {
        format!(
            r#"<s:Header>
    <Security xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd"
              s:mustUnderstand="true">
      <UsernameToken>
        <Username>{}</Username>
        <Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{}</Password>
        <Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{}</Nonce>
        <Created xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">{}</Created>
      </UsernameToken>
    </Security>
  </s:Header>"#,
            self.username,
            token.digest(&self.password),
            token.nonce_base64(),
            token.created
        )
    }

    fn envelope(&self, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
            xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl"
            xmlns:trt="http://www.onvif.org/ver10/media/wsdl"
            xmlns:tt="http://www.onvif.org/ver10/schema">
  {}
  <s:Body>
    {}
  </s:Body>
</s:Envelope>"#,
            self.security_header(),
            body
        )
    }

    /// Body of an AbsoluteMove; `None` axes are omitted from the position
    fn absolute_move_body(&self, command: &AimCommand) -> String {
        let mut position = String::new();
        if let Some((pan, tilt)) = command.pan_tilt() {
            position.push_str(&format!(
                r#"<tt:PanTilt x="{:.4}" y="{:.4}"/>"#,
                pan_to_space(pan),
                tilt_to_space(tilt)
            ));
        }
        if let Some(zoom) = command.zoom {
            position.push_str(&format!(r#"<tt:Zoom x="{:.4}"/>"#, self.zoom_to_space(zoom)));
        }
        format!(
            r#"<tptz:AbsoluteMove>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:Position>{}</tptz:Position>
    </tptz:AbsoluteMove>"#,
            PROFILE_TOKEN, position
        )
    }

    /// Send one SOAP request to `service`, returning the response body
    async fn send_soap_request(&self, service: &str, body: &str, action: &str) -> Result<String> {
        let url = self.service_url(service);
        tracing::debug!(camera = %self.camera, url = %url, action = %action, "Sending ONVIF request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(self.envelope(body))
            .send()
            .await
            .map_err(|e| Error::Network(format!("ONVIF {} failed: {}", action, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::actuator(
                &self.camera,
                format!("ONVIF {} returned {}: {}", action, status, text),
            ));
        }
        Ok(text)
    }

    async fn read_pose(&self) -> Result<PtzPose> {
        let body = format!(
            "<tptz:GetStatus><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GetStatus>",
            PROFILE_TOKEN
        );
        let xml = self.send_soap_request("ptz", &body, "GetStatus").await?;
        parse_status_position(&xml)
            .map(|(x, y, z)| PtzPose::new(pan_from_space(x), tilt_from_space(y), self.zoom_from_space(z)))
            .ok_or_else(|| Error::Parse(format!("{}: no PTZ position in GetStatus", self.camera)))
    }

    async fn fetch_snapshot(&self) -> Result<Vec<u8>> {
        let body = format!(
            "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
            PROFILE_TOKEN
        );
        let xml = self.send_soap_request("media", &body, "GetSnapshotUri").await?;
        let uri = xml_value(&xml, "Uri")
            .map(|u| u.replace("&amp;", "&"))
            .ok_or_else(|| Error::Parse(format!("{}: no snapshot URI", self.camera)))?;

        let response = self.snapshot_http.send(Method::GET, &uri, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::actuator(&self.camera, format!("snapshot returned {}", status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl Actuator for OnvifPtzClient {
    fn get_pose(&self) -> BoxFuture<'_, Result<PtzPose>> {
        Box::pin(async move { with_retries(&self.camera, "get pose", || self.read_pose()).await })
    }

    fn set_pose(&self, command: AimCommand) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if command.pan_tilt().is_none() && command.zoom.is_none() {
                return Ok(());
            }
            let body = self.absolute_move_body(&command);
            with_retries(&self.camera, "absolute move", || async {
                self.send_soap_request("ptz", &body, "AbsoluteMove").await.map(|_| ())
            })
            .await
        })
    }

    fn goto_preset(&self, preset: u64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tracing::info!(camera = %self.camera, preset, "Moving to preset");
            let body = format!(
                "<tptz:GotoPreset><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:PresetToken>{}</tptz:PresetToken></tptz:GotoPreset>",
                PROFILE_TOKEN, preset
            );
            with_retries(&self.camera, "goto preset", || async {
                self.send_soap_request("ptz", &body, "GotoPreset").await.map(|_| ())
            })
            .await
        })
    }

    fn snapshot(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            with_retries(&self.camera, "snapshot", || self.fetch_snapshot()).await
        })
    }
}

fn pan_to_space(pan: f64) -> f64 {
    (pan / 180.0 - 1.0).clamp(-1.0, 1.0)
}

fn pan_from_space(x: f64) -> f64 {
    crate::ptz_controller::wrap_degrees((x.clamp(-1.0, 1.0) + 1.0) * 180.0)
}

fn tilt_to_space(tilt: f64) -> f64 {
    (tilt / 90.0).clamp(-1.0, 1.0)
}

fn tilt_from_space(y: f64) -> f64 {
    y.clamp(-1.0, 1.0) * 90.0
}

/// `(x, y, zoom)` of the Position block in a GetStatus response
fn parse_status_position(xml: &str) -> Option<(f64, f64, f64)> {
    let start = xml.find("Position>")?;
    let section = &xml[start..];
    let x = xml_attribute(section, "PanTilt", "x")?.parse().ok()?;
    let y = xml_attribute(section, "PanTilt", "y")?.parse().ok()?;
    let zoom = xml_attribute(section, "Zoom", "x")
        .and_then(|z| z.parse().ok())
        .unwrap_or(0.0);
    Some((x, y, zoom))
}

/// Attribute of the first `tag` element, namespace prefix ignored
fn xml_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    for pattern in [format!(":{} ", tag), format!("<{} ", tag)] {
        if let Some(tag_start) = xml.find(pattern.as_str()) {
            let after_tag = &xml[tag_start..];
            let tag_content = &after_tag[..after_tag.find('>')?];
            let attr_pattern = format!(" {}=", attr);
            let attr_start = tag_content.find(attr_pattern.as_str())?;
            let after_attr = &tag_content[attr_start + attr_pattern.len()..];
            let quote = if after_attr.starts_with('"') { '"' } else { '\'' };
            let value = after_attr.strip_prefix(quote)?;
            return Some(value[..value.find(quote)?].to_string());
        }
    }
    None
}

/// Text content of the first `tag` element, namespace prefix ignored
fn xml_value(xml: &str, tag: &str) -> Option<String> {
    for pattern in [format!(":{}>", tag), format!("<{}>", tag)] {
        if let Some(start) = xml.find(pattern.as_str()) {
            let content_start = start + pattern.len();
            let end = xml[content_start..].find("</")?;
            let value = xml[content_start..content_start + end].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// One-shot WS-Security UsernameToken material
struct UsernameToken {
    nonce: [u8; 16],
    created: String,
}

impl UsernameToken {
    fn fresh() -> Self {
        Self {
            nonce: rand::random(),
            created: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    fn nonce_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.nonce)
    }

    /// Base64(SHA1(nonce ++ created ++ password))
    fn digest(&self, password: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.nonce);
        hasher.update(self.created.as_bytes());
        hasher.update(password.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(addr: &str) -> OnvifPtzClient {
        OnvifPtzClient::new(&DriverContext {
            camera: "tapo1".to_string(),
            addr: addr.to_string(),
            username: "admin".to_string(),
            password: "testpass".to_string(),
            max_zoom: 21.0,
        })
        .unwrap()
    }

    #[test]
    fn test_service_urls() {
        let c = client("http://192.168.1.100:2020/onvif/device_service");
        assert_eq!(c.service_url("ptz"), "http://192.168.1.100:2020/onvif/ptz_service");
        assert_eq!(c.service_url("media"), "http://192.168.1.100:2020/onvif/media_service");

        let c = client("192.168.1.100:2020");
        assert_eq!(c.service_url("ptz"), "http://192.168.1.100:2020/onvif/ptz_service");
    }

    #[test]
    fn test_password_digest_known_vector() {
        let token = UsernameToken {
            nonce: std::array::from_fn(|i| i as u8),
            created: "2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(token.nonce_base64(), "AAECAwQFBgcICQoLDA0ODw==");
        assert_eq!(token.digest("secret"), "Zp5M/ztyvf9G14qXDvS2VCbwotA=");
    }

    #[test]
    fn test_each_request_gets_a_fresh_nonce() {
        let first = UsernameToken::fresh();
        let second = UsernameToken::fresh();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.digest("secret"), second.digest("secret"));

        let c = client("192.168.1.100");
        let header = c.token_header(&first);
        assert!(header.contains(&format!(">{}</Password>", first.digest(&c.password))));
        assert!(header.contains(&format!(">{}</Nonce>", first.nonce_base64())));
    }

    #[test]
    fn test_space_mapping() {
        assert_eq!(pan_to_space(0.0), -1.0);
        assert_eq!(pan_to_space(180.0), 0.0);
        assert_eq!(pan_from_space(0.5), 270.0);
        assert_eq!(pan_from_space(1.0), 0.0);
        assert_eq!(tilt_to_space(45.0), 0.5);
        assert_eq!(tilt_from_space(-1.0), -90.0);

        let c = client("192.168.1.100");
        assert_eq!(c.zoom_to_space(1.0), 0.0);
        assert_eq!(c.zoom_to_space(11.0), 0.5);
        assert_eq!(c.zoom_from_space(1.0), 21.0);
    }

    #[test]
    fn test_absolute_move_omits_missing_axes() {
        let c = client("192.168.1.100");
        let body = c.absolute_move_body(&AimCommand::zoom_only(11.0));
        assert!(!body.contains("PanTilt"));
        assert!(body.contains(r#"<tt:Zoom x="0.5000"/>"#));

        let body = c.absolute_move_body(&AimCommand::absolute(PtzPose::new(90.0, 45.0, 1.0)));
        assert!(body.contains(r#"<tt:PanTilt x="-0.5000" y="0.5000"/>"#));
    }

    #[test]
    fn test_parse_get_status() {
        let xml = r#"<s:Envelope><s:Body><tptz:GetStatusResponse><tptz:PTZStatus>
            <tt:Position><tt:PanTilt space="http://www.onvif.org/ver10/tptz/PanTiltSpaces/PositionGenericSpace" x="0.25" y="-0.1"/>
            <tt:Zoom space="http://www.onvif.org/ver10/tptz/ZoomSpaces/PositionGenericSpace" x="0.5"/></tt:Position>
            <tt:MoveStatus><tt:PanTilt>IDLE</tt:PanTilt></tt:MoveStatus>
            </tptz:PTZStatus></tptz:GetStatusResponse></s:Body></s:Envelope>"#;
        assert_eq!(parse_status_position(xml), Some((0.25, -0.1, 0.5)));
    }

    #[test]
    fn test_snapshot_uri_extraction() {
        let xml = "<trt:MediaUri><tt:Uri>http://192.168.1.100/stream/snapshot.jpg</tt:Uri></trt:MediaUri>";
        assert_eq!(
            xml_value(xml, "Uri").as_deref(),
            Some("http://192.168.1.100/stream/snapshot.jpg")
        );
    }
}
