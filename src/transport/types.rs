//! Transport wire types and topic layout

use crate::config_store::FeedTopics;
use crate::error::{Error, Result};
use crate::v2x_feed::{self, EventBatch, VehicleBatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fleet-wide command topic; a group topic is `<this>/<group_id>`
pub const COMMAND_TOPIC: &str = "/ptz/control/all";
/// Status topic prefix, followed by the camera serial
pub const STATUS_TOPIC_PREFIX: &str = "/ptz/status/";
/// Event topic prefix, followed by the device serial
pub const EVENT_TOPIC_PREFIX: &str = "/mec/algoentry/result/event/";

/// Operator command selecting the focus target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    /// 0 = none, 1 = by plate, 2 = by track id
    pub focus_type: i32,
    #[serde(default)]
    pub focus: String,
    /// Issue time, epoch milliseconds
    pub ts: i64,
    /// Restricts the command to one camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,
}

/// Periodic per-camera status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStatus {
    pub device_serial: String,
    pub focus_type: i32,
    pub focus: String,
    /// 1 while tracking, else 0
    pub tracking: u8,
    pub p: f64,
    pub t: f64,
    pub z: f64,
    /// Publish time, epoch milliseconds
    pub ts: i64,
}

impl CameraStatus {
    pub fn topic(&self) -> String {
        format!("{}{}", STATUS_TOPIC_PREFIX, self.device_serial)
    }
}

/// A decoded inbound message
#[derive(Debug, Clone)]
pub enum Inbound {
    Command(RemoteCommand),
    Vehicles(Arc<VehicleBatch>),
    Events(Arc<EventBatch>),
}

/// Topics this process subscribes to
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMap {
    pub commands: String,
    pub group_commands: Option<String>,
    pub vehicles: String,
    pub events: String,
}

impl TopicMap {
    pub fn new(group_id: Option<&str>, feed: &FeedTopics) -> Self {
        Self {
            commands: COMMAND_TOPIC.to_string(),
            group_commands: group_id
                .filter(|g| !g.is_empty())
                .map(|g| format!("{}/{}", COMMAND_TOPIC, g)),
            vehicles: feed.vehicles_topic.clone(),
            events: feed.events_topic.clone(),
        }
    }

    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = vec![self.commands.clone()];
        topics.extend(self.group_commands.clone());
        topics.push(self.vehicles.clone());
        topics.push(self.events.clone());
        topics
    }

    /// Decode a payload by the topic it arrived on; `None` for foreign topics
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<Option<Inbound>> {
        if topic == self.commands || self.group_commands.as_deref() == Some(topic) {
            let command = serde_json::from_slice(payload)
                .map_err(|e| Error::Parse(format!("remote command: {}", e)))?;
            return Ok(Some(Inbound::Command(command)));
        }
        if topic == self.vehicles {
            return Ok(Some(Inbound::Vehicles(Arc::new(v2x_feed::decode_vehicles(payload)?))));
        }
        if topic == self.events {
            return Ok(Some(Inbound::Events(Arc::new(v2x_feed::decode_events(payload)?))));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> TopicMap {
        TopicMap::new(Some("north"), &FeedTopics::default())
    }

    #[test]
    fn test_subscriptions_include_group() {
        assert_eq!(
            topics().subscriptions(),
            vec![
                "/ptz/control/all".to_string(),
                "/ptz/control/all/north".to_string(),
                "/v2x/participants".to_string(),
                "/v2x/events".to_string(),
            ]
        );
        let no_group = TopicMap::new(Some(""), &FeedTopics::default());
        assert_eq!(no_group.group_commands, None);
    }

    #[test]
    fn test_decode_command_on_group_topic() {
        let inbound = topics()
            .decode(
                "/ptz/control/all/north",
                br#"{"focus_type":1,"focus":"ABC","ts":1700000000000}"#,
            )
            .unwrap();
        match inbound {
            Some(Inbound::Command(cmd)) => {
                assert_eq!(cmd.focus_type, 1);
                assert_eq!(cmd.focus, "ABC");
                assert_eq!(cmd.device_serial, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_and_foreign() {
        assert!(matches!(
            topics().decode("/ptz/control/all", b"{\"focus\":1}"),
            Err(Error::Parse(_))
        ));
        assert!(topics().decode("/other", b"{}").unwrap().is_none());
    }

    #[test]
    fn test_status_wire_shape() {
        let status = CameraStatus {
            device_serial: "CAM1".to_string(),
            focus_type: 2,
            focus: "42".to_string(),
            tracking: 1,
            p: 90.0,
            t: 3.0,
            z: 4.0,
            ts: 1,
        };
        assert_eq!(status.topic(), "/ptz/status/CAM1");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"device_serial":"CAM1","focus_type":2,"focus":"42","tracking":1,
                               "p":90.0,"t":3.0,"z":4.0,"ts":1})
        );
    }
}
