//! V2X feed wire types
//!
//! The roadside unit publishes protobuf messages rendered as JSON, so 64-bit
//! integers may arrive either as numbers or as decimal strings.

use serde::{Deserialize, Deserializer, Serialize};

/// One fused traffic participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleObservation {
    #[serde(rename = "ptcId", default, deserialize_with = "lenient_u64")]
    pub track_id: u64,
    #[serde(default)]
    pub plate: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Velocity east component, m/s
    #[serde(rename = "speedx", default)]
    pub speed_x: f64,
    /// Velocity north component, m/s
    #[serde(rename = "speedy", default)]
    pub speed_y: f64,
    /// Capture time, epoch milliseconds
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub timestamp: Option<i64>,
}

impl VehicleObservation {
    pub fn velocity(&self) -> (f64, f64) {
        (self.speed_x, self.speed_y)
    }
}

/// `{ "participants": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleBatch {
    #[serde(default)]
    pub participants: Vec<VehicleObservation>,
}

/// One traffic incident
///
/// Unknown fields are kept so the event can be republished as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficEvent {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub event_type: u32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, deserialize_with = "lenient_opt_i64", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrafficEvent {
    /// Copy of the event whose first image is `url`
    pub fn with_image(&self, url: &str) -> Self {
        let mut event = self.clone();
        match event.images.first_mut() {
            Some(first) => *first = url.to_string(),
            None => event.images.push(url.to_string()),
        }
        event
    }
}

/// `{ "ihsTrafficEventList": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    #[serde(default)]
    pub ihs_traffic_event_list: Vec<TrafficEvent>,
}

impl EventBatch {
    pub fn single(event: TrafficEvent) -> Self {
        Self {
            ihs_traffic_event_list: vec![event],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Str(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Str(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let raw: Option<NumberOrString> = Option::deserialize(d)?;
    match raw {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected an integer")),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = lenient_opt_i64(d)?.unwrap_or(0);
    u64::try_from(value).map_err(|_| serde::de::Error::custom("expected an unsigned integer"))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = lenient_opt_i64(d)?.unwrap_or(0);
    u32::try_from(value).map_err(|_| serde::de::Error::custom("expected a 32-bit unsigned integer"))
}
