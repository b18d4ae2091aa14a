//! V2X feed
//!
//! Vehicle participant and traffic event batches from the roadside
//! sensor-fusion unit, decoded from JSON payloads.

mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::geo::{PlanarPoint, UtmProjection};

/// Decode a `{ "participants": [...] }` payload
pub fn decode_vehicles(payload: &[u8]) -> Result<VehicleBatch> {
    serde_json::from_slice(payload).map_err(|e| Error::Parse(format!("vehicle batch: {}", e)))
}

/// Decode a `{ "ihsTrafficEventList": [...] }` payload
pub fn decode_events(payload: &[u8]) -> Result<EventBatch> {
    serde_json::from_slice(payload).map_err(|e| Error::Parse(format!("event batch: {}", e)))
}

/// Anything located by latitude/longitude
pub trait GeoLocated {
    fn lat_lon(&self) -> (f64, f64);

    fn project(&self, projection: &UtmProjection) -> PlanarPoint {
        let (lat, lon) = self.lat_lon();
        projection.forward(lat, lon)
    }
}

impl GeoLocated for VehicleObservation {
    fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl GeoLocated for TrafficEvent {
    fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_parse_errors() {
        assert!(matches!(decode_vehicles(b"not json"), Err(Error::Parse(_))));
        assert!(matches!(decode_events(b"{\"ihsTrafficEventList\": 3}"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_empty_batches() {
        assert!(decode_vehicles(b"{}").unwrap().participants.is_empty());
        assert!(decode_events(b"{}").unwrap().ihs_traffic_event_list.is_empty());
    }
}
