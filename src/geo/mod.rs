//! Planar projection
//!
//! Converts WGS84 latitude/longitude into the UTM grid the camera mount
//! positions are surveyed in, so distances and bearings are plain metres.

mod utm;

pub use utm::UtmProjection;

/// A point in the local planar grid (metres)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Vector from `origin` to this point
    pub fn offset_from(&self, origin: PlanarPoint) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// A planar point with height (metres)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn planar(&self) -> PlanarPoint {
        PlanarPoint::new(self.x, self.y)
    }
}
