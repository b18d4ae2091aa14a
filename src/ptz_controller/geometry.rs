//! Aim geometry
//!
//! Bearing/elevation from the camera mount to a target in the planar grid.
//! Pan is measured clockwise from grid north; tilt is the depression angle
//! below the mount (positive when the target is lower than the camera).

use super::types::wrap_degrees;
use crate::geo::Position3;

/// Below this distance the target is treated as coinciding with the camera
pub const DEGENERATE_DISTANCE: f64 = 1e-6;

/// Stateless pan/tilt solver
pub struct AimGeometry;

impl AimGeometry {
    /// Bearing and elevation for an offset `(dx, dy)` and height drop `dh`
    ///
    /// Returns `None` when the target sits on the camera.
    pub fn bearing_elevation(dx: f64, dy: f64, dh: f64) -> Option<(f64, f64)> {
        let horiz = dx.hypot(dy);
        let dist3d = horiz.hypot(dh);
        if horiz < DEGENERATE_DISTANCE || dist3d < DEGENERATE_DISTANCE {
            return None;
        }

        let theta = (dy / horiz).clamp(-1.0, 1.0).asin().to_degrees();
        let phi = (dh / dist3d).clamp(-1.0, 1.0).asin().to_degrees();

        let pan = if dx > 0.0 {
            90.0 - theta
        } else {
            360.0 - (90.0 - theta)
        };

        Some((wrap_degrees(pan), phi))
    }

    /// Pan/tilt needed to look from `camera` at `target`
    ///
    /// A degenerate target leaves `current` untouched.
    pub fn solve(camera: Position3, target: Position3, current: (f64, f64)) -> (f64, f64) {
        Self::bearing_elevation(target.x - camera.x, target.y - camera.y, camera.z - target.z)
            .unwrap_or(current)
    }
}
