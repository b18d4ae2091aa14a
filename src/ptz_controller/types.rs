//! PTZ Controller type definitions

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Absolute camera pose in actuator units (degrees, zoom ratio)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PtzPose {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

impl PtzPose {
    pub fn new(pan: f64, tilt: f64, zoom: f64) -> Self {
        Self { pan, tilt, zoom }
    }
}

/// Parses `pan,tilt,zoom`; every value must lie in `[0, 360]`
impl FromStr for PtzPose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::Validation(format!("'{}' is not a number", v.trim())))
            })
            .collect::<Result<Vec<f64>, Error>>()?;

        let [pan, tilt, zoom] = values[..] else {
            return Err(Error::Validation(format!(
                "expected pan,tilt,zoom, got {} value(s)",
                values.len()
            )));
        };

        for (axis, value) in [("pan", pan), ("tilt", tilt), ("zoom", zoom)] {
            if !(0.0..=360.0).contains(&value) {
                return Err(Error::Validation(format!(
                    "{} {} outside [0, 360]",
                    axis, value
                )));
            }
        }

        Ok(Self::new(pan, tilt, zoom))
    }
}

/// Absolute set-pose command; `None` leaves that axis unchanged
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimCommand {
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub zoom: Option<f64>,
}

impl AimCommand {
    /// Command every axis
    pub fn absolute(pose: PtzPose) -> Self {
        Self {
            pan: Some(pose.pan),
            tilt: Some(pose.tilt),
            zoom: Some(pose.zoom),
        }
    }

    /// Command zoom only, pan/tilt untouched
    pub fn zoom_only(zoom: f64) -> Self {
        Self {
            pan: None,
            tilt: None,
            zoom: Some(zoom),
        }
    }

    /// Pan and tilt are moved as a pair; both must be present
    pub fn pan_tilt(&self) -> Option<(f64, f64)> {
        self.pan.zip(self.tilt)
    }
}

/// Wrap an angle into `[0, 360)`
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an angular difference into `[-180, 180)`
pub fn wrap_error(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
        assert!(wrap_degrees(-1e-18) < 360.0);
    }

    #[test]
    fn test_wrap_error_takes_short_way() {
        assert_eq!(wrap_error(358.0), -2.0);
        assert_eq!(wrap_error(-350.0), 10.0);
        assert_eq!(wrap_error(90.0), 90.0);
    }

    #[test]
    fn test_parse_pose() {
        assert_eq!("10,20.5,3".parse::<PtzPose>().unwrap(), PtzPose::new(10.0, 20.5, 3.0));
        assert_eq!(" 0, 360 ,1".parse::<PtzPose>().unwrap(), PtzPose::new(0.0, 360.0, 1.0));
        assert!(matches!("10,20".parse::<PtzPose>(), Err(Error::Validation(_))));
        assert!(matches!("10,x,3".parse::<PtzPose>(), Err(Error::Validation(_))));
        assert!(matches!("361,0,1".parse::<PtzPose>(), Err(Error::Validation(_))));
        assert!(matches!("10,-1,1".parse::<PtzPose>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_zoom_only_command() {
        let cmd = AimCommand::zoom_only(4.0);
        assert!(cmd.pan_tilt().is_none());
        assert_eq!(cmd.zoom, Some(4.0));
    }
}
