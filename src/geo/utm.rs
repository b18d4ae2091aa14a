//! UTM forward projection (WGS84, Krüger series)

use super::PlanarPoint;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Projects geographic coordinates into a UTM zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtmProjection {
    /// Fixed zone; `None` picks the standard zone of each point
    zone: Option<u8>,
}

impl UtmProjection {
    /// Projection pinned to one zone (1..=60)
    pub fn fixed(zone: u8) -> Self {
        Self { zone: Some(zone) }
    }

    /// Projection using the standard zone of every projected point
    pub fn standard() -> Self {
        Self { zone: None }
    }

    pub fn from_config(zone: Option<u8>) -> Self {
        Self { zone }
    }

    /// Standard 6° zone containing `lon_deg`
    pub fn standard_zone(lon_deg: f64) -> u8 {
        let lon = (lon_deg + 180.0).rem_euclid(360.0);
        ((lon / 6.0).floor() as u8 % 60) + 1
    }

    /// Project `(lat, lon)` in degrees to easting/northing in metres
    pub fn forward(&self, lat_deg: f64, lon_deg: f64) -> PlanarPoint {
        let zone = self.zone.unwrap_or_else(|| Self::standard_zone(lon_deg));
        let lon0 = (zone as f64) * 6.0 - 183.0;

        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;
        let e = (WGS84_F * (2.0 - WGS84_F)).sqrt();
        let a_hat = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        let alpha = [
            n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3,
            13.0 / 48.0 * n2 - 3.0 / 5.0 * n3,
            61.0 / 240.0 * n3,
        ];

        let phi = lat_deg.to_radians();
        let lambda = (lon_deg - lon0).to_radians();

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_p = t.atan2(lambda.cos());
        let eta_p = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let easting = FALSE_EASTING + K0 * a_hat * eta;
        let mut northing = K0 * a_hat * xi;
        if lat_deg < 0.0 {
            northing += FALSE_NORTHING_SOUTH;
        }

        PlanarPoint::new(easting, northing)
    }
}
