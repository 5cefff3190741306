//! Coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for haversine distances, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Naver local search encodes WGS84 degrees as integers scaled by this factor.
pub const NAVER_COORD_SCALE: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` for finite coordinates inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Haversine distance to `other` in meters.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }

    /// Decodes Naver's `mapx`/`mapy` integer strings. Returns `None` when either
    /// value is not an integer.
    pub fn from_naver(mapx: &str, mapy: &str) -> Option<Self> {
        let x: i64 = mapx.trim().parse().ok()?;
        let y: i64 = mapy.trim().parse().ok()?;
        Some(Self {
            lat: y as f64 / NAVER_COORD_SCALE,
            lng: x as f64 / NAVER_COORD_SCALE,
        })
    }
}
