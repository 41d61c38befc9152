//! Coordinates and great-circle distance.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

const DEG: f64 = PI / 180.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance to `other`, in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude * DEG;
        let lat2 = other.latitude * DEG;
        let dlat = (other.latitude - self.latitude) * DEG;
        let dlon = (other.longitude - self.longitude) * DEG;

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        self.distance_m(other) / 1000.0
    }

    /// Offset by a number of degrees; used to place synthetic reference points.
    pub fn offset(&self, dlat: f64, dlon: f64) -> GeoPoint {
        GeoPoint::new(self.latitude + dlat, self.longitude + dlon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Qualitative distance band. Each bound is exclusive, so a value sitting
/// exactly on a boundary belongs to the farther band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceCategory {
    Immediate,
    VeryClose,
    Close,
    Nearby,
    ModeratelyFar,
    Far,
}

impl DistanceCategory {
    pub fn from_meters(meters: f64) -> Self {
        if meters < 30.0 {
            Self::Immediate
        } else if meters < 100.0 {
            Self::VeryClose
        } else if meters < 300.0 {
            Self::Close
        } else if meters < 1000.0 {
            Self::Nearby
        } else if meters < 5000.0 {
            Self::ModeratelyFar
        } else {
            Self::Far
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate (< 30m)",
            Self::VeryClose => "very close (30-100m)",
            Self::Close => "close (100-300m)",
            Self::Nearby => "nearby (300m-1km)",
            Self::ModeratelyFar => "moderately far (1-5km)",
            Self::Far => "far (> 5km)",
        }
    }
}

impl fmt::Display for DistanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(45.5017, -73.5673);
        assert_eq!(p.distance_m(&p), 0.0);
    }

    #[test]
    fn test_montreal_to_quebec_city() {
        let montreal = GeoPoint::new(45.501, -73.567);
        let quebec = GeoPoint::new(46.813, -71.208);
        // ~233 km along the great circle
        let d = montreal.distance_km(&quebec);
        assert!(d > 230.0 && d < 237.0, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(48.428, -71.068);
        let b = GeoPoint::new(45.400, -71.890);
        assert_relative_eq!(a.distance_m(&b), b.distance_m(&a), epsilon = 1e-6);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = GeoPoint::new(45.0, -73.0);
        let b = GeoPoint::new(46.0, -73.0);
        assert_relative_eq!(a.distance_m(&b), 111_194.9, epsilon = 1.0);
    }

    #[test]
    fn test_category_boundaries_are_exclusive() {
        assert_eq!(DistanceCategory::from_meters(29.999), DistanceCategory::Immediate);
        assert_eq!(DistanceCategory::from_meters(30.0), DistanceCategory::VeryClose);
        assert_eq!(DistanceCategory::from_meters(99.999), DistanceCategory::VeryClose);
        assert_eq!(DistanceCategory::from_meters(100.0), DistanceCategory::Close);
        assert_eq!(DistanceCategory::from_meters(300.0), DistanceCategory::Nearby);
        assert_eq!(DistanceCategory::from_meters(1000.0), DistanceCategory::ModeratelyFar);
        assert_eq!(DistanceCategory::from_meters(4999.9), DistanceCategory::ModeratelyFar);
        assert_eq!(DistanceCategory::from_meters(5000.0), DistanceCategory::Far);
    }

    #[test]
    fn test_category_label() {
        assert_eq!(DistanceCategory::from_meters(0.0).label(), "immediate (< 30m)");
        assert_eq!(DistanceCategory::Far.to_string(), "far (> 5km)");
    }

    #[test]
    fn test_validity() {
        assert!(GeoPoint::new(45.5, -73.5).is_valid());
        assert!(!GeoPoint::new(95.0, -73.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
