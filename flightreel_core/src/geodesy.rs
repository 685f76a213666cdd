//! Spherical-earth great-circle distance.

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Haversine distance in metres. Any non-finite coordinate yields `None`.
pub fn haversine(a: GeoPoint, b: GeoPoint) -> Option<f64> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1].
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    Some(EARTH_RADIUS_M * c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_known_distance() {
        // One degree of latitude along a meridian.
        let d = haversine(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0)).unwrap();
        assert_relative_eq!(d, EARTH_RADIUS_M * std::f64::consts::PI / 180.0, max_relative = 1e-12);
    }

    #[test]
    fn test_non_finite_is_none() {
        let ok = GeoPoint::new(47.0, 8.0);
        assert!(haversine(ok, GeoPoint::new(f64::NAN, 8.0)).is_none());
        assert!(haversine(GeoPoint::new(47.0, f64::INFINITY), ok).is_none());
    }

    proptest! {
        #[test]
        fn prop_identity(lat in -90.0f64..90.0, lon in -180.0f64..180.0) {
            let p = GeoPoint::new(lat, lon);
            prop_assert_eq!(haversine(p, p), Some(0.0));
        }

        #[test]
        fn prop_symmetry(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let a = GeoPoint::new(lat1, lon1);
            let b = GeoPoint::new(lat2, lon2);
            let ab = haversine(a, b).unwrap();
            let ba = haversine(b, a).unwrap();
            prop_assert!((ab - ba).abs() <= 1e-6);
            prop_assert!(ab >= 0.0 && ab <= EARTH_RADIUS_M * std::f64::consts::PI + 1e-6);
        }
    }
}
