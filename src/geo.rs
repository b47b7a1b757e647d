use crate::models::verification::GeoPoint;

/// Mean Earth radius (IUGG), metres.
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Haversine great-circle distance in metres.
pub fn great_circle_distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// A distance equal to the tolerance still counts as a match.
pub fn is_geo_mismatch(distance_meters: f64, tolerance_meters: f64) -> bool {
    distance_meters > tolerance_meters
}

/// Point `meters` due north of `origin`. Used to build fixtures at a known distance.
#[cfg(test)]
pub fn offset_north(origin: GeoPoint, meters: f64) -> GeoPoint {
    let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
    GeoPoint::new(origin.latitude + d_lat, origin.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero_meters() {
        let p = GeoPoint::new(20.652494, -100.391404);
        assert_eq!(great_circle_distance_meters(p, p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = great_circle_distance_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.08).abs() < 1.0, "{d}");
    }

    #[test]
    fn offset_north_round_trips_through_distance() {
        let origin = GeoPoint::new(19.4326, -99.1332);
        let d = great_circle_distance_meters(origin, offset_north(origin, 40.0));
        assert!((d - 40.0).abs() < 1e-6, "{d}");
    }

    #[test]
    fn tolerance_boundary_is_not_a_mismatch() {
        assert!(!is_geo_mismatch(100.0, 100.0));
        assert!(is_geo_mismatch(100.0001, 100.0));
        assert!(!is_geo_mismatch(40.0, 100.0));
    }
}
