use crate::fix::Coordinate;

/// Mean earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates in meters, via the
/// haversine formula. Altitude is ignored; vertical movement is accounted
/// for separately by the accumulator.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Coordinate::new(50.0755, 14.4378);
        assert_eq!(distance_m(&p, &p), 0.0);
    }

    #[test]
    fn one_millidegree_of_latitude() {
        // 0.001 degrees of latitude is ~111.19 m anywhere on the globe.
        let a = Coordinate::new(50.0, 14.4);
        let b = Coordinate::new(50.001, 14.4);
        let d = distance_m(&a, &b);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let eq_a = Coordinate::new(0.0, 10.0);
        let eq_b = Coordinate::new(0.0, 10.001);
        let north_a = Coordinate::new(60.0, 10.0);
        let north_b = Coordinate::new(60.0, 10.001);

        let at_equator = distance_m(&eq_a, &eq_b);
        let at_60 = distance_m(&north_a, &north_b);

        // cos(60 deg) = 0.5
        assert!((at_60 / at_equator - 0.5).abs() < 0.01);
    }

    #[test]
    fn symmetric() {
        let a = Coordinate::new(50.0755, 14.4378);
        let b = Coordinate::new(48.8566, 2.3522);
        assert!((distance_m(&a, &b) - distance_m(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn prague_to_paris_ballpark() {
        // Known great-circle distance is ~885 km.
        let prague = Coordinate::new(50.0755, 14.4378);
        let paris = Coordinate::new(48.8566, 2.3522);
        let d = distance_m(&prague, &paris);
        assert!(d > 870_000.0 && d < 900_000.0, "got {d}");
    }
}
