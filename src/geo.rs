//! Great-circle helpers and hex-cell mapping.

use h3o::{CellIndex, LatLng, Resolution};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two lat/lng pairs (degrees).
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing from the first point towards the second, in degrees [0, 360).
pub fn bearing_deg(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Absolute change between two bearings, folded into [0, 180].
pub fn bearing_change(from: f64, to: f64) -> f64 {
    let change = (to - from).abs();
    if change > 180.0 { 360.0 - change } else { change }
}

/// Maps a coordinate to its hex cell. Fails only on non-finite input.
pub fn cell_for(lat: f64, lng: f64, resolution: Resolution) -> Result<CellIndex, h3o::error::InvalidLatLng> {
    Ok(LatLng::new(lat, lng)?.to_cell(resolution))
}

/// Center of a hex cell as `(lat, lng)` degrees.
pub fn cell_center(cell: CellIndex) -> (f64, f64) {
    let center = LatLng::from(cell);
    (center.lat(), center.lng())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine() {
        let dist = haversine_km(52.036769, 6.602018, 52.036730, 6.603560);
        assert!((dist - 0.10556793).abs() < 1e-5);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine_km(51.1, 71.4, 51.1, 71.4), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let dist = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!(bearing_deg(0.0, 0.0, 1.0, 0.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing_deg(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_change_wraps() {
        assert_eq!(bearing_change(350.0, 10.0), 20.0);
        assert_eq!(bearing_change(10.0, 350.0), 20.0);
        assert_eq!(bearing_change(0.0, 180.0), 180.0);
        assert_eq!(bearing_change(90.0, 135.0), 45.0);
    }

    #[test]
    fn test_cell_center_is_inside_cell() {
        let cell = cell_for(51.128, 71.430, Resolution::Eight).unwrap();
        let (lat, lng) = cell_center(cell);
        assert_eq!(cell_for(lat, lng, Resolution::Eight).unwrap(), cell);
        assert!(haversine_km(lat, lng, 51.128, 71.430) < 1.0);
    }

    #[test]
    fn test_cell_for_rejects_nan() {
        assert!(cell_for(f64::NAN, 71.4, Resolution::Eight).is_err());
    }
}
