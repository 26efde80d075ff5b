//! Angle and great-circle helpers shared by the detection methods

/// Mean Earth radius in meters, matching the constant used by the receivers'
/// own distance computations.
pub const EARTH_RADIUS: f64 = 6_378_100.0;

/// The smallest non-negative angular distance between two headings on the circle
///
/// Inputs may lie outside `[0, 360)`; the result is always in `[0, 180]`.
#[must_use]
pub fn minimum_angle_difference(angle1: f64, angle2: f64) -> f64 {
    let phi = (angle1 - angle2).abs() % 360.0;
    if phi > 180.0 { 360.0 - phi } else { phi }
}

/// Great-circle distance in meters between two geographic positions (degrees)
#[must_use]
pub fn haversine_distance(latitude1: f64, longitude1: f64, latitude2: f64, longitude2: f64) -> f64 {
    let phi1 = latitude1.to_radians();
    let phi2 = latitude2.to_radians();
    let dlat = phi2 - phi1;
    let dlon = longitude2.to_radians() - longitude1.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS * c
}
