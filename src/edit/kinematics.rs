//! Pure derivations between speed and distance, and between incline and
//! elevation gain. Degenerate inputs (zero time, zero distance) yield 0.

/// Conversion factor from meters per second to kilometers per hour
pub const MPS_TO_KMH: f64 = 3.6;

/// Distance in meters covered at `speed_kmh` for `time_seconds`
pub fn distance_from_speed(speed_kmh: f64, time_seconds: f64) -> f64 {
    speed_kmh / MPS_TO_KMH * time_seconds
}

/// Speed in km/h that covers `distance_meters` in `time_seconds`
pub fn speed_from_distance(distance_meters: f64, time_seconds: f64) -> f64 {
    if time_seconds > 0.0 {
        distance_meters / time_seconds * MPS_TO_KMH
    } else {
        0.0
    }
}

/// Elevation change in meters over `distance_meters` at `incline_percent`
pub fn elevation_from_incline(incline_percent: f64, distance_meters: f64) -> f64 {
    distance_meters * incline_percent / 100.0
}

/// Grade in percent producing `elevation_meters` over `distance_meters`
pub fn incline_from_elevation(elevation_meters: f64, distance_meters: f64) -> f64 {
    if distance_meters > 0.0 {
        elevation_meters / distance_meters * 100.0
    } else {
        0.0
    }
}
