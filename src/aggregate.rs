//! Activity-level totals, always recomputed from the current lap state

use serde::{Deserialize, Serialize};

use crate::edit::kinematics;
use crate::models::LapSummary;

/// Whole-activity totals for the edited laps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub total_time_seconds: f64,
    pub total_distance_meters: f64,

    /// Net climb over all laps, never negative
    pub total_climb_meters: f64,

    pub avg_speed_kmh: f64,
}

impl ActivityTotals {
    pub fn from_laps(laps: &[LapSummary]) -> Self {
        let total_time_seconds: f64 = laps.iter().map(|lap| lap.total_time_seconds).sum();
        let total_distance_meters: f64 = laps.iter().map(LapSummary::edited_distance_meters).sum();
        let net_climb: f64 = laps
            .iter()
            .map(LapSummary::edited_elevation_gain_meters)
            .sum();

        Self {
            total_time_seconds,
            total_distance_meters,
            total_climb_meters: net_climb.max(0.0),
            avg_speed_kmh: kinematics::speed_from_distance(total_distance_meters, total_time_seconds),
        }
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }
}

/// Render a duration as `H:MM:SS`, or `M:SS` under one hour
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
