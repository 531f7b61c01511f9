use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::edit::kinematics;

/// A single trackpoint as recorded in the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrackpoint {
    /// Recorded timestamp
    pub time: Option<DateTime<Utc>>,

    /// Cumulative distance in meters
    pub distance_meters: Option<f64>,

    /// Altitude in meters above sea level
    pub altitude_meters: Option<f64>,

    /// Instantaneous speed from the activity extension, in meters per second
    pub speed_mps: Option<f64>,
}

/// A lap as recorded in the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLap {
    /// Lap start time (the `StartTime` attribute)
    pub start_time: Option<DateTime<Utc>>,

    /// Recorded elapsed time in seconds (required)
    pub total_time_seconds: Option<f64>,

    /// Recorded lap distance in meters (required)
    pub distance_meters: Option<f64>,

    /// Trackpoints in recorded order
    pub trackpoints: Vec<RawTrackpoint>,
}

/// Parsed view of one activity document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityDocument {
    pub laps: Vec<RawLap>,
}

impl ActivityDocument {
    pub fn new(laps: Vec<RawLap>) -> Self {
        Self { laps }
    }

    /// Total number of trackpoints across all laps
    pub fn trackpoint_count(&self) -> usize {
        self.laps.iter().map(|lap| lap.trackpoints.len()).sum()
    }

    /// The timestamps retained for gap detection
    pub fn timeline(&self) -> Vec<LapTimeline> {
        self.laps
            .iter()
            .map(|lap| LapTimeline {
                start_time: lap.start_time,
                trackpoint_times: lap.trackpoints.iter().map(|tp| tp.time).collect(),
            })
            .collect()
    }
}

/// Original timestamps of one lap, in recorded order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapTimeline {
    pub start_time: Option<DateTime<Utc>>,
    pub trackpoint_times: Vec<Option<DateTime<Utc>>>,
}

/// Per-lap kinematic summary with original and edited values.
///
/// Only `edited_speed_kmh` and `edited_incline_percent` are independent;
/// edited distance and elevation gain are always derived on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapSummary {
    /// 1-based position in the activity
    pub lap_number: u32,

    /// Recorded elapsed (moving) time
    pub total_time_seconds: f64,

    /// Recorded lap distance
    pub original_distance_meters: f64,

    /// Recorded speed derived from distance and time
    pub original_speed_kmh: f64,

    /// Recorded grade from first/last altitude samples
    pub original_incline_percent: f64,

    /// Speed reported by the device on the first trackpoint, if any
    pub recorded_speed_kmh: Option<f64>,

    pub edited_speed_kmh: f64,
    pub edited_incline_percent: f64,
}

impl LapSummary {
    /// Distance implied by the edited speed
    pub fn edited_distance_meters(&self) -> f64 {
        kinematics::distance_from_speed(self.edited_speed_kmh, self.total_time_seconds)
    }

    /// Elevation gain implied by the edited speed and incline. May be negative.
    pub fn edited_elevation_gain_meters(&self) -> f64 {
        kinematics::elevation_from_incline(
            self.edited_incline_percent,
            self.edited_distance_meters(),
        )
    }

    /// Elevation change over the recorded distance at the recorded grade
    pub fn original_elevation_gain_meters(&self) -> f64 {
        kinematics::elevation_from_incline(
            self.original_incline_percent,
            self.original_distance_meters,
        )
    }

    /// Edited speed expressed in meters per second
    pub fn edited_speed_mps(&self) -> f64 {
        self.edited_speed_kmh / kinematics::MPS_TO_KMH
    }

    /// Whether either edited value differs from the recorded baseline
    pub fn is_modified(&self) -> bool {
        self.edited_speed_kmh != self.original_speed_kmh
            || self.edited_incline_percent != self.original_incline_percent
    }
}

/// One corrected trackpoint sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    /// Corrected timestamp (None when the trackpoint had no recorded time)
    pub timestamp: Option<DateTime<Utc>>,

    pub cumulative_distance_meters: f64,
    pub cumulative_altitude_meters: f64,

    /// Instantaneous speed in meters per second, the unit used by the source document
    pub speed_mps: f64,
}

/// Corrected values for one lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedLap {
    pub lap_number: u32,

    /// Start time shifted by the offset accumulated before the lap
    pub start_time: Option<DateTime<Utc>>,

    /// Lap distance implied by the edited speed
    pub distance_meters: f64,

    pub samples: Vec<ActivitySample>,
}

/// Fully corrected sample stream, ready to be written back into the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectedActivity {
    pub laps: Vec<CorrectedLap>,
}

impl CorrectedActivity {
    /// All samples in recorded order
    pub fn samples(&self) -> impl Iterator<Item = &ActivitySample> {
        self.laps.iter().flat_map(|lap| lap.samples.iter())
    }

    pub fn start_times(&self) -> Vec<Option<DateTime<Utc>>> {
        self.laps.iter().map(|lap| lap.start_time).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.laps.iter().map(|lap| lap.samples.len()).sum()
    }

    /// Final cumulative distance, or 0 for an empty stream
    pub fn final_distance_meters(&self) -> f64 {
        self.laps.iter().map(|lap| lap.distance_meters).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_summary() -> LapSummary {
        LapSummary {
            lap_number: 1,
            total_time_seconds: 600.0,
            original_distance_meters: 2000.0,
            original_speed_kmh: 12.0,
            original_incline_percent: 0.0,
            recorded_speed_kmh: None,
            edited_speed_kmh: 12.0,
            edited_incline_percent: 5.0,
        }
    }

    #[test]
    fn test_derived_values_follow_edits() {
        let mut lap = sample_summary();
        assert!((lap.edited_distance_meters() - 2000.0).abs() < 1e-9);
        assert!((lap.edited_elevation_gain_meters() - 100.0).abs() < 1e-9);

        lap.edited_speed_kmh = 10.0;
        assert!((lap.edited_distance_meters() - 1666.666_666_7).abs() < 1e-6);
        assert!((lap.edited_elevation_gain_meters() - 83.333_333_3).abs() < 1e-6);
        assert!(lap.is_modified());
    }

    #[test]
    fn test_document_timeline() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let doc = ActivityDocument::new(vec![RawLap {
            start_time: Some(t0),
            total_time_seconds: Some(10.0),
            distance_meters: Some(30.0),
            trackpoints: vec![
                RawTrackpoint {
                    time: Some(t0),
                    ..Default::default()
                },
                RawTrackpoint::default(),
            ],
        }]);

        let timeline = doc.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].start_time, Some(t0));
        assert_eq!(timeline[0].trackpoint_times, vec![Some(t0), None]);
        assert_eq!(doc.trackpoint_count(), 2);
    }

    #[test]
    fn test_summary_serialization() {
        let lap = sample_summary();
        let json = serde_json::to_string(&lap).unwrap();
        let back: LapSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lap);
    }
}
