//! Lap summary extraction
//!
//! Derives the recorded baseline (speed, incline) of every lap from the raw
//! document view and seeds the edited values with it.

use tracing::{debug, info};

use crate::edit::kinematics;
use crate::error::ExtractError;
use crate::models::{ActivityDocument, LapSummary, RawLap};

/// Extract one summary per lap, in document order.
///
/// Fails on the first lap missing its elapsed time or distance; no partial
/// result is returned.
pub fn extract_lap_summaries(document: &ActivityDocument) -> Result<Vec<LapSummary>, ExtractError> {
    let summaries = document
        .laps
        .iter()
        .enumerate()
        .map(|(index, lap)| summarize_lap(index as u32 + 1, lap))
        .collect::<Result<Vec<_>, _>>()?;

    info!(laps = summaries.len(), "Extracted lap summaries");
    Ok(summaries)
}

/// Summarize a single recorded lap
pub fn summarize_lap(lap_number: u32, lap: &RawLap) -> Result<LapSummary, ExtractError> {
    let total_time_seconds = required(lap_number, "TotalTimeSeconds", lap.total_time_seconds)?;
    let distance_meters = required(lap_number, "DistanceMeters", lap.distance_meters)?;

    let original_speed_kmh = kinematics::speed_from_distance(distance_meters, total_time_seconds);
    let original_incline_percent = recorded_incline(lap, distance_meters);
    let recorded_speed_kmh = lap
        .trackpoints
        .first()
        .and_then(|tp| tp.speed_mps)
        .map(|mps| mps * kinematics::MPS_TO_KMH);

    debug!(
        lap = lap_number,
        time_s = total_time_seconds,
        distance_m = distance_meters,
        speed_kmh = original_speed_kmh,
        incline_pct = original_incline_percent,
        "Summarized lap"
    );

    Ok(LapSummary {
        lap_number,
        total_time_seconds,
        original_distance_meters: distance_meters,
        original_speed_kmh,
        original_incline_percent,
        recorded_speed_kmh,
        edited_speed_kmh: original_speed_kmh,
        edited_incline_percent: original_incline_percent,
    })
}

fn required(lap_number: u32, field: &'static str, value: Option<f64>) -> Result<f64, ExtractError> {
    let value = value.ok_or(ExtractError::MissingField { lap_number, field })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ExtractError::InvalidField {
            lap_number,
            field,
            value,
        });
    }
    Ok(value)
}

/// Grade between the first and last trackpoint altitudes, or 0 when either is
/// missing or the lap has fewer than two trackpoints.
fn recorded_incline(lap: &RawLap, distance_meters: f64) -> f64 {
    if lap.trackpoints.len() < 2 {
        return 0.0;
    }

    let first = lap.trackpoints.first().and_then(|tp| tp.altitude_meters);
    let last = lap.trackpoints.last().and_then(|tp| tp.altitude_meters);

    match (first, last) {
        (Some(start), Some(end)) => kinematics::incline_from_elevation(end - start, distance_meters),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTrackpoint;

    fn point(altitude: Option<f64>) -> RawTrackpoint {
        RawTrackpoint {
            altitude_meters: altitude,
            ..Default::default()
        }
    }

    fn lap(time: Option<f64>, distance: Option<f64>, trackpoints: Vec<RawTrackpoint>) -> RawLap {
        RawLap {
            start_time: None,
            total_time_seconds: time,
            distance_meters: distance,
            trackpoints,
        }
    }

    #[test]
    fn test_speed_and_incline_from_recording() {
        let doc = ActivityDocument::new(vec![lap(
            Some(600.0),
            Some(2000.0),
            vec![point(Some(100.0)), point(None), point(Some(150.0))],
        )]);

        let summaries = extract_lap_summaries(&doc).unwrap();
        assert_eq!(summaries.len(), 1);

        let summary = &summaries[0];
        assert_eq!(summary.lap_number, 1);
        assert!((summary.original_speed_kmh - 12.0).abs() < 1e-9);
        assert!((summary.original_incline_percent - 2.5).abs() < 1e-9);
        assert_eq!(summary.edited_speed_kmh, summary.original_speed_kmh);
        assert_eq!(summary.edited_incline_percent, summary.original_incline_percent);
        assert!(!summary.is_modified());
    }

    #[test]
    fn test_missing_altitude_gives_flat_lap() {
        let doc = ActivityDocument::new(vec![
            lap(Some(60.0), Some(200.0), vec![point(None), point(Some(10.0))]),
            lap(Some(60.0), Some(200.0), vec![point(Some(10.0))]),
        ]);

        let summaries = extract_lap_summaries(&doc).unwrap();
        assert_eq!(summaries[0].original_incline_percent, 0.0);
        assert_eq!(summaries[1].original_incline_percent, 0.0);
        assert_eq!(summaries[1].lap_number, 2);
    }

    #[test]
    fn test_zero_time_and_zero_distance_are_tolerated() {
        let doc = ActivityDocument::new(vec![lap(
            Some(0.0),
            Some(0.0),
            vec![point(Some(5.0)), point(Some(9.0))],
        )]);

        let summary = &extract_lap_summaries(&doc).unwrap()[0];
        assert_eq!(summary.original_speed_kmh, 0.0);
        assert_eq!(summary.original_incline_percent, 0.0);
    }

    #[test]
    fn test_missing_required_field_aborts() {
        let doc = ActivityDocument::new(vec![
            lap(Some(60.0), Some(200.0), vec![]),
            lap(None, Some(200.0), vec![]),
        ]);
        assert_eq!(
            extract_lap_summaries(&doc),
            Err(ExtractError::MissingField {
                lap_number: 2,
                field: "TotalTimeSeconds"
            })
        );

        let doc = ActivityDocument::new(vec![lap(Some(60.0), None, vec![])]);
        assert_eq!(
            extract_lap_summaries(&doc),
            Err(ExtractError::MissingField {
                lap_number: 1,
                field: "DistanceMeters"
            })
        );
    }

    #[test]
    fn test_non_finite_field_is_rejected() {
        let doc = ActivityDocument::new(vec![lap(Some(f64::NAN), Some(1.0), vec![])]);
        assert!(matches!(
            extract_lap_summaries(&doc),
            Err(ExtractError::InvalidField { lap_number: 1, .. })
        ));
    }

    #[test]
    fn test_extension_speed_is_kept_for_display() {
        let doc = ActivityDocument::new(vec![lap(
            Some(100.0),
            Some(300.0),
            vec![RawTrackpoint {
                speed_mps: Some(2.5),
                ..Default::default()
            }],
        )]);

        let summary = &extract_lap_summaries(&doc).unwrap()[0];
        assert!((summary.recorded_speed_kmh.unwrap() - 9.0).abs() < 1e-9);
        assert!((summary.original_speed_kmh - 10.8).abs() < 1e-9);
    }
}
