use serde::Serialize;
use std::path::Path;

use super::ExportError;
use crate::edit::kinematics;
use crate::models::CorrectedActivity;

/// One row of the corrected distance/altitude profile
#[derive(Debug, Serialize)]
struct ProfileRow {
    lap_number: u32,
    point: usize,
    timestamp: Option<String>,
    distance_m: f64,
    altitude_m: f64,
    speed_kmh: f64,
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::SerializationError(err.to_string())
    }
}

/// Export the corrected sample stream as a CSV profile, one row per trackpoint
pub fn export_profile<P: AsRef<Path>>(activity: &CorrectedActivity, output_path: P) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(output_path)?;

    for lap in &activity.laps {
        for (point, sample) in lap.samples.iter().enumerate() {
            writer.serialize(ProfileRow {
                lap_number: lap.lap_number,
                point: point + 1,
                timestamp: sample.timestamp.map(|t| t.to_rfc3339()),
                distance_m: sample.cumulative_distance_meters,
                altitude_m: sample.cumulative_altitude_meters,
                speed_kmh: sample.speed_mps * kinematics::MPS_TO_KMH,
            })?;
        }
    }

    writer.flush()?;
    Ok(())
}
