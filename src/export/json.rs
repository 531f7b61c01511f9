use super::{ExportError, LapReport};
use std::io::Write;
use std::path::Path;

/// Export a lap report to JSON format
pub fn export_lap_report<P: AsRef<Path>>(report: &LapReport, output_path: P) -> Result<(), ExportError> {
    export_json(report, output_path)
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ActivityTotals;
    use crate::export::LapReportRow;
    use chrono::Utc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_export_lap_report() {
        let report = LapReport {
            generated_at: Utc::now(),
            source: Some("treadmill.tcx".to_string()),
            laps: vec![LapReportRow {
                lap_number: 1,
                total_time_seconds: 600.0,
                original_speed_kmh: 12.0,
                original_distance_meters: 2000.0,
                original_incline_percent: 0.0,
                edited_speed_kmh: 10.0,
                edited_distance_meters: 1666.67,
                edited_incline_percent: 5.0,
                edited_elevation_gain_meters: 83.33,
                modified: true,
            }],
            totals: ActivityTotals::default(),
        };

        let temp_file = NamedTempFile::new().unwrap();
        export_lap_report(&report, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("treadmill.tcx"));
        assert!(content.contains("\"edited_incline_percent\": 5.0"));

        let parsed: LapReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.laps, report.laps);
    }
}
