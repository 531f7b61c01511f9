use chrono::{DateTime, TimeZone, Utc};
use lapfix::export::tcx::TcxExporter;
use lapfix::import::tcx::parse_tcx;
use lapfix::import::ImportManager;
use lapfix::{synthesize, AppConfig, BulkEdit, EditPlan, EditSession, LapSelection, SynthesisOptions};

/// Integration tests that drive the whole read, edit, correct, write cycle

#[cfg(test)]
mod integration_tests {
    use super::*;

    const ACTIVITY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2" xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="Running">
      <Id>2024-03-10T06:30:00Z</Id>
      <Lap StartTime="2024-03-10T06:30:00Z">
        <TotalTimeSeconds>600</TotalTimeSeconds>
        <DistanceMeters>2000</DistanceMeters>
        <Track>
          <Trackpoint>
            <Time>2024-03-10T06:30:00Z</Time>
            <AltitudeMeters>100</AltitudeMeters>
            <DistanceMeters>0</DistanceMeters>
            <Extensions><ns3:TPX><ns3:Speed>3.33</ns3:Speed></ns3:TPX></Extensions>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-03-10T06:30:05Z</Time>
            <AltitudeMeters>105</AltitudeMeters>
            <DistanceMeters>1000</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-03-10T06:30:10Z</Time>
            <AltitudeMeters>110</AltitudeMeters>
            <DistanceMeters>2000</DistanceMeters>
          </Trackpoint>
        </Track>
      </Lap>
      <Lap StartTime="2024-03-10T06:31:00Z">
        <TotalTimeSeconds>60</TotalTimeSeconds>
        <DistanceMeters>200</DistanceMeters>
        <Track>
          <Trackpoint>
            <Time>2024-03-10T06:31:00Z</Time>
            <DistanceMeters>2100</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-03-10T06:31:05Z</Time>
            <DistanceMeters>2200</DistanceMeters>
          </Trackpoint>
        </Track>
      </Lap>
      <Lap StartTime="2024-03-10T06:31:10Z">
        <TotalTimeSeconds>60</TotalTimeSeconds>
        <DistanceMeters>200</DistanceMeters>
        <Track>
          <Trackpoint>
            <Time>2024-03-10T06:31:10Z</Time>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>
"#;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_lap_summaries_from_document() {
        let document = parse_tcx(ACTIVITY).unwrap();
        let session = EditSession::from_document(&document).unwrap();

        assert_eq!(session.lap_count(), 3);
        let lap = session.lap(1).unwrap();
        assert_close(lap.original_speed_kmh, 12.0);
        assert_close(lap.original_incline_percent, 0.5);
        assert_close(lap.recorded_speed_kmh.unwrap(), 3.33 * 3.6);
        assert!(!lap.is_modified());

        // Laps without altitude report no incline
        assert_eq!(session.lap(2).unwrap().original_incline_percent, 0.0);
    }

    #[test]
    fn test_speed_and_incline_edits_flow_into_totals() {
        let document = parse_tcx(ACTIVITY).unwrap();
        let mut session = EditSession::from_document(&document).unwrap();

        session.set_speed(1, 10.0).unwrap();
        session.set_incline(1, 5.0).unwrap();

        let lap = session.lap(1).unwrap();
        assert_close(lap.edited_distance_meters(), 10_000.0 / 6.0);
        assert_close(lap.edited_elevation_gain_meters(), 10_000.0 / 6.0 * 0.05);

        let totals = session.totals();
        assert_close(totals.total_time_seconds, 720.0);
        assert_close(totals.total_distance_meters, 10_000.0 / 6.0 + 400.0);

        // Setting the distance back restores the recorded speed
        session.set_distance(1, 2.0).unwrap();
        assert_close(session.lap(1).unwrap().edited_speed_kmh, 12.0);
    }

    #[test]
    fn test_bulk_edit_with_selection_expression() {
        let selection = LapSelection::parse("1, 3-5, 8");
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![1, 3, 4, 5, 8]);
        assert_eq!(selection.to_string(), "1, 3-5, 8");

        let document = parse_tcx(ACTIVITY).unwrap();
        let mut session = EditSession::from_document(&document).unwrap();
        let edit = BulkEdit::from_fields(Some(9.0), None, None, Some(10.0)).unwrap();

        // Laps 4, 5 and 8 do not exist and are skipped
        assert_eq!(session.apply_bulk(&selection, &edit).unwrap(), 2);
        assert_eq!(session.lap(1).unwrap().edited_speed_kmh, 9.0);
        assert_eq!(session.lap(2).unwrap().edited_speed_kmh, 12.0);
        assert_close(session.lap(3).unwrap().edited_elevation_gain_meters(), 10.0);
        assert_eq!(session.modified_count(), 2);

        assert!(BulkEdit::from_fields(Some(9.0), Some(1.0), None, None).is_err());
    }

    #[test]
    fn test_gap_between_laps_is_collapsed() {
        let document = parse_tcx(ACTIVITY).unwrap();
        let session = EditSession::from_document(&document).unwrap();

        let corrected =
            synthesize(session.laps(), &document.timeline(), &SynthesisOptions::default()).unwrap();

        let times: Vec<DateTime<Utc>> = corrected.samples().filter_map(|s| s.timestamp).collect();
        assert_eq!(
            times,
            vec![
                at(6, 30, 0),
                at(6, 30, 5),
                at(6, 30, 10),
                at(6, 30, 11),
                at(6, 30, 16),
                at(6, 30, 21),
            ]
        );
        assert_eq!(corrected.laps[2].start_time, Some(at(6, 30, 21)));
        assert_close(corrected.final_distance_meters(), 2400.0);
    }

    #[test]
    fn test_corrected_file_round_trip() {
        let document = parse_tcx(ACTIVITY).unwrap();
        let mut session = EditSession::from_document(&document).unwrap();
        session.set_speed(1, 10.0).unwrap();
        session.set_incline(1, 5.0).unwrap();

        let corrected =
            synthesize(session.laps(), &document.timeline(), &SynthesisOptions::default()).unwrap();
        let xml = TcxExporter::new(2).rewrite(ACTIVITY, &corrected).unwrap();

        let reread = parse_tcx(&xml).unwrap();
        assert_eq!(reread.laps.len(), 3);
        assert_eq!(reread.trackpoint_count(), document.trackpoint_count());

        let lap1 = &reread.laps[0];
        assert_eq!(lap1.distance_meters, Some(1666.67));
        assert_eq!(lap1.total_time_seconds, Some(600.0));
        assert_eq!(lap1.trackpoints[2].distance_meters, Some(1666.67));
        assert_eq!(lap1.trackpoints[2].altitude_meters, Some(83.33));
        assert_eq!(lap1.trackpoints[0].speed_mps, Some(2.78));

        // Altitude is written for every trackpoint, continuing across laps
        let lap2 = &reread.laps[1];
        assert_eq!(lap2.trackpoints[0].altitude_meters, Some(83.33));
        assert_eq!(lap2.trackpoints[0].time, Some(at(6, 30, 11)));
        assert_eq!(lap2.trackpoints[1].distance_meters, Some(1866.67));

        // Trackpoints without a distance element do not gain one
        let lap3 = &reread.laps[2];
        assert_eq!(lap3.trackpoints[0].distance_meters, None);
        assert_eq!(lap3.trackpoints[0].altitude_meters, Some(83.33));
        assert_close(
            corrected.laps[2].samples[0].cumulative_distance_meters,
            10_000.0 / 6.0 + 400.0,
        );

        // Untouched content survives
        assert!(xml.contains(r#"<Activity Sport="Running">"#));
        assert!(xml.contains("<Id>2024-03-10T06:30:00Z</Id>"));
    }

    #[test]
    fn test_plan_then_correct_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("treadmill.tcx");
        std::fs::write(&input, ACTIVITY).unwrap();

        let document = ImportManager::new().import_file(&input).unwrap();
        let mut session = EditSession::from_document(&document).unwrap();
        let plan = EditPlan::from_toml(
            r#"
[[edit]]
laps = "2-3"
distance_km = 0.3
incline_percent = 2.0
"#,
        )
        .unwrap();
        assert_eq!(plan.apply(&mut session).unwrap(), 2);

        let config = AppConfig::default();
        let corrected =
            synthesize(session.laps(), &document.timeline(), &config.synthesis.options()).unwrap();
        let output = config.output.corrected_path(&input);
        assert_eq!(output, dir.path().join("treadmill_corrected.tcx"));

        TcxExporter::new(config.output.decimals)
            .export_corrected(ACTIVITY, &corrected, &output)
            .unwrap();

        let reread = ImportManager::new().import_file(&output).unwrap();
        let summaries = EditSession::from_document(&reread).unwrap();
        assert_close(summaries.lap(2).unwrap().original_distance_meters, 300.0);
        assert_close(summaries.totals().total_distance_meters, 2600.0);
    }

    #[test]
    fn test_unsupported_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("activity.gpx");
        std::fs::write(&input, ACTIVITY).unwrap();

        assert!(ImportManager::new().import_file(&input).is_err());
        assert!(ImportManager::new()
            .import_file(&dir.path().join("missing.tcx"))
            .is_err());
    }
}
