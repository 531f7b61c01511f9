//! Writes a corrected activity back into the original TCX text.
//!
//! The source document is streamed event by event. Only the values owned by
//! the corrected activity are replaced; every other element, attribute,
//! comment and whitespace run passes through untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::Path;
use tracing::info;

use super::ExportError;
use crate::models::{ActivitySample, CorrectedActivity, CorrectedLap};

/// Trackpoint children that follow `AltitudeMeters` in the TCX schema
const AFTER_ALTITUDE: &[&str] = &[
    "DistanceMeters",
    "HeartRateBpm",
    "Cadence",
    "SensorState",
    "Extensions",
];

impl From<quick_xml::Error> for ExportError {
    fn from(err: quick_xml::Error) -> Self {
        ExportError::SerializationError(err.to_string())
    }
}

pub struct TcxExporter {
    decimals: usize,
}

impl TcxExporter {
    pub fn new(decimals: usize) -> Self {
        Self { decimals }
    }

    /// Rewrite `source` with the corrected values and write it to `path`
    pub fn export_corrected(
        &self,
        source: &str,
        activity: &CorrectedActivity,
        path: &Path,
    ) -> Result<(), ExportError> {
        let xml = self.rewrite(source, activity)?;
        fs::write(path, xml)?;
        info!(path = %path.display(), "Wrote corrected TCX file");
        Ok(())
    }

    /// Return `source` with lap start times and distances, and trackpoint
    /// times, distances, altitudes and speeds replaced by `activity`.
    pub fn rewrite(&self, source: &str, activity: &CorrectedActivity) -> Result<String, ExportError> {
        let mut reader = Reader::from_str(source);
        let mut rewriter = Rewriter {
            writer: Writer::new(Vec::new()),
            activity,
            decimals: self.decimals,
            path: Vec::new(),
            lap_count: 0,
            lap: None,
            point_count: 0,
            point: None,
            altitude_written: false,
            child_indent: None,
            held: None,
            pending: None,
        };

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Start(e) => rewriter.start(e, false)?,
                Event::Empty(e) => rewriter.start(e, true)?,
                Event::Text(t) => rewriter.text(t, &event)?,
                Event::End(e) => rewriter.end(e)?,
                Event::Eof => break,
                _ => {
                    rewriter.flush_held()?;
                    rewriter.writer.write_event(&event)?;
                }
            }
        }

        if rewriter.lap_count != activity.laps.len() {
            return Err(ExportError::StructureMismatch(format!(
                "document has {} laps, corrected activity has {}",
                rewriter.lap_count,
                activity.laps.len()
            )));
        }

        String::from_utf8(rewriter.writer.into_inner())
            .map_err(|err| ExportError::SerializationError(err.to_string()))
    }
}

/// Streaming state while copying the document
struct Rewriter<'a> {
    writer: Writer<Vec<u8>>,
    activity: &'a CorrectedActivity,
    decimals: usize,
    path: Vec<String>,
    lap_count: usize,
    lap: Option<&'a CorrectedLap>,
    point_count: usize,
    point: Option<PointContext<'a>>,
    altitude_written: bool,
    child_indent: Option<String>,
    held: Option<String>,
    pending: Option<String>,
}

/// The trackpoint currently being copied
struct PointContext<'a> {
    sample: &'a ActivitySample,
    prefix: Option<String>,
}

impl<'a> Rewriter<'a> {
    fn start(&mut self, e: &BytesStart, empty: bool) -> Result<(), ExportError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let in_trackpoint = self.parent() == Some("Trackpoint") && self.point.is_some();

        let held = self.held.take();
        self.write_whitespace(held.as_deref())?;
        if in_trackpoint {
            if !self.altitude_written && AFTER_ALTITUDE.contains(&name.as_str()) {
                self.write_altitude()?;
                self.write_whitespace(held.as_deref())?;
            }
            if held.is_some() {
                self.child_indent = held;
            }
        }

        match name.as_str() {
            "Lap" => {
                self.enter_lap()?;
                let elem = self.lap_start_element(e)?;
                self.write_open(elem, empty)?;
                if empty {
                    self.leave_lap()?;
                }
                return Ok(());
            }
            "Trackpoint" if self.lap.is_some() => {
                self.enter_point(e)?;
                self.writer.write_event(Event::Start(e.to_owned()))?;
                if empty {
                    self.leave_point(e.name().as_ref())?;
                } else {
                    self.path.push(name);
                }
                return Ok(());
            }
            _ => {}
        }

        let replacement = self.replacement_for(&name, in_trackpoint);
        if name == "AltitudeMeters" && in_trackpoint {
            self.altitude_written = true;
        }

        match replacement {
            Some(value) if empty => {
                self.writer.write_event(Event::Start(e.to_owned()))?;
                self.writer.write_event(Event::Text(BytesText::new(&value)))?;
                self.writer.write_event(Event::End(e.to_end().into_owned()))?;
            }
            Some(value) => {
                self.pending = Some(value);
                self.writer.write_event(Event::Start(e.to_owned()))?;
                self.path.push(name);
            }
            None => self.write_open(e.to_owned(), empty)?,
        }
        Ok(())
    }

    fn text(&mut self, t: &BytesText, event: &Event) -> Result<(), ExportError> {
        if let Some(value) = self.pending.take() {
            self.writer.write_event(Event::Text(BytesText::new(&value)))?;
            return Ok(());
        }

        if self.parent() == Some("Trackpoint")
            && self.point.is_some()
            && t.iter().all(u8::is_ascii_whitespace)
        {
            self.held = Some(String::from_utf8_lossy(t).into_owned());
            return Ok(());
        }
        self.flush_held()?;
        self.writer.write_event(event)?;
        Ok(())
    }

    fn end(&mut self, e: &BytesEnd) -> Result<(), ExportError> {
        if let Some(value) = self.pending.take() {
            self.writer.write_event(Event::Text(BytesText::new(&value)))?;
        }

        let name = self.path.pop();
        match name.as_deref() {
            Some("Trackpoint") if self.point.is_some() => self.leave_point(e.name().as_ref()),
            Some("Lap") => {
                self.writer.write_event(Event::End(e.to_owned()))?;
                self.leave_lap()
            }
            _ => {
                self.writer.write_event(Event::End(e.to_owned()))?;
                Ok(())
            }
        }
    }

    /// Whitespace directly inside a trackpoint is held back so a missing
    /// altitude can be written with the same indentation as its siblings.
    fn flush_held(&mut self) -> Result<(), ExportError> {
        let held = self.held.take();
        self.write_whitespace(held.as_deref())
    }

    fn write_whitespace(&mut self, text: Option<&str>) -> Result<(), ExportError> {
        if let Some(text) = text {
            self.writer.write_event(Event::Text(BytesText::from_escaped(text)))?;
        }
        Ok(())
    }

    fn parent(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    fn write_open(&mut self, elem: BytesStart, empty: bool) -> Result<(), ExportError> {
        if empty {
            self.writer.write_event(Event::Empty(elem))?;
        } else {
            let name = String::from_utf8_lossy(elem.local_name().as_ref()).into_owned();
            self.writer.write_event(Event::Start(elem))?;
            self.path.push(name);
        }
        Ok(())
    }

    fn enter_lap(&mut self) -> Result<(), ExportError> {
        let lap = self.activity.laps.get(self.lap_count).ok_or_else(|| {
            ExportError::StructureMismatch(format!(
                "document has more than {} laps",
                self.activity.laps.len()
            ))
        })?;
        self.lap_count += 1;
        self.lap = Some(lap);
        self.point_count = 0;
        Ok(())
    }

    fn leave_lap(&mut self) -> Result<(), ExportError> {
        if let Some(lap) = self.lap.take() {
            if self.point_count != lap.samples.len() {
                return Err(ExportError::StructureMismatch(format!(
                    "lap {} has {} trackpoints, corrected activity has {}",
                    lap.lap_number,
                    self.point_count,
                    lap.samples.len()
                )));
            }
        }
        Ok(())
    }

    fn enter_point(&mut self, e: &BytesStart) -> Result<(), ExportError> {
        let lap = self
            .lap
            .ok_or_else(|| ExportError::StructureMismatch("trackpoint outside a lap".to_string()))?;
        let sample = lap.samples.get(self.point_count).ok_or_else(|| {
            ExportError::StructureMismatch(format!(
                "lap {} has more trackpoints than the corrected activity",
                lap.lap_number
            ))
        })?;
        self.point_count += 1;
        self.point = Some(PointContext {
            sample,
            prefix: e
                .name()
                .prefix()
                .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
        });
        self.altitude_written = false;
        Ok(())
    }

    fn leave_point(&mut self, qname: &[u8]) -> Result<(), ExportError> {
        if !self.altitude_written {
            let indent = self.child_indent.take();
            self.write_whitespace(indent.as_deref())?;
            self.write_altitude()?;
        }
        self.flush_held()?;
        self.point = None;
        self.child_indent = None;
        let end = String::from_utf8_lossy(qname).into_owned();
        self.writer.write_event(Event::End(BytesEnd::new(end)))?;
        Ok(())
    }

    fn write_altitude(&mut self) -> Result<(), ExportError> {
        let Some(point) = self.point.as_ref() else {
            return Ok(());
        };
        let name = match &point.prefix {
            Some(prefix) => format!("{}:AltitudeMeters", prefix),
            None => "AltitudeMeters".to_string(),
        };
        let value = self.number(point.sample.cumulative_altitude_meters);

        self.writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
        self.writer.write_event(Event::Text(BytesText::new(&value)))?;
        self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        self.altitude_written = true;
        Ok(())
    }

    fn lap_start_element(&self, e: &BytesStart) -> Result<BytesStart<'static>, ExportError> {
        let start_time = self.lap.and_then(|lap| lap.start_time);
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut elem = BytesStart::new(name);

        for attr in e.attributes() {
            let attr = attr.map_err(|err| ExportError::SerializationError(err.to_string()))?;
            match start_time {
                Some(time) if attr.key.as_ref() == b"StartTime" => {
                    elem.push_attribute(("StartTime", format_time(time).as_str()));
                }
                _ => elem.push_attribute(attr),
            }
        }
        Ok(elem)
    }

    /// New text for a leaf element, if this element carries a corrected value
    fn replacement_for(&self, name: &str, in_trackpoint: bool) -> Option<String> {
        if in_trackpoint {
            let sample = self.point.as_ref()?.sample;
            return match name {
                "Time" => sample.timestamp.map(format_time),
                "DistanceMeters" => Some(self.number(sample.cumulative_distance_meters)),
                "AltitudeMeters" => Some(self.number(sample.cumulative_altitude_meters)),
                _ => None,
            };
        }

        match (self.parent(), name) {
            (Some("Lap"), "DistanceMeters") => self.lap.map(|lap| self.number(lap.distance_meters)),
            (_, "Speed") => self.point.as_ref().map(|p| self.number(p.sample.speed_mps)),
            _ => None,
        }
    }

    fn number(&self, value: f64) -> String {
        format!("{:.*}", self.decimals, value)
    }
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-03-10T06:30:01.000Z`
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap() + chrono::Duration::seconds(seconds))
    }

    fn sample(timestamp: Option<DateTime<Utc>>, distance: f64, altitude: f64) -> ActivitySample {
        ActivitySample {
            timestamp,
            cumulative_distance_meters: distance,
            cumulative_altitude_meters: altitude,
            speed_mps: 2.5,
        }
    }

    fn activity() -> CorrectedActivity {
        CorrectedActivity {
            laps: vec![CorrectedLap {
                lap_number: 1,
                start_time: at(0),
                distance_meters: 1234.567,
                samples: vec![sample(at(0), 617.25, 1.5), sample(at(1), 1234.567, 3.0)],
            }],
        }
    }

    const SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <!-- recorded on a treadmill -->
  <Lap StartTime="2024-03-10T06:29:00Z">
    <TotalTimeSeconds>600</TotalTimeSeconds>
    <DistanceMeters>2000</DistanceMeters>
    <Track>
      <Trackpoint>
        <Time>2024-03-10T06:30:00Z</Time>
        <DistanceMeters>10</DistanceMeters>
        <HeartRateBpm><Value>120</Value></HeartRateBpm>
        <Extensions><ns3:TPX><ns3:Speed>3.1</ns3:Speed></ns3:TPX></Extensions>
      </Trackpoint>
      <Trackpoint>
        <Time>2024-03-10T06:30:45Z</Time>
        <AltitudeMeters>55</AltitudeMeters>
      </Trackpoint>
    </Track>
  </Lap>
</TrainingCenterDatabase>
"#;

    #[test]
    fn test_rewrites_corrected_values() {
        let xml = TcxExporter::new(2).rewrite(SOURCE, &activity()).unwrap();

        assert!(xml.contains(r#"<Lap StartTime="2024-03-10T06:30:00.000Z">"#));
        assert!(xml.contains("<DistanceMeters>1234.57</DistanceMeters>\n    <Track>"));
        assert!(xml.contains("<Time>2024-03-10T06:30:01.000Z</Time>"));
        assert!(xml.contains("<DistanceMeters>617.25</DistanceMeters>"));
        assert!(xml.contains("<ns3:Speed>2.50</ns3:Speed>"));
        assert!(xml.contains("<AltitudeMeters>3.00</AltitudeMeters>"));
        assert!(!xml.contains("<AltitudeMeters>55</AltitudeMeters>"));
        assert!(xml.contains("<TotalTimeSeconds>600</TotalTimeSeconds>"));
        assert!(xml.contains("<!-- recorded on a treadmill -->"));
        assert!(xml.contains("<HeartRateBpm><Value>120</Value></HeartRateBpm>"));
    }

    #[test]
    fn test_inserts_missing_altitude_in_schema_order() {
        let xml = TcxExporter::new(2).rewrite(SOURCE, &activity()).unwrap();
        let time = xml.find("<Time>2024-03-10T06:30:00.000Z</Time>").unwrap();
        let altitude = xml.find("<AltitudeMeters>1.50</AltitudeMeters>").unwrap();
        let distance = xml.find("<DistanceMeters>617.25</DistanceMeters>").unwrap();
        assert!(time < altitude && altitude < distance);
    }

    #[test]
    fn test_rewrite_is_readable_again() {
        let xml = TcxExporter::new(3).rewrite(SOURCE, &activity()).unwrap();
        let doc = crate::import::tcx::parse_tcx(&xml).unwrap();

        let points = &doc.laps[0].trackpoints;
        assert_eq!(points[0].altitude_meters, Some(1.5));
        assert_eq!(points[0].distance_meters, Some(617.25));
        assert_eq!(points[0].speed_mps, Some(2.5));
        assert_eq!(points[1].time, at(1));
        assert_eq!(doc.laps[0].distance_meters, Some(1234.567));
        assert_eq!(doc.laps[0].total_time_seconds, Some(600.0));
    }

    #[test]
    fn test_prefixed_document_gets_prefixed_altitude() {
        let source = r#"<tcx:Lap StartTime="2024-03-10T06:30:00Z"><tcx:DistanceMeters>5</tcx:DistanceMeters><tcx:Track><tcx:Trackpoint><tcx:Time>2024-03-10T06:30:00Z</tcx:Time></tcx:Trackpoint><tcx:Trackpoint/></tcx:Track></tcx:Lap>"#;
        let xml = TcxExporter::new(1).rewrite(source, &activity()).unwrap();

        assert!(xml.contains(
            "<tcx:Time>2024-03-10T06:30:00.000Z</tcx:Time><tcx:AltitudeMeters>1.5</tcx:AltitudeMeters></tcx:Trackpoint>"
        ));
        assert!(xml.contains("<tcx:Trackpoint><tcx:AltitudeMeters>3.0</tcx:AltitudeMeters></tcx:Trackpoint>"));
    }

    #[test]
    fn test_structure_mismatch() {
        let mut corrected = activity();
        corrected.laps[0].samples.pop();
        assert!(matches!(
            TcxExporter::new(2).rewrite(SOURCE, &corrected),
            Err(ExportError::StructureMismatch(_))
        ));

        let empty = CorrectedActivity::default();
        assert!(matches!(
            TcxExporter::new(2).rewrite(SOURCE, &empty),
            Err(ExportError::StructureMismatch(_))
        ));
    }
}
