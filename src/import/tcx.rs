//! TCX (Training Center XML) reader
//!
//! Elements are matched on their local name, so documents using a namespace
//! prefix (`<tcx:Lap>`) read the same as unprefixed ones.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::import::ImportFormat;
use crate::models::{ActivityDocument, RawLap, RawTrackpoint};

/// TCX importer
pub struct TcxImporter;

impl TcxImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcxImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for TcxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase() == "tcx")
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<ActivityDocument> {
        let content = fs::read_to_string(file_path)?;
        Ok(parse_tcx(&content)?)
    }

    fn parse_source(&self, content: &str) -> Result<ActivityDocument> {
        Ok(parse_tcx(content)?)
    }

    fn get_format_name(&self) -> &'static str {
        "TCX"
    }
}

/// Parse TCX text into the document view used by the engine
pub fn parse_tcx(xml: &str) -> std::result::Result<ActivityDocument, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut laps: Vec<RawLap> = Vec::new();
    let mut lap: Option<RawLap> = None;
    let mut point: Option<RawTrackpoint> = None;

    loop {
        let event = reader.read_event().map_err(|err| ImportError::Malformed {
            position: reader.buffer_position(),
            reason: err.to_string(),
        })?;

        match event {
            Event::Start(ref e) => {
                let name = local_name(e);
                open_element(&name, e, &mut lap, &mut point)?;
                path.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                open_element(&name, e, &mut lap, &mut point)?;
                close_element(&name, &mut laps, &mut lap, &mut point);
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|err| ImportError::Malformed {
                    position: reader.buffer_position(),
                    reason: err.to_string(),
                })?;
                assign_text(&path, text.trim(), &mut lap, &mut point)?;
            }
            Event::End(_) => {
                if let Some(name) = path.pop() {
                    close_element(&name, &mut laps, &mut lap, &mut point);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if laps.is_empty() {
        return Err(ImportError::NoLaps);
    }

    let document = ActivityDocument::new(laps);
    debug!(
        laps = document.laps.len(),
        trackpoints = document.trackpoint_count(),
        "Parsed TCX document"
    );
    Ok(document)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn open_element(
    name: &str,
    e: &BytesStart,
    lap: &mut Option<RawLap>,
    point: &mut Option<RawTrackpoint>,
) -> std::result::Result<(), ImportError> {
    match name {
        "Lap" => {
            let start_time = match e.try_get_attribute("StartTime") {
                Ok(Some(attr)) => {
                    let value = attr.unescape_value().map_err(|err| ImportError::Malformed {
                        position: 0,
                        reason: err.to_string(),
                    })?;
                    Some(parse_time("Lap/@StartTime", &value)?)
                }
                Ok(None) => None,
                Err(err) => {
                    return Err(ImportError::Malformed {
                        position: 0,
                        reason: err.to_string(),
                    })
                }
            };
            *lap = Some(RawLap {
                start_time,
                ..Default::default()
            });
        }
        "Trackpoint" if lap.is_some() => *point = Some(RawTrackpoint::default()),
        _ => {}
    }
    Ok(())
}

fn close_element(
    name: &str,
    laps: &mut Vec<RawLap>,
    lap: &mut Option<RawLap>,
    point: &mut Option<RawTrackpoint>,
) {
    match name {
        "Trackpoint" => {
            if let (Some(lap), Some(point)) = (lap.as_mut(), point.take()) {
                lap.trackpoints.push(point);
            }
        }
        "Lap" => {
            if let Some(lap) = lap.take() {
                laps.push(lap);
            }
        }
        _ => {}
    }
}

fn assign_text(
    path: &[String],
    text: &str,
    lap: &mut Option<RawLap>,
    point: &mut Option<RawTrackpoint>,
) -> std::result::Result<(), ImportError> {
    let (element, parent) = match path {
        [.., parent, element] => (element.as_str(), parent.as_str()),
        _ => return Ok(()),
    };

    if let Some(point) = point.as_mut() {
        match (parent, element) {
            ("Trackpoint", "Time") => point.time = Some(parse_time("Trackpoint/Time", text)?),
            ("Trackpoint", "DistanceMeters") => {
                point.distance_meters = Some(parse_number("Trackpoint/DistanceMeters", text)?)
            }
            ("Trackpoint", "AltitudeMeters") => {
                point.altitude_meters = Some(parse_number("Trackpoint/AltitudeMeters", text)?)
            }
            (_, "Speed") => point.speed_mps = Some(parse_number("Trackpoint/Speed", text)?),
            _ => {}
        }
    } else if let Some(lap) = lap.as_mut() {
        match (parent, element) {
            ("Lap", "TotalTimeSeconds") => {
                lap.total_time_seconds = Some(parse_number("Lap/TotalTimeSeconds", text)?)
            }
            ("Lap", "DistanceMeters") => {
                lap.distance_meters = Some(parse_number("Lap/DistanceMeters", text)?)
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_number(element: &str, text: &str) -> std::result::Result<f64, ImportError> {
    text.parse::<f64>().map_err(|_| ImportError::InvalidValue {
        element: element.to_string(),
        value: text.to_string(),
    })
}

fn parse_time(element: &str, text: &str) -> std::result::Result<DateTime<Utc>, ImportError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ImportError::InvalidValue {
            element: element.to_string(),
            value: text.to_string(),
        })
}
