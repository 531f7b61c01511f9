use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::ActivityTotals;
use crate::edit::EditSession;
use crate::models::LapSummary;

pub mod csv;
pub mod json;
pub mod tcx;

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Document does not match corrected activity: {0}")]
    StructureMismatch(String),
}

/// One lap row with original, edited and derived values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapReportRow {
    pub lap_number: u32,
    pub total_time_seconds: f64,
    pub original_speed_kmh: f64,
    pub original_distance_meters: f64,
    pub original_incline_percent: f64,
    pub edited_speed_kmh: f64,
    pub edited_distance_meters: f64,
    pub edited_incline_percent: f64,
    pub edited_elevation_gain_meters: f64,
    pub modified: bool,
}

impl From<&LapSummary> for LapReportRow {
    fn from(lap: &LapSummary) -> Self {
        Self {
            lap_number: lap.lap_number,
            total_time_seconds: lap.total_time_seconds,
            original_speed_kmh: lap.original_speed_kmh,
            original_distance_meters: lap.original_distance_meters,
            original_incline_percent: lap.original_incline_percent,
            edited_speed_kmh: lap.edited_speed_kmh,
            edited_distance_meters: lap.edited_distance_meters(),
            edited_incline_percent: lap.edited_incline_percent,
            edited_elevation_gain_meters: lap.edited_elevation_gain_meters(),
            modified: lap.is_modified(),
        }
    }
}

/// Snapshot of an edit session for display or export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapReport {
    pub generated_at: DateTime<Utc>,
    pub source: Option<String>,
    pub laps: Vec<LapReportRow>,
    pub totals: ActivityTotals,
}

impl LapReport {
    pub fn from_session(session: &EditSession, source: Option<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            source,
            laps: session.laps().iter().map(LapReportRow::from).collect(),
            totals: session.totals(),
        }
    }
}
