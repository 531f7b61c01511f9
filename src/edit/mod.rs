//! Edit model
//!
//! An [`EditSession`] owns the lap summaries of one loaded activity. Each lap
//! has two independent edited values, speed and incline; distance and
//! elevation gain are derived from them on every read, so edits along either
//! axis can never leave a lap inconsistent.
//!
//! Elevation edits are solved against the lap's distance at the time of the
//! edit. A later speed edit keeps the incline, so the realised elevation gain
//! changes with it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::ActivityTotals;
use crate::error::{EditError, ExtractError};
use crate::extract::extract_lap_summaries;
use crate::models::{ActivityDocument, LapSummary};
use crate::selection::LapSelection;

pub mod kinematics;

/// Value for the speed/distance axis of a bulk edit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpeedAxis {
    /// Speed in km/h
    Speed(f64),
    /// Lap distance in km
    Distance(f64),
}

/// Value for the incline/elevation axis of a bulk edit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InclineAxis {
    /// Grade in percent
    Incline(f64),
    /// Elevation gain in meters
    Elevation(f64),
}

/// A batch edit applied to every selected lap.
///
/// Each axis holds at most one value, so speed and distance (or incline and
/// elevation) can never both be requested for the same call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkEdit {
    pub speed: Option<SpeedAxis>,
    pub incline: Option<InclineAxis>,
}

impl BulkEdit {
    /// Build a bulk edit from the four optional input fields, rejecting
    /// requests that set both members of an axis pair.
    pub fn from_fields(
        speed_kmh: Option<f64>,
        distance_km: Option<f64>,
        incline_percent: Option<f64>,
        elevation_m: Option<f64>,
    ) -> Result<Self, EditError> {
        let speed = match (speed_kmh, distance_km) {
            (Some(_), Some(_)) => {
                return Err(EditError::ConflictingValues {
                    first: "speed",
                    second: "distance",
                })
            }
            (Some(kmh), None) => Some(SpeedAxis::Speed(kmh)),
            (None, Some(km)) => Some(SpeedAxis::Distance(km)),
            (None, None) => None,
        };

        let incline = match (incline_percent, elevation_m) {
            (Some(_), Some(_)) => {
                return Err(EditError::ConflictingValues {
                    first: "incline",
                    second: "elevation",
                })
            }
            (Some(percent), None) => Some(InclineAxis::Incline(percent)),
            (None, Some(meters)) => Some(InclineAxis::Elevation(meters)),
            (None, None) => None,
        };

        Ok(Self { speed, incline })
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_none() && self.incline.is_none()
    }

    /// Reject edits with no value or a non-finite value
    pub fn validate(&self) -> Result<(), EditError> {
        if self.is_empty() {
            return Err(EditError::NoValues);
        }
        match self.speed {
            Some(SpeedAxis::Speed(v)) => finite("speed", v)?,
            Some(SpeedAxis::Distance(v)) => finite("distance", v)?,
            None => {}
        }
        match self.incline {
            Some(InclineAxis::Incline(v)) => finite("incline", v)?,
            Some(InclineAxis::Elevation(v)) => finite("elevation", v)?,
            None => {}
        }
        Ok(())
    }
}

/// Editable state of one loaded activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditSession {
    laps: Vec<LapSummary>,
}

impl EditSession {
    pub fn new(laps: Vec<LapSummary>) -> Self {
        Self { laps }
    }

    /// Extract lap summaries from a parsed document
    pub fn from_document(document: &ActivityDocument) -> Result<Self, ExtractError> {
        Ok(Self::new(extract_lap_summaries(document)?))
    }

    pub fn laps(&self) -> &[LapSummary] {
        &self.laps
    }

    pub fn lap(&self, lap_number: u32) -> Option<&LapSummary> {
        self.laps.iter().find(|lap| lap.lap_number == lap_number)
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    /// Number of laps whose edited values differ from the recording
    pub fn modified_count(&self) -> usize {
        self.laps.iter().filter(|lap| lap.is_modified()).count()
    }

    /// Activity totals for the current edited state
    pub fn totals(&self) -> ActivityTotals {
        ActivityTotals::from_laps(&self.laps)
    }

    /// Set the edited speed in km/h. Negative values are clamped to 0.
    pub fn set_speed(&mut self, lap_number: u32, speed_kmh: f64) -> Result<(), EditError> {
        finite("speed", speed_kmh)?;
        apply_speed(self.lap_mut(lap_number)?, speed_kmh);
        Ok(())
    }

    /// Set the lap distance in km by solving for the speed over the recorded time
    pub fn set_distance(&mut self, lap_number: u32, distance_km: f64) -> Result<(), EditError> {
        finite("distance", distance_km)?;
        apply_distance(self.lap_mut(lap_number)?, distance_km);
        Ok(())
    }

    /// Set the edited incline in percent
    pub fn set_incline(&mut self, lap_number: u32, incline_percent: f64) -> Result<(), EditError> {
        finite("incline", incline_percent)?;
        self.lap_mut(lap_number)?.edited_incline_percent = incline_percent;
        Ok(())
    }

    /// Set the elevation gain in meters by solving for the incline over the
    /// current edited distance
    pub fn set_elevation(&mut self, lap_number: u32, elevation_m: f64) -> Result<(), EditError> {
        finite("elevation", elevation_m)?;
        apply_elevation(self.lap_mut(lap_number)?, elevation_m);
        Ok(())
    }

    /// Restore the recorded speed and incline of one lap
    pub fn reset(&mut self, lap_number: u32) -> Result<(), EditError> {
        let lap = self.lap_mut(lap_number)?;
        lap.edited_speed_kmh = lap.original_speed_kmh;
        lap.edited_incline_percent = lap.original_incline_percent;
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for lap in &mut self.laps {
            lap.edited_speed_kmh = lap.original_speed_kmh;
            lap.edited_incline_percent = lap.original_incline_percent;
        }
    }

    /// Apply `edit` to every selected lap and return how many laps changed.
    ///
    /// The speed axis is applied first, so an elevation target is solved
    /// against the new distance. Lap numbers with no matching lap are skipped.
    /// On error nothing is modified.
    pub fn apply_bulk(&mut self, selection: &LapSelection, edit: &BulkEdit) -> Result<usize, EditError> {
        if selection.is_empty() {
            return Err(EditError::EmptySelection);
        }
        edit.validate()?;

        let mut updated = 0;
        for lap in self.laps.iter_mut().filter(|lap| selection.contains(lap.lap_number)) {
            match edit.speed {
                Some(SpeedAxis::Speed(kmh)) => apply_speed(lap, kmh),
                Some(SpeedAxis::Distance(km)) => apply_distance(lap, km),
                None => {}
            }
            match edit.incline {
                Some(InclineAxis::Incline(percent)) => lap.edited_incline_percent = percent,
                Some(InclineAxis::Elevation(meters)) => apply_elevation(lap, meters),
                None => {}
            }
            debug!(
                lap = lap.lap_number,
                speed_kmh = lap.edited_speed_kmh,
                incline_pct = lap.edited_incline_percent,
                "Applied bulk edit"
            );
            updated += 1;
        }

        if updated < selection.len() {
            warn!(
                selected = selection.len(),
                updated,
                "Selection contains lap numbers outside the activity"
            );
        }
        info!(selection = %selection, updated, "Bulk edit applied");
        Ok(updated)
    }

    fn lap_mut(&mut self, lap_number: u32) -> Result<&mut LapSummary, EditError> {
        self.laps
            .iter_mut()
            .find(|lap| lap.lap_number == lap_number)
            .ok_or(EditError::UnknownLap { lap_number })
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), EditError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EditError::InvalidValue { field, value })
    }
}

fn apply_speed(lap: &mut LapSummary, speed_kmh: f64) {
    lap.edited_speed_kmh = speed_kmh.max(0.0);
}

fn apply_distance(lap: &mut LapSummary, distance_km: f64) {
    let speed = kinematics::speed_from_distance(distance_km * 1000.0, lap.total_time_seconds);
    apply_speed(lap, speed);
}

fn apply_elevation(lap: &mut LapSummary, elevation_m: f64) {
    lap.edited_incline_percent =
        kinematics::incline_from_elevation(elevation_m, lap.edited_distance_meters());
}
