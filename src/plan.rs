//! Edit plans
//!
//! A plan is a TOML file listing bulk edits that are applied in order:
//!
//! ```toml
//! [[edit]]
//! laps = "2-30"
//! speed_kmh = 8.2
//! incline_percent = 18.0
//!
//! [[edit]]
//! laps = "31"
//! distance_km = 0.4
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::edit::{BulkEdit, EditSession};
use crate::error::{EditError, LapfixError, Result};
use crate::selection::LapSelection;

/// One `[[edit]]` entry as written in the file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    /// Lap range expression, e.g. `"1-3, 5"`
    pub laps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incline_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl PlanEntry {
    /// Resolve the entry into a selection and a validated bulk edit
    pub fn resolve(&self) -> std::result::Result<(LapSelection, BulkEdit), EditError> {
        let edit = BulkEdit::from_fields(
            self.speed_kmh,
            self.distance_km,
            self.incline_percent,
            self.elevation_m,
        )?;
        Ok((LapSelection::parse(&self.laps), edit))
    }
}

/// An ordered list of bulk edits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    #[serde(default, rename = "edit")]
    pub entries: Vec<PlanEntry>,
}

impl EditPlan {
    pub fn from_toml(content: &str) -> Result<Self> {
        let plan: EditPlan = toml::from_str(content)
            .map_err(|e| LapfixError::Validation(format!("Invalid edit plan: {}", e)))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let plan = Self::from_toml(&content)?;
        debug!(path = %path.display(), entries = plan.entries.len(), "Loaded edit plan");
        Ok(plan)
    }

    /// Reject conflicting pairs, empty entries and non-finite values before
    /// anything is applied
    pub fn validate(&self) -> Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            let invalid =
                |e: EditError| LapfixError::Validation(format!("edit #{}: {}", index + 1, e));
            let (selection, edit) = entry.resolve().map_err(invalid)?;
            if selection.is_empty() {
                return Err(LapfixError::Validation(format!(
                    "edit #{}: no laps selected by \"{}\"",
                    index + 1,
                    entry.laps
                )));
            }
            edit.validate().map_err(invalid)?;
        }
        Ok(())
    }

    /// Apply every entry in order, returning the number of lap edits made.
    ///
    /// Entries are applied to a copy of the session, which replaces it only
    /// when all of them succeed.
    pub fn apply(&self, session: &mut EditSession) -> Result<usize> {
        self.validate()?;

        let mut staged = session.clone();
        let mut applied = 0;
        for entry in &self.entries {
            let (selection, edit) = entry.resolve()?;
            applied += staged.apply_bulk(&selection, &edit)?;
        }
        *session = staged;

        info!(entries = self.entries.len(), laps = applied, "Applied edit plan");
        Ok(applied)
    }
}
