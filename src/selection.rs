//! Lap range expressions such as `"1-3, 5, 7-9"`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An ordered set of 1-based lap numbers.
///
/// Stored as disjoint, non-adjacent inclusive runs keyed by their start, so
/// a range expression costs the same whatever its width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapSelection {
    runs: BTreeMap<u32, u32>,
}

impl LapSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list of lap numbers and inclusive ranges.
    ///
    /// Parsing never fails: tokens that are not numbers or ranges are skipped,
    /// and a range whose start exceeds its end selects nothing.
    pub fn parse(text: &str) -> Self {
        let mut selection = Self::new();

        for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.split_once('-') {
                Some((start, end)) => {
                    if let (Ok(start), Ok(end)) =
                        (start.trim().parse::<u32>(), end.trim().parse::<u32>())
                    {
                        selection.insert_range(start, end);
                    }
                }
                None => {
                    if let Ok(lap) = token.parse::<u32>() {
                        selection.insert(lap);
                    }
                }
            }
        }

        selection
    }

    /// Every lap of an activity with `lap_count` laps
    pub fn all(lap_count: u32) -> Self {
        let mut selection = Self::new();
        selection.insert_range(1, lap_count);
        selection
    }

    /// Laps 1, 3, 5, ...
    pub fn odd(lap_count: u32) -> Self {
        (1..=lap_count).filter(|lap| lap % 2 == 1).collect()
    }

    /// Laps 2, 4, 6, ...
    pub fn even(lap_count: u32) -> Self {
        (1..=lap_count).filter(|lap| lap % 2 == 0).collect()
    }

    pub fn insert(&mut self, lap: u32) -> bool {
        if self.contains(lap) {
            return false;
        }
        self.insert_range(lap, lap);
        true
    }

    /// Add the inclusive range `start..=end`, merging with overlapping or
    /// adjacent runs. Does nothing when `start > end`.
    pub fn insert_range(&mut self, start: u32, end: u32) {
        if start > end {
            return;
        }
        let (mut start, mut end) = (start, end);

        if let Some((&prev_start, &prev_end)) = self.runs.range(..=start).next_back() {
            if prev_end.saturating_add(1) >= start {
                start = prev_start;
                end = end.max(prev_end);
            }
        }

        let absorbed: Vec<(u32, u32)> = self
            .runs
            .range(start..=end.saturating_add(1))
            .map(|(&s, &e)| (s, e))
            .collect();
        for (run_start, run_end) in absorbed {
            self.runs.remove(&run_start);
            end = end.max(run_end);
        }

        self.runs.insert(start, end);
    }

    pub fn contains(&self, lap: u32) -> bool {
        self.runs
            .range(..=lap)
            .next_back()
            .map_or(false, |(_, &end)| lap <= end)
    }

    pub fn len(&self) -> usize {
        let total: u64 = self
            .runs
            .iter()
            .map(|(&start, &end)| u64::from(end - start) + 1)
            .sum();
        usize::try_from(total).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Lap numbers in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.runs.iter().flat_map(|(&start, &end)| start..=end)
    }

    /// The selected laps greater than `lap`
    pub fn above(&self, lap: u32) -> Self {
        let mut selection = Self::new();
        if let Some(first) = lap.checked_add(1) {
            for (&start, &end) in &self.runs {
                if end >= first {
                    selection.insert_range(start.max(first), end);
                }
            }
        }
        selection
    }

    /// Canonical text form: ascending, runs collapsed, joined by `", "`
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LapSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (start, end)) in self.runs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
        }
        Ok(())
    }
}

impl FromStr for LapSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl FromIterator<u32> for LapSelection {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut selection = Self::new();
        selection.extend(iter);
        selection
    }
}

impl Extend<u32> for LapSelection {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for lap in iter {
            self.insert(lap);
        }
    }
}
