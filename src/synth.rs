//! Corrected sample stream generation
//!
//! Rebuilds distance, altitude, speed and time for every trackpoint from the
//! edited lap summaries. Distance and climb are spread evenly over the
//! trackpoints of each lap and accumulate across laps. Recording pauses longer
//! than the gap threshold are collapsed to a fixed short gap; every later
//! timestamp moves earlier by the removed time.
//!
//! The scan is a single ordered pass carrying a [`SynthesisState`]. It is
//! exposed lazily through [`SampleStream`] and folded into a
//! [`CorrectedActivity`] by [`synthesize`].

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::edit::kinematics;
use crate::error::SynthesisError;
use crate::models::{ActivitySample, CorrectedActivity, CorrectedLap, LapSummary, LapTimeline};

/// Pauses longer than this are collapsed
pub const DEFAULT_GAP_THRESHOLD_SECS: i64 = 30;

/// Length a collapsed pause is reduced to
pub const DEFAULT_COLLAPSED_GAP_SECS: i64 = 1;

/// Tuning for the gap collapsing scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub gap_threshold: Duration,
    pub collapsed_gap: Duration,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::seconds(DEFAULT_GAP_THRESHOLD_SECS),
            collapsed_gap: Duration::seconds(DEFAULT_COLLAPSED_GAP_SECS),
        }
    }
}

/// Running time offset of the gap collapsing scan.
///
/// Gaps are always measured between *original* timestamps, so the offset
/// grows by the recorded pause length regardless of earlier corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapCollapser {
    threshold: Duration,
    collapsed_gap: Duration,
    total_offset: Duration,
    last_original: Option<DateTime<Utc>>,
}

impl GapCollapser {
    pub fn new(options: &SynthesisOptions) -> Self {
        Self {
            threshold: options.gap_threshold,
            collapsed_gap: options.collapsed_gap,
            total_offset: Duration::zero(),
            last_original: None,
        }
    }

    /// Time removed so far
    pub fn offset(&self) -> Duration {
        self.total_offset
    }

    /// Feed the next recorded timestamp and return its corrected value
    pub fn correct(&mut self, original: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(last) = self.last_original {
            let gap = original - last;
            if gap > self.threshold {
                self.total_offset = self.total_offset + (gap - self.collapsed_gap);
                debug!(
                    at = %original,
                    gap_s = gap.num_milliseconds() as f64 / 1000.0,
                    offset_s = self.total_offset.num_milliseconds() as f64 / 1000.0,
                    "Collapsed recording pause"
                );
            }
        }
        self.last_original = Some(original);
        original - self.total_offset
    }

    /// Shift a timestamp by the current offset without advancing the scan
    pub fn shift(&self, original: DateTime<Utc>) -> DateTime<Utc> {
        original - self.total_offset
    }
}

/// Accumulator threaded through the scan
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisState {
    pub gaps: GapCollapser,
    pub cumulative_distance_meters: f64,
    pub cumulative_altitude_meters: f64,
}

impl SynthesisState {
    pub fn new(options: &SynthesisOptions) -> Self {
        Self {
            gaps: GapCollapser::new(options),
            cumulative_distance_meters: 0.0,
            cumulative_altitude_meters: 0.0,
        }
    }
}

/// One step of the corrected stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Emitted once per lap, before its samples
    LapStart {
        lap_number: u32,
        start_time: Option<DateTime<Utc>>,
        distance_meters: f64,
        point_count: usize,
    },
    Sample(ActivitySample),
}

/// Per-lap increments, fixed when the lap is entered
#[derive(Debug, Clone, Copy, Default)]
struct LapStep {
    delta_distance: f64,
    delta_altitude: f64,
    speed_mps: f64,
}

/// Lazy corrected stream over all laps in recorded order
#[derive(Debug, Clone)]
pub struct SampleStream<'a> {
    laps: &'a [LapSummary],
    timeline: &'a [LapTimeline],
    state: SynthesisState,
    lap_index: usize,
    point_index: usize,
    step: Option<LapStep>,
}

impl<'a> SampleStream<'a> {
    pub fn new(
        laps: &'a [LapSummary],
        timeline: &'a [LapTimeline],
        options: &SynthesisOptions,
    ) -> Result<Self, SynthesisError> {
        if laps.len() != timeline.len() {
            return Err(SynthesisError::LapCountMismatch {
                summaries: laps.len(),
                timeline: timeline.len(),
            });
        }

        Ok(Self {
            laps,
            timeline,
            state: SynthesisState::new(options),
            lap_index: 0,
            point_index: 0,
            step: None,
        })
    }

    /// Accumulator as of the last emitted event
    pub fn state(&self) -> &SynthesisState {
        &self.state
    }

    fn enter_lap(&mut self, lap: &LapSummary, times: &LapTimeline) -> StreamEvent {
        let lap_distance = lap.edited_distance_meters();
        let point_count = times.trackpoint_times.len();
        let start_time = times.start_time.map(|t| self.state.gaps.shift(t));

        if point_count == 0 {
            self.state.cumulative_distance_meters += lap_distance;
            self.state.cumulative_altitude_meters +=
                kinematics::elevation_from_incline(lap.edited_incline_percent, lap_distance);
            self.step = Some(LapStep::default());
        } else {
            let delta_distance = lap_distance / point_count as f64;
            self.step = Some(LapStep {
                delta_distance,
                delta_altitude: kinematics::elevation_from_incline(
                    lap.edited_incline_percent,
                    delta_distance,
                ),
                speed_mps: lap.edited_speed_mps(),
            });
        }

        debug!(
            lap = lap.lap_number,
            points = point_count,
            distance_m = lap_distance,
            offset_s = self.state.gaps.offset().num_milliseconds() as f64 / 1000.0,
            "Synthesizing lap"
        );

        StreamEvent::LapStart {
            lap_number: lap.lap_number,
            start_time,
            distance_meters: lap_distance,
            point_count,
        }
    }
}

impl Iterator for SampleStream<'_> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        let laps = self.laps;
        let timeline = self.timeline;

        loop {
            let lap = laps.get(self.lap_index)?;
            let times = timeline.get(self.lap_index)?;

            let step = match self.step {
                Some(step) => step,
                None => return Some(self.enter_lap(lap, times)),
            };

            if let Some(original) = times.trackpoint_times.get(self.point_index) {
                self.point_index += 1;
                let timestamp = original.map(|t| self.state.gaps.correct(t));
                self.state.cumulative_distance_meters += step.delta_distance;
                self.state.cumulative_altitude_meters += step.delta_altitude;

                return Some(StreamEvent::Sample(ActivitySample {
                    timestamp,
                    cumulative_distance_meters: self.state.cumulative_distance_meters,
                    cumulative_altitude_meters: self.state.cumulative_altitude_meters,
                    speed_mps: step.speed_mps,
                }));
            }

            self.lap_index += 1;
            self.point_index = 0;
            self.step = None;
        }
    }
}

/// Generate the corrected activity for the edited laps.
///
/// `timeline` holds the original timestamps of the same document the laps
/// were extracted from. Lap elapsed times are not changed.
pub fn synthesize(
    laps: &[LapSummary],
    timeline: &[LapTimeline],
    options: &SynthesisOptions,
) -> Result<CorrectedActivity, SynthesisError> {
    let stream = SampleStream::new(laps, timeline, options)?;

    let corrected = stream.fold(CorrectedActivity::default(), |mut activity, event| {
        match event {
            StreamEvent::LapStart {
                lap_number,
                start_time,
                distance_meters,
                point_count,
            } => activity.laps.push(CorrectedLap {
                lap_number,
                start_time,
                distance_meters,
                samples: Vec::with_capacity(point_count),
            }),
            StreamEvent::Sample(sample) => {
                if let Some(lap) = activity.laps.last_mut() {
                    lap.samples.push(sample);
                }
            }
        }
        activity
    });

    info!(
        laps = corrected.laps.len(),
        samples = corrected.sample_count(),
        distance_m = corrected.final_distance_meters(),
        "Generated corrected activity"
    );
    Ok(corrected)
}
