//! Sustained-change segmentation (v1).
//!
//! Grows a segment point by point and cuts it at the first of:
//! 1. a slope change that persists for the minimum segment distance
//! 2. a peak, valley or direction change that persists just as long
//! 3. the fit of the growing segment dropping below the R² threshold
//!
//! Change events are detected on a moving-average copy of the profile; the
//! final regressions use the raw points.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::builder::build_segments;
use crate::error::{ensure_non_negative, Result, SegmentationError};
use crate::regression::{gradient_between, regression_over, smoothed_profile};
use crate::{trivial_boundaries, ElevationPoint, SegmentationResult};

use super::{SegmentationStrategy, StrategyKind};

/// Points on each side of a candidate when measuring slope change.
const SLOPE_WINDOW: usize = 10;
/// Points on each side of a candidate when looking for inflections.
const INFLECTION_WINDOW: usize = 5;
/// Below this length (km) the R² fallback is not consulted.
const MIN_FIT_DISTANCE_KM: f64 = 0.1;

/// Parameters for [`SustainedChange`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct SustainedChangeParams {
    /// Cut when the growing segment's R² falls below this
    pub r_squared_threshold: f64,
    /// Minimum distance (km) a change must persist to be recorded
    pub min_segment_distance: f64,
    /// Gradient change (percentage points) that counts as a slope change
    pub slope_change_threshold: f64,
    /// Elevation change (m) over the inflection window that counts as movement
    pub inflection_sensitivity: f64,
    pub detect_inflection_points: bool,
    /// Moving-average window (points) applied before event detection
    pub smoothing_window: u32,
}

impl Default for SustainedChangeParams {
    fn default() -> Self {
        Self {
            r_squared_threshold: 0.92,
            min_segment_distance: 0.2,
            slope_change_threshold: 4.0,
            inflection_sensitivity: 2.0,
            detect_inflection_points: true,
            smoothing_window: 5,
        }
    }
}

impl SustainedChangeParams {
    /// Fewer, longer segments: only strong, long-lasting changes cut.
    pub fn coarse() -> Self {
        Self {
            r_squared_threshold: 0.85,
            min_segment_distance: 0.5,
            slope_change_threshold: 6.0,
            inflection_sensitivity: 5.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("r_squared_threshold", self.r_squared_threshold)?;
        ensure_non_negative("min_segment_distance", self.min_segment_distance)?;
        ensure_non_negative("slope_change_threshold", self.slope_change_threshold)?;
        ensure_non_negative("inflection_sensitivity", self.inflection_sensitivity)?;
        if self.r_squared_threshold > 1.0 {
            return Err(SegmentationError::ConfigError {
                message: format!(
                    "r_squared_threshold must be at most 1.0, got {}",
                    self.r_squared_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Kind of change event found in the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    SlopeChange,
    Peak,
    Valley,
    DirectionChange,
}

/// A persisting change in the profile that may end a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeEvent {
    pub index: usize,
    pub kind: ChangeKind,
    /// Gradient delta (slope changes) or elevation delta (inflections)
    pub magnitude: f64,
}

/// Why a growing segment was cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutReason {
    SlopeChange,
    Inflection,
    PoorFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    Accumulating,
    Cut { at: usize, reason: CutReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Level,
}

fn direction(rise: f64, sensitivity: f64) -> Direction {
    if rise >= sensitivity {
        Direction::Up
    } else if rise <= -sensitivity {
        Direction::Down
    } else {
        Direction::Level
    }
}

/// Sustained-change segmenter.
#[derive(Debug, Clone, Default)]
pub struct SustainedChange {
    pub params: SustainedChangeParams,
}

impl SustainedChange {
    pub const MIN_POINTS: usize = 10;

    pub fn new(params: SustainedChangeParams) -> Self {
        Self { params }
    }
}

impl SegmentationStrategy for SustainedChange {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SustainedChange
    }

    fn min_points(&self) -> usize {
        Self::MIN_POINTS
    }

    fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult {
        segment_sustained(points, &self.params)
    }
}

/// Segment a profile with the sustained-change strategy.
///
/// No macro segmentation is involved; the reported boundaries are the whole
/// profile.
pub fn segment_sustained(
    points: &[ElevationPoint],
    params: &SustainedChangeParams,
) -> SegmentationResult {
    if points.len() < SustainedChange::MIN_POINTS {
        return SegmentationResult::degenerate(points.len());
    }

    let smoothed = smoothed_profile(points, params.smoothing_window as usize);
    let slope_events = detect_slope_changes(
        &smoothed,
        params.slope_change_threshold,
        params.min_segment_distance,
    );
    let inflection_events = if params.detect_inflection_points {
        detect_inflections(
            &smoothed,
            params.inflection_sensitivity,
            params.min_segment_distance,
        )
    } else {
        Vec::new()
    };

    debug!(
        "[Sustained] {} slope changes, {} inflections",
        slope_events.len(),
        inflection_events.len()
    );

    let mut cuts = Vec::new();
    let mut segment_start = 0;
    let mut slope_cursor = 0;
    let mut inflection_cursor = 0;
    let mut fit_cuts = 0;

    for end in 1..points.len() {
        slope_cursor = skip_stale(&slope_events, slope_cursor, segment_start);
        inflection_cursor = skip_stale(&inflection_events, inflection_cursor, segment_start);

        let state = evaluate(
            points,
            segment_start,
            end,
            slope_events.get(slope_cursor),
            inflection_events.get(inflection_cursor),
            params,
        );

        if let SegmentState::Cut { at, reason } = state {
            if reason == CutReason::PoorFit {
                fit_cuts += 1;
            }
            cuts.push(at);
            segment_start = at;
        }
    }

    let segments = build_segments(points, &cuts);
    info!(
        "[Sustained] {} points -> {} segments ({} R² fallback cuts)",
        points.len(),
        segments.len(),
        fit_cuts
    );

    SegmentationResult {
        segments,
        macro_boundaries: trivial_boundaries(points.len()),
    }
}

/// Advance past events at or before the current segment start.
fn skip_stale(events: &[ChangeEvent], mut cursor: usize, segment_start: usize) -> usize {
    while events.get(cursor).map_or(false, |e| e.index <= segment_start) {
        cursor += 1;
    }
    cursor
}

/// Cut tests in priority order, first match wins.
fn evaluate(
    points: &[ElevationPoint],
    segment_start: usize,
    end: usize,
    next_slope_change: Option<&ChangeEvent>,
    next_inflection: Option<&ChangeEvent>,
    params: &SustainedChangeParams,
) -> SegmentState {
    if let Some(event) = next_slope_change.filter(|e| e.index <= end) {
        return SegmentState::Cut {
            at: event.index,
            reason: CutReason::SlopeChange,
        };
    }

    if let Some(event) = next_inflection.filter(|e| e.index <= end) {
        return SegmentState::Cut {
            at: event.index,
            reason: CutReason::Inflection,
        };
    }

    let length = points[end].distance - points[segment_start].distance;
    if length > MIN_FIT_DISTANCE_KM && end - 1 > segment_start {
        let fit = regression_over(points, segment_start, end);
        if fit.r_squared < params.r_squared_threshold {
            return SegmentState::Cut {
                at: end - 1,
                reason: CutReason::PoorFit,
            };
        }
    }

    SegmentState::Accumulating
}

/// Index `min_km` further along than `from`, if the profile is that long.
fn sustain_end(points: &[ElevationPoint], from: usize, min_km: f64) -> Option<usize> {
    let origin = points[from].distance;
    (from + 1..points.len()).find(|&j| points[j].distance - origin >= min_km)
}

/// Keep the strongest candidate of each run of consecutive indices.
fn strongest_per_run(candidates: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut peaks: Vec<ChangeEvent> = Vec::new();
    let mut previous_index: Option<usize> = None;

    for candidate in candidates {
        let continues_run = previous_index.map_or(false, |p| candidate.index == p + 1);
        previous_index = Some(candidate.index);

        match peaks.last_mut() {
            Some(best) if continues_run => {
                if candidate.magnitude.abs() > best.magnitude.abs() {
                    *best = candidate;
                }
            }
            _ => peaks.push(candidate),
        }
    }

    peaks
}

/// Slope changes of at least `threshold` percentage points whose new slope
/// still differs from the old one over the `min_km` following the window.
pub fn detect_slope_changes(
    points: &[ElevationPoint],
    threshold: f64,
    min_km: f64,
) -> Vec<ChangeEvent> {
    let n = points.len();
    if n < 2 * SLOPE_WINDOW + 1 {
        return Vec::new();
    }

    let candidates: Vec<ChangeEvent> = (SLOPE_WINDOW..n - SLOPE_WINDOW)
        .filter_map(|i| {
            let before = gradient_between(points, i - SLOPE_WINDOW, i);
            let after = gradient_between(points, i, i + SLOPE_WINDOW);
            let delta = after - before;
            (delta.abs() >= threshold).then_some(ChangeEvent {
                index: i,
                kind: ChangeKind::SlopeChange,
                magnitude: delta,
            })
        })
        .collect();

    strongest_per_run(candidates)
        .into_iter()
        .filter(|event| {
            let i = event.index;
            let before = gradient_between(points, i - SLOPE_WINDOW, i);
            let settled = i + SLOPE_WINDOW;
            sustain_end(points, settled, min_km).map_or(false, |j| {
                (gradient_between(points, settled, j) - before).abs() >= threshold
            })
        })
        .collect()
}

/// Peaks, valleys and direction changes whose new direction still holds over
/// the `min_km` following the window.
pub fn detect_inflections(
    points: &[ElevationPoint],
    sensitivity: f64,
    min_km: f64,
) -> Vec<ChangeEvent> {
    let n = points.len();
    if n < 2 * INFLECTION_WINDOW + 1 {
        return Vec::new();
    }

    let candidates: Vec<ChangeEvent> = (INFLECTION_WINDOW..n - INFLECTION_WINDOW)
        .filter_map(|i| {
            let rise_before = points[i].elevation - points[i - INFLECTION_WINDOW].elevation;
            let rise_after = points[i + INFLECTION_WINDOW].elevation - points[i].elevation;
            let kind = match (
                direction(rise_before, sensitivity),
                direction(rise_after, sensitivity),
            ) {
                (Direction::Up, Direction::Down) => ChangeKind::Peak,
                (Direction::Down, Direction::Up) => ChangeKind::Valley,
                (a, b) if a != b => ChangeKind::DirectionChange,
                _ => return None,
            };
            Some(ChangeEvent {
                index: i,
                kind,
                magnitude: rise_after - rise_before,
            })
        })
        .collect();

    strongest_per_run(candidates)
        .into_iter()
        .filter(|event| {
            let i = event.index;
            let rise_after = points[i + INFLECTION_WINDOW].elevation - points[i].elevation;
            let expected = direction(rise_after, sensitivity);
            let settled = i + INFLECTION_WINDOW;
            sustain_end(points, settled, min_km).map_or(false, |j| {
                direction(points[j].elevation - points[settled].elevation, sensitivity) == expected
            })
        })
        .collect()
}
