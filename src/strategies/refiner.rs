//! Dual-criterion breakpoint refinement (v2).
//!
//! ## Algorithm
//! For each macro segment (peak to valley or valley to peak):
//! 1. Seed breakpoints while growing a segment: cut when its fit degrades or
//!    the gradient ahead departs from it
//! 2. Wiggle: move each interior breakpoint by one point if that lowers the
//!    combined misfit of its two neighbouring segments
//! 3. Validate: drop breakpoints whose left segment is too short or whose
//!    neighbouring slopes are too similar
//! 4. Repeat 2-3 until nothing changes (at most 30 iterations)
//!
//! Seeding uses fixed constants; only validation reads the caller's
//! parameters.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::builder::build_segments;
use crate::error::{ensure_non_negative, Result};
use crate::macro_segments::{find_extrema, macro_ranges};
use crate::progress::{NoopProgress, RefinementProgress};
use crate::regression::{forward_window_end, gradient_between, regression_over};
use crate::{to_u32_indices, ElevationPoint, SegmentationResult};

use super::{ConvergenceState, SegmentationStrategy, StrategyKind};

/// Seeding cuts when the growing segment's R² falls below this.
const SEED_R_SQUARED: f64 = 0.98;
/// Seeding cuts when the look-ahead gradient departs by more than this (points).
const SEED_GRADIENT_CHANGE: f64 = 3.0;
/// Seeded segments are at least this long (km).
const SEED_MIN_DISTANCE_KM: f64 = 0.2;
/// Look-ahead window for the seeding gradient test (km).
const LOOKAHEAD_KM: f64 = 0.1;
/// Upper bound on wiggle + validate iterations per macro segment.
pub const MAX_ITERATIONS: usize = 30;
/// Minimum misfit improvement for a wiggle to count as a move.
const WIGGLE_EPSILON: f64 = 1e-12;

/// Parameters for [`DualCriterionRefiner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct RefinerParams {
    /// Prominence (m) for macro segmentation
    #[serde(alias = "prominenciaMinima")]
    pub min_prominence_m: f64,
    /// Minimum length (km) of the segment left of a kept breakpoint
    #[serde(alias = "distanciaMinima")]
    pub min_distance_km: f64,
    /// Minimum slope difference between neighbours, as a fraction (0.10 = 10 points)
    #[serde(alias = "diferenciaPendiente")]
    pub min_slope_difference: f64,
}

impl Default for RefinerParams {
    fn default() -> Self {
        Self {
            min_prominence_m: 40.0,
            min_distance_km: 0.2,
            min_slope_difference: 0.10,
        }
    }
}

impl RefinerParams {
    /// More breakpoints survive validation.
    pub fn detailed() -> Self {
        Self {
            min_prominence_m: 20.0,
            min_distance_km: 0.1,
            min_slope_difference: 0.05,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("min_prominence_m", self.min_prominence_m)?;
        ensure_non_negative("min_distance_km", self.min_distance_km)?;
        ensure_non_negative("min_slope_difference", self.min_slope_difference)
    }
}

/// Dual-criterion refiner.
#[derive(Debug, Clone, Default)]
pub struct DualCriterionRefiner {
    pub params: RefinerParams,
}

impl DualCriterionRefiner {
    pub const MIN_POINTS: usize = 5;

    pub fn new(params: RefinerParams) -> Self {
        Self { params }
    }
}

impl SegmentationStrategy for DualCriterionRefiner {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DualCriterionRefiner
    }

    fn min_points(&self) -> usize {
        Self::MIN_POINTS
    }

    fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult {
        segment_refined(points, &self.params)
    }
}

/// Approximate progress over all macro segments.
struct ProgressBudget<'a> {
    processed: usize,
    budget: usize,
    sink: &'a dyn RefinementProgress,
}

impl ProgressBudget<'_> {
    fn record(&mut self) {
        self.processed += 1;
        let percent = (self.processed * 100 / self.budget).min(99);
        self.sink.on_progress(percent as u8);
    }
}

/// Segment a profile with the dual-criterion refiner.
pub fn segment_refined(points: &[ElevationPoint], params: &RefinerParams) -> SegmentationResult {
    segment_refined_with_progress(points, params, &NoopProgress)
}

/// Segment a profile, reporting approximate progress.
///
/// `progress` receives a percentage after each validated breakpoint and
/// always receives 100 when done.
pub fn segment_refined_with_progress(
    points: &[ElevationPoint],
    params: &RefinerParams,
    progress: &dyn RefinementProgress,
) -> SegmentationResult {
    if points.len() < DualCriterionRefiner::MIN_POINTS {
        progress.on_progress(100);
        return SegmentationResult::degenerate(points.len());
    }

    let boundaries = find_extrema(points, params.min_prominence_m);
    let seeded: Vec<(usize, usize, Vec<usize>)> = macro_ranges(&boundaries)
        .map(|(start, end)| (start, end, seed_breakpoints(points, start, end)))
        .collect();

    let seed_count: usize = seeded.iter().map(|(_, _, seeds)| seeds.len()).sum();
    let mut budget = ProgressBudget {
        processed: 0,
        budget: seed_count.max(1) * MAX_ITERATIONS,
        sink: progress,
    };

    let mut breakpoints = boundaries.clone();
    let mut unconverged = 0;
    for (start, end, seeds) in seeded {
        let mut local = Vec::with_capacity(seeds.len() + 2);
        local.push(start);
        local.extend(seeds);
        local.push(end);

        if refine(points, &mut local, params, &mut budget) == ConvergenceState::Continuing {
            unconverged += 1;
        }
        breakpoints.extend_from_slice(&local[1..local.len() - 1]);
    }
    breakpoints.sort_unstable();
    breakpoints.dedup();

    progress.on_progress(100);

    let segments = build_segments(points, &breakpoints);
    info!(
        "[Refiner] {} points, {} macro segments, {} seeds -> {} segments ({} capped)",
        points.len(),
        boundaries.len().saturating_sub(1),
        seed_count,
        segments.len(),
        unconverged
    );

    SegmentationResult {
        segments,
        macro_boundaries: to_u32_indices(&boundaries),
    }
}

/// Initial breakpoints inside one macro segment `start..=end`.
pub fn seed_breakpoints(points: &[ElevationPoint], start: usize, end: usize) -> Vec<usize> {
    let mut seeds = Vec::new();
    let mut local_start = start;

    for candidate in start + 1..end {
        let length = points[candidate].distance - points[local_start].distance;
        if length < SEED_MIN_DISTANCE_KM {
            continue;
        }

        let fit = regression_over(points, local_start, candidate);
        let ahead = forward_window_end(points, candidate, LOOKAHEAD_KM, end);
        let change = if ahead > candidate {
            (gradient_between(points, local_start, candidate)
                - gradient_between(points, candidate, ahead))
            .abs()
        } else {
            0.0
        };

        if fit.r_squared < SEED_R_SQUARED || change > SEED_GRADIENT_CHANGE {
            seeds.push(candidate);
            local_start = candidate;
        }
    }

    seeds
}

/// Wiggle and validate `breakpoints` (macro endpoints first and last) until
/// a full iteration changes nothing.
fn refine(
    points: &[ElevationPoint],
    breakpoints: &mut Vec<usize>,
    params: &RefinerParams,
    budget: &mut ProgressBudget<'_>,
) -> ConvergenceState {
    for iteration in 0..MAX_ITERATIONS {
        let moved = wiggle_pass(points, breakpoints);
        let dropped = validate_pass(points, breakpoints, params, budget);

        if !moved && !dropped {
            debug!(
                "[Refiner] Converged after {} iterations with {} breakpoints",
                iteration + 1,
                breakpoints.len()
            );
            return ConvergenceState::Converged;
        }
    }
    ConvergenceState::Continuing
}

/// Positions to try for a breakpoint, or `None` when it sits next to either
/// end of the profile and must stay put.
pub fn wiggle_candidates(bp: usize, len: usize) -> Option<[usize; 3]> {
    if bp <= 1 || bp + 2 >= len {
        return None;
    }
    Some([bp - 1, bp, bp + 1])
}

/// `(1 - R²)` of the left plus the right segment around `bp`.
fn combined_error(points: &[ElevationPoint], previous: usize, bp: usize, next: usize) -> f64 {
    regression_over(points, previous, bp).error() + regression_over(points, bp, next).error()
}

/// Move each interior breakpoint to its best neighbouring position.
/// Returns whether anything moved.
fn wiggle_pass(points: &[ElevationPoint], breakpoints: &mut [usize]) -> bool {
    let mut moved = false;

    for i in 1..breakpoints.len().saturating_sub(1) {
        let bp = breakpoints[i];
        let Some(candidates) = wiggle_candidates(bp, points.len()) else {
            continue;
        };
        let (previous, next) = (breakpoints[i - 1], breakpoints[i + 1]);

        let mut best = bp;
        let mut best_error = combined_error(points, previous, bp, next);
        for candidate in candidates {
            if candidate == bp || candidate <= previous || candidate >= next {
                continue;
            }
            debug_assert!(candidate < points.len());
            let error = combined_error(points, previous, candidate, next);
            if error < best_error - WIGGLE_EPSILON {
                best = candidate;
                best_error = error;
            }
        }

        if best != bp {
            breakpoints[i] = best;
            moved = true;
        }
    }

    moved
}

/// Drop breakpoints that fail the distance or slope-difference test.
/// Returns whether anything was dropped.
fn validate_pass(
    points: &[ElevationPoint],
    breakpoints: &mut Vec<usize>,
    params: &RefinerParams,
    budget: &mut ProgressBudget<'_>,
) -> bool {
    let mut dropped = false;
    let mut i = 1;

    while i + 1 < breakpoints.len() {
        let (previous, bp, next) = (breakpoints[i - 1], breakpoints[i], breakpoints[i + 1]);
        let left = regression_over(points, previous, bp);
        let right = regression_over(points, bp, next);

        let left_km = points[bp].distance - points[previous].distance;
        let slope_difference = (left.slope_percent() - right.slope_percent()).abs();

        if left_km >= params.min_distance_km
            && slope_difference >= params.min_slope_difference * 100.0
        {
            budget.record();
            i += 1;
        } else {
            breakpoints.remove(i);
            dropped = true;
        }
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::is_contiguous;
    use crate::progress::AtomicProgress;

    fn mountain() -> Vec<ElevationPoint> {
        (0..1000)
            .map(|i| {
                let e = 500.0 + 200.0 * (std::f64::consts::PI * i as f64 / 999.0).sin();
                ElevationPoint::new(i as f64 * 0.0025, e)
            })
            .collect()
    }

    fn two_pitch_climb() -> Vec<ElevationPoint> {
        // 1 km at 25% then 1 km at 5%, 10m spacing
        (0..=200)
            .map(|i| {
                let d = i as f64 * 0.01;
                let e = if d <= 1.0 { 250.0 * d } else { 250.0 + 50.0 * (d - 1.0) };
                ElevationPoint::new(d, e)
            })
            .collect()
    }

    #[test]
    fn test_wiggle_candidates_guard_ends() {
        assert_eq!(wiggle_candidates(0, 100), None);
        assert_eq!(wiggle_candidates(1, 100), None);
        assert_eq!(wiggle_candidates(98, 100), None);
        assert_eq!(wiggle_candidates(99, 100), None);
        assert_eq!(wiggle_candidates(2, 100), Some([1, 2, 3]));
        assert_eq!(wiggle_candidates(97, 100), Some([96, 97, 98]));
        assert_eq!(wiggle_candidates(1, 3), None);
    }

    #[test]
    fn test_wiggle_skips_edge_breakpoints() {
        let points = two_pitch_climb();
        let mut breakpoints = vec![0, 1, 199, 200];
        let moved = wiggle_pass(&points, &mut breakpoints);
        assert!(!moved);
        assert_eq!(breakpoints, vec![0, 1, 199, 200]);
    }

    #[test]
    fn test_wiggle_moves_toward_true_corner() {
        let points = two_pitch_climb();
        let mut breakpoints = vec![0, 99, 200];
        assert!(wiggle_pass(&points, &mut breakpoints));
        assert_eq!(breakpoints, vec![0, 100, 200]);
        // Already at the corner: nothing to improve
        assert!(!wiggle_pass(&points, &mut breakpoints));
    }

    #[test]
    fn test_validate_drops_similar_slopes() {
        let points = two_pitch_climb();
        let params = RefinerParams::default();
        let sink = NoopProgress;
        let mut budget = ProgressBudget {
            processed: 0,
            budget: 30,
            sink: &sink,
        };

        // 25% vs 5%: a 20 point difference survives
        let mut kept = vec![0, 100, 200];
        assert!(!validate_pass(&points, &mut kept, &params, &mut budget));
        assert_eq!(kept, vec![0, 100, 200]);

        // Both sides of index 50 are 25%: dropped
        let mut similar = vec![0, 50, 100];
        assert!(validate_pass(&points, &mut similar, &params, &mut budget));
        assert_eq!(similar, vec![0, 100]);

        // Left side only 50m long: dropped
        let mut short = vec![0, 5, 200];
        assert!(validate_pass(&points, &mut short, &params, &mut budget));
        assert_eq!(short, vec![0, 200]);
    }

    #[test]
    fn test_two_pitch_climb() {
        let points = two_pitch_climb();
        let result = segment_refined(&points, &RefinerParams::default());

        assert_eq!(result.macro_boundaries, vec![0, 200]);
        assert!(is_contiguous(&result.segments, points.len()));
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].end(), 100);
        assert!((result.segments[0].slope_percent() - 25.0).abs() < 1e-6);
        assert!((result.segments[1].slope_percent() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_mountain_slopes_monotonic() {
        let points = mountain();
        let result = segment_refined(&points, &RefinerParams::default());

        assert_eq!(result.macro_boundaries, vec![0, 499, 999]);
        assert!(is_contiguous(&result.segments, points.len()));
        assert!(result.segments.len() >= 2);

        for segment in &result.segments {
            if segment.end() <= 499 {
                assert!(segment.slope > 0.0);
            } else {
                assert!(segment.start() >= 499);
                assert!(segment.slope < 0.0);
            }
        }
        assert!(result
            .segments
            .windows(2)
            .all(|w| w[0].slope > w[1].slope));
    }

    #[test]
    fn test_progress_reaches_100() {
        let points = mountain();
        let tracker = AtomicProgress::new();
        segment_refined_with_progress(&points, &RefinerParams::default(), &tracker);
        assert_eq!(tracker.latest(), 100);
        assert!(tracker.updates() >= 1);

        let tiny = AtomicProgress::new();
        let result = segment_refined_with_progress(&points[..3], &RefinerParams::default(), &tiny);
        assert!(result.segments.is_empty());
        assert_eq!(tiny.latest(), 100);
    }

    #[test]
    fn test_seeds_respect_fixed_minimum() {
        let points = two_pitch_climb();
        let seeds = seed_breakpoints(&points, 0, 200);
        let mut previous = 0;
        for seed in seeds {
            assert!(points[seed].distance - points[previous].distance >= SEED_MIN_DISTANCE_KM);
            previous = seed;
        }
    }

    #[test]
    fn test_spanish_aliases() {
        let params: RefinerParams = serde_json::from_str(
            r#"{"prominenciaMinima": 25, "distanciaMinima": 0.3, "diferenciaPendiente": 0.08}"#,
        )
        .unwrap();
        assert_eq!(params.min_prominence_m, 25.0);
        assert_eq!(params.min_distance_km, 0.3);
        assert_eq!(params.min_slope_difference, 0.08);
        assert!(params.validate().is_ok());
    }
}
