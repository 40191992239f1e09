//! Gradient detect-and-fuse segmentation (v2).
//!
//! ## Phase 1: raw detection
//! Inside each macro segment a candidate grows from its start and is compared
//! with the gradient of the next 5 points. As soon as they differ by the
//! configured change the candidate is emitted as a raw segment, whatever its
//! length. Each emission is reported as it happens.
//!
//! ## Phase 2: fusion
//! Segments shorter than the minimum distance are merged into a neighbour,
//! one fusion per pass, always the fusion with the best resulting R². A
//! fusion only happens when that R² exceeds 0.7, so some short segments may
//! remain. Every fusion produces a new frame: a complete, renderable segment
//! list for animated playback.

use std::ops::ControlFlow;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::builder::build_segment;
use crate::error::{ensure_non_negative, Result};
use crate::macro_segments::find_extrema;
use crate::regression::{gradient_between, regression_over};
use crate::{to_u32_indices, ElevationPoint, Segment, SegmentationResult};

use super::{ConvergenceState, SegmentationStrategy, StrategyKind};

/// Points in the forward window compared against the candidate.
const LOOKAHEAD_POINTS: usize = 5;
/// Upper bound on fusion passes (one fusion per pass).
pub const MAX_FUSION_PASSES: usize = 20;
/// A fusion is only performed when the merged segment's R² exceeds this.
pub const MIN_FUSION_R_SQUARED: f64 = 0.7;

/// Parameters for [`GradientDetectAndFuse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct GradientFuseParams {
    /// Prominence (m) for macro segmentation
    #[serde(alias = "prominenciaMinima")]
    pub min_prominence_m: f64,
    /// Segments shorter than this (km) are fusion candidates
    #[serde(alias = "distanciaMinima")]
    pub min_distance_km: f64,
    /// Gradient difference (percentage points) that emits a raw segment
    #[serde(alias = "cambioGradiente")]
    pub gradient_change: f64,
}

impl Default for GradientFuseParams {
    fn default() -> Self {
        Self {
            min_prominence_m: 30.0,
            min_distance_km: 0.20,
            gradient_change: 3.0,
        }
    }
}

impl GradientFuseParams {
    /// Longer minimum segments and a less sensitive detector.
    pub fn coarse() -> Self {
        Self {
            min_prominence_m: 50.0,
            min_distance_km: 0.5,
            gradient_change: 5.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("min_prominence_m", self.min_prominence_m)?;
        ensure_non_negative("min_distance_km", self.min_distance_km)?;
        ensure_non_negative("gradient_change", self.gradient_change)
    }
}

/// Gradient detect-and-fuse segmenter.
#[derive(Debug, Clone, Default)]
pub struct GradientDetectAndFuse {
    pub params: GradientFuseParams,
}

impl GradientDetectAndFuse {
    pub const MIN_POINTS: usize = 5;

    pub fn new(params: GradientFuseParams) -> Self {
        Self { params }
    }
}

impl SegmentationStrategy for GradientDetectAndFuse {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GradientDetectAndFuse
    }

    fn min_points(&self) -> usize {
        Self::MIN_POINTS
    }

    fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult {
        let animated = segment_with_animation(points, &self.params, |_, _| {});
        SegmentationResult {
            segments: animated.segments,
            macro_boundaries: animated.macro_boundaries,
        }
    }
}

/// Final segments together with every intermediate fusion frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct AnimatedSegmentation {
    /// The last frame
    pub segments: Vec<Segment>,
    /// Raw segments first, then one list per fusion
    pub frames: Vec<Vec<Segment>>,
    pub macro_boundaries: Vec<u32>,
}

/// Phase 1: detect raw segments, reporting each one with the running count.
///
/// Returns an empty list below the minimum point count.
pub fn detect_raw<F>(
    points: &[ElevationPoint],
    params: &GradientFuseParams,
    mut on_segment: F,
) -> Vec<Segment>
where
    F: FnMut(&Segment, usize),
{
    detect_raw_with(points, params, |segment, total| {
        on_segment(segment, total);
        ControlFlow::Continue(())
    })
}

/// Phase 1 with a callback that may stop detection early.
///
/// On `Break` the segments emitted so far are returned.
pub fn detect_raw_with<F>(
    points: &[ElevationPoint],
    params: &GradientFuseParams,
    mut on_segment: F,
) -> Vec<Segment>
where
    F: FnMut(&Segment, usize) -> ControlFlow<()>,
{
    let mut raw = Vec::new();
    for segment in RawSegments::new(points, params) {
        raw.push(segment);
        if on_segment(&raw[raw.len() - 1], raw.len()).is_break() {
            debug!("[Fusion] Raw detection stopped after {} segments", raw.len());
            break;
        }
    }
    raw
}

/// Lazy phase 1: yields raw segments in profile order.
///
/// Nothing is computed beyond the macro boundaries until the next segment is
/// requested, so a consumer can pace detection.
#[derive(Debug, Clone)]
pub struct RawSegments<'a> {
    points: &'a [ElevationPoint],
    boundaries: Vec<usize>,
    gradient_change: f64,
    /// Index into `boundaries` of the current macro segment's start
    macro_index: usize,
    current_start: usize,
    candidate: usize,
}

impl<'a> RawSegments<'a> {
    pub fn new(points: &'a [ElevationPoint], params: &GradientFuseParams) -> Self {
        let boundaries = if points.len() < GradientDetectAndFuse::MIN_POINTS {
            Vec::new()
        } else {
            find_extrema(points, params.min_prominence_m)
        };
        Self {
            points,
            boundaries,
            gradient_change: params.gradient_change,
            macro_index: 0,
            current_start: 0,
            candidate: 1,
        }
    }

    /// Macro boundaries the segments are detected within.
    pub fn macro_boundaries(&self) -> &[usize] {
        &self.boundaries
    }
}

impl Iterator for RawSegments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let end = *self.boundaries.get(self.macro_index + 1)?;

        while self.candidate < end {
            let candidate = self.candidate;
            self.candidate += 1;

            let ahead = (candidate + LOOKAHEAD_POINTS).min(end);
            let own = gradient_between(self.points, self.current_start, candidate);
            let forward = gradient_between(self.points, candidate, ahead);

            if (own - forward).abs() >= self.gradient_change {
                let segment = build_segment(self.points, self.current_start, candidate);
                self.current_start = candidate;
                return Some(segment);
            }
        }

        // Trailing remainder of the macro segment
        let tail = build_segment(self.points, self.current_start, end);
        self.macro_index += 1;
        self.current_start = end;
        self.candidate = end + 1;
        Some(tail)
    }
}

/// A fusion of the segment at `left` with the one after it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fusion {
    left: usize,
    r_squared: f64,
}

/// Best fusion over every undersized segment and both of its neighbours.
fn best_fusion(
    points: &[ElevationPoint],
    segments: &[Segment],
    min_distance_km: f64,
) -> Option<Fusion> {
    let mut best: Option<Fusion> = None;
    let mut consider = |left: usize| {
        let r_squared =
            regression_over(points, segments[left].start(), segments[left + 1].end()).r_squared;
        if best.map_or(true, |b| r_squared > b.r_squared) {
            best = Some(Fusion { left, r_squared });
        }
    };

    for (i, segment) in segments.iter().enumerate() {
        if segment.distance >= min_distance_km {
            continue;
        }
        if i > 0 {
            consider(i - 1);
        }
        if i + 1 < segments.len() {
            consider(i);
        }
    }

    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Initial,
    Fusing,
    Done,
}

/// Lazy sequence of fusion frames.
///
/// Yields the raw list first, then one complete list per fusion. The
/// sequence is finite and can be replayed with [`FusionFrames::restart`].
///
/// # Example
/// ```
/// use profile_segmenter::{build_segments, ElevationPoint, FusionFrames};
///
/// let points: Vec<ElevationPoint> = (0..=40)
///     .map(|i| ElevationPoint::new(i as f64 * 0.01, 100.0 + i as f64))
///     .collect();
/// let raw = build_segments(&points, &[5, 20]);
/// let frames: Vec<_> = FusionFrames::new(raw.clone(), &points, 0.2).collect();
/// assert_eq!(frames[0], raw);
/// assert_eq!(frames.last().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FusionFrames<'a> {
    points: &'a [ElevationPoint],
    raw: Vec<Segment>,
    current: Vec<Segment>,
    min_distance_km: f64,
    passes: usize,
    state: FrameState,
}

impl<'a> FusionFrames<'a> {
    pub fn new(raw: Vec<Segment>, points: &'a [ElevationPoint], min_distance_km: f64) -> Self {
        Self {
            points,
            current: raw.clone(),
            raw,
            min_distance_km,
            passes: 0,
            state: FrameState::Initial,
        }
    }

    /// Go back to the raw list; the next frame is the raw list again.
    pub fn restart(&mut self) {
        self.current = self.raw.clone();
        self.passes = 0;
        self.state = FrameState::Initial;
    }

    /// Segment list after the fusions performed so far.
    pub fn current(&self) -> &[Segment] {
        &self.current
    }

    /// Perform at most one fusion.
    fn step(&mut self) -> ConvergenceState {
        if self.passes >= MAX_FUSION_PASSES {
            return ConvergenceState::Converged;
        }
        self.passes += 1;

        match best_fusion(self.points, &self.current, self.min_distance_km) {
            Some(fusion) if fusion.r_squared > MIN_FUSION_R_SQUARED => {
                let left = &self.current[fusion.left];
                let right = &self.current[fusion.left + 1];
                let merged = build_segment(self.points, left.start(), right.end());
                debug!(
                    "[Fusion] Pass {}: merged {}..{} into {} (R² {:.3})",
                    self.passes,
                    merged.start_index,
                    merged.end_index,
                    merged.segment_type,
                    fusion.r_squared
                );
                self.current[fusion.left] = merged;
                self.current.remove(fusion.left + 1);
                ConvergenceState::Continuing
            }
            _ => ConvergenceState::Converged,
        }
    }
}

impl Iterator for FusionFrames<'_> {
    type Item = Vec<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            FrameState::Initial => {
                self.state = FrameState::Fusing;
                Some(self.current.clone())
            }
            FrameState::Fusing => match self.step() {
                ConvergenceState::Continuing => Some(self.current.clone()),
                ConvergenceState::Converged => {
                    self.state = FrameState::Done;
                    None
                }
            },
            FrameState::Done => None,
        }
    }
}

/// Phase 2: every fusion frame, raw list first.
pub fn fuse(raw: &[Segment], points: &[ElevationPoint], min_distance_km: f64) -> Vec<Vec<Segment>> {
    FusionFrames::new(raw.to_vec(), points, min_distance_km).collect()
}

/// Both phases: raw detection with per-segment reporting, then fusion.
pub fn segment_with_animation<F>(
    points: &[ElevationPoint],
    params: &GradientFuseParams,
    mut on_segment: F,
) -> AnimatedSegmentation
where
    F: FnMut(&Segment, usize),
{
    if points.len() < GradientDetectAndFuse::MIN_POINTS {
        let degenerate = SegmentationResult::degenerate(points.len());
        return AnimatedSegmentation {
            segments: Vec::new(),
            frames: vec![Vec::new()],
            macro_boundaries: degenerate.macro_boundaries,
        };
    }

    let detector = RawSegments::new(points, params);
    let boundaries = detector.macro_boundaries().to_vec();
    let mut raw = Vec::new();
    for segment in detector {
        raw.push(segment);
        on_segment(&raw[raw.len() - 1], raw.len());
    }
    let raw_count = raw.len();

    let frames = fuse(&raw, points, params.min_distance_km);
    let segments = frames.last().cloned().unwrap_or_default();

    info!(
        "[Fusion] {} points: {} raw segments -> {} after {} fusions",
        points.len(),
        raw_count,
        segments.len(),
        frames.len() - 1
    );

    AnimatedSegmentation {
        segments,
        frames,
        macro_boundaries: to_u32_indices(&boundaries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_segments, is_contiguous};

    fn mountain() -> Vec<ElevationPoint> {
        (0..1000)
            .map(|i| {
                let e = 500.0 + 200.0 * (std::f64::consts::PI * i as f64 / 999.0).sin();
                ElevationPoint::new(i as f64 * 0.0025, e)
            })
            .collect()
    }

    fn sawtooth() -> Vec<ElevationPoint> {
        // 50m teeth of +/-20m: any two neighbours fuse into a poor fit
        (0..=40)
            .map(|i| {
                let e = if i % 10 < 5 { (i % 5) as f64 * 4.0 } else { 20.0 - (i % 5) as f64 * 4.0 };
                ElevationPoint::new(i as f64 * 0.01, 300.0 + e)
            })
            .collect()
    }

    #[test]
    fn test_raw_detection_reports_each_segment() {
        let points = mountain();
        let mut reported = Vec::new();
        let raw = detect_raw(&points, &GradientFuseParams::default(), |segment, total| {
            reported.push((segment.clone(), total));
        });

        assert!(!raw.is_empty());
        assert!(is_contiguous(&raw, points.len()));
        assert_eq!(reported.len(), raw.len());
        for (i, (segment, total)) in reported.iter().enumerate() {
            assert_eq!(*total, i + 1);
            assert_eq!(segment, &raw[i]);
        }
    }

    #[test]
    fn test_raw_detection_can_stop() {
        let points = mountain();
        let raw = detect_raw_with(&points, &GradientFuseParams::default(), |_, total| {
            if total >= 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].end_index, raw[1].start_index);
    }

    #[test]
    fn test_raw_segments_iterator_is_lazy() {
        let points = mountain();
        let params = GradientFuseParams::default();
        let mut detector = RawSegments::new(&points, &params);
        assert_eq!(detector.macro_boundaries(), &[0, 499, 999]);

        let first = detector.next().unwrap();
        assert_eq!(first.start_index, 0);
        let rest: Vec<Segment> = detector.collect();
        assert_eq!(rest.last().map(|s| s.end_index), Some(999));
        assert_eq!(rest[0].start_index, first.end_index);
    }

    #[test]
    fn test_raw_ignores_minimum_distance() {
        let points = mountain();
        let raw = detect_raw(&points, &GradientFuseParams::default(), |_, _| {});
        assert!(raw.iter().any(|s| s.distance < 0.2));
    }

    #[test]
    fn test_frames_shrink_and_start_raw() {
        let points = mountain();
        let raw = detect_raw(&points, &GradientFuseParams::default(), |_, _| {});
        let frames = fuse(&raw, &points, 0.2);

        assert_eq!(frames[0], raw);
        assert!(frames.len() > 1);
        assert!(frames.len() <= MAX_FUSION_PASSES + 1);
        for pair in frames.windows(2) {
            assert!(pair[1].len() <= pair[0].len());
        }
        for frame in &frames {
            assert!(is_contiguous(frame, points.len()));
        }
    }

    #[test]
    fn test_no_profitable_fusion_keeps_raw() {
        let points = sawtooth();
        let raw = build_segments(&points, &[5, 10, 15, 20, 25, 30, 35]);
        let frames = fuse(&raw, &points, 0.2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], raw);
    }

    #[test]
    fn test_fusion_frames_restart() {
        let points = mountain();
        let raw = detect_raw(&points, &GradientFuseParams::default(), |_, _| {});
        let mut frames = FusionFrames::new(raw.clone(), &points, 0.2);

        let first_pass: Vec<_> = frames.by_ref().collect();
        assert!(frames.next().is_none());

        frames.restart();
        let second_pass: Vec<_> = frames.collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn test_segment_with_animation() {
        let points = mountain();
        let mut emitted = 0;
        let result = segment_with_animation(&points, &GradientFuseParams::default(), |_, total| {
            emitted = total;
        });

        assert_eq!(result.macro_boundaries, vec![0, 499, 999]);
        assert_eq!(emitted, result.frames[0].len());
        assert_eq!(Some(&result.segments), result.frames.last());
        assert!(is_contiguous(&result.segments, points.len()));
        assert!(result.segments.iter().all(|s| s.distance >= 0.2));
    }

    #[test]
    fn test_degenerate_input() {
        let points = vec![ElevationPoint::new(0.0, 10.0), ElevationPoint::new(0.1, 12.0)];
        let result = segment_with_animation(&points, &GradientFuseParams::default(), |_, _| {});
        assert!(result.segments.is_empty());
        assert_eq!(result.macro_boundaries, vec![0, 1]);
        assert!(detect_raw(&points, &GradientFuseParams::default(), |_, _| {}).is_empty());
    }
}
