//! Gradient-threshold segmentation (v1).
//!
//! Inside each macro segment a candidate segment grows from its start. At
//! every candidate end its own gradient is compared with the gradient of the
//! next 100 m; a large enough difference on a long enough candidate commits
//! a breakpoint. There is no refinement pass.

use log::info;
use serde::{Deserialize, Serialize};

use crate::builder::build_segments;
use crate::error::{ensure_non_negative, Result};
use crate::macro_segments::{find_extrema, macro_ranges};
use crate::regression::{forward_window_end, gradient_between};
use crate::{to_u32_indices, ElevationPoint, SegmentationResult};

use super::{SegmentationStrategy, StrategyKind};

/// Forward window compared against the candidate (km).
const LOOKAHEAD_KM: f64 = 0.1;

/// Parameters for [`GradientThreshold`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct GradientThresholdParams {
    /// Prominence (m) for macro segmentation
    #[serde(alias = "prominenciaMinima")]
    pub min_prominence_m: f64,
    /// Minimum candidate length (km) before a breakpoint may be committed
    #[serde(alias = "distanciaMinima")]
    pub min_distance_km: f64,
    /// Gradient difference (percentage points) that commits a breakpoint
    #[serde(alias = "cambioGradiente")]
    pub gradient_change: f64,
}

impl Default for GradientThresholdParams {
    fn default() -> Self {
        Self {
            min_prominence_m: 30.0,
            min_distance_km: 0.20,
            gradient_change: 3.0,
        }
    }
}

impl GradientThresholdParams {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("min_prominence_m", self.min_prominence_m)?;
        ensure_non_negative("min_distance_km", self.min_distance_km)?;
        ensure_non_negative("gradient_change", self.gradient_change)
    }
}

/// Gradient-threshold segmenter.
#[derive(Debug, Clone, Default)]
pub struct GradientThreshold {
    pub params: GradientThresholdParams,
}

impl GradientThreshold {
    pub const MIN_POINTS: usize = 5;

    pub fn new(params: GradientThresholdParams) -> Self {
        Self { params }
    }
}

impl SegmentationStrategy for GradientThreshold {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GradientThreshold
    }

    fn min_points(&self) -> usize {
        Self::MIN_POINTS
    }

    fn segment(&self, points: &[ElevationPoint]) -> SegmentationResult {
        segment_by_gradient(points, &self.params)
    }
}

/// Segment a profile with the gradient-threshold strategy.
pub fn segment_by_gradient(
    points: &[ElevationPoint],
    params: &GradientThresholdParams,
) -> SegmentationResult {
    if points.len() < GradientThreshold::MIN_POINTS {
        return SegmentationResult::degenerate(points.len());
    }

    let boundaries = find_extrema(points, params.min_prominence_m);
    let mut breakpoints = boundaries.clone();
    for (start, end) in macro_ranges(&boundaries) {
        breakpoints.extend(gradient_breakpoints(points, start, end, params));
    }
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let segments = build_segments(points, &breakpoints);
    info!(
        "[GradientThreshold] {} points, {} macro segments -> {} segments",
        points.len(),
        boundaries.len().saturating_sub(1),
        segments.len()
    );

    SegmentationResult {
        segments,
        macro_boundaries: to_u32_indices(&boundaries),
    }
}

/// Breakpoints strictly inside the macro segment `start..=end`.
pub fn gradient_breakpoints(
    points: &[ElevationPoint],
    start: usize,
    end: usize,
    params: &GradientThresholdParams,
) -> Vec<usize> {
    let mut breakpoints = Vec::new();
    let mut current_start = start;

    for candidate in start + 1..end {
        let ahead = forward_window_end(points, candidate, LOOKAHEAD_KM, end);
        if ahead <= candidate {
            continue;
        }

        let own = gradient_between(points, current_start, candidate);
        let forward = gradient_between(points, candidate, ahead);
        let length = points[candidate].distance - points[current_start].distance;

        if (own - forward).abs() >= params.gradient_change && length >= params.min_distance_km {
            breakpoints.push(candidate);
            current_start = candidate;
        }
    }

    breakpoints
}
