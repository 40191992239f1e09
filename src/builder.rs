//! Segment builder shared by all strategies.
//!
//! Turns breakpoint indices into finished [`Segment`] records: the regression
//! is re-run over each final segment, the net gradient decides the type, and
//! gain/loss come from the endpoint elevations only.

use serde::{Deserialize, Serialize};

use crate::regression::{classify, gradient, regression_over};
use crate::{ElevationPoint, Segment, SegmentType};

/// Build one segment over the inclusive index range `start..=end`.
pub fn build_segment(points: &[ElevationPoint], start: usize, end: usize) -> Segment {
    debug_assert!(start <= end, "segment start {} after end {}", start, end);
    debug_assert!(end < points.len(), "segment end {} out of range", end);

    let start_point = points[start];
    let end_point = points[end];
    let fit = regression_over(points, start, end);
    let delta = end_point.elevation - start_point.elevation;
    let segment_type = classify(gradient(&start_point, &end_point));

    Segment {
        start_index: start as u32,
        end_index: end as u32,
        start_point,
        end_point,
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        distance: end_point.distance - start_point.distance,
        elevation_gain: delta.max(0.0),
        elevation_loss: (-delta).max(0.0),
        segment_type,
        color: segment_type.color().to_string(),
    }
}

/// Build contiguous segments from a breakpoint list.
///
/// `breakpoints` must be sorted; 0 and `len - 1` are added when missing and
/// duplicates are dropped, so every pair of neighbours becomes one segment
/// sharing its boundary point with the next.
pub fn build_segments(points: &[ElevationPoint], breakpoints: &[usize]) -> Vec<Segment> {
    if points.len() < 2 {
        return Vec::new();
    }
    let last = points.len() - 1;

    let mut cuts = Vec::with_capacity(breakpoints.len() + 2);
    cuts.push(0);
    for &bp in breakpoints {
        debug_assert!(bp <= last, "breakpoint {} out of range", bp);
        if bp > *cuts.last().unwrap_or(&0) && bp < last {
            cuts.push(bp);
        }
    }
    cuts.push(last);

    cuts.windows(2)
        .map(|w| build_segment(points, w[0], w[1]))
        .collect()
}

/// Check that a segment list covers `0..=last` with shared boundaries.
pub fn is_contiguous(segments: &[Segment], len: usize) -> bool {
    if segments.is_empty() || len == 0 {
        return segments.is_empty();
    }
    segments[0].start_index == 0
        && segments[segments.len() - 1].end() == len - 1
        && segments.windows(2).all(|w| w[0].end_index == w[1].start_index)
        && segments.iter().all(|s| s.end_index >= s.start_index)
}

/// Aggregate figures over a segment list, for dashboards and comparisons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct SegmentationSummary {
    pub segment_count: u32,
    pub ascent_count: u32,
    pub descent_count: u32,
    pub flat_count: u32,
    pub total_distance_km: f64,
    /// Sum of per-segment net gains (metres)
    pub total_gain_m: f64,
    /// Sum of per-segment net losses (metres)
    pub total_loss_m: f64,
    /// Distance-weighted mean R² (1.0 for an empty list)
    pub mean_r_squared: f64,
    pub min_r_squared: f64,
}

impl SegmentationSummary {
    pub fn from_segments(segments: &[Segment]) -> Self {
        if segments.is_empty() {
            return Self {
                mean_r_squared: 1.0,
                min_r_squared: 1.0,
                ..Self::default()
            };
        }

        let count_of = |kind: SegmentType| {
            segments.iter().filter(|s| s.segment_type == kind).count() as u32
        };
        let total_distance_km: f64 = segments.iter().map(|s| s.distance).sum();
        let mean_r_squared = if total_distance_km > 0.0 {
            segments.iter().map(|s| s.r_squared * s.distance).sum::<f64>() / total_distance_km
        } else {
            segments.iter().map(|s| s.r_squared).sum::<f64>() / segments.len() as f64
        };

        Self {
            segment_count: segments.len() as u32,
            ascent_count: count_of(SegmentType::Ascent),
            descent_count: count_of(SegmentType::Descent),
            flat_count: count_of(SegmentType::Flat),
            total_distance_km,
            total_gain_m: segments.iter().map(|s| s.elevation_gain).sum(),
            total_loss_m: segments.iter().map(|s| s.elevation_loss).sum(),
            mean_r_squared,
            min_r_squared: segments
                .iter()
                .map(|s| s.r_squared)
                .fold(f64::INFINITY, f64::min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> Vec<ElevationPoint> {
        // 1 km up at 10%, 1 km flat, 1 km down at 8%
        (0..=30)
            .map(|i| {
                let d = i as f64 * 0.1;
                let e = if d <= 1.0 {
                    100.0 + 100.0 * d
                } else if d <= 2.0 {
                    200.0
                } else {
                    200.0 - 80.0 * (d - 2.0)
                };
                ElevationPoint::new(d, e)
            })
            .collect()
    }

    #[test]
    fn test_build_segment_fields() {
        let points = zigzag();
        let segment = build_segment(&points, 0, 10);
        assert_eq!(segment.start_index, 0);
        assert_eq!(segment.end_index, 10);
        assert_eq!(segment.start_point, points[0]);
        assert_eq!(segment.end_point, points[10]);
        assert!((segment.distance - 1.0).abs() < 1e-9);
        assert!((segment.elevation_gain - 100.0).abs() < 1e-9);
        assert_eq!(segment.elevation_loss, 0.0);
        assert_eq!(segment.segment_type, SegmentType::Ascent);
        assert_eq!(segment.color, SegmentType::Ascent.color());
        assert!((segment.slope - 100.0).abs() < 1e-6);
        assert!((segment.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gain_loss_from_endpoints_only() {
        // Up 50m then down 50m: net zero, so no gain and no loss
        let points = vec![
            ElevationPoint::new(0.0, 100.0),
            ElevationPoint::new(0.5, 150.0),
            ElevationPoint::new(1.0, 100.0),
        ];
        let segment = build_segment(&points, 0, 2);
        assert_eq!(segment.elevation_gain, 0.0);
        assert_eq!(segment.elevation_loss, 0.0);
        assert_eq!(segment.segment_type, SegmentType::Flat);
    }

    #[test]
    fn test_build_segments_contiguous() {
        let points = zigzag();
        let segments = build_segments(&points, &[10, 20]);
        assert_eq!(segments.len(), 3);
        assert!(is_contiguous(&segments, points.len()));
        assert_eq!(segments[0].segment_type, SegmentType::Ascent);
        assert_eq!(segments[1].segment_type, SegmentType::Flat);
        assert_eq!(segments[2].segment_type, SegmentType::Descent);
        assert!((segments[2].elevation_loss - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_segments_normalizes_breakpoints() {
        let points = zigzag();
        let segments = build_segments(&points, &[0, 10, 10, 30]);
        assert_eq!(segments.len(), 2);
        assert!(is_contiguous(&segments, points.len()));
        assert!(build_segments(&points[..1], &[]).is_empty());
    }

    #[test]
    fn test_is_contiguous_detects_gaps() {
        let points = zigzag();
        let mut segments = build_segments(&points, &[10, 20]);
        segments[1].start_index = 11;
        assert!(!is_contiguous(&segments, points.len()));
    }

    #[test]
    fn test_summary() {
        let points = zigzag();
        let summary = SegmentationSummary::from_segments(&build_segments(&points, &[10, 20]));
        assert_eq!(summary.segment_count, 3);
        assert_eq!(summary.ascent_count, 1);
        assert_eq!(summary.flat_count, 1);
        assert_eq!(summary.descent_count, 1);
        assert!((summary.total_distance_km - 3.0).abs() < 1e-9);
        assert!((summary.total_gain_m - 100.0).abs() < 1e-9);
        assert!((summary.total_loss_m - 80.0).abs() < 1e-9);
        assert!(summary.min_r_squared > 0.999);

        let empty = SegmentationSummary::from_segments(&[]);
        assert_eq!(empty.segment_count, 0);
        assert_eq!(empty.mean_r_squared, 1.0);
    }
}
