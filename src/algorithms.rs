//! # Algorithm Toolbox
//!
//! Direct access to the building blocks behind the strategies, for callers
//! that want to assemble their own segmentation pipeline.
//!
//! ## Kernel
//!
//! - **Linear Regression**: least squares fit with R²
//! - **Gradient**: percent grade between two points
//! - **Moving Average**: centered smoothing of elevations
//!
//! ## Building Blocks
//!
//! - **Macro Segmentation**: prominence-based peaks and valleys
//! - **Segment Builder**: breakpoints to finished segments
//! - **Per-strategy breakpoints**: seeding, wiggling and gradient cuts
//!
//! # Example
//!
//! ```rust
//! use profile_segmenter::algorithms::{
//!     build_segments, find_extrema, resample_profile, ElevationPoint,
//! };
//!
//! let raw = vec![
//!     ElevationPoint::new(0.0, 100.0),
//!     ElevationPoint::new(0.35, 135.0),
//!     ElevationPoint::new(1.0, 70.0),
//! ];
//! let profile = resample_profile(&raw, 0.05);
//! let boundaries = find_extrema(&profile, 20.0);
//! let segments = build_segments(&profile, &boundaries);
//! assert_eq!(segments.len(), 2);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{ElevationPoint, Segment, SegmentType, SegmentationResult};

// =============================================================================
// Kernel
// =============================================================================

pub use crate::regression::{
    classify, forward_window_end, gradient, linear_regression, moving_average, regression_over,
    RegressionResult, FLAT_BAND_PERCENT,
};

// =============================================================================
// Macro Segmentation and Building
// =============================================================================

/// Prominence-based peak/valley detection
pub use crate::macro_segments::find_extrema;
/// Build one segment over an inclusive index range
pub use crate::builder::build_segment;
/// Build contiguous segments from breakpoints
pub use crate::builder::build_segments;
/// Check that segments tile a profile
pub use crate::builder::is_contiguous;

// =============================================================================
// Strategy Internals
// =============================================================================

/// Slope-change events of the sustained-change strategy
pub use crate::strategies::sustained::{
    detect_inflections, detect_slope_changes, ChangeEvent, ChangeKind,
};

/// Initial breakpoints of the refiner within one macro segment
pub use crate::strategies::refiner::seed_breakpoints;
/// Positions tried when nudging a breakpoint
pub use crate::strategies::refiner::wiggle_candidates;

/// Gradient-threshold breakpoints within one macro segment
pub use crate::strategies::gradient::gradient_breakpoints;

/// Lazy raw detection and fusion frames
pub use crate::strategies::fusion::{FusionFrames, RawSegments};

// =============================================================================
// Profile Preparation
// =============================================================================

/// Resample a profile to a fixed distance spacing.
///
/// Elevations are linearly interpolated. The first and last input points are
/// always kept, so the last gap may be shorter than `spacing_km`. Points
/// whose distance does not increase are skipped. Segment tags are dropped.
///
/// # Example
/// ```rust
/// use profile_segmenter::algorithms::{resample_profile, ElevationPoint};
///
/// let raw = vec![ElevationPoint::new(0.0, 100.0), ElevationPoint::new(0.1, 110.0)];
/// let even = resample_profile(&raw, 0.025);
/// assert_eq!(even.len(), 5);
/// assert!((even[2].elevation - 105.0).abs() < 1e-9);
/// ```
pub fn resample_profile(points: &[ElevationPoint], spacing_km: f64) -> Vec<ElevationPoint> {
    if points.len() < 2 || !(spacing_km > 0.0) {
        return points.iter().map(|p| ElevationPoint::new(p.distance, p.elevation)).collect();
    }

    let first = points[0];
    let last = points[points.len() - 1];
    let mut result = vec![ElevationPoint::new(first.distance, first.elevation)];

    let mut target = first.distance + spacing_km;
    let mut previous = first;
    for &point in &points[1..] {
        if point.distance <= previous.distance {
            continue;
        }
        while target < point.distance && target < last.distance {
            let ratio = (target - previous.distance) / (point.distance - previous.distance);
            let elevation = previous.elevation + ratio * (point.elevation - previous.elevation);
            result.push(ElevationPoint::new(target, elevation));
            target = first.distance + spacing_km * result.len() as f64;
        }
        previous = point;
    }

    if last.distance > result[result.len() - 1].distance {
        result.push(ElevationPoint::new(last.distance, last.elevation));
    }
    result
}
