//! # Profile Segmenter
//!
//! Elevation-profile segmentation for trail-running route analysis.
//!
//! This library takes a dense `(distance, elevation)` profile from a GPS track
//! and partitions it into a few piecewise-linear segments, each classified as
//! ascent, descent or flat and scored with the R² of its linear fit.
//!
//! - Prominence-based macro segmentation (peaks and valleys)
//! - Four independent breakpoint strategies sharing one regression kernel
//! - Progressive detection and frame-by-frame fusion for animated display
//!
//! ## Features
//!
//! - **`parallel`** - Run several strategy configurations in parallel with rayon
//! - **`async`** - Expose raw segment detection as a tokio-backed stream
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use profile_segmenter::{ElevationPoint, StrategyConfig};
//!
//! // 3 km climb at 8% followed by a 2 km descent at -10%
//! let profile: Vec<ElevationPoint> = (0..=500)
//!     .map(|i| {
//!         let d = i as f64 * 0.01;
//!         let e = if d <= 3.0 { 80.0 * d } else { 240.0 - 100.0 * (d - 3.0) };
//!         ElevationPoint::new(d, e)
//!     })
//!     .collect();
//!
//! let result = StrategyConfig::default().segment(&profile);
//! for segment in &result.segments {
//!     println!(
//!         "{:?} {:.2} km at {:.1}% (R² {:.3})",
//!         segment.segment_type,
//!         segment.distance,
//!         segment.gradient_percent(),
//!         segment.r_squared
//!     );
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, SegmentationError};

// Regression, gradient and smoothing kernel
pub mod regression;
pub use regression::{classify, gradient, linear_regression, RegressionResult};

// Prominence-based peak/valley detection
pub mod macro_segments;
pub use macro_segments::find_extrema;

// Breakpoints -> finished segment records
pub mod builder;
pub use builder::{build_segment, build_segments, SegmentationSummary};

// Progress reporting and background detection
pub mod progress;
pub use progress::{
    spawn_raw_detection, AtomicProgress, NoopProgress, RawDetectionHandle, RawSegmentEvent,
    RefinementProgress,
};

// Segmentation strategies
pub mod strategies;
pub use strategies::{
    compare_strategies, strategy_catalog, ConvergenceState, DualCriterionRefiner,
    GradientDetectAndFuse, GradientFuseParams, GradientThreshold, GradientThresholdParams,
    RefinerParams, SegmentationStrategy, StrategyConfig, StrategyInfo, StrategyKind,
    StrategyOutcome, SustainedChange, SustainedChangeParams,
};
#[cfg(feature = "parallel")]
pub use strategies::compare_strategies_parallel;
pub use strategies::fusion::{
    detect_raw, fuse, segment_with_animation, AnimatedSegmentation, FusionFrames, RawSegments,
};

// Algorithm toolbox - modular access to all algorithms
pub mod algorithms;

// Async raw segment stream
#[cfg(feature = "async")]
pub mod stream;
#[cfg(feature = "async")]
pub use stream::raw_segment_stream;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("ProfileSegmenterRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A single sample of an elevation profile.
///
/// # Example
/// ```
/// use profile_segmenter::ElevationPoint;
/// let point = ElevationPoint::new(1.25, 843.0); // 1.25 km in, 843 m altitude
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct ElevationPoint {
    /// Cumulative distance along the track in kilometres
    pub distance: f64,
    /// Elevation in metres
    pub elevation: f64,
    /// Optional segment tag assigned by the caller
    #[serde(default)]
    pub segment_index: Option<i32>,
}

impl ElevationPoint {
    /// Create a new untagged point.
    pub fn new(distance: f64, elevation: f64) -> Self {
        Self {
            distance,
            elevation,
            segment_index: None,
        }
    }

    /// Check if distance and elevation are finite numbers.
    pub fn is_valid(&self) -> bool {
        self.distance.is_finite() && self.elevation.is_finite()
    }
}

/// Direction of a segment, from its net gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Ascent,
    Descent,
    Flat,
}

impl SegmentType {
    /// Display tag handed to renderers.
    pub fn color(&self) -> &'static str {
        match self {
            SegmentType::Ascent => "#e74c3c",
            SegmentType::Descent => "#3498db",
            SegmentType::Flat => "#95a5a6",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Ascent => "ascent",
            SegmentType::Descent => "descent",
            SegmentType::Flat => "flat",
        }
    }
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished piecewise-linear segment of a profile.
///
/// Adjacent segments of one result share their boundary point:
/// `segments[i].end_index == segments[i + 1].start_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Index of the first point in the input profile
    pub start_index: u32,
    /// Index of the last point in the input profile (inclusive)
    pub end_index: u32,
    pub start_point: ElevationPoint,
    pub end_point: ElevationPoint,
    /// Regression slope in metres per kilometre
    pub slope: f64,
    /// Regression intercept in metres
    pub intercept: f64,
    /// Goodness of fit of the regression (0.0-1.0)
    pub r_squared: f64,
    /// Segment length in kilometres
    pub distance: f64,
    /// Net elevation gained between the endpoints (metres, >= 0)
    pub elevation_gain: f64,
    /// Net elevation lost between the endpoints (metres, >= 0)
    pub elevation_loss: f64,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// Opaque display tag
    pub color: String,
}

impl Segment {
    /// Start index as a usize for slicing the profile.
    pub fn start(&self) -> usize {
        self.start_index as usize
    }

    /// End index (inclusive) as a usize for slicing the profile.
    pub fn end(&self) -> usize {
        self.end_index as usize
    }

    /// Net gradient between the endpoints, in percent.
    pub fn gradient_percent(&self) -> f64 {
        gradient(&self.start_point, &self.end_point)
    }

    /// Regression slope expressed in percent.
    pub fn slope_percent(&self) -> f64 {
        self.slope / 1000.0 * 100.0
    }
}

/// Output of a segmentation strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    /// Contiguous segments covering the whole profile (empty for tiny inputs)
    pub segments: Vec<Segment>,
    /// Peak/valley indices used to split the profile, first 0 and last len-1
    pub macro_boundaries: Vec<u32>,
}

impl SegmentationResult {
    /// Result for an input below a strategy's minimum size.
    pub(crate) fn degenerate(len: usize) -> Self {
        Self {
            segments: Vec::new(),
            macro_boundaries: trivial_boundaries(len),
        }
    }

    /// Summary statistics over the produced segments.
    pub fn summary(&self) -> SegmentationSummary {
        SegmentationSummary::from_segments(&self.segments)
    }
}

/// `[0, len - 1]`, collapsed to `[0]` for a single point and empty for no points.
pub(crate) fn trivial_boundaries(len: usize) -> Vec<u32> {
    match len {
        0 => Vec::new(),
        1 => vec![0],
        _ => vec![0, (len - 1) as u32],
    }
}

/// Convert internal boundary indices to the public representation.
pub(crate) fn to_u32_indices(indices: &[usize]) -> Vec<u32> {
    indices.iter().map(|&i| i as u32).collect()
}
