//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the segmenter to
//! Kotlin and Swift. Functions that would clash with the internal API are
//! prefixed with `ffi_`.

use log::{info, warn};

use crate::strategies::fusion::segment_with_animation;
use crate::strategies::gradient::segment_by_gradient;
use crate::strategies::refiner::{segment_refined, segment_refined_with_progress};
use crate::strategies::sustained::segment_sustained;
use crate::{
    find_extrema, init_logging, strategy_catalog, to_u32_indices, AnimatedSegmentation,
    ElevationPoint, GradientFuseParams, GradientThresholdParams, RefinerParams, Segment,
    SegmentationError, SegmentationResult, SegmentationSummary, StrategyConfig, StrategyInfo,
    SustainedChangeParams,
};

// ============================================================================
// Callback Interfaces (for real-time updates to mobile)
// ============================================================================

/// Callback interface for refinement progress.
/// Implement this in Kotlin/Swift to drive a progress bar.
#[uniffi::export(callback_interface)]
pub trait SegmentationProgressCallback: Send + Sync {
    /// Approximate completion in percent. 100 is always sent last.
    fn on_progress(&self, percent: u8);
}

/// Callback interface for progressive raw segment detection.
#[uniffi::export(callback_interface)]
pub trait RawSegmentCallback: Send + Sync {
    /// Called as soon as a raw segment is found.
    /// - segment: The new segment
    /// - total_found: Raw segments found so far, including this one
    fn on_raw_segment(&self, segment: Segment, total_found: u32);
}

// ============================================================================
// Strategies
// ============================================================================

/// Segment with the sustained-change strategy.
#[uniffi::export]
pub fn ffi_segment_sustained(
    points: Vec<ElevationPoint>,
    params: SustainedChangeParams,
) -> SegmentationResult {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_sustained called with {} points",
        points.len()
    );
    segment_sustained(&points, &params)
}

/// Segment with the dual-criterion refiner.
#[uniffi::export]
pub fn ffi_segment_refined(
    points: Vec<ElevationPoint>,
    params: RefinerParams,
) -> SegmentationResult {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_refined called with {} points",
        points.len()
    );
    segment_refined(&points, &params)
}

/// Segment with the dual-criterion refiner, reporting progress.
#[uniffi::export]
pub fn ffi_segment_refined_with_progress(
    points: Vec<ElevationPoint>,
    params: RefinerParams,
    callback: Box<dyn SegmentationProgressCallback>,
) -> SegmentationResult {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_refined_with_progress called with {} points",
        points.len()
    );

    let progress = move |percent: u8| callback.on_progress(percent);
    let start = std::time::Instant::now();
    let result = segment_refined_with_progress(&points, &params, &progress);

    info!(
        "[ProfileSegmenterRust] Refined into {} segments in {:?}",
        result.segments.len(),
        start.elapsed()
    );
    result
}

/// Segment with the gradient-threshold strategy.
#[uniffi::export]
pub fn ffi_segment_by_gradient(
    points: Vec<ElevationPoint>,
    params: GradientThresholdParams,
) -> SegmentationResult {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_by_gradient called with {} points",
        points.len()
    );
    segment_by_gradient(&points, &params)
}

/// Gradient detect-and-fuse with every fusion frame.
#[uniffi::export]
pub fn ffi_segment_with_animation(
    points: Vec<ElevationPoint>,
    params: GradientFuseParams,
) -> AnimatedSegmentation {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_with_animation called with {} points",
        points.len()
    );
    segment_with_animation(&points, &params, |_, _| {})
}

/// Gradient detect-and-fuse, handing each raw segment to the callback as it
/// is detected, before fusion starts.
#[uniffi::export]
pub fn ffi_segment_with_animation_progressive(
    points: Vec<ElevationPoint>,
    params: GradientFuseParams,
    callback: Box<dyn RawSegmentCallback>,
) -> AnimatedSegmentation {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_with_animation_progressive called with {} points",
        points.len()
    );

    let result = segment_with_animation(&points, &params, |segment, total| {
        callback.on_raw_segment(segment.clone(), total as u32);
    });

    info!(
        "[ProfileSegmenterRust] {} frames, {} final segments",
        result.frames.len(),
        result.segments.len()
    );
    result
}

/// Peak/valley indices at the given prominence.
#[uniffi::export]
pub fn ffi_find_extrema(points: Vec<ElevationPoint>, prominence_m: f64) -> Vec<u32> {
    init_logging();
    to_u32_indices(&find_extrema(&points, prominence_m))
}

/// Summary figures over a segment list.
#[uniffi::export]
pub fn ffi_summarize_segments(segments: Vec<Segment>) -> SegmentationSummary {
    SegmentationSummary::from_segments(&segments)
}

// ============================================================================
// Parameter Presets
// ============================================================================

#[uniffi::export]
pub fn default_sustained_params() -> SustainedChangeParams {
    SustainedChangeParams::default()
}

#[uniffi::export]
pub fn coarse_sustained_params() -> SustainedChangeParams {
    SustainedChangeParams::coarse()
}

#[uniffi::export]
pub fn default_refiner_params() -> RefinerParams {
    RefinerParams::default()
}

#[uniffi::export]
pub fn detailed_refiner_params() -> RefinerParams {
    RefinerParams::detailed()
}

#[uniffi::export]
pub fn default_gradient_params() -> GradientThresholdParams {
    GradientThresholdParams::default()
}

#[uniffi::export]
pub fn default_fuse_params() -> GradientFuseParams {
    GradientFuseParams::default()
}

#[uniffi::export]
pub fn coarse_fuse_params() -> GradientFuseParams {
    GradientFuseParams::coarse()
}

/// All strategies with their default params as JSON.
#[uniffi::export]
pub fn ffi_strategy_catalog() -> Vec<StrategyInfo> {
    strategy_catalog().to_vec()
}

// ============================================================================
// JSON Interface
// ============================================================================

fn error_json(err: &SegmentationError) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}

/// Segment with a JSON strategy config (`{"strategy": ..., "params": ...}`).
///
/// # Returns
/// JSON string with the segmentation result, or `{"error": "..."}`
#[uniffi::export]
pub fn ffi_segment_json(config_json: String, points: Vec<ElevationPoint>) -> String {
    init_logging();
    info!(
        "[ProfileSegmenterRust] segment_json called with {} points",
        points.len()
    );

    let result = StrategyConfig::from_json(&config_json)
        .and_then(|config| config.try_segment(&points))
        .and_then(|result| Ok(serde_json::to_string(&result)?));

    result.unwrap_or_else(|err| {
        warn!("[ProfileSegmenterRust] segment_json failed: {}", err);
        error_json(&err)
    })
}

/// Segment from a flat buffer: `[d1, e1, d2, e2, ...]`.
/// This avoids the overhead of deserializing point objects.
///
/// # Returns
/// JSON string with the segmentation result, or `{"error": "..."}`
#[uniffi::export]
pub fn ffi_segment_flat(config_json: String, coords: Vec<f64>) -> String {
    let points: Vec<ElevationPoint> = coords
        .chunks_exact(2)
        .map(|chunk| ElevationPoint::new(chunk[0], chunk[1]))
        .collect();
    ffi_segment_json(config_json, points)
}

/// Run several JSON configs over one profile.
///
/// # Arguments
/// * `configs_json` - JSON array of strategy configs
///
/// # Returns
/// JSON array of outcomes in config order, or `{"error": "..."}`
#[uniffi::export]
pub fn ffi_compare_strategies(configs_json: String, points: Vec<ElevationPoint>) -> String {
    init_logging();
    info!(
        "[ProfileSegmenterRust] compare_strategies called with {} points",
        points.len()
    );

    let configs: Vec<StrategyConfig> = match serde_json::from_str(&configs_json) {
        Ok(configs) => configs,
        Err(e) => return error_json(&SegmentationError::from(e)),
    };
    if let Some(err) = configs.iter().find_map(|c| c.validate().err()) {
        return error_json(&err);
    }

    #[cfg(feature = "parallel")]
    let outcomes = crate::compare_strategies_parallel(&points, &configs);
    #[cfg(not(feature = "parallel"))]
    let outcomes = crate::compare_strategies(&points, &configs);

    serde_json::to_string(&outcomes).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hill() -> Vec<ElevationPoint> {
        (0..=200)
            .map(|i| {
                let d = i as f64 * 0.01;
                let e = if i <= 100 { 300.0 + d * 80.0 } else { 380.0 - (d - 1.0) * 80.0 };
                ElevationPoint::new(d, e)
            })
            .collect()
    }

    #[test]
    fn test_segment_json_round_trip() {
        let json = ffi_segment_json(
            r#"{"strategy": "gradient_threshold", "params": {}}"#.to_string(),
            hill(),
        );
        let result: SegmentationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.macro_boundaries, vec![0, 100, 200]);
    }

    #[test]
    fn test_segment_json_reports_errors() {
        let json = ffi_segment_json("not json".to_string(), hill());
        assert!(json.contains("\"error\""));

        let short = hill().into_iter().take(2).collect();
        let config = r#"{"strategy": "sustained_change", "params": {}}"#;
        let json = ffi_segment_json(config.to_string(), short);
        assert!(json.contains("minimum 10 required"), "{}", json);
    }

    #[test]
    fn test_flat_buffer_matches_points() {
        let points = hill();
        let coords: Vec<f64> = points.iter().flat_map(|p| [p.distance, p.elevation]).collect();
        let config = r#"{"strategy": "dual_criterion_refiner", "params": {}}"#.to_string();
        assert_eq!(
            ffi_segment_flat(config.clone(), coords),
            ffi_segment_json(config, points)
        );
    }

    #[test]
    fn test_compare_strategies_json() {
        let configs = r#"[{"strategy": "gradient_threshold", "params": {}},
                          {"strategy": "gradient_detect_and_fuse", "params": {}}]"#;
        let json = ffi_compare_strategies(configs.to_string(), hill());
        let outcomes: Vec<crate::StrategyOutcome> = serde_json::from_str(&json).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].kind, crate::StrategyKind::GradientDetectAndFuse);
    }

    #[test]
    fn test_catalog_exported() {
        assert_eq!(ffi_strategy_catalog().len(), 4);
    }
}
