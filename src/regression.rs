//! Geometry and statistics kernel shared by every strategy.
//!
//! ## Units
//! - distance in kilometres, elevation in metres
//! - regression slope in metres per kilometre
//! - gradients in percent (`slope / 1000 * 100`)

use serde::{Deserialize, Serialize};

use crate::{ElevationPoint, SegmentType};

/// Net gradient (percent) above which a segment counts as an ascent.
/// The band is symmetric: below `-FLAT_BAND_PERCENT` is a descent.
pub const FLAT_BAND_PERCENT: f64 = 2.0;

/// Result of an ordinary least squares fit of elevation against distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RegressionResult {
    /// Metres per kilometre
    pub slope: f64,
    /// Metres
    pub intercept: f64,
    /// Coefficient of determination, clamped to 0.0-1.0
    pub r_squared: f64,
}

impl RegressionResult {
    /// Slope expressed as a percentage gradient.
    pub fn slope_percent(&self) -> f64 {
        self.slope / 1000.0 * 100.0
    }

    /// `1 - R²`, the misfit used when comparing breakpoint positions.
    pub fn error(&self) -> f64 {
        1.0 - self.r_squared
    }
}

/// Ordinary least squares over `(x, y)` pairs.
///
/// Never fails:
/// - fewer than 2 points: slope 0, intercept the single y (or 0), R² 1
/// - all x identical: slope 0, intercept mean y
/// - constant y: R² 1
///
/// # Example
/// ```
/// use profile_segmenter::linear_regression;
///
/// let fit = linear_regression(&[(0.0, 100.0), (1.0, 150.0), (2.0, 200.0)]);
/// assert!((fit.slope - 50.0).abs() < 1e-9);
/// assert!((fit.r_squared - 1.0).abs() < 1e-9);
/// ```
pub fn linear_regression(points: &[(f64, f64)]) -> RegressionResult {
    let n = points.len();
    if n < 2 {
        return RegressionResult {
            slope: 0.0,
            intercept: points.first().map(|&(_, y)| y).unwrap_or(0.0),
            r_squared: 1.0,
        };
    }

    let count = n as f64;
    let mean_x = points.iter().map(|&(x, _)| x).sum::<f64>() / count;
    let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / count;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for &(x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;

    if syy == 0.0 {
        return RegressionResult {
            slope,
            intercept,
            r_squared: 1.0,
        };
    }

    let ss_res: f64 = points
        .iter()
        .map(|&(x, y)| {
            let residual = y - (slope * x + intercept);
            residual * residual
        })
        .sum();

    RegressionResult {
        slope,
        intercept,
        r_squared: (1.0 - ss_res / syy).clamp(0.0, 1.0),
    }
}

/// Regression over the inclusive index range `start..=end` of a profile.
pub fn regression_over(points: &[ElevationPoint], start: usize, end: usize) -> RegressionResult {
    debug_assert!(start <= end && end < points.len());
    let pairs: Vec<(f64, f64)> = points[start..=end]
        .iter()
        .map(|p| (p.distance, p.elevation))
        .collect();
    linear_regression(&pairs)
}

/// Gradient between two points in percent.
///
/// Returns 0 for zero-distance pairs; duplicate GPS fixes are common.
pub fn gradient(p1: &ElevationPoint, p2: &ElevationPoint) -> f64 {
    let delta_km = p2.distance - p1.distance;
    if delta_km == 0.0 {
        return 0.0;
    }
    (p2.elevation - p1.elevation) / (delta_km * 1000.0) * 100.0
}

/// Gradient between two indices of a profile.
pub(crate) fn gradient_between(points: &[ElevationPoint], from: usize, to: usize) -> f64 {
    gradient(&points[from], &points[to])
}

/// Classify a gradient (percent) into ascent, descent or flat.
pub fn classify(slope_percent: f64) -> SegmentType {
    if slope_percent > FLAT_BAND_PERCENT {
        SegmentType::Ascent
    } else if slope_percent < -FLAT_BAND_PERCENT {
        SegmentType::Descent
    } else {
        SegmentType::Flat
    }
}

/// First index after `from` lying at least `window_km` further along,
/// capped at `limit`.
pub fn forward_window_end(
    points: &[ElevationPoint],
    from: usize,
    window_km: f64,
    limit: usize,
) -> usize {
    let limit = limit.min(points.len().saturating_sub(1));
    let origin = points[from].distance;
    (from + 1..=limit)
        .find(|&k| points[k].distance - origin >= window_km)
        .unwrap_or(limit)
}

/// Centered moving average of a series.
///
/// Windows are truncated at the edges so the output has the input's length.
/// A window of 0 or 1 returns the series unchanged.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }

    let half = window / 2;
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for &v in values {
        let last = *prefix.last().unwrap_or(&0.0);
        prefix.push(last + v);
    }

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(values.len() - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64
        })
        .collect()
}

/// Copy of a profile with elevations replaced by their moving average.
pub(crate) fn smoothed_profile(points: &[ElevationPoint], window: usize) -> Vec<ElevationPoint> {
    let elevations: Vec<f64> = points.iter().map(|p| p.elevation).collect();
    moving_average(&elevations, window)
        .into_iter()
        .zip(points)
        .map(|(elevation, p)| ElevationPoint { elevation, ..*p })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(slope: f64, intercept: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 0.05;
                (x, slope * x + intercept)
            })
            .collect()
    }

    #[test]
    fn test_exact_line() {
        let fit = linear_regression(&line(85.0, 1200.0, 40));
        assert!((fit.slope - 85.0).abs() < 1e-9);
        assert!((fit.intercept - 1200.0).abs() < 1e-6);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert!((fit.slope_percent() - 8.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_line() {
        let fit = linear_regression(&line(-120.0, 900.0, 25));
        assert!((fit.slope + 120.0).abs() < 1e-9);
        assert!(fit.r_squared > 0.999_999);
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty = linear_regression(&[]);
        assert_eq!(empty.slope, 0.0);
        assert_eq!(empty.intercept, 0.0);
        assert_eq!(empty.r_squared, 1.0);

        let single = linear_regression(&[(3.0, 450.0)]);
        assert_eq!(single.intercept, 450.0);
        assert_eq!(single.r_squared, 1.0);

        let flat = linear_regression(&[(0.0, 10.0), (1.0, 10.0), (2.0, 10.0)]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 1.0);
    }

    #[test]
    fn test_identical_x_is_defined() {
        let fit = linear_regression(&[(1.0, 100.0), (1.0, 110.0)]);
        assert!(fit.slope.is_finite());
        assert!(fit.intercept.is_finite());
        assert!(fit.r_squared.is_finite());
        assert!((0.0..=1.0).contains(&fit.r_squared));
        assert!((fit.intercept - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_fit_in_bounds() {
        let points: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let x = i as f64 * 0.02;
                (x, 40.0 * x + if i % 2 == 0 { 3.0 } else { -3.0 })
            })
            .collect();
        let fit = linear_regression(&points);
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_gradient() {
        let a = ElevationPoint::new(1.0, 100.0);
        let b = ElevationPoint::new(1.5, 150.0);
        assert!((gradient(&a, &b) - 10.0).abs() < 1e-9);
        assert!((gradient(&b, &a) - 10.0).abs() < 1e-9);

        let c = ElevationPoint::new(2.0, 100.0);
        assert!((gradient(&b, &c) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_gradient_zero_distance() {
        let a = ElevationPoint::new(1.0, 100.0);
        let b = ElevationPoint::new(1.0, 180.0);
        assert_eq!(gradient(&a, &b), 0.0);
    }

    #[test]
    fn test_classify_band() {
        assert_eq!(classify(2.5), SegmentType::Ascent);
        assert_eq!(classify(2.0), SegmentType::Flat);
        assert_eq!(classify(0.0), SegmentType::Flat);
        assert_eq!(classify(-2.0), SegmentType::Flat);
        assert_eq!(classify(-7.0), SegmentType::Descent);
    }

    #[test]
    fn test_forward_window_end() {
        let points: Vec<ElevationPoint> = (0..20)
            .map(|i| ElevationPoint::new(i as f64 * 0.03, 0.0))
            .collect();
        // 0.1 km ahead of index 2 (0.06 km) is index 6 (0.18 km)
        assert_eq!(forward_window_end(&points, 2, 0.1, 19), 6);
        // Capped at the limit when the window runs past it
        assert_eq!(forward_window_end(&points, 17, 0.1, 19), 19);
        assert_eq!(forward_window_end(&points, 2, 0.1, 4), 4);
    }

    #[test]
    fn test_moving_average() {
        let values = vec![0.0, 3.0, 6.0, 9.0, 12.0];
        let smoothed = moving_average(&values, 3);
        assert_eq!(smoothed.len(), values.len());
        assert!((smoothed[0] - 1.5).abs() < 1e-9);
        assert!((smoothed[2] - 6.0).abs() < 1e-9);
        assert!((smoothed[4] - 10.5).abs() < 1e-9);

        assert_eq!(moving_average(&values, 1), values);
    }

    #[test]
    fn test_smoothed_profile_keeps_distance() {
        let points = vec![
            ElevationPoint::new(0.0, 0.0),
            ElevationPoint::new(0.1, 10.0),
            ElevationPoint::new(0.2, 0.0),
        ];
        let smoothed = smoothed_profile(&points, 3);
        assert_eq!(smoothed[1].distance, 0.1);
        assert!((smoothed[1].elevation - 10.0 / 3.0).abs() < 1e-9);
    }
}
