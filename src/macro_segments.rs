//! Prominence-based macro segmentation.
//!
//! Splits a profile at the peaks and valleys that stand out by at least a
//! given prominence. Smaller wiggles only move the running extremum.

use log::debug;

use crate::ElevationPoint;

/// Points compared to infer the initial trend.
const TREND_LOOKAHEAD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
}

/// Find peak/valley indices separating broad climbs and descents.
///
/// A running extremum is committed only once the elevation has reversed by at
/// least `prominence_m` from it. The result always starts at 0 and ends at
/// `len - 1`, without duplicates. Inputs shorter than 3 points return
/// `[0, min(1, len - 1)]` (empty for an empty profile).
///
/// # Example
/// ```
/// use profile_segmenter::{find_extrema, ElevationPoint};
///
/// let profile: Vec<ElevationPoint> = (0..=100)
///     .map(|i| ElevationPoint::new(i as f64 * 0.1, 500.0 - (i as f64 - 50.0).abs() * 4.0))
///     .collect();
/// assert_eq!(find_extrema(&profile, 40.0), vec![0, 50, 100]);
/// ```
pub fn find_extrema(points: &[ElevationPoint], prominence_m: f64) -> Vec<usize> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    if n < 3 {
        let mut boundaries = vec![0, 1.min(n - 1)];
        boundaries.dedup();
        return boundaries;
    }

    let lookahead = TREND_LOOKAHEAD.min(n - 1);
    let mut trend = if points[lookahead].elevation >= points[0].elevation {
        Trend::Up
    } else {
        Trend::Down
    };

    let mut boundaries = vec![0];
    let mut extremum = 0;

    for i in 1..n {
        let elevation = points[i].elevation;
        let best = points[extremum].elevation;
        match trend {
            Trend::Up => {
                if elevation > best {
                    extremum = i;
                } else if best - elevation >= prominence_m {
                    push_unique(&mut boundaries, extremum);
                    trend = Trend::Down;
                    extremum = i;
                }
            }
            Trend::Down => {
                if elevation < best {
                    extremum = i;
                } else if elevation - best >= prominence_m {
                    push_unique(&mut boundaries, extremum);
                    trend = Trend::Up;
                    extremum = i;
                }
            }
        }
    }

    push_unique(&mut boundaries, n - 1);

    debug!(
        "[MacroSegments] {} boundaries from {} points (prominence {:.0}m)",
        boundaries.len(),
        n,
        prominence_m
    );

    boundaries
}

fn push_unique(boundaries: &mut Vec<usize>, index: usize) {
    if boundaries.last() != Some(&index) {
        boundaries.push(index);
    }
}

/// Consecutive `(start, end)` pairs of a boundary list.
pub(crate) fn macro_ranges(boundaries: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    boundaries
        .windows(2)
        .map(|w| (w[0], w[1]))
        .filter(|(start, end)| end > start)
}
