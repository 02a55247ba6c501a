//! # Geometry Engine
//!
//! Pure functions over GPS tracks: great-circle distance, elevation statistics
//! and fixed-budget point reduction.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two track points |
//! | [`distance_km`] | Total length of a track in kilometres |
//! | [`elevation_stats`] | Gain, loss and min/max/start/end elevation |
//! | [`simplify`] | Reduce a track to at most `max_count` points |
//! | [`round_to`] | Decimal rounding used for published statistics |
//!
//! ## Example
//!
//! ```rust
//! use tour_pipeline::{TrackPoint, geo_utils};
//!
//! let track = vec![
//!     TrackPoint::new(-122.9574, 50.1163, Some(675.0)),  // Whistler village
//!     TrackPoint::new(-122.9490, 50.1080, Some(1020.0)),
//!     TrackPoint::new(-122.9400, 50.0990, Some(1850.0)),
//! ];
//!
//! let km = geo_utils::distance_km(&track);
//! let stats = geo_utils::elevation_stats(&track);
//! println!("{:.2} km, +{:?} m", km, stats.gain_m);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine formula on a sphere with the IUGG mean Earth
//! radius of 6371.0088 km, the same radius the `geo` crate's [`Haversine`]
//! metric uses.
//!
//! ### Elevation Gaps
//!
//! Points without elevation are skipped, not interpolated: the next available
//! elevation is compared directly against the last available one. On tracks with
//! sparse elevation sampling this can understate gain and loss.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::TrackPoint;

/// Mean Earth radius in kilometres used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two track points, in kilometres.
///
/// Elevation is ignored.
///
/// # Example
///
/// ```rust
/// use tour_pipeline::{TrackPoint, geo_utils};
///
/// let london = TrackPoint::new(-0.1278, 51.5074, None);
/// let paris = TrackPoint::new(2.3522, 48.8566, None);
///
/// let km = geo_utils::haversine_km(&london, &paris);
/// assert!((km - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_km(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2) / 1000.0
}

/// Total length of a track in kilometres.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// tracks return 0.0.
pub fn distance_km(points: &[TrackPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Elevation
// =============================================================================

/// Elevation statistics for one track, in metres.
///
/// `gain_m`, `loss_m`, `min_ele_m` and `max_ele_m` need at least two
/// elevation samples. `start_ele_m`/`end_ele_m` are present with a single
/// sample and absent with none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationStats {
    pub gain_m: Option<f64>,
    pub loss_m: Option<f64>,
    pub min_ele_m: Option<f64>,
    pub max_ele_m: Option<f64>,
    pub start_ele_m: Option<f64>,
    pub end_ele_m: Option<f64>,
}

/// Compute ascent/descent statistics from point-to-point elevation differences.
///
/// Only points carrying an elevation take part. Gain and loss are rounded to
/// whole metres, min/max/start/end to one decimal.
///
/// # Example
///
/// ```rust
/// use tour_pipeline::{TrackPoint, geo_utils};
///
/// let track = vec![
///     TrackPoint::new(7.0, 46.0, Some(1000.0)),
///     TrackPoint::new(7.001, 46.001, None),
///     TrackPoint::new(7.002, 46.002, Some(1100.0)),
///     TrackPoint::new(7.003, 46.003, Some(1050.0)),
/// ];
///
/// let stats = geo_utils::elevation_stats(&track);
/// assert_eq!(stats.gain_m, Some(100.0));
/// assert_eq!(stats.loss_m, Some(50.0));
/// assert_eq!(stats.max_ele_m, Some(1100.0));
/// ```
pub fn elevation_stats(points: &[TrackPoint]) -> ElevationStats {
    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();

    if elevations.len() < 2 {
        return ElevationStats {
            start_ele_m: elevations.first().copied(),
            end_ele_m: elevations.last().copied(),
            ..ElevationStats::default()
        };
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    for w in elevations.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gain += delta;
        } else if delta < 0.0 {
            loss -= delta;
        }
    }

    let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    ElevationStats {
        gain_m: Some(round_to(gain, 0)),
        loss_m: Some(round_to(loss, 0)),
        min_ele_m: Some(round_to(min, 1)),
        max_ele_m: Some(round_to(max, 1)),
        start_ele_m: Some(round_to(elevations[0], 1)),
        end_ele_m: Some(round_to(elevations[elevations.len() - 1], 1)),
    }
}

// =============================================================================
// Simplification
// =============================================================================

/// Reduce a sequence to at most `max_count` points by even index-space sampling.
///
/// Sequences already within budget are returned unchanged. Otherwise the first
/// and last point are always kept and `max_count - 2` interior indices are taken
/// at `round(i * (n - 1) / (max_count - 1))`, deduplicated in ascending order.
/// A budget below 2 is treated as 2.
///
/// The reduction is lossy and one-directional, but stable: simplifying an
/// already simplified sequence with the same budget changes nothing.
///
/// # Example
///
/// ```rust
/// use tour_pipeline::geo_utils::simplify;
///
/// let idx: Vec<usize> = (0..1000).collect();
/// let slim = simplify(&idx, 450);
/// assert_eq!(slim.len(), 450);
/// assert_eq!(slim[0], 0);
/// assert_eq!(slim[449], 999);
/// ```
pub fn simplify<T: Clone>(points: &[T], max_count: usize) -> Vec<T> {
    let n = points.len();
    if n <= max_count {
        return points.to_vec();
    }
    let max_count = max_count.max(2);

    let step = (n - 1) as f64 / (max_count - 1) as f64;
    let mut indices = Vec::with_capacity(max_count);
    indices.push(0);
    for i in 1..max_count - 1 {
        let idx = ((i as f64 * step).round() as usize).min(n - 1);
        // Indices are non-decreasing, so checking the last one dedupes.
        if indices.last() != Some(&idx) {
            indices.push(idx);
        }
    }
    if indices.last() != Some(&(n - 1)) {
        indices.push(n - 1);
    }

    indices.into_iter().map(|i| points[i].clone()).collect()
}

/// Round to `decimals` places, working on the exact binary value with ties to even.
///
/// Goes through the correctly rounded float formatter, so `2.675` (stored as
/// `2.67499...`) becomes `2.67` and `0.25` becomes `0.2`.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn line(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(-122.95 + i as f64 * 0.001, 50.11, Some(600.0 + i as f64)))
            .collect()
    }

    #[test]
    fn test_haversine_same_point() {
        let p = TrackPoint::new(-122.9574, 50.1163, None);
        assert_eq!(haversine_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        // One degree along a meridian is R * pi / 180
        let a = TrackPoint::new(0.0, 0.0, None);
        let b = TrackPoint::new(0.0, 1.0, None);
        let expected = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
        assert!(approx_eq(haversine_km(&a, &b), expected, 1e-6));
    }

    #[test]
    fn test_distance_empty_and_single() {
        assert_eq!(distance_km(&[]), 0.0);
        assert_eq!(distance_km(&line(1)), 0.0);
    }

    #[test]
    fn test_distance_prefix_is_not_longer() {
        let track = line(20);
        let full = distance_km(&track);
        let prefix = distance_km(&track[..10]);
        assert!(prefix > 0.0);
        assert!(prefix <= full);
    }

    #[test]
    fn test_distance_is_additive() {
        let track = line(10);
        let split = distance_km(&track[..5]) + distance_km(&track[4..]);
        assert!(approx_eq(distance_km(&track), split, 1e-9));
    }

    #[test]
    fn test_elevation_stats_no_samples() {
        let track = vec![TrackPoint::new(0.0, 0.0, None), TrackPoint::new(0.1, 0.1, None)];
        assert_eq!(elevation_stats(&track), ElevationStats::default());
    }

    #[test]
    fn test_elevation_stats_single_sample() {
        let track = vec![TrackPoint::new(0.0, 0.0, Some(812.37)), TrackPoint::new(0.1, 0.1, None)];
        let stats = elevation_stats(&track);
        assert_eq!(stats.gain_m, None);
        assert_eq!(stats.loss_m, None);
        assert_eq!(stats.min_ele_m, None);
        assert_eq!(stats.max_ele_m, None);
        assert_eq!(stats.start_ele_m, Some(812.37));
        assert_eq!(stats.end_ele_m, Some(812.37));
    }

    #[test]
    fn test_elevation_stats_skips_gaps() {
        let track = vec![
            TrackPoint::new(0.0, 0.0, Some(100.0)),
            TrackPoint::new(0.0, 0.0, None),
            TrackPoint::new(0.0, 0.0, Some(160.4)),
            TrackPoint::new(0.0, 0.0, None),
            TrackPoint::new(0.0, 0.0, Some(120.2)),
        ];
        let stats = elevation_stats(&track);
        assert_eq!(stats.gain_m, Some(60.0));
        assert_eq!(stats.loss_m, Some(40.0));
        assert_eq!(stats.min_ele_m, Some(100.0));
        assert_eq!(stats.max_ele_m, Some(160.4));
        assert_eq!(stats.start_ele_m, Some(100.0));
        assert_eq!(stats.end_ele_m, Some(120.2));
    }

    #[test]
    fn test_simplify_within_budget_is_unchanged() {
        let track = line(10);
        assert_eq!(simplify(&track, 10), track);
        assert_eq!(simplify(&track, 400), track);
    }

    #[test]
    fn test_simplify_keeps_endpoints_and_budget() {
        let track = line(1000);
        for k in [2, 3, 7, 100, 450, 999] {
            let slim = simplify(&track, k);
            assert_eq!(slim.len(), k);
            assert_eq!(slim[0], track[0]);
            assert_eq!(slim[slim.len() - 1], track[999]);
        }
    }

    #[test]
    fn test_simplify_even_spacing() {
        let idx: Vec<usize> = (0..11).collect();
        assert_eq!(simplify(&idx, 6), vec![0, 2, 4, 6, 8, 10]);
        // 9 / 3 = 3.0 per step
        let idx: Vec<usize> = (0..10).collect();
        assert_eq!(simplify(&idx, 4), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_simplify_idempotent() {
        let idx: Vec<usize> = (0..5000).collect();
        let once = simplify(&idx, 450);
        assert_eq!(simplify(&once, 450), once);
    }

    #[test]
    fn test_simplify_tiny_budget() {
        let idx: Vec<usize> = (0..5).collect();
        assert_eq!(simplify(&idx, 1), vec![0, 4]);
        assert_eq!(simplify(&idx, 0), vec![0, 4]);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345, 2), 12.35);
        assert_eq!(round_to(1234.56, 0), 1235.0);
        assert_eq!(round_to(-0.25, 1), -0.2);
    }

    #[test]
    fn test_round_to_ties_to_even_on_binary_value() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(0.15, 1), 0.1);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(812.25, 1), 812.2);
    }

    #[test]
    fn test_elevation_stats_half_metre_gain_rounds_to_even() {
        let points = vec![
            TrackPoint::new(7.0, 46.0, Some(100.0)),
            TrackPoint::new(7.001, 46.0, Some(102.5)),
            TrackPoint::new(7.002, 46.0, Some(812.25)),
        ];
        let stats = elevation_stats(&points);
        // 2.5 + 709.75
        assert_eq!(stats.gain_m, Some(712.0));
        assert_eq!(stats.max_ele_m, Some(812.2));

        let stats = elevation_stats(&points[..2]);
        assert_eq!(stats.gain_m, Some(2.0));
    }
}
