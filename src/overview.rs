//! Overview collection: one simplified feature per tour.
//!
//! The overview (`data/tours.geojson`) drives the map of all tours and doubles
//! as the place where presentation fields are curated by hand. It is rewritten
//! as a whole on every run.

use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::geo_utils::{distance_km, round_to, simplify};
use crate::geojson::{to_pretty_json, to_properties, write_text, Feature, FeatureCollection, Geometry};
use crate::gpx::read_all_tracks;
use crate::metadata::{slug_from_path, title_from_slug};
use crate::{BuildReport, TrackPoint, MIN_TRACK_POINTS};

/// Properties of an overview entry, in output order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewProperties {
    pub slug: String,
    pub title: String,
    pub region: String,
    pub subtitle: String,
    pub activity: String,
    pub difficulty: String,
    pub distance_km: f64,
    pub vert_m: Option<f64>,
    pub time_h: Option<f64>,
    pub cover: String,
    pub page: String,
    pub gpx: String,
    pub start_lat: f64,
    pub start_lon: f64,
}

impl OverviewProperties {
    /// Defaults for a freshly discovered tour.
    ///
    /// `points` must not be empty.
    pub fn new(slug: &str, points: &[TrackPoint], config: &PipelineConfig) -> Self {
        let start = points[0];
        Self {
            slug: slug.to_string(),
            title: title_from_slug(slug),
            region: String::new(),
            subtitle: String::new(),
            activity: config.default_activity.clone(),
            difficulty: config.default_difficulty.clone(),
            distance_km: round_to(distance_km(points), 2),
            vert_m: None,
            time_h: None,
            cover: cover_path(slug),
            page: page_path(slug),
            gpx: gpx_path(slug),
            start_lat: start.latitude,
            start_lon: start.longitude,
        }
    }
}

/// Site-root-relative cover photo of a tour.
pub fn cover_path(slug: &str) -> String {
    format!("./photos/{slug}/cover.jpg")
}

/// Site-root-relative HTML page of a tour.
pub fn page_path(slug: &str) -> String {
    format!("./tours/{slug}.html")
}

/// Site-root-relative GPX download of a tour.
pub fn gpx_path(slug: &str) -> String {
    format!("./tracks/{slug}.gpx")
}

/// Build the overview feature of one track.
///
/// Returns `None` for tracks with fewer than two points. Distance is computed
/// from the full track, the geometry is reduced to the configured budget.
pub fn build_overview_feature(slug: &str, points: &[TrackPoint], config: &PipelineConfig) -> Option<Feature> {
    if points.len() < MIN_TRACK_POINTS {
        return None;
    }

    let properties = OverviewProperties::new(slug, points, config);
    let slim = simplify(points, config.overview_max_points);
    Some(Feature::new(to_properties(&properties), Geometry::line_2d(&slim)))
}

/// Rebuild `data/tours.geojson` from all tracks.
///
/// Fails only if the tracks directory is missing or empty, or the collection
/// cannot be written. Unreadable or too-short tracks are logged and left out.
pub fn build_overview(config: &PipelineConfig) -> Result<BuildReport> {
    let layout = &config.layout;
    let files = layout.track_files()?;
    let mut report = BuildReport::default();

    let features = collect_features(&files, config, &mut report);

    let count = features.len();
    let collection = FeatureCollection::new(features);
    write_text(&layout.overview_path, &to_pretty_json(&collection))?;
    report.written = 1;

    info!("Wrote {} with {} tours", layout.overview_path.display(), count);
    report.log_summary("overview");
    Ok(report)
}

fn collect_features(files: &[PathBuf], config: &PipelineConfig, report: &mut BuildReport) -> Vec<Feature> {
    let mut features = Vec::with_capacity(files.len());

    for (path, points) in files.iter().zip(read_all_tracks(files)) {
        let slug = slug_from_path(path);
        let points = match points {
            Ok(points) => points,
            Err(e) => {
                warn!("Skipping {}: {}", slug, e);
                report.failed += 1;
                continue;
            }
        };

        match build_overview_feature(&slug, &points, config) {
            Some(feature) => features.push(feature),
            None => {
                warn!("Skipping {}: not enough points", slug);
                report.skipped += 1;
            }
        }
    }

    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn track(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(-122.95 + i as f64 * 1e-4, 50.11 + i as f64 * 1e-4, Some(700.0)))
            .collect()
    }

    #[test]
    fn test_too_short_track_has_no_feature() {
        let config = PipelineConfig::default();
        assert!(build_overview_feature("a", &track(1), &config).is_none());
        assert!(build_overview_feature("a", &[], &config).is_none());
    }

    #[test]
    fn test_overview_properties() {
        let config = PipelineConfig::default();
        let feature = build_overview_feature("ginpeak_north", &track(3), &config).unwrap();
        let props = &feature.properties;

        assert_eq!(props["slug"], "ginpeak_north");
        assert_eq!(props["title"], "Ginpeak North");
        assert_eq!(props["region"], "");
        assert_eq!(props["activity"], "ski_tour");
        assert_eq!(props["difficulty"], "moderate");
        assert_eq!(props["vert_m"], Value::Null);
        assert_eq!(props["time_h"], Value::Null);
        assert_eq!(props["cover"], "./photos/ginpeak_north/cover.jpg");
        assert_eq!(props["page"], "./tours/ginpeak_north.html");
        assert_eq!(props["gpx"], "./tracks/ginpeak_north.gpx");
        assert_eq!(props["start_lat"], 50.11);
        assert_eq!(props["start_lon"], -122.95);

        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys.first(), Some(&"slug"));
        assert_eq!(keys.last(), Some(&"start_lon"));
    }

    #[test]
    fn test_overview_geometry_is_simplified_2d() {
        let config = PipelineConfig::default();
        let points = track(2000);
        let feature = build_overview_feature("long", &points, &config).unwrap();
        let coords = feature.geometry.coordinates();
        assert_eq!(coords.len(), 450);
        assert_eq!(coords[0].lon_lat(), (points[0].longitude, points[0].latitude));
        let last = points[1999];
        assert_eq!(coords[449].lon_lat(), (last.longitude, last.latitude));

        let geometry = serde_json::to_value(&feature.geometry).unwrap();
        assert_eq!(geometry["coordinates"][0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_distance_uses_full_track() {
        let config = PipelineConfig { overview_max_points: 2, ..PipelineConfig::default() };
        let points = track(50);
        let feature = build_overview_feature("zigzag", &points, &config).unwrap();
        let expected = round_to(distance_km(&points), 2);
        assert_eq!(feature.properties["distance_km"], json!(expected));
    }
}
