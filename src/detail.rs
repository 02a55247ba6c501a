//! Per-tour detail records.
//!
//! Each track becomes `data/tours_detail/<slug>.geojson`: a collection with a
//! single full-resolution feature carrying inferred metadata, elevation
//! statistics and any curated fields from the overview.
//!
//! Files are only rewritten when their serialized content changes, so running
//! the stage twice on unchanged input touches nothing.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::geo_utils::{distance_km, elevation_stats, round_to, ElevationStats};
use crate::geojson::{
    apply_overrides, is_present, load_overview_by_slug, to_pretty_json, to_properties, write_if_changed, Feature,
    FeatureCollection, Geometry, Properties, WriteOutcome,
};
use crate::gpx::read_all_tracks;
use crate::metadata::{parse_slug, slug_from_path};
use crate::overview::{cover_path, gpx_path, page_path};
use crate::{BuildReport, TrackPoint, MIN_TRACK_POINTS};

/// Fields a curated overview entry may override in a detail record.
///
/// Computed geometry and statistics are never overridden.
pub const DETAIL_OVERRIDE_FIELDS: &[&str] = &[
    "subtitle",
    "activity",
    "difficulty",
    "vert_m",
    "time_h",
    "cover",
    "page",
    "gpx",
    "province",
    "region",
    "country",
];

/// Properties of a detail record before overrides, in output order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailProperties {
    pub slug: String,

    pub title: String,
    pub country_code: String,
    pub country: String,
    pub province_code: String,
    pub province: String,
    pub region: String,
    pub direction: String,

    pub subtitle: String,
    pub activity: String,
    pub difficulty: String,

    pub cover: String,
    pub page: String,
    pub gpx: String,

    pub start_lon: f64,
    pub start_lat: f64,

    pub distance_km: f64,
    #[serde(flatten)]
    pub elevation: ElevationStats,
}

impl DetailProperties {
    /// Inferred metadata, defaults and statistics of one track.
    ///
    /// `points` must not be empty.
    pub fn new(slug: &str, points: &[TrackPoint], default_activity: &str) -> Self {
        let parsed = parse_slug(slug);
        if !parsed.is_parsed() {
            debug!("{} does not follow Title_CC_PP_Region_direction, using title only", slug);
        }
        let meta = parsed.into_metadata();
        let start = points[0];
        Self {
            slug: slug.to_string(),
            title: meta.title,
            country_code: meta.country_code,
            country: meta.country,
            province_code: meta.province_code,
            province: meta.province,
            region: meta.region,
            direction: meta.direction,
            subtitle: String::new(),
            activity: default_activity.to_string(),
            difficulty: String::new(),
            cover: cover_path(slug),
            page: page_path(slug),
            gpx: gpx_path(slug),
            start_lon: start.longitude,
            start_lat: start.latitude,
            distance_km: round_to(distance_km(points), 2),
            elevation: elevation_stats(points),
        }
    }
}

/// Build the detail feature of one track, applying curated overrides.
///
/// `vert_m` comes from the overview when curated there, otherwise it is the
/// computed elevation gain in whole metres. Returns `None` for tracks with
/// fewer than two points.
pub fn build_detail_feature(
    slug: &str,
    points: &[TrackPoint],
    overrides: &Properties,
    default_activity: &str,
) -> Option<Feature> {
    if points.len() < MIN_TRACK_POINTS {
        return None;
    }

    let base = DetailProperties::new(slug, points, default_activity);
    let gain_m = base.elevation.gain_m;

    let mut properties = to_properties(&base);
    apply_overrides(&mut properties, overrides, DETAIL_OVERRIDE_FIELDS);

    let vert_curated = properties.get("vert_m").is_some_and(is_present);
    if !vert_curated {
        if let Some(gain) = gain_m {
            properties.insert("vert_m".to_string(), Value::from(gain as i64));
        }
    }

    Some(Feature::new(properties, Geometry::line_3d(points)))
}

/// Serialized detail file content for one feature.
pub fn render_detail(feature: Feature) -> String {
    to_pretty_json(&FeatureCollection::new(vec![feature]))
}

/// Rebuild all detail files, writing only the ones whose content changed.
pub fn build_details(config: &PipelineConfig) -> Result<BuildReport> {
    let layout = &config.layout;
    let files = layout.track_files()?;
    let overview = load_overview_by_slug(&layout.overview_path);
    debug!("Loaded {} curated overview entries", overview.len());

    let mut report = BuildReport::default();
    let no_overrides = Properties::new();

    for (path, points) in files.iter().zip(read_all_tracks(&files)) {
        let slug = slug_from_path(path);
        let points = match points {
            Ok(points) => points,
            Err(e) => {
                warn!("Skipping {}: {}", slug, e);
                report.failed += 1;
                continue;
            }
        };

        let overrides = overview.get(&slug).unwrap_or(&no_overrides);
        let Some(feature) = build_detail_feature(&slug, &points, overrides, &config.default_activity) else {
            warn!("Skipping {}: not enough points", slug);
            report.skipped += 1;
            continue;
        };

        match write_if_changed(&layout.detail_path(&slug), &render_detail(feature))? {
            WriteOutcome::Written => {
                debug!("Wrote detail for {}", slug);
                report.written += 1;
            }
            WriteOutcome::Unchanged => report.unchanged += 1,
        }
    }

    info!("Built/updated: {}, unchanged: {}", report.written, report.unchanged);
    info!("Wrote to: {}", layout.detail_dir.display());
    report.log_summary("detail");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn climb() -> Vec<TrackPoint> {
        vec![
            TrackPoint::new(-122.9574, 50.1163, Some(675.04)),
            TrackPoint::new(-122.9490, 50.1080, None),
            TrackPoint::new(-122.9400, 50.0990, Some(1020.6)),
            TrackPoint::new(-122.9300, 50.0900, Some(980.0)),
            TrackPoint::new(-122.9200, 50.0800, Some(1850.46)),
        ]
    }

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn build(overrides: Value) -> Properties {
        build_detail_feature("Ginpeak_CAN_BC_Whistler_up", &climb(), &props(overrides), "ski_tour")
            .unwrap()
            .properties
    }

    #[test]
    fn test_detail_properties_from_slug_and_track() {
        let p = build(json!({}));
        assert_eq!(p["slug"], "Ginpeak_CAN_BC_Whistler_up");
        assert_eq!(p["title"], "Ginpeak");
        assert_eq!(p["country"], "Canada");
        assert_eq!(p["province"], "British Columbia");
        assert_eq!(p["region"], "Whistler");
        assert_eq!(p["direction"], "up");
        assert_eq!(p["subtitle"], "");
        assert_eq!(p["activity"], "ski_tour");
        assert_eq!(p["difficulty"], "");
        assert_eq!(p["start_lon"], -122.9574);
        assert_eq!(p["min_ele_m"], 675.0);
        assert_eq!(p["max_ele_m"], 1850.5);
        assert_eq!(p["start_ele_m"], 675.0);
        assert_eq!(p["end_ele_m"], 1850.5);
        // 345.56 + 870.46 up, 40.6 down
        assert_eq!(p["gain_m"], 1216.0);
        assert_eq!(p["loss_m"], 41.0);
    }

    #[test]
    fn test_vert_m_falls_back_to_gain() {
        let p = build(json!({}));
        assert_eq!(p["vert_m"], json!(1216));
        assert!(p["vert_m"].is_i64());
    }

    #[test]
    fn test_vert_m_curated_wins() {
        let p = build(json!({"vert_m": 1300}));
        assert_eq!(p["vert_m"], json!(1300));

        let p = build(json!({"vert_m": ""}));
        assert_eq!(p["vert_m"], json!(1216));
    }

    #[test]
    fn test_vert_m_absent_without_elevation() {
        let points = vec![TrackPoint::new(0.0, 0.0, None), TrackPoint::new(0.01, 0.01, None)];
        let feature = build_detail_feature("flat", &points, &Properties::new(), "ski_tour").unwrap();
        assert!(!feature.properties.contains_key("vert_m"));
        assert_eq!(feature.properties["gain_m"], Value::Null);
    }

    #[test]
    fn test_subtitle_override_requires_value() {
        assert_eq!(build(json!({"subtitle": "Classic north couloir"}))["subtitle"], "Classic north couloir");
        assert_eq!(build(json!({"subtitle": ""}))["subtitle"], "");
        assert_eq!(build(json!({"subtitle": null}))["subtitle"], "");
    }

    #[test]
    fn test_only_allow_listed_fields_override() {
        let p = build(json!({
            "region": "Spearhead",
            "difficulty": "hard",
            "distance_km": 1.0,
            "gain_m": 5,
            "title": "Renamed",
            "direction": "down"
        }));
        assert_eq!(p["region"], "Spearhead");
        assert_eq!(p["difficulty"], "hard");
        assert_ne!(p["distance_km"], 1.0);
        assert_eq!(p["gain_m"], 1216.0);
        assert_eq!(p["title"], "Ginpeak");
        assert_eq!(p["direction"], "up");
    }

    #[test]
    fn test_detail_geometry_is_full_3d() {
        let points = climb();
        let feature = build_detail_feature("x", &points, &Properties::new(), "ski_tour").unwrap();
        let text = render_detail(feature);
        let value: Value = serde_json::from_str(&text).unwrap();
        let coords = value["features"][0]["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), points.len());
        assert_eq!(coords[1], json!([-122.949, 50.108, null]));
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unconventional_slug_keeps_title_only() {
        let feature = build_detail_feature("spanky_ladder", &climb(), &Properties::new(), "ski_tour").unwrap();
        let p = feature.properties;
        assert_eq!(p["title"], "Spanky Ladder");
        assert_eq!(p["country"], "");
        assert_eq!(p["province"], "");
        assert_eq!(p["direction"], "");
        assert_eq!(p["gain_m"], 1216.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = render_detail(build_detail_feature("x", &climb(), &Properties::new(), "ski_tour").unwrap());
        let b = render_detail(build_detail_feature("x", &climb(), &Properties::new(), "ski_tour").unwrap());
        assert_eq!(a, b);
    }
}
