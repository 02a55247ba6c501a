//! GeoJSON documents written and read by the pipeline.
//!
//! Only the subset the site uses is modelled: a `FeatureCollection` of
//! `Feature`s with `LineString` geometry and free-form properties. Properties
//! are an ordered JSON map so curated fields of unknown shape survive a
//! read/merge/write cycle.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, TourError};
use crate::TrackPoint;

/// Feature properties, in insertion order.
pub type Properties = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// One coordinate: `[lon, lat]` or `[lon, lat, ele]` (ele may be null).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    LonLat(f64, f64),
    LonLatEle(f64, f64, Option<f64>),
}

impl Position {
    pub fn lon_lat(&self) -> (f64, f64) {
        match *self {
            Self::LonLat(lon, lat) | Self::LonLatEle(lon, lat, _) => (lon, lat),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<Position> },
}

impl Geometry {
    /// 2D line for overview maps.
    pub fn line_2d(points: &[TrackPoint]) -> Self {
        Self::LineString {
            coordinates: points.iter().map(|p| Position::LonLat(p.longitude, p.latitude)).collect(),
        }
    }

    /// 3D line carrying elevation (null where unknown).
    pub fn line_3d(points: &[TrackPoint]) -> Self {
        Self::LineString {
            coordinates: points
                .iter()
                .map(|p| Position::LonLatEle(p.longitude, p.latitude, p.elevation))
                .collect(),
        }
    }

    pub fn coordinates(&self) -> &[Position] {
        match self {
            Self::LineString { coordinates } => coordinates,
        }
    }
}

/// A GeoJSON feature; `G` is the geometry representation.
///
/// Builders use the typed [`Geometry`]; readers that must tolerate
/// hand-edited files use `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<G = Geometry> {
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
    #[serde(default)]
    pub geometry: G,
}

impl<G> Feature<G> {
    pub fn new(properties: Properties, geometry: G) -> Self {
        Self { tag: FeatureTag::Feature, properties, geometry }
    }

    /// The `slug` property, if present and non-blank.
    pub fn slug(&self) -> Option<&str> {
        self.properties
            .get("slug")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<G = Geometry> {
    #[serde(rename = "type")]
    pub tag: CollectionTag,
    #[serde(default)]
    pub features: Vec<Feature<G>>,
}

impl<G> FeatureCollection<G> {
    pub fn new(features: Vec<Feature<G>>) -> Self {
        Self { tag: CollectionTag::FeatureCollection, features }
    }
}

/// A document holding either a bare feature or a collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged, bound(deserialize = "G: Deserialize<'de> + Default"))]
pub enum GeoJsonDocument<G = Value> {
    Feature(Feature<G>),
    Collection(FeatureCollection<G>),
}

impl<G> GeoJsonDocument<G> {
    /// The feature itself, or the first feature of a collection.
    pub fn into_first_feature(self) -> Option<Feature<G>> {
        match self {
            Self::Feature(feature) => Some(feature),
            Self::Collection(collection) => collection.features.into_iter().next(),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Properties, D::Error> {
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serialize a typed record into a property map, keeping field order.
pub fn to_properties<T: Serialize>(record: &T) -> Properties {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Properties::new(),
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Whether a curated value counts as set: not null and not an empty string.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Copy allow-listed fields from `overrides` into `target`.
///
/// A field is copied only if it is in `fields` and its value in `overrides`
/// is present (see [`is_present`]). Everything else in `overrides` is ignored.
/// Returns the number of fields copied.
///
/// # Example
/// ```
/// use serde_json::json;
/// use tour_pipeline::geojson::{apply_overrides, Properties};
///
/// let mut target: Properties = json!({"subtitle": "", "distance_km": 8.2}).as_object().unwrap().clone();
/// let curated: Properties = json!({"subtitle": "North face", "distance_km": 1.0}).as_object().unwrap().clone();
///
/// assert_eq!(apply_overrides(&mut target, &curated, &["subtitle"]), 1);
/// assert_eq!(target["subtitle"], "North face");
/// assert_eq!(target["distance_km"], 8.2);
/// ```
pub fn apply_overrides(target: &mut Properties, overrides: &Properties, fields: &[&str]) -> usize {
    let mut applied = 0;
    for field in fields {
        if let Some(value) = overrides.get(*field).filter(|v| is_present(v)) {
            target.insert((*field).to_string(), value.clone());
            applied += 1;
        }
    }
    applied
}

/// Overlay `primary` on top of `fallback`: keys of `primary` win.
pub fn merge_with_fallback(fallback: &Properties, primary: &Properties) -> Properties {
    let mut merged = fallback.clone();
    for (key, value) in primary {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ============================================================================
// File I/O
// ============================================================================

/// Outcome of writing an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or its content changed.
    Written,
    /// The file already had exactly this content and was not touched.
    Unchanged,
}

/// Pretty-printed JSON with two-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> String {
    // Serializing maps with string keys and finite numbers cannot fail.
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Write `text` to `path`, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TourError::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| TourError::io(path, e))
}

/// Write `text` unless the file already holds exactly these bytes.
///
/// Skipping identical writes keeps modification times stable for the page
/// staleness check downstream.
pub fn write_if_changed(path: &Path, text: &str) -> Result<WriteOutcome> {
    if let Ok(existing) = fs::read(path) {
        if existing == text.as_bytes() {
            return Ok(WriteOutcome::Unchanged);
        }
    }
    write_text(path, text)?;
    Ok(WriteOutcome::Written)
}

/// Read and parse a JSON file.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| TourError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| TourError::Json { path: path.to_path_buf(), source })
}

/// Curated overview properties keyed by slug.
///
/// A missing file yields an empty map. So does a malformed one: overrides are
/// optional, so a broken overview must not stop the build.
pub fn load_overview_by_slug(path: &Path) -> HashMap<String, Properties> {
    if !path.exists() {
        return HashMap::new();
    }

    match read_json::<FeatureCollection<Value>>(path) {
        Ok(collection) => collection
            .features
            .into_iter()
            .filter_map(|f| {
                let slug = f.slug()?.to_string();
                Some((slug, f.properties))
            })
            .collect(),
        Err(e) => {
            warn!("Ignoring overview overrides: {}", e);
            HashMap::new()
        }
    }
}
