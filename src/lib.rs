//! # Tour Pipeline
//!
//! Builds a small static dataset from a directory of GPX tracks and renders
//! one HTML page per tour.
//!
//! This library provides:
//! - Track geometry: distance, elevation statistics and point reduction
//! - Metadata inference from the `Title_CC_PP_Region_direction` filename convention
//! - An overview GeoJSON collection with simplified geometry
//! - Per-tour detail GeoJSON files with curated overrides, written only on change
//! - HTML pages from a template and Markdown notes, rebuilt only when stale
//!
//! ## Features
//!
//! - **`parallel`** - Read and build tracks in parallel with rayon
//! - **`markdown`** - Render notes with a CommonMark engine (pulldown-cmark)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tour_pipeline::{PipelineConfig, pipeline::{self, PipelineOptions}};
//!
//! let config = PipelineConfig::for_root("docs");
//! pipeline::run(&config, PipelineOptions { rerun: false })?;
//! # Ok::<(), tour_pipeline::TourError>(())
//! ```
//!
//! ## Artifacts
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`overview`] | `tracks/*.gpx` | `data/tours.geojson` |
//! | [`detail`] | `tracks/*.gpx`, `data/tours.geojson` | `data/tours_detail/<slug>.geojson` |
//! | [`pages`] | detail files, `tours_md/<slug>.md`, `templates/tour_page.html` | `tours/<slug>.html` |
//!
//! The slug (track file stem) joins all artifacts of one tour.

use log::info;

pub mod config;
pub mod detail;
pub mod error;
pub mod geo_utils;
pub mod geojson;
pub mod gpx;
pub mod markdown;
pub mod metadata;
pub mod overview;
pub mod pages;
pub mod pipeline;

pub use config::{PipelineConfig, SiteLayout};
pub use error::{Result, TourError};
pub use geo_utils::{distance_km, elevation_stats, simplify, ElevationStats};
pub use geojson::{apply_overrides, Feature, FeatureCollection, Properties, WriteOutcome};
pub use metadata::{parse_slug, SlugMetadata, TourMetadata};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS track point: longitude, latitude and an optional elevation in metres.
///
/// # Example
/// ```
/// use tour_pipeline::TrackPoint;
/// let summit = TrackPoint::new(-122.9490, 50.0590, Some(2182.0));
/// assert_eq!(summit.elevation, Some(2182.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
}

impl TrackPoint {
    /// Create a new track point.
    pub fn new(longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        Self { longitude, latitude, elevation }
    }
}

/// Per-stage run summary.
///
/// Unchanged writes and up-to-date pages are successes, counted apart from
/// fresh writes and from failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Artifacts written (new or changed content)
    pub written: usize,
    /// Detail files whose serialized content was byte-identical
    pub unchanged: usize,
    /// Pages skipped because they were newer than all inputs
    pub up_to_date: usize,
    /// Pages rewritten by a forced rebuild that already existed
    pub forced: usize,
    /// Tours skipped for lack of data (fewer than 2 points, not a feature)
    pub skipped: usize,
    /// Tours whose input could not be read or parsed
    pub failed: usize,
    /// Markdown notes scaffolded from the notes template
    pub created_notes: usize,
}

impl BuildReport {
    /// Log the summary under the given stage name.
    pub fn log_summary(&self, stage: &str) {
        info!(
            "[{}] written: {}, unchanged: {}, up to date: {}, forced: {}, skipped: {}, failed: {}, notes created: {}",
            stage,
            self.written,
            self.unchanged,
            self.up_to_date,
            self.forced,
            self.skipped,
            self.failed,
            self.created_notes,
        );
    }
}

/// Minimum number of points a track needs to produce any artifact.
pub const MIN_TRACK_POINTS: usize = 2;
