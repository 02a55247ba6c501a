//! Error types for the tour pipeline.
//!
//! Errors fall into two tiers:
//! - **Fatal** (configuration): a required directory or template is missing, or
//!   there is nothing to build. These abort the whole run.
//! - **Per-item** (data): one track or detail record could not be read. Builders
//!   log these and skip the offending tour.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TourError>;

#[derive(Debug, Error)]
pub enum TourError {
    /// A required input directory does not exist.
    #[error("{what} directory not found: {}", path.display())]
    MissingDirectory { what: &'static str, path: PathBuf },

    /// A required input file (template) does not exist.
    #[error("missing {what}: {}", path.display())]
    MissingFile { what: &'static str, path: PathBuf },

    /// The input directory exists but holds no files to process.
    #[error("no {extension} files found in {}", dir.display())]
    NoInputs { extension: &'static str, dir: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The track document is not well-formed XML.
    #[error("malformed track document: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A track or route point lacks a usable coordinate.
    #[error("invalid point #{index}: {reason}")]
    InvalidPoint { index: usize, reason: String },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON document parsed but is not a usable GeoJSON feature.
    #[error("{} is not a GeoJSON Feature or FeatureCollection", path.display())]
    InvalidFeature { path: PathBuf },
}

impl TourError {
    /// Wrap an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether this error indicates a broken environment rather than bad data.
    ///
    /// Fatal errors abort the run; everything else only skips one tour.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingDirectory { .. } | Self::MissingFile { .. } | Self::NoInputs { .. }
        )
    }
}
