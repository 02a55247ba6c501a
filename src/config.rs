//! Site layout and build settings.
//!
//! All paths derive from a single site root (`docs/` by default):
//!
//! ```text
//! docs/
//!   tracks/*.gpx                 input tracks
//!   data/tours.geojson           overview collection
//!   data/tours_detail/*.geojson  detail records
//!   templates/tour_page.html     page template
//!   tours_md/_template.md        notes template
//!   tours_md/<slug>.md           authored notes
//!   tours/<slug>.html            generated pages
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TourError};

/// Input and output locations of one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteLayout {
    pub root: PathBuf,
    pub tracks_dir: PathBuf,
    pub overview_path: PathBuf,
    pub detail_dir: PathBuf,
    pub page_template: PathBuf,
    pub notes_dir: PathBuf,
    pub notes_template: PathBuf,
    pub pages_dir: PathBuf,
}

impl SiteLayout {
    /// Derive the conventional layout below `root`.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let notes_dir = root.join("tours_md");
        Self {
            tracks_dir: root.join("tracks"),
            overview_path: root.join("data").join("tours.geojson"),
            detail_dir: root.join("data").join("tours_detail"),
            page_template: root.join("templates").join("tour_page.html"),
            notes_template: notes_dir.join("_template.md"),
            notes_dir,
            pages_dir: root.join("tours"),
            root,
        }
    }

    pub fn detail_path(&self, slug: &str) -> PathBuf {
        self.detail_dir.join(format!("{slug}.geojson"))
    }

    pub fn notes_path(&self, slug: &str) -> PathBuf {
        self.notes_dir.join(format!("{slug}.md"))
    }

    pub fn page_path(&self, slug: &str) -> PathBuf {
        self.pages_dir.join(format!("{slug}.html"))
    }

    /// Sorted `*.gpx` files of the tracks directory.
    ///
    /// Missing directory or no tracks at all is fatal.
    pub fn track_files(&self) -> Result<Vec<PathBuf>> {
        list_inputs(&self.tracks_dir, "Tracks", "gpx")
    }

    /// Sorted `*.geojson` files of the detail directory.
    pub fn detail_files(&self) -> Result<Vec<PathBuf>> {
        list_inputs(&self.detail_dir, "Detail GeoJSON", "geojson")
    }
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self::from_root("docs")
    }
}

/// Settings shared by all pipeline stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: SiteLayout,

    /// Point budget of overview geometries.
    /// Default: 450
    pub overview_max_points: usize,

    /// Activity assigned to new tours until curated.
    /// Default: "ski_tour"
    pub default_activity: String,

    /// Difficulty written into overview entries until curated.
    /// Default: "moderate"
    pub default_difficulty: String,
}

impl PipelineConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: SiteLayout::from_root(root),
            ..Self::default()
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: SiteLayout::default(),
            overview_max_points: 450,
            default_activity: "ski_tour".to_string(),
            default_difficulty: "moderate".to_string(),
        }
    }
}

fn list_inputs(dir: &Path, what: &'static str, extension: &'static str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TourError::MissingDirectory { what, path: dir.to_path_buf() });
    }

    let entries = fs::read_dir(dir).map_err(|e| TourError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TourError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(TourError::NoInputs { extension, dir: dir.to_path_buf() });
    }
    Ok(files)
}
