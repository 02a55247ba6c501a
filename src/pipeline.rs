//! Full build: overview, then detail records, then pages.
//!
//! Stages run in order and the first fatal error stops the run, so a later
//! stage never consumes a half-built earlier artifact.

use log::info;

use crate::config::PipelineConfig;
use crate::detail::build_details;
use crate::error::Result;
use crate::overview::build_overview;
use crate::pages::{build_pages, PageOptions};
use crate::BuildReport;

/// Options of a full build.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Rebuild every page regardless of modification times.
    pub rerun: bool,
}

/// Reports of the three stages of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub overview: BuildReport,
    pub detail: BuildReport,
    pub pages: BuildReport,
}

/// Run all stages against one site.
pub fn run(config: &PipelineConfig, options: PipelineOptions) -> Result<PipelineReport> {
    info!("Running overview stage");
    let overview = build_overview(config)?;

    info!("Running detail stage");
    let detail = build_details(config)?;

    info!("Running pages stage");
    let pages = build_pages(config, PageOptions { rerun: options.rerun })?;

    info!("Build pipeline finished successfully");
    Ok(PipelineReport { overview, detail, pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TourError;

    #[test]
    fn test_missing_tracks_stops_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::for_root(dir.path());

        let err = run(&config, PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, TourError::MissingDirectory { .. }));
        assert!(err.is_fatal());
        assert!(!config.layout.overview_path.exists());
        assert!(!config.layout.pages_dir.exists());
    }
}
