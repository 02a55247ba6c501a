//! tours - build the tour site data and pages
//!
//! Usage:
//!   tours [--root <dir>] overview
//!   tours [--root <dir>] detail
//!   tours [--root <dir>] pages [--rerun]
//!   tours [--root <dir>] build [--rerun]
//!
//! `build` runs overview, detail and pages in order and stops at the first
//! fatal error.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;
use tour_pipeline::{
    detail::build_details,
    overview::build_overview,
    pages::{build_pages, PageOptions},
    pipeline::{self, PipelineOptions},
    PipelineConfig,
};

#[derive(Parser)]
#[command(name = "tours")]
#[command(about = "Build tour GeoJSON and HTML pages from GPX tracks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site root containing tracks/, data/, templates/, tours_md/ and tours/
    #[arg(long, global = true, env = "TOURS_ROOT", default_value = "docs")]
    root: PathBuf,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild data/tours.geojson from all tracks
    Overview,

    /// Rebuild data/tours_detail/<slug>.geojson, writing only changed files
    Detail,

    /// Render tours/<slug>.html from detail records and notes
    Pages {
        /// Rebuild every page even if it is up to date
        #[arg(long)]
        rerun: bool,
    },

    /// Run overview, detail and pages in order
    Build {
        /// Rebuild every page even if it is up to date
        #[arg(long)]
        rerun: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::for_root(&cli.root);

    match cli.command {
        Commands::Overview => {
            build_overview(&config).context("overview stage failed")?;
        }
        Commands::Detail => {
            build_details(&config).context("detail stage failed")?;
        }
        Commands::Pages { rerun } => {
            build_pages(&config, PageOptions { rerun }).context("pages stage failed")?;
        }
        Commands::Build { rerun } => {
            pipeline::run(&config, PipelineOptions { rerun })
                .with_context(|| format!("build failed for site root {}", cli.root.display()))?;
        }
    }

    Ok(())
}
