//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::source::{parse_date, SearchOptions};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Birdmap - choropleth maps of bird observations
///
/// Sums observation counts per region, colors each region of a GeoJSON
/// boundary file by exact or quantile buckets, and writes the annotated
/// GeoJSON with a legend and summary report.
///
/// Examples:
///   birdmap --observations obs.json --boundaries us-states.json --geojson-out map.json
///   birdmap --url http://localhost:8080/heatmap-observations -b us-states.json --common-name hawk
///   birdmap -i obs.json -b us-states.json --region Texas,Ohio --format json -o report.json
///   birdmap --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file holding the observation array
    ///
    /// Takes precedence over --url.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub observations: Option<PathBuf>,

    /// Observation endpoint URL
    ///
    /// Search filters are sent as query parameters.
    /// Can also be set via BIRDMAP_URL env var or .birdmap.toml config.
    #[arg(short, long, value_name = "URL", env = "BIRDMAP_URL")]
    pub url: Option<String>,

    /// GeoJSON FeatureCollection of region boundaries
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "init_config"
    )]
    pub boundaries: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output file path for the annotated GeoJSON
    #[arg(short, long, value_name = "FILE")]
    pub geojson_out: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .birdmap.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    // === Search filters ===
    /// First observation date included (YYYY-MM-DD, default 2022-12-01)
    #[arg(long, value_name = "DATE", value_parser = parse_start_date)]
    pub start_date: Option<NaiveDate>,

    /// Last observation date included (YYYY-MM-DD, default today)
    #[arg(long, value_name = "DATE", value_parser = parse_end_date)]
    pub end_date: Option<NaiveDate>,

    /// Species common name contains
    #[arg(long, value_name = "TEXT")]
    pub common_name: Option<String>,

    /// Species scientific name contains
    #[arg(long, value_name = "TEXT")]
    pub scientific_name: Option<String>,

    /// Family common name contains
    #[arg(long, value_name = "TEXT")]
    pub family_common_name: Option<String>,

    /// Family scientific name contains
    #[arg(long, value_name = "TEXT")]
    pub family_scientific_name: Option<String>,

    /// Regions to include (comma-separated)
    ///
    /// Example: --region "Texas,New York"
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub region: Option<Vec<String>>,

    // === Report options ===
    /// Species ranking page (1-based)
    #[arg(long, value_name = "PAGE")]
    pub page: Option<usize>,

    /// Species per ranking page
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Join region names exactly (no trimming or case-folding)
    #[arg(long)]
    pub exact_join: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Re-fetch and rewrite outputs every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Exit with code 2 if any observation region matched no boundary
    #[arg(long)]
    pub fail_on_unmatched: bool,

    /// Dry run: load inputs and print counts without writing outputs
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .birdmap.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

fn parse_start_date(value: &str) -> Result<NaiveDate, String> {
    parse_date("start_date", value).map_err(|e| e.to_string())
}

fn parse_end_date(value: &str) -> Result<NaiveDate, String> {
    parse_date("end_date", value).map_err(|e| e.to_string())
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Observation URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref path) = self.observations {
            if !path.is_file() {
                return Err(format!("Observation file does not exist: {}", path.display()));
            }
        }

        if let Some(ref path) = self.boundaries {
            if !path.is_file() {
                return Err(format!("Boundary file does not exist: {}", path.display()));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(format!("Start date {} is after end date {}", start, end));
            }
        }

        if self.page == Some(0) {
            return Err("Page must be at least 1".to_string());
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.watch == Some(0) {
            return Err("Watch interval must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Search filters given on the command line.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            start_date: self.start_date,
            end_date: self.end_date,
            common_name: self.common_name.clone(),
            scientific_name: self.scientific_name.clone(),
            family_common_name: self.family_common_name.clone(),
            family_scientific_name: self.family_scientific_name.clone(),
            regions: self.region.clone().unwrap_or_default(),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
