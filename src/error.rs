//! Typed errors for the loading layers.
//!
//! The aggregation core never fails; these cover the boundary file,
//! configuration validation and observation sources.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the region boundary set.
#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("Failed to read boundary file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Boundary file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected a GeoJSON FeatureCollection, found type {0:?}")]
    NotFeatureCollection(String),
}

/// Errors raised by configuration validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Palette must contain exactly {expected} colors, found {found}")]
    PaletteSize { expected: usize, found: usize },

    #[error("Palette color at index {0} is empty")]
    EmptyColor(usize),

    #[error("Invalid date {value:?} for {field}: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("Ranking limit must be at least 1")]
    ZeroLimit,
}

/// Errors raised by an observation source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read observations from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Observation payload is not JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Observation payload must be a JSON array")]
    NotArray,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to observation endpoint at {0}")]
    Connect(String),

    #[error("Observation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}
