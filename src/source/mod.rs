//! Observation sources.
//!
//! Observations arrive either from a JSON file or from an HTTP endpoint.
//! Both yield the raw row array; [`prepare_observations`] turns rows into
//! typed observations and applies the search filters for sources that
//! cannot filter server-side.

pub mod http;
pub mod search;

pub use http::HttpSource;
pub use search::*;

use crate::analysis::parse_observations;
use crate::error::SourceError;
use crate::models::{InputStats, LoadState, Observation};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where observation rows come from.
#[derive(Debug, Clone)]
pub enum ObservationSource {
    /// A JSON file holding the row array.
    File(PathBuf),
    /// An endpoint that filters by query parameters.
    Http(HttpSource),
}

impl ObservationSource {
    /// Human-readable source description.
    pub fn describe(&self) -> String {
        match self {
            ObservationSource::File(path) => path.display().to_string(),
            ObservationSource::Http(source) => source.url().to_string(),
        }
    }

    /// Whether search filters must be applied after loading.
    pub fn filters_locally(&self) -> bool {
        matches!(self, ObservationSource::File(_))
    }

    /// Load the raw observation rows.
    pub async fn load(&self, options: &SearchOptions) -> LoadState<Vec<Value>> {
        let result = match self {
            ObservationSource::File(path) => load_observations_file(path),
            ObservationSource::Http(source) => source.fetch(options).await,
        };
        result.into()
    }
}

/// Parse an observation payload, which must be a JSON array.
pub fn parse_payload(text: &str) -> Result<Vec<Value>, SourceError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(rows) => Ok(rows),
        _ => Err(SourceError::NotArray),
    }
}

/// Read an observation payload from a file.
pub fn load_observations_file(path: &Path) -> Result<Vec<Value>, SourceError> {
    info!("Reading observations from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_payload(&content)
}

/// Turn raw rows into observations, filtering locally when asked.
///
/// `options` must already be resolved. Malformed rows are skipped and
/// counted, never reported as errors.
pub fn prepare_observations(
    rows: &[Value],
    options: &SearchOptions,
    filter_locally: bool,
) -> (Vec<Observation>, InputStats) {
    let (mut observations, malformed) = parse_observations(rows);
    let parsed = observations.len();

    if filter_locally {
        observations.retain(|obs| options.matches(obs));
    }

    let stats = InputStats {
        rows: rows.len(),
        malformed,
        filtered_out: parsed - observations.len(),
        unmatched: 0,
    };
    debug!("Prepared observations: {:?}", stats);

    (observations, stats)
}
