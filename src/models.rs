//! Data models for the choropleth pipeline.
//!
//! This module contains the observation record read from the wire, the
//! legend and region summaries produced by classification, and the
//! report structures written at the end of a run.

use crate::analysis::{BucketScheme, SpeciesRank};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire field carrying the region name.
pub const REGION_FIELD: &str = "subnational1_name";

/// Wire field carrying the observation count.
pub const COUNT_FIELD: &str = "total_count";

/// A single observation row.
///
/// Only `region_name` and `count` take part in aggregation; the remaining
/// fields are carried for search filtering and species ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// First-level administrative region (e.g. a US state).
    pub region_name: String,
    /// Number of birds counted.
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_scientific_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnational2_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_date: Option<NaiveDate>,
}

impl Observation {
    /// Creates an observation carrying only the aggregation fields.
    pub fn new(region_name: impl Into<String>, count: u64) -> Self {
        Self {
            region_name: region_name.into(),
            count,
            ..Self::default()
        }
    }

    /// Reads an observation from a loosely typed JSON row.
    ///
    /// Returns `None` when the region name is missing or not a string, or
    /// when the count is missing, negative, fractional or non-numeric.
    pub fn from_value(row: &Value) -> Option<Self> {
        let region_name = row.get(REGION_FIELD)?.as_str()?.to_string();
        let count = parse_count(row.get(COUNT_FIELD)?)?;

        let text = |field: &str| row.get(field).and_then(Value::as_str).map(String::from);

        Some(Self {
            region_name,
            count,
            species_code: text("species_code"),
            common_name: text("common_name"),
            scientific_name: text("scientific_name"),
            family_code: text("family_code"),
            family_common_name: text("family_common_name"),
            family_scientific_name: text("family_scientific_name"),
            subnational2_name: text("subnational2_name"),
            observation_date: row
                .get("observation_date")
                .and_then(Value::as_str)
                .and_then(parse_date_prefix),
        })
    }
}

/// Parse a count that may arrive as a JSON number or a numeric string.
///
/// MySQL `SUM()` over integers is returned as a decimal string by some
/// drivers, so `"12"` is accepted alongside `12` and `12.0`.
pub fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| integral_f64(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| integral_f64(s.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

fn integral_f64(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Parse the `YYYY-MM-DD` prefix of a date or timestamp string.
fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let prefix = value.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// One row of the map legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    /// Human-readable range, e.g. `"16 - 100"`.
    pub label: String,
    /// Palette color for the bucket.
    pub color: String,
}

/// Loading state of data handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    /// Nothing has been requested or published yet.
    NotLoaded,
    /// Data is available.
    Loaded(T),
    /// The last attempt failed with the given message.
    Failed(String),
}

impl<T> LoadState<T> {
    /// Returns the loaded data, if any.
    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    /// Returns true when data is available.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }

    /// Maps the loaded value, leaving the other states unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadState<U> {
        match self {
            LoadState::NotLoaded => LoadState::NotLoaded,
            LoadState::Loaded(data) => LoadState::Loaded(f(data)),
            LoadState::Failed(message) => LoadState::Failed(message),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for LoadState<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => LoadState::Loaded(data),
            Err(e) => LoadState::Failed(e.to_string()),
        }
    }
}

/// Per-region result row used in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTotal {
    pub name: String,
    pub total_count: u64,
    pub bucket_index: usize,
    pub color: String,
}

/// Counters describing how the observation input was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStats {
    /// Rows present in the payload.
    pub rows: usize,
    /// Rows skipped because they were malformed.
    pub malformed: usize,
    /// Rows rejected by the search options.
    pub filtered_out: usize,
    /// Rows whose region did not match any boundary feature.
    pub unmatched: usize,
}

/// Metadata about a choropleth run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Observation source (file path or URL).
    pub source: String,
    /// Boundary file path.
    pub boundaries: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Input counters.
    pub input: InputStats,
    /// Number of region features in the boundary set.
    pub regions: usize,
    /// Number of regions with a non-zero total.
    pub regions_with_data: usize,
    /// Sum of all matched counts.
    pub total_count: u64,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete choropleth report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub scheme: BucketScheme,
    pub legend: Vec<LegendEntry>,
    /// Regions with data, highest total first.
    pub top_regions: Vec<RegionTotal>,
    /// Region names from the observations that matched no feature.
    pub unmatched_regions: Vec<String>,
    pub species_ranking: Vec<SpeciesRank>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full_row() {
        let row = json!({
            "species_code": "reshaw",
            "family_code": "accipi1",
            "location_id": "L1000048",
            "latitude": 37.6939406,
            "longitude": -89.3823087,
            "common_name": "Red-shouldered Hawk",
            "scientific_name": "Buteo lineatus",
            "family_common_name": "Hawks, Eagles, and Kites",
            "family_scientific_name": "Accipitridae",
            "subnational1_name": "Illinois",
            "subnational2_name": "Jackson",
            "total_count": 2
        });

        let obs = Observation::from_value(&row).unwrap();
        assert_eq!(obs.region_name, "Illinois");
        assert_eq!(obs.count, 2);
        assert_eq!(obs.species_code.as_deref(), Some("reshaw"));
        assert_eq!(obs.subnational2_name.as_deref(), Some("Jackson"));
        assert_eq!(obs.observation_date, None);
    }

    #[test]
    fn test_from_value_rejects_malformed() {
        assert!(Observation::from_value(&json!({"total_count": 3})).is_none());
        assert!(Observation::from_value(&json!({"subnational1_name": "Ohio"})).is_none());
        assert!(
            Observation::from_value(&json!({"subnational1_name": 5, "total_count": 3})).is_none()
        );
        assert!(Observation::from_value(
            &json!({"subnational1_name": "Ohio", "total_count": "many"})
        )
        .is_none());
        assert!(
            Observation::from_value(&json!({"subnational1_name": "Ohio", "total_count": -1}))
                .is_none()
        );
        assert!(Observation::from_value(&json!("not an object")).is_none());
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count(&json!(7)), Some(7));
        assert_eq!(parse_count(&json!(7.0)), Some(7));
        assert_eq!(parse_count(&json!("12")), Some(12));
        assert_eq!(parse_count(&json!(" 12 ")), Some(12));
        assert_eq!(parse_count(&json!("12.0")), Some(12));
        assert_eq!(parse_count(&json!(2.5)), None);
        assert_eq!(parse_count(&json!(null)), None);
        assert_eq!(parse_count(&json!(true)), None);
    }

    #[test]
    fn test_observation_date_from_timestamp() {
        let row = json!({
            "subnational1_name": "Texas",
            "total_count": 1,
            "observation_date": "2023-03-21T04:00:00.000Z"
        });
        let obs = Observation::from_value(&row).unwrap();
        assert_eq!(
            obs.observation_date,
            NaiveDate::from_ymd_opt(2023, 3, 21)
        );
    }

    #[test]
    fn test_load_state_from_result() {
        let ok: LoadState<u32> = Ok::<_, String>(3).into();
        assert_eq!(ok.loaded(), Some(&3));
        assert!(ok.is_loaded());

        let failed: LoadState<u32> = Err::<u32, _>("boom").into();
        assert_eq!(failed, LoadState::Failed("boom".to_string()));
        assert!(!failed.is_loaded());

        let mapped = LoadState::Loaded(2).map(|n| n * 10);
        assert_eq!(mapped, LoadState::Loaded(20));
        assert_eq!(LoadState::<u32>::NotLoaded.map(|n| n + 1), LoadState::NotLoaded);
    }
}
