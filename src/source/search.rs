//! Typed search options for observation queries.
//!
//! Mirrors the query parameters of the `/heatmap-observations` endpoint.
//! Every field is optional; [`SearchOptions::resolve`] fills in defaults.

use crate::analysis::normalize_region_name;
use crate::error::ConfigError;
use crate::models::Observation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Query parameter carrying the region list.
pub const REGION_PARAM: &str = "subnational1_name";

/// Earliest date searched when no start date is given.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 1).unwrap_or_default()
}

/// Observation search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// First day included. Defaults to 2022-12-01.
    pub start_date: Option<NaiveDate>,
    /// Last day included. Defaults to today.
    pub end_date: Option<NaiveDate>,
    /// Substring of the species common name.
    pub common_name: Option<String>,
    /// Substring of the species scientific name.
    pub scientific_name: Option<String>,
    /// Substring of the family common name.
    pub family_common_name: Option<String>,
    /// Substring of the family scientific name.
    pub family_scientific_name: Option<String>,
    /// Region names to keep; empty keeps all.
    pub regions: Vec<String>,
}

impl SearchOptions {
    /// Fill defaults and normalize the text filters.
    ///
    /// Dates default to `2022-12-01 ..= today`. Text filters are trimmed
    /// and lower-cased; blank filters are dropped. Region names are
    /// normalized the same way region joins are.
    pub fn resolve(&self, today: NaiveDate) -> Self {
        Self {
            start_date: Some(self.start_date.unwrap_or_else(default_start_date)),
            end_date: Some(self.end_date.unwrap_or(today)),
            common_name: clean(&self.common_name),
            scientific_name: clean(&self.scientific_name),
            family_common_name: clean(&self.family_common_name),
            family_scientific_name: clean(&self.family_scientific_name),
            regions: self
                .regions
                .iter()
                .map(|r| normalize_region_name(r))
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    /// Overlay the fields set in `other` onto these options.
    pub fn merge(&mut self, other: &SearchOptions) {
        if other.start_date.is_some() {
            self.start_date = other.start_date;
        }
        if other.end_date.is_some() {
            self.end_date = other.end_date;
        }
        for (ours, theirs) in [
            (&mut self.common_name, &other.common_name),
            (&mut self.scientific_name, &other.scientific_name),
            (&mut self.family_common_name, &other.family_common_name),
            (&mut self.family_scientific_name, &other.family_scientific_name),
        ] {
            if theirs.is_some() {
                ours.clone_from(theirs);
            }
        }
        if !other.regions.is_empty() {
            self.regions = other.regions.clone();
        }
    }

    /// Query parameters for the observation endpoint, in a stable order.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();

        if let Some(date) = self.start_date {
            query.push(("start_date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(date) = self.end_date {
            query.push(("end_date", date.format("%Y-%m-%d").to_string()));
        }

        let texts = [
            ("common_name", &self.common_name),
            ("scientific_name", &self.scientific_name),
            ("family_common_name", &self.family_common_name),
            ("family_scientific_name", &self.family_scientific_name),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                query.push((key, value.clone()));
            }
        }

        if !self.regions.is_empty() {
            query.push((REGION_PARAM, self.regions.join(",")));
        }

        query
    }

    /// Whether an observation passes these (resolved) filters.
    ///
    /// Name filters are case-insensitive substring matches; a record
    /// lacking a filtered field does not match. The date range only
    /// applies to records carrying an observation date.
    pub fn matches(&self, obs: &Observation) -> bool {
        let text_filters = [
            (&self.common_name, &obs.common_name),
            (&self.scientific_name, &obs.scientific_name),
            (&self.family_common_name, &obs.family_common_name),
            (&self.family_scientific_name, &obs.family_scientific_name),
        ];
        for (needle, field) in text_filters {
            if let Some(needle) = needle {
                match field {
                    Some(value) if value.to_lowercase().contains(needle.as_str()) => {}
                    _ => return false,
                }
            }
        }

        if !self.regions.is_empty() {
            let region = normalize_region_name(&obs.region_name);
            if !self.regions.iter().any(|r| *r == region) {
                return false;
            }
        }

        if let Some(date) = obs.observation_date {
            if self.start_date.is_some_and(|start| date < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| date > end) {
                return false;
            }
        }

        true
    }

    /// Whether any filter beyond the date range is set.
    pub fn has_filters(&self) -> bool {
        self.common_name.is_some()
            || self.scientific_name.is_some()
            || self.family_common_name.is_some()
            || self.family_scientific_name.is_some()
            || !self.regions.is_empty()
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// Parse a `YYYY-MM-DD` date for the named field.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
