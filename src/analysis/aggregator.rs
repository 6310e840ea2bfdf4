//! Observation aggregation by region.
//!
//! This module turns raw observation rows into per-region totals. It never
//! touches the boundary set; joining totals onto features happens in
//! [`crate::geo`].

use crate::models::{Observation, RegionTotal};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

/// How region names are compared when joining observations to features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    /// Byte-for-byte equality.
    Exact,
    /// Trimmed, case-folded, inner whitespace collapsed.
    #[default]
    Normalized,
}

impl JoinMode {
    /// Returns the join key for a region name under this mode.
    pub fn key<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self {
            JoinMode::Exact => Cow::Borrowed(name),
            JoinMode::Normalized => Cow::Owned(normalize_region_name(name)),
        }
    }
}

/// Normalize a region name for joining.
pub fn normalize_region_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse raw JSON rows into observations, skipping malformed rows.
///
/// Returns the parsed observations and the number of rows skipped.
pub fn parse_observations(rows: &[Value]) -> (Vec<Observation>, usize) {
    let mut observations = Vec::with_capacity(rows.len());
    let mut skipped = 0;

    for (index, row) in rows.iter().enumerate() {
        match Observation::from_value(row) {
            Some(obs) => observations.push(obs),
            None => {
                debug!("Skipping malformed observation at index {}", index);
                skipped += 1;
            }
        }
    }

    (observations, skipped)
}

/// Sum observation counts per region name, comparing names exactly.
#[allow(dead_code)]
pub fn aggregate(observations: &[Observation]) -> HashMap<String, u64> {
    aggregate_with(observations, JoinMode::Exact)
}

/// Sum observation counts per region key under the given join mode.
///
/// Regions without observations are absent from the result.
pub fn aggregate_with(observations: &[Observation], mode: JoinMode) -> HashMap<String, u64> {
    let mut totals: HashMap<String, u64> = HashMap::new();

    for obs in observations {
        let total = totals.entry(mode.key(&obs.region_name).into_owned()).or_default();
        *total = total.saturating_add(obs.count);
    }

    totals
}

/// Sum of all counts in a totals map.
pub fn grand_total(totals: &HashMap<String, u64>) -> u64 {
    totals.values().fold(0u64, |acc, v| acc.saturating_add(*v))
}

/// Regions with data, highest total first (ties by name), truncated to `n`.
pub fn top_regions(regions: &[RegionTotal], n: usize) -> Vec<RegionTotal> {
    let mut ranked: Vec<RegionTotal> = regions
        .iter()
        .filter(|r| r.total_count > 0)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(n);
    ranked
}
