//! Species ranking over a set of observations.

use crate::models::Observation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default page size for rankings.
pub const DEFAULT_LIMIT: usize = 5;

/// A species and its summed count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRank {
    pub rank: usize,
    pub species_code: String,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub family_common_name: Option<String>,
    pub total_count: u64,
}

/// Rank species by total count and return one page.
///
/// `page` is 1-based; page 0 is treated as page 1. Observations without a
/// species code are ignored.
pub fn rank_species(observations: &[Observation], page: usize, limit: usize) -> Vec<SpeciesRank> {
    let mut by_species: HashMap<&str, SpeciesRank> = HashMap::new();

    for obs in observations {
        let Some(code) = obs.species_code.as_deref() else {
            continue;
        };

        let entry = by_species.entry(code).or_insert_with(|| SpeciesRank {
            rank: 0,
            species_code: code.to_string(),
            common_name: obs.common_name.clone(),
            scientific_name: obs.scientific_name.clone(),
            family_common_name: obs.family_common_name.clone(),
            total_count: 0,
        });
        entry.total_count = entry.total_count.saturating_add(obs.count);
    }

    let mut ranked: Vec<SpeciesRank> = by_species.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| a.common_name.cmp(&b.common_name))
            .then_with(|| a.species_code.cmp(&b.species_code))
    });

    let offset = page.max(1).saturating_sub(1).saturating_mul(limit);
    ranked
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(limit)
        .map(|(i, mut rank)| {
            rank.rank = i + 1;
            rank
        })
        .collect()
}
