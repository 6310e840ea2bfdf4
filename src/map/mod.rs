//! Choropleth construction.
//!
//! Wires the aggregation core to the boundary set: sum per region, join,
//! classify, annotate a copy of the boundaries and derive the legend.

pub mod state;

pub use state::MapState;

use crate::analysis::{
    aggregate_with, classify, grand_total, labels, rank_species, top_regions, BucketScheme,
    Palette,
};
use crate::geo::{AnnotateOptions, BoundarySet, FeatureCollection};
use crate::models::{LegendEntry, Observation, RegionTotal, Report, ReportMetadata};
use crate::source::{prepare_observations, SearchOptions};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Styling options for a choropleth.
#[derive(Debug, Clone)]
pub struct ChoroplethOptions {
    pub palette: Palette,
    /// Extrusion height per counted bird.
    pub height_scale: f64,
}

impl Default for ChoroplethOptions {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            height_scale: 10.0,
        }
    }
}

/// Result of one aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Choropleth {
    /// Annotated copy of the boundary set.
    pub collection: FeatureCollection,
    /// One row per named region, in feature order.
    pub regions: Vec<RegionTotal>,
    pub scheme: BucketScheme,
    pub legend: Vec<LegendEntry>,
    /// Region keys without a matching feature and their dropped totals.
    pub unmatched: BTreeMap<String, u64>,
    /// Sum of all matched counts.
    pub total_count: u64,
}

/// Aggregate observations onto the boundary set.
///
/// Pure with respect to `boundaries`: the reference set is only read.
pub fn build_choropleth(
    boundaries: &BoundarySet,
    observations: &[Observation],
    options: &ChoroplethOptions,
) -> Choropleth {
    let totals = aggregate_with(observations, boundaries.mode());
    let outcome = boundaries.join(&totals);

    let scheme = classify(&outcome.matched_totals());
    let legend = labels(&scheme, &options.palette);
    debug!(
        "Classified {} regions with a {} scheme ({} buckets)",
        outcome.matched.len(),
        scheme.kind(),
        scheme.bucket_count()
    );

    let annotate = AnnotateOptions {
        palette: &options.palette,
        height_scale: options.height_scale,
    };
    let annotated = boundaries.annotate(&outcome, &scheme, &annotate);

    Choropleth {
        collection: annotated.collection,
        regions: annotated.regions,
        scheme,
        legend,
        total_count: grand_total(&outcome.matched),
        unmatched: outcome.unmatched,
    }
}

/// Everything needed to turn a row payload into a render.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Observation source description.
    pub source: String,
    /// Boundary file description.
    pub boundaries: String,
    /// Resolved search options.
    pub search: SearchOptions,
    /// Apply `search` to the rows after loading.
    pub filter_locally: bool,
    pub choropleth: ChoroplethOptions,
    /// Number of regions listed in the report.
    pub top_regions: usize,
    pub ranking_page: usize,
    pub ranking_limit: usize,
}

/// A finished map: the annotated GeoJSON plus its report.
#[derive(Debug, Clone)]
pub struct MapRender {
    pub collection: FeatureCollection,
    pub report: Report,
}

/// Build a full render from a row payload.
pub fn render(boundaries: &BoundarySet, rows: &[Value], ctx: &RenderContext) -> MapRender {
    let start = Instant::now();

    let (observations, mut input) = prepare_observations(rows, &ctx.search, ctx.filter_locally);
    let choropleth = build_choropleth(boundaries, &observations, &ctx.choropleth);

    let mode = boundaries.mode();
    input.unmatched = observations
        .iter()
        .filter(|obs| choropleth.unmatched.contains_key(mode.key(&obs.region_name).as_ref()))
        .count();

    let species_ranking = rank_species(&observations, ctx.ranking_page, ctx.ranking_limit);
    let regions_with_data = choropleth.regions.iter().filter(|r| r.total_count > 0).count();

    info!(
        "Aggregated {} observations into {} of {} regions",
        observations.len(),
        regions_with_data,
        boundaries.len()
    );

    let metadata = ReportMetadata {
        source: ctx.source.clone(),
        boundaries: ctx.boundaries.clone(),
        generated_at: Utc::now(),
        input,
        regions: boundaries.len(),
        regions_with_data,
        total_count: choropleth.total_count,
        duration_seconds: start.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        top_regions: top_regions(&choropleth.regions, ctx.top_regions),
        unmatched_regions: choropleth.unmatched.keys().cloned().collect(),
        scheme: choropleth.scheme,
        legend: choropleth.legend,
        species_ranking,
    };

    MapRender {
        collection: choropleth.collection,
        report,
    }
}
