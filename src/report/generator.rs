//! Markdown report generation.
//!
//! This module generates Markdown and JSON choropleth reports and writes
//! them, together with the annotated GeoJSON, to disk.

use crate::analysis::{BucketScheme, SpeciesRank};
use crate::cli::OutputFormat;
use crate::geo::FeatureCollection;
use crate::map::MapRender;
use crate::models::{LegendEntry, LoadState, RegionTotal, Report, ReportMetadata};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Bird Observation Map Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_legend_section(&report.scheme, &report.legend));
    output.push_str(&generate_regions_section(&report.top_regions));
    output.push_str(&generate_unmatched_section(&report.unmatched_regions));
    output.push_str(&generate_ranking_section(&report.species_ranking));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Observations:** {}\n", metadata.source));
    section.push_str(&format!("- **Boundaries:** {}\n", metadata.boundaries));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows Read:** {}\n", metadata.input.rows));
    if metadata.input.malformed > 0 {
        section.push_str(&format!(
            "- **Malformed Rows:** {}\n",
            metadata.input.malformed
        ));
    }
    if metadata.input.filtered_out > 0 {
        section.push_str(&format!(
            "- **Filtered Out:** {}\n",
            metadata.input.filtered_out
        ));
    }
    if metadata.input.unmatched > 0 {
        section.push_str(&format!(
            "- **Unmatched Rows:** {}\n",
            metadata.input.unmatched
        ));
    }
    section.push_str(&format!(
        "- **Regions With Data:** {} of {}\n",
        metadata.regions_with_data, metadata.regions
    ));
    section.push_str(&format!("- **Total Count:** {}\n", metadata.total_count));
    section.push_str(&format!(
        "- **Duration:** {:.3}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the legend section.
fn generate_legend_section(scheme: &BucketScheme, legend: &[LegendEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Legend\n\n");

    if legend.is_empty() {
        section.push_str("No observations matched any region.\n\n");
        return section;
    }

    section.push_str(&format!("*Scheme: {}*\n\n", scheme.kind()));
    section.push_str("| Bucket | Range | Color |\n");
    section.push_str("|:---:|:---|:---|\n");

    for (i, entry) in legend.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | `{}` |\n",
            i, entry.label, entry.color
        ));
    }
    section.push('\n');

    section
}

/// Generate the top regions section.
fn generate_regions_section(regions: &[RegionTotal]) -> String {
    if regions.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Top Regions\n\n");
    section.push_str("| Region | Total | Bucket |\n");
    section.push_str("|:---|---:|:---:|\n");

    for region in regions {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            region.name, region.total_count, region.bucket_index
        ));
    }
    section.push('\n');

    section
}

/// Generate the unmatched regions section.
fn generate_unmatched_section(unmatched: &[String]) -> String {
    if unmatched.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Unmatched Regions\n\n");
    section.push_str("Observations for these regions matched no boundary feature and were dropped:\n\n");

    for name in unmatched {
        section.push_str(&format!("- `{}`\n", name));
    }
    section.push('\n');

    section
}

/// Generate the species ranking section.
fn generate_ranking_section(ranking: &[SpeciesRank]) -> String {
    if ranking.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Species Ranking\n\n");
    section.push_str("| # | Species | Scientific Name | Family | Total |\n");
    section.push_str("|:---:|:---|:---|:---|---:|\n");

    for species in ranking {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            species.rank,
            species.common_name.as_deref().unwrap_or(&species.species_code),
            species.scientific_name.as_deref().unwrap_or("-"),
            species.family_common_name.as_deref().unwrap_or("-"),
            species.total_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by birdmap v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Serialize the annotated boundaries.
pub fn generate_geojson(collection: &FeatureCollection) -> Result<String> {
    serde_json::to_string(collection).map_err(Into::into)
}

/// One-line description of the current map state.
pub fn status_line(state: &LoadState<Arc<MapRender>>) -> String {
    match state {
        LoadState::NotLoaded => "No map loaded yet".to_string(),
        LoadState::Loaded(render) => {
            let meta = &render.report.metadata;
            format!(
                "Map ready: {} birds across {} of {} regions ({} scheme)",
                meta.total_count,
                meta.regions_with_data,
                meta.regions,
                render.report.scheme.kind()
            )
        }
        LoadState::Failed(message) => format!("Map unavailable: {}", message),
    }
}

/// Write the report and, when a path is given, the annotated GeoJSON.
pub fn write_outputs(
    render: &MapRender,
    format: OutputFormat,
    report_path: &Path,
    geojson_path: Option<&Path>,
) -> Result<()> {
    let output = match format {
        OutputFormat::Json => generate_json_report(&render.report)?,
        OutputFormat::Markdown => generate_markdown_report(&render.report),
    };

    std::fs::write(report_path, &output)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    info!("Report written to {}", report_path.display());

    if let Some(path) = geojson_path {
        let geojson = generate_geojson(&render.collection)?;
        std::fs::write(path, geojson)
            .with_context(|| format!("Failed to write GeoJSON to {}", path.display()))?;
        info!("GeoJSON written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InputStats;
    use chrono::Utc;
    use serde_json::json;

    fn create_test_report() -> Report {
        let metadata = ReportMetadata {
            source: "obs.json".to_string(),
            boundaries: "us-states.json".to_string(),
            generated_at: Utc::now(),
            input: InputStats {
                rows: 12,
                malformed: 2,
                filtered_out: 0,
                unmatched: 1,
            },
            regions: 50,
            regions_with_data: 2,
            total_count: 142,
            duration_seconds: 0.02,
        };

        Report {
            metadata,
            scheme: BucketScheme::Exact {
                values: vec![42, 100],
            },
            legend: vec![
                LegendEntry {
                    label: "<= 42".to_string(),
                    color: "#fff9c4".to_string(),
                },
                LegendEntry {
                    label: "43 - 100".to_string(),
                    color: "#fff176".to_string(),
                },
            ],
            top_regions: vec![
                RegionTotal {
                    name: "Texas".to_string(),
                    total_count: 100,
                    bucket_index: 1,
                    color: "#fff176".to_string(),
                },
                RegionTotal {
                    name: "Ohio".to_string(),
                    total_count: 42,
                    bucket_index: 0,
                    color: "#fff9c4".to_string(),
                },
            ],
            unmatched_regions: vec!["ontario".to_string()],
            species_ranking: vec![SpeciesRank {
                rank: 1,
                species_code: "rethaw".to_string(),
                common_name: Some("Red-tailed Hawk".to_string()),
                scientific_name: Some("Buteo jamaicensis".to_string()),
                family_common_name: None,
                total_count: 90,
            }],
        }
    }

    fn create_test_render() -> MapRender {
        let collection: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "Texas", "total_count": 100, "color": "#fff176"},
                "geometry": null
            }]
        }))
        .unwrap();

        MapRender {
            collection,
            report: create_test_report(),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Bird Observation Map Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Legend"));
        assert!(markdown.contains("| 1 | 43 - 100 | `#fff176` |"));
        assert!(markdown.contains("| Texas | 100 | 1 |"));
        assert!(markdown.contains("- `ontario`"));
        assert!(markdown.contains("| 1 | Red-tailed Hawk | Buteo jamaicensis | - | 90 |"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let report = create_test_report();
        let section = generate_metadata_section(&report.metadata);

        assert!(section.contains("obs.json"));
        assert!(section.contains("us-states.json"));
        assert!(section.contains("Malformed Rows:** 2"));
        assert!(!section.contains("Filtered Out"));
        assert!(section.contains("2 of 50"));
    }

    #[test]
    fn test_empty_legend_section() {
        let section = generate_legend_section(&BucketScheme::Empty, &[]);
        assert!(section.contains("No observations matched any region."));
        assert!(!section.contains("| Bucket |"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"legend\""));
        assert!(json.contains("\"kind\": \"exact\""));
        assert!(json.contains("\"unmatched_regions\""));
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status_line(&LoadState::NotLoaded), "No map loaded yet");
        assert_eq!(
            status_line(&LoadState::Failed("timed out".to_string())),
            "Map unavailable: timed out"
        );

        let loaded = LoadState::Loaded(Arc::new(create_test_render()));
        assert_eq!(
            status_line(&loaded),
            "Map ready: 142 birds across 2 of 50 regions (exact scheme)"
        );
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let report_path = dir.path().join("report.json");
        let geojson_path = dir.path().join("map.geojson");

        write_outputs(
            &create_test_render(),
            OutputFormat::Json,
            &report_path,
            Some(&geojson_path),
        )
        .unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["metadata"]["total_count"], 142);

        let geojson: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&geojson_path).unwrap()).unwrap();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"][0]["properties"]["color"], "#fff176");
    }
}
