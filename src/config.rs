//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.birdmap.toml` files.

use crate::analysis::{JoinMode, Palette, DEFAULT_COLORS, DEFAULT_LIMIT};
use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use crate::source::SearchOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".birdmap.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Map coloring settings.
    #[serde(default)]
    pub palette: PaletteConfig,

    /// Region join settings.
    #[serde(default)]
    pub join: JoinConfig,

    /// Observation source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Default search filters.
    #[serde(default)]
    pub search: SearchOptions,

    /// Report ranking settings.
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format ("markdown" or "json").
    #[serde(default = "default_format")]
    pub format: String,

    /// Annotated GeoJSON path, if any.
    #[serde(default)]
    pub geojson_out: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: default_format(),
            geojson_out: None,
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "birdmap_report.md".to_string()
}

fn default_format() -> String {
    "markdown".to_string()
}

/// Map coloring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteConfig {
    /// Bucket colors, lightest first. Exactly five.
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,

    /// Extrusion height per counted bird.
    #[serde(default = "default_height_scale")]
    pub height_scale: f64,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            height_scale: default_height_scale(),
        }
    }
}

fn default_colors() -> Vec<String> {
    DEFAULT_COLORS.iter().map(|c| c.to_string()).collect()
}

fn default_height_scale() -> f64 {
    10.0
}

/// Region join settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Trim and case-fold region names before joining.
    #[serde(default = "default_true")]
    pub normalize_names: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            normalize_names: true,
        }
    }
}

impl JoinConfig {
    pub fn mode(&self) -> JoinMode {
        if self.normalize_names {
            JoinMode::Normalized
        } else {
            JoinMode::Exact
        }
    }
}

fn default_true() -> bool {
    true
}

/// Observation source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Observation endpoint URL, used when no file is given.
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Ranking and summary sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Species ranking page (1-based).
    #[serde(default = "default_page")]
    pub page: usize,

    /// Species per ranking page.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Regions listed in the report summary.
    #[serde(default = "default_top_regions")]
    pub top_regions: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            top_regions: default_top_regions(),
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_top_regions() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.palette()?;
        if self.ranking.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(())
    }

    /// The validated palette.
    pub fn palette(&self) -> Result<Palette, ConfigError> {
        Palette::try_from(self.palette.colors.clone())
    }

    /// Configured report format, falling back to Markdown.
    pub fn output_format(&self) -> OutputFormat {
        match self.general.format.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Markdown,
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = match format {
                OutputFormat::Markdown => "markdown".to_string(),
                OutputFormat::Json => "json".to_string(),
            };
        }
        if let Some(ref geojson) = args.geojson_out {
            self.general.geojson_out = Some(geojson.display().to_string());
        }

        if let Some(ref url) = args.url {
            self.source.url = Some(url.clone());
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if args.exact_join {
            self.join.normalize_names = false;
        }

        self.search.merge(&args.search_options());

        if let Some(page) = args.page {
            self.ranking.page = page;
        }
        if let Some(limit) = args.limit {
            self.ranking.limit = limit;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "birdmap_report.md");
        assert_eq!(config.palette.colors.len(), 5);
        assert_eq!(config.join.mode(), JoinMode::Normalized);
        assert_eq!(config.ranking.limit, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r##"
[general]
output = "texas.json"
format = "JSON"
verbose = true

[palette]
colors = ["#eff3ff", "#bdd7e7", "#6baed6", "#3182bd", "#08519c"]
height_scale = 2.5

[join]
normalize_names = false

[source]
url = "http://localhost:8080/heatmap-observations"

[search]
start_date = "2023-03-21"
common_name = "hawk"
regions = ["Texas", "Ohio"]

[ranking]
limit = 10
"##;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "texas.json");
        assert_eq!(config.output_format(), OutputFormat::Json);
        assert!(config.general.verbose);
        assert_eq!(config.palette().unwrap().color(4), "#08519c");
        assert_eq!(config.palette.height_scale, 2.5);
        assert_eq!(config.join.mode(), JoinMode::Exact);
        assert_eq!(
            config.source.url.as_deref(),
            Some("http://localhost:8080/heatmap-observations")
        );
        assert_eq!(config.source.timeout_seconds, 30);
        assert_eq!(
            config.search.start_date,
            NaiveDate::from_ymd_opt(2023, 3, 21)
        );
        assert_eq!(config.search.regions, vec!["Texas", "Ohio"]);
        assert_eq!(config.ranking.limit, 10);
        assert_eq!(config.ranking.page, 1);
    }

    #[test]
    fn test_validate_rejects_bad_palette() {
        let config: Config = toml::from_str("[palette]\ncolors = [\"#000\", \"#fff\"]\n").unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::PaletteSize {
                expected: 5,
                found: 2
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config: Config = toml::from_str("[ranking]\nlimit = 0\n").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroLimit));
    }

    #[test]
    fn test_load_reports_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[palette]\ncolors = []\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("exactly 5 colors"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[palette]"));
        assert!(toml_str.contains("[ranking]"));

        let round: Config = toml::from_str(&toml_str).unwrap();
        assert!(round.validate().is_ok());
    }
}
