//! Birdmap - choropleth maps of bird observations
//!
//! A CLI tool that sums bird observation counts per region, classifies
//! the totals into color buckets and writes an annotated GeoJSON map
//! with a legend and summary report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable input, failed request, bad config, etc.)
//!   2 - Unmatched regions found with --fail-on-unmatched

mod analysis;
mod cli;
mod config;
mod error;
mod geo;
mod map;
mod models;
mod report;
mod source;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use geo::BoundarySet;
use map::{ChoroplethOptions, MapRender, MapState, RenderContext};
use models::LoadState;
use source::{HttpSource, ObservationSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging so its verbose flag can apply
    let (config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("Birdmap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .birdmap.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the palette, source URL, search filters, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Where a finished render is written.
#[derive(Debug, Clone)]
struct OutputTargets {
    format: OutputFormat,
    report: PathBuf,
    geojson: Option<PathBuf>,
}

impl OutputTargets {
    fn from_config(config: &Config) -> Self {
        Self {
            format: config.output_format(),
            report: PathBuf::from(&config.general.output),
            geojson: config.general.geojson_out.as_ref().map(PathBuf::from),
        }
    }

    fn write(&self, render: &MapRender) -> Result<()> {
        report::write_outputs(render, self.format, &self.report, self.geojson.as_deref())
    }
}

/// Run the complete map workflow. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let mut config = config;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    // Step 1: Load the boundary set once
    let boundaries_path = args
        .boundaries
        .as_ref()
        .context("--boundaries is required")?;
    println!("🗺️  Loading boundaries: {}", boundaries_path.display());
    let boundaries = Arc::new(
        BoundarySet::load(boundaries_path, config.join.mode())
            .with_context(|| format!("Failed to load boundaries from {}", boundaries_path.display()))?,
    );
    if boundaries.is_empty() {
        warn!("Boundary file has no features; every observation will be unmatched");
    }

    // Step 2: Resolve the observation source and search filters
    let source = build_source(&args, &config)?;
    let search = config.search.resolve(Utc::now().date_naive());
    if let (Some(start), Some(end)) = (search.start_date, search.end_date) {
        if start > end {
            bail!("Start date {} is after end date {}", start, end);
        }
    }

    let ctx = Arc::new(RenderContext {
        source: source.describe(),
        boundaries: boundaries_path.display().to_string(),
        search,
        filter_locally: source.filters_locally(),
        choropleth: ChoroplethOptions {
            palette: config.palette()?,
            height_scale: config.palette.height_scale,
        },
        top_regions: config.ranking.top_regions,
        ranking_page: config.ranking.page,
        ranking_limit: config.ranking.limit,
    });

    println!("🐦 Observations: {}", ctx.source);
    if ctx.search.has_filters() {
        debug!("Search filters: {:?}", ctx.search);
    }

    // Handle --dry-run: load and count, write nothing
    if args.dry_run {
        return handle_dry_run(&source, &boundaries, &ctx).await;
    }

    let state = Arc::new(MapState::new());
    let outputs = Arc::new(OutputTargets::from_config(&config));

    match args.watch {
        None => {
            refresh(&source, &boundaries, &ctx, &state).await;
            let current = state.current();
            let render = match current {
                LoadState::Loaded(render) => render,
                LoadState::Failed(message) => bail!("Failed to load observations: {}", message),
                LoadState::NotLoaded => bail!("No map was produced"),
            };

            println!("\n📝 Writing outputs...");
            outputs.write(&render)?;
            print_summary(&render, &outputs);
        }
        Some(seconds) => {
            run_watch(source, boundaries, ctx, Arc::clone(&state), outputs, seconds).await;
            debug!("Last published request: {}", state.published_ticket());
            if !state.current().is_loaded() {
                warn!("Watch stopped before any map was produced");
            }
        }
    }

    Ok(exit_code(&state.current(), args.fail_on_unmatched))
}

/// Build the observation source from a file or an endpoint URL.
fn build_source(args: &Args, config: &Config) -> Result<ObservationSource> {
    if let Some(ref path) = args.observations {
        return Ok(ObservationSource::File(path.clone()));
    }

    match config.source.url {
        Some(ref url) => {
            let client = HttpSource::new(url, config.source.timeout_seconds, !args.quiet)?;
            Ok(ObservationSource::Http(client))
        }
        None => bail!(
            "No observation source: pass --observations or --url, or set [source] url in {}",
            CONFIG_FILE
        ),
    }
}

/// Load observations and publish a render under a fresh ticket.
///
/// Returns true when the result was published.
async fn refresh(
    source: &ObservationSource,
    boundaries: &BoundarySet,
    ctx: &RenderContext,
    state: &MapState<MapRender>,
) -> bool {
    let ticket = state.begin();
    debug!("Starting request {}", ticket.id());

    let rows = source.load(&ctx.search).await;
    if let LoadState::Failed(ref message) = rows {
        warn!("Request {} failed: {}", ticket.id(), message);
    }

    let result = rows.map(|rows| map::render(boundaries, &rows, ctx));
    state.publish(ticket, result)
}

/// Re-render every `seconds` until interrupted.
///
/// Each tick runs as its own task; a slow request finishing after a newer
/// one has published is discarded by the map state.
async fn run_watch(
    source: ObservationSource,
    boundaries: Arc<BoundarySet>,
    ctx: Arc<RenderContext>,
    state: Arc<MapState<MapRender>>,
    outputs: Arc<OutputTargets>,
    seconds: u64,
) {
    println!("\n👀 Watching every {}s (Ctrl+C to stop)...", seconds);

    let source = Arc::new(source);
    let write_lock = Arc::new(tokio::sync::Mutex::new(()));
    let mut interval = tokio::time::interval(Duration::from_secs(seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let source = Arc::clone(&source);
                let boundaries = Arc::clone(&boundaries);
                let ctx = Arc::clone(&ctx);
                let state = Arc::clone(&state);
                let outputs = Arc::clone(&outputs);
                let write_lock = Arc::clone(&write_lock);

                tokio::spawn(async move {
                    if !refresh(&source, &boundaries, &ctx, &state).await {
                        return;
                    }

                    // Always write the latest snapshot, not this task's result
                    let _guard = write_lock.lock().await;
                    let current = state.current();
                    if let Some(render) = current.loaded() {
                        if let Err(e) = outputs.write(render) {
                            error!("Failed to write outputs: {:#}", e);
                        }
                    }
                    println!("   {}", report::status_line(&current));
                });
            }
            _ = &mut shutdown => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
}

/// Handle --dry-run: load inputs, print what would be mapped, exit.
async fn handle_dry_run(
    source: &ObservationSource,
    boundaries: &BoundarySet,
    ctx: &RenderContext,
) -> Result<i32> {
    println!("\n🔍 Dry run: loading observations (no outputs written)...\n");

    let rows = match source.load(&ctx.search).await {
        LoadState::Loaded(rows) => rows,
        LoadState::Failed(message) => bail!("Failed to load observations: {}", message),
        LoadState::NotLoaded => bail!("No observations were loaded"),
    };

    let (observations, stats) =
        crate::source::prepare_observations(&rows, &ctx.search, ctx.filter_locally);
    let totals = analysis::aggregate_with(&observations, boundaries.mode());
    let outcome = boundaries.join(&totals);

    println!("   Rows: {}", stats.rows);
    println!("   Malformed rows: {}", stats.malformed);
    println!("   Filtered out: {}", stats.filtered_out);
    let unnamed = boundaries
        .collection()
        .features
        .iter()
        .filter(|f| f.name().is_none())
        .count();
    println!("   Boundary features: {} ({} unnamed)", boundaries.len(), unnamed);
    println!("   Regions matched: {}", outcome.matched.len());
    if outcome.unmatched.is_empty() {
        println!("   Regions unmatched: 0");
    } else {
        println!("   Regions unmatched: {}", outcome.unmatched.len());
        for (name, total) in &outcome.unmatched {
            println!("     ❓ {} ({} birds)", name, total);
        }
    }

    println!("\n✅ Dry run complete. No outputs were written.");
    Ok(0)
}

/// Print the run summary.
fn print_summary(render: &MapRender, outputs: &OutputTargets) {
    let report = &render.report;
    let meta = &report.metadata;

    println!("\n📊 Map Summary:");
    println!(
        "   Regions with data: {} of {}",
        meta.regions_with_data, meta.regions
    );
    println!("   Total count: {}", meta.total_count);
    println!(
        "   Scheme: {} ({} buckets)",
        report.scheme.kind(),
        report.legend.len()
    );
    for entry in &report.legend {
        println!("     {}  {}", entry.color, entry.label);
    }
    debug!("Bucket boundaries: {:?}", report.scheme.boundaries());
    if !report.unmatched_regions.is_empty() {
        println!(
            "   ⚠️  Unmatched regions: {}",
            report.unmatched_regions.join(", ")
        );
    }
    println!("   Duration: {:.3}s", meta.duration_seconds);

    println!("\n✅ Report saved to: {}", outputs.report.display());
    if let Some(ref path) = outputs.geojson {
        println!("   GeoJSON saved to: {}", path.display());
    }
}

/// Exit code for the final state: 2 when unmatched regions fail the run.
fn exit_code(state: &LoadState<Arc<MapRender>>, fail_on_unmatched: bool) -> i32 {
    match state {
        LoadState::Loaded(render)
            if fail_on_unmatched && !render.report.unmatched_regions.is_empty() =>
        {
            eprintln!(
                "\n⛔ {} region(s) matched no boundary. Failing (exit code 2).",
                render.report.unmatched_regions.len()
            );
            2
        }
        _ => 0,
    }
}

/// Load configuration from file or use defaults.
///
/// Also returns the path the configuration was read from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        None => Ok((Config::default(), None)),
    }
}
