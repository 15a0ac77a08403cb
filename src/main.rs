//! gfi-sweep CLI - harvest WMS feature attributes over a pixel grid.
//!
//! # Examples
//!
//! ```bash
//! # 25x30 sweep of one layer, default pacing
//! gfi-sweep https://maps.example.com/lizmap/service impianti ./out \
//!     --bbox 1252852.5,5568056.2,1556460.4,5936176.9 --width 993 --height 1204
//!
//! # Authenticated session, denser grid, four workers sharing the same pacing
//! gfi-sweep "$URL" impianti ./out --bbox "$BBOX" --width 993 --height 1204 \
//!     --cookie "PHPSESSID=..." --gridx 50 --gridy 60 --workers 4
//!
//! # Everything from a JSON file, with one override
//! gfi-sweep --config sweep.json --sleep 0.1
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gfi_sweep::{BBox, Error, Event, SweepConfig, Sweeper, ToExitCode};

// ============================================================================
// CLI Definition
// ============================================================================

/// Pixel-grid GetFeatureInfo sweeper.
#[derive(Parser, Debug)]
#[command(name = "gfi-sweep")]
#[command(about = "Harvest WMS feature attributes by querying a regular pixel grid")]
#[command(long_about = r#"
Issues GetFeatureInfo requests at the centers of a gridx x gridy grid laid over
a width x height raster of the given bounding box. Each pixel is tried with
WMS 1.3.0 first and 1.1.1 as fallback. Every distinct HTML answer is saved
once as gfi_<J>_<I>_<v13|v111>_<md5>.<ext> in the output directory.
"#)]
#[command(version)]
pub struct Cli {
    /// WMS base URL
    #[arg(required_unless_present = "config")]
    pub base_url: Option<String>,

    /// Layer to query
    #[arg(required_unless_present = "config")]
    pub layer: Option<String>,

    /// Output directory
    #[arg(required_unless_present = "config")]
    pub out_dir: Option<PathBuf>,

    /// Map extent as minx,miny,maxx,maxy
    #[arg(long, required_unless_present = "config", allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// Raster width in pixels
    #[arg(long, required_unless_present = "config")]
    pub width: Option<u32>,

    /// Raster height in pixels
    #[arg(long, required_unless_present = "config")]
    pub height: Option<u32>,

    /// Samples along X [default: 25]
    #[arg(long)]
    pub gridx: Option<u32>,

    /// Samples along Y [default: 30]
    #[arg(long)]
    pub gridy: Option<u32>,

    /// Cookie header sent with every request
    #[arg(long)]
    pub cookie: Option<String>,

    /// Minimum seconds between two requests [default: 0.02]
    #[arg(long)]
    pub sleep: Option<f64>,

    /// Coordinates processed concurrently [default: 1]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds [default: 40]
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Spatial reference of the bounding box [default: EPSG:3857]
    #[arg(long)]
    pub crs: Option<String>,

    /// STYLES parameter [default: predefinito]
    #[arg(long)]
    pub style: Option<String>,

    /// Referer header
    #[arg(long)]
    pub referer: Option<String>,

    /// User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Artifact file extension [default: html]
    #[arg(long)]
    pub extension: Option<String>,

    /// Write summary.json into the output directory
    #[arg(long)]
    pub summary_json: bool,

    /// JSON configuration file; command-line values override it
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print the final summary and warnings
    #[arg(long, short)]
    pub quiet: bool,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "gfi_sweep=debug"
    } else if quiet {
        "gfi_sweep=warn"
    } else {
        "gfi_sweep=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Configuration
// ============================================================================

fn seconds(key: &str, value: f64) -> gfi_sweep::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::config(key, format!("{value} is not a valid number of seconds: {e}")))
}

fn build_config(cli: &Cli) -> anyhow::Result<SweepConfig> {
    let mut config = match &cli.config {
        Some(path) => SweepConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SweepConfig::default(),
    };

    if let Some(base_url) = &cli.base_url {
        config.service.base_url = base_url.clone();
    }
    if let Some(layer) = &cli.layer {
        config.service.layer = layer.clone();
    }
    if let Some(out_dir) = &cli.out_dir {
        config.output.out_dir = out_dir.clone();
    }
    if let Some(bbox) = &cli.bbox {
        config.raster.bbox = Some(bbox.parse::<BBox>()?);
    }
    if let Some(width) = cli.width {
        config.raster.width = width;
    }
    if let Some(height) = cli.height {
        config.raster.height = height;
    }
    if let Some(gridx) = cli.gridx {
        config.grid.gridx = gridx;
    }
    if let Some(gridy) = cli.gridy {
        config.grid.gridy = gridy;
    }
    if let Some(cookie) = &cli.cookie {
        config.service.cookie = Some(cookie.clone());
    }
    if let Some(sleep) = cli.sleep {
        config.pacing.delay = seconds("pacing.delay", sleep)?;
    }
    if let Some(workers) = cli.workers {
        config.pacing.workers = workers;
    }
    if let Some(timeout) = cli.timeout {
        config.service.timeout = seconds("service.timeout", timeout)?;
    }
    if let Some(crs) = &cli.crs {
        config.query.crs = crs.clone();
    }
    if let Some(style) = &cli.style {
        config.query.style = style.clone();
    }
    if let Some(referer) = &cli.referer {
        config.service.referer = Some(referer.clone());
    }
    if let Some(user_agent) = &cli.user_agent {
        config.service.user_agent = user_agent.clone();
    }
    if let Some(extension) = &cli.extension {
        config.output.extension = extension.trim_start_matches('.').to_string();
    }
    if cli.summary_json {
        config.output.summary_json = true;
    }

    Ok(config)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<Error>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;
    let sweeper = Sweeper::new(config)?;

    let printer = tokio::spawn(print_events(sweeper.subscribe(), cli.quiet));
    let signals = tokio::spawn(gfi_sweep::cancel_on_signal(sweeper.cancellation_token()));

    let report = sweeper.run().await;

    // Stops the signal listener if no signal arrived
    sweeper.cancellation_token().cancel();
    let _ = signals.await;
    if let Err(e) = printer.await {
        tracing::error!(error = %e, "Event printer task failed");
    }

    if let Some(e) = report.error {
        return Err(e.into());
    }
    if report.result.cancelled {
        return Err(Error::Cancelled.into());
    }
    Ok(())
}

/// Print hit, progress and summary lines until the sweep finishes
async fn print_events(mut events: tokio::sync::broadcast::Receiver<Event>, quiet: bool) {
    loop {
        match events.recv().await {
            Ok(Event::Hit {
                done,
                total,
                coordinate,
                variant,
                ..
            }) if !quiet => {
                println!("[hit] {done}/{total}  {coordinate} {variant}");
            }
            Ok(Event::Progress { done, total, hits }) if !quiet => {
                println!("[{done}/{total}] hits so far: {hits}");
            }
            Ok(Event::SweepFinished { result }) => {
                println!(
                    "[DONE] saved: {}  (dir: {})",
                    result.hits,
                    result.output_dir.display()
                );
                break;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind, some lines were dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
