//! debris-ts command line driver

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use debris_ts::config::PipelineConfig;
use debris_ts::core::parallel::select_batch;
use debris_ts::core::regional::RegionalAggregator;
use debris_ts::core::tscurve::{summarize_thickness, TsCurveProcessor, TsCurveRunOptions};
use debris_ts::io::AcquisitionGrid;
use debris_ts::types::GridCell;

#[derive(Parser)]
#[command(name = "debris-ts")]
#[command(author, version, about = "Debris surface-temperature curves and regional statistics", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (1 on, 0 off)
    #[arg(long, global = true, default_value_t = 0)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract interpolated surface-temperature curves for grid cells
    TsCurves {
        /// Batch number used to differentiate output across nodes
        #[arg(long, default_value_t = 0)]
        batchno: usize,
        /// Total number of batches (nodes)
        #[arg(long, default_value_t = 1)]
        batches: usize,
        /// JSON file with a list of [lat, lon] pairs
        #[arg(long)]
        latlon_fn: Option<PathBuf>,
        /// Number of simultaneous worker processes
        #[arg(long, default_value_t = 4)]
        num_simultaneous_processes: usize,
        /// Use parallel workers (1) or run sequentially (0)
        #[arg(long, default_value_t = 1)]
        option_parallels: u8,
        /// Keep cell lists ordered (1) or interleave them (0)
        #[arg(long, default_value_t = 1)]
        option_ordered: u8,
    },
    /// Aggregate per-glacier debris thickness and melt factors by region
    RegionalStats,
}

fn setup_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_cells(config: &PipelineConfig, latlon_fn: Option<&Path>) -> Result<Vec<GridCell>> {
    match latlon_fn {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read lat/lon list {}", path.display()))?;
            let pairs: Vec<(f64, f64)> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid lat/lon list {}", path.display()))?;
            Ok(pairs.into_iter().map(|(lat, lon)| GridCell::new(lat, lon)).collect())
        }
        None => Ok(config.cells()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_ts_curves(
    config: &PipelineConfig,
    batchno: usize,
    batches: usize,
    latlon_fn: Option<&Path>,
    num_simultaneous_processes: usize,
    option_parallels: u8,
    option_ordered: u8,
    debug: bool,
) -> Result<()> {
    let all_cells = load_cells(config, latlon_fn)?;
    let cells = select_batch(&all_cells, batches, batchno);
    if cells.is_empty() {
        log::warn!("Batch {} of {} has no grid cells to process", batchno, batches);
        return Ok(());
    }
    log::info!("Batch {} of {}: {} of {} cells", batchno, batches, cells.len(), all_cells.len());

    let grid = AcquisitionGrid::open(&config.paths.ts_info_path)
        .context("Failed to read acquisition grid")?;
    let options = TsCurveRunOptions {
        num_workers: num_simultaneous_processes,
        parallel: option_parallels != 0,
        ordered: option_ordered != 0,
        debug,
    };

    let processor = TsCurveProcessor::new(config, &grid);
    let run = processor.run(&cells, &options)?;

    for report in &run.reports {
        log::info!(
            "worker {}: {} assigned, {} written, {} skipped{}",
            report.worker,
            report.assigned,
            report.written,
            report.skipped,
            if report.failed() { ", FAILED" } else { "" }
        );
    }

    if debug && (!options.parallel || options.num_workers == 1) {
        if let Some(product) = run.last_product() {
            let summary = summarize_thickness(
                product,
                0,
                config.ts_curve.summary_min_hd_cm,
                config.regional.mad_scale,
            )?;
            for stats in summary {
                log::debug!(
                    "hd {:.2} m: ts mean {:.2} C, median {:.2} C, mad {:.2} ({} samples)",
                    stats.debris_thickness_m,
                    stats.ts_degc.mean,
                    stats.ts_degc.median,
                    stats.ts_degc.mad,
                    stats.n_samples
                );
            }
        }
    }

    let failures: Vec<String> = run
        .failures()
        .filter_map(|r| r.error.as_ref().map(|(cell, e)| format!("worker {} at {}: {}", r.worker, cell, e)))
        .collect();
    if !failures.is_empty() {
        bail!("{} worker(s) failed:\n  {}", failures.len(), failures.join("\n  "));
    }
    log::info!("{} products written, {} cells skipped", run.written(), run.skipped());
    Ok(())
}

fn run_regional_stats(config: &PipelineConfig) -> Result<()> {
    let aggregator = RegionalAggregator::from_config(&config.regional, &config.paths);
    let summary = aggregator.run()?;

    if let Some(all) = summary.combined() {
        log::info!(
            "all hd: {:.2} ({:.2} - {:.2})  mf: {:.2} ({:.2} - {:.2})",
            all.hd.median,
            all.hd.q25,
            all.hd.q75,
            all.mf.median,
            all.mf.q25,
            all.mf.q75
        );
    }

    let stats_path = aggregator
        .write_summary(&summary, &config.paths.output_dir)
        .context("Failed to write regional statistics")?;
    println!("Regional statistics written to {}", stats_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = cli.debug != 0;
    setup_logging(debug);

    let start = Instant::now();
    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::TsCurves {
            batchno,
            batches,
            latlon_fn,
            num_simultaneous_processes,
            option_parallels,
            option_ordered,
        } => run_ts_curves(
            &config,
            batchno,
            batches,
            latlon_fn.as_deref(),
            num_simultaneous_processes,
            option_parallels,
            option_ordered,
            debug,
        ),
        Commands::RegionalStats => run_regional_stats(&config),
    };

    println!("\nProcessing time of: {:.2} s", start.elapsed().as_secs_f64());
    result
}
