//! idcard-extract - Batch field extraction from ID card photographs
//!
//! Reads a list of card photographs, finds the card in each frame,
//! recognizes the name and ethnicity fields and writes one outcome per
//! file to a JSON report.

mod batch;
mod config;
mod report;
mod vision;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::batch::{BatchProcessor, CancelToken};
use crate::config::AppConfig;
use crate::report::JsonReportSink;
use crate::vision::{CardPipeline, TextEngine, TextRecognizer};

/// idcard-extract - Batch ID card field extraction
#[derive(Parser, Debug)]
#[command(name = "idcard-extract", version)]
#[command(about = "Extracts name and ethnicity fields from photographed ID cards")]
struct Args {
    /// Image files to process; report rows follow this order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Write the JSON report to this path instead of the configured one
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write normalized cards and enhanced field crops to this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    // Load or create configuration
    let config = load_or_create_config(args.config.as_deref());

    let report_path = args
        .output
        .unwrap_or_else(|| config.output.report_path.clone());
    let debug_dir = args.debug_dir.or_else(|| config.output.debug_dir.clone());
    if let Some(dir) = &debug_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating debug directory {}", dir.display()))?;
    }

    info!(
        images = args.images.len(),
        report = %report_path.display(),
        "starting extraction"
    );

    let engine = TextEngine::new(&config.engine);
    if engine.is_available() {
        info!(language = %config.engine.language, "text engine ready");
    }
    let pipeline = CardPipeline::new(engine, config.pipeline.clone()).with_debug_dir(debug_dir);

    // Ctrl-C stops the batch between images; the report of what was
    // processed so far is still written.
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping after the current image");
        handler_token.cancel();
    })
    .context("installing interrupt handler")?;

    let processor = BatchProcessor::new(pipeline).with_cancel_token(cancel);
    let mut sink = JsonReportSink::new(&report_path);

    let summary = processor.process(&args.images, &mut sink)?;

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        missing = summary.missing,
        errored = summary.errored,
        cancelled = summary.cancelled,
        "extraction finished"
    );

    Ok(())
}

/// Load configuration from the override path, the default location, or
/// fall back to defaults.
fn load_or_create_config(path_override: Option<&Path>) -> AppConfig {
    if let Some(path) = path_override {
        return match config::load_config(path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load configuration, using defaults"
                );
                AppConfig::default()
            }
        };
    }

    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!(path = %config_path.display(), "loaded configuration");
                return config;
            }
        } else {
            let config = AppConfig::default();
            match config::save_config(&config, &config_path) {
                Ok(()) => info!(path = %config_path.display(), "created default configuration"),
                Err(err) => warn!(error = %err, "failed to write default configuration"),
            }
            return config;
        }
    }

    info!("using default configuration");
    AppConfig::default()
}
