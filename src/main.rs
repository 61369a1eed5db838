//! Binary entrypoint for the slide viewer.
//!
//! Parses the command line, sets up logging and configuration, scans the
//! slide directory and hands over to the windowed viewer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use slide_viewer::config::Configuration;
use slide_viewer::processing::kernels::ResampleKernel;
use slide_viewer::tasks::{files, viewer};

#[derive(Debug, Parser)]
#[command(name = "slide-viewer", version, about = "GPU slideshow with adaptive scaling")]
struct Cli {
    /// Directory of images (overrides photo-library-path)
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Resampling kernel for native-size and downscaled slides
    #[arg(long, value_enum)]
    kernel: Option<ResampleKernel>,

    /// Deterministic shuffle seed
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("slide_viewer={level}").parse()?)
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?);
    fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

fn load_configuration(cli: &Cli) -> Result<Configuration> {
    let mut cfg = match cli.config.as_ref() {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(dir) = cli.dir.clone() {
        cfg.photo_library_path = dir;
    }
    if let Some(kernel) = cli.kernel {
        cfg.resample_kernel = kernel;
    }
    if let Some(seed) = cli.seed {
        cfg.startup_shuffle_seed = Some(seed);
    }
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = load_configuration(&cli)?;
    info!(
        root = %cfg.photo_library_path.display(),
        kernel = %cfg.resample_kernel,
        tick = %humantime::format_duration(cfg.tick_interval),
        "configuration loaded"
    );

    let slides = files::discover_slides(&cfg.photo_library_path)
        .with_context(|| format!("failed to scan {}", cfg.photo_library_path.display()))?;
    if slides.is_empty() {
        let notice = slide_viewer::Error::EmptyLibrary(cfg.photo_library_path.clone());
        info!(%notice, "nothing to show");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // Runs on the main thread until the window closes or cancellation occurs.
    let reason = viewer::run_windowed(slides, cfg, cancel.clone()).context("viewer failed")?;
    cancel.cancel();
    info!(?reason, "viewer exited");
    Ok(())
}
