use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use photo_slideshow::config::SlideshowConfig;
use photo_slideshow::render::viewer;
use photo_slideshow::shutdown;

#[derive(Debug, Parser)]
#[command(
    name = "photo-slideshow",
    version,
    about = "Full-screen photo slideshow with scheduled backlight"
)]
struct Args {
    /// Delay between images, in milliseconds
    #[arg(value_name = "PERIOD_MS")]
    period_ms: u64,
    /// Directory of images to cycle through
    #[arg(value_name = "STORE")]
    store: PathBuf,
    /// Hour (0-23) at which the backlight turns on
    #[arg(value_name = "ON_TIME", value_parser = clap::value_parser!(u8).range(0..24))]
    on_time: u8,
    /// Hour (0-23) at which the backlight turns off
    #[arg(value_name = "OFF_TIME", value_parser = clap::value_parser!(u8).range(0..24))]
    off_time: u8,
    /// Nonzero enables backlight scheduling
    #[arg(value_name = "BACKLIGHT", allow_negative_numbers = true)]
    backlight: i64,
}

fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let Args {
        period_ms,
        store,
        on_time,
        off_time,
        backlight,
    } = Args::parse();

    ensure_display();

    let cfg = SlideshowConfig::from_args(period_ms, store, on_time, off_time, backlight)
        .validated()
        .context("invalid arguments")?;
    tracing::info!(
        store = %cfg.store.display(),
        period = %humantime::format_duration(cfg.period),
        brightness = ?cfg.brightness,
        "configuration loaded"
    );

    // One worker is enough: it only watches for signals.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let guard = runtime.enter();

    let cancel = CancellationToken::new();
    shutdown::spawn_signal_watchers(&cancel);

    let result = viewer::run_windowed(cfg, cancel.clone());
    cancel.cancel();
    drop(guard);
    runtime.shutdown_background();
    result
}

/// Point X clients at the local display when launched from a console session.
fn ensure_display() {
    #[cfg(target_os = "linux")]
    if std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none() {
        tracing::warn!("DISPLAY not set; defaulting to :0.0");
        // SAFETY: called before the async runtime or any other thread exists.
        unsafe { std::env::set_var("DISPLAY", ":0.0") };
    }
}
