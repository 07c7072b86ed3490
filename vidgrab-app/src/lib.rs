mod config;
mod form;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vidgrab_core::{DestinationTable, Reporter, Submitter, destination::default_private_dir};

pub use config::AppConfig;
pub use form::VidGrabApp;

const APP_NAME: &str = "VidGrab";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn run() -> Result<()> {
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vidgrab-worker")
        .build()
        .context("failed to start worker runtime")?;

    // Ensure app data dir exists
    let app_data_dir = default_private_dir();
    fs_err::create_dir_all(&app_data_dir)?;

    let config_path = app_data_dir.join("config.json");
    let config = runtime.block_on(AppConfig::load(&config_path))?;
    config.validate()?;
    if !config_path.exists() {
        runtime.block_on(config.save(&config_path))?;
    }
    tracing::info!(config = %config_path.display(), "{APP_NAME} starting");

    let destinations = DestinationTable::new(app_data_dir);
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([480.0, 640.0])
            .with_min_inner_size([360.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let (reporter, updates) = Reporter::channel();
            let reporter = reporter.with_waker(Arc::new(move || ctx.request_repaint()));

            let submitter = Submitter::new(
                config.engine(),
                destinations,
                config.preferences(),
                config.max_concurrent_jobs,
                reporter,
                handle,
            );
            Ok(Box::new(VidGrabApp::new(
                submitter,
                updates,
                config.default_mode,
                config.default_destination.clone(),
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("ui terminated: {e}"))
}
