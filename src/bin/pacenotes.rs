//! Pacenote caller
//!
//! Listens for DiRT Rally telemetry and calls the co-driver's pacenotes.
//! Usage: `pacenotes [config.toml]`

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dirty_pacenotes::{
    audio::{list_output_devices, list_sound_files, CpalSink, WavDecoder},
    config::AppConfig,
    constants::SHUTDOWN_TIMEOUT_MS,
    control::ControlHandle,
    pacenotes::DirectoryStore,
    runner::{self, RuntimeParameters, WorkerHandle, WorkerSetup},
    stages::StageTable,
    telemetry::TelemetrySocket,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DiRTy Pacenotes");

    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_path().ok_or_else(|| anyhow!("no config directory on this platform"))?,
    };
    let config = AppConfig::load_or_create(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;

    let params = RuntimeParameters::from_config(&config);
    tracing::info!(
        "Co-driver {}, delay {:?}, volume {} dB",
        params.co_driver,
        config.pacenotes.delay,
        config.pacenotes.volume
    );

    let stages_file = config.paths.stages_file();
    let stages = StageTable::load(&stages_file)
        .with_context(|| format!("loading stage table {}", stages_file.display()))?;

    let sounds_dir = config.paths.sounds_dir(&params.co_driver);
    let sound_files = list_sound_files(&sounds_dir).unwrap_or_else(|e| {
        tracing::warn!("No sounds in {}: {}", sounds_dir.display(), e);
        Vec::new()
    });

    println!("\n=== Available Output Devices ===");
    for name in list_output_devices() {
        println!("  {}", name);
    }
    println!();

    let sink = CpalSink::open(config.pacenotes.output_device.as_deref())?;
    tracing::info!("Playing through {}", sink.name());

    let socket = TelemetrySocket::bind(&params.bind_address, params.udp_port, params.recv_timeout)?;

    let (control, worker) = runner::spawn(WorkerSetup {
        source: socket,
        stages,
        store: Box::new(DirectoryStore::new(config.paths.pacenotes_dir(&params.co_driver))),
        sound_files,
        decoder: Box::new(WavDecoder),
        sink: Box::new(sink),
        params,
    })?;

    start_ui(&config, &control)?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Ctrl+C received, shutting down");
        }
        _ = worker_finished(&worker) => {
            tracing::warn!("Telemetry worker exited");
        }
    }

    match worker.shutdown(Duration::from_millis(SHUTDOWN_TIMEOUT_MS)) {
        Some(exit) => tracing::info!("Worker finished: {:?}", exit),
        None => tracing::warn!("Worker still running at exit"),
    }

    Ok(())
}

async fn worker_finished(worker: &WorkerHandle) {
    while !worker.is_finished() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(feature = "web-ui")]
fn start_ui(config: &AppConfig, control: &ControlHandle) -> Result<()> {
    use dirty_pacenotes::ui::{spawn_event_bridge, AppState, WebServer};

    if !config.ui.enabled {
        return log_events(control);
    }

    let state = AppState::new(control.clone(), &config.pacenotes);
    spawn_event_bridge(control.events().clone(), state.clone())?;
    WebServer::new(config.ui.clone(), state).start_background();

    tracing::info!(
        "Web UI available at http://{}:{}",
        config.ui.bind_address,
        config.ui.http_port
    );
    Ok(())
}

#[cfg(not(feature = "web-ui"))]
fn start_ui(_config: &AppConfig, control: &ControlHandle) -> Result<()> {
    log_events(control)
}

/// Without a UI, worker events only go to the log
fn log_events(control: &ControlHandle) -> Result<()> {
    let events = control.events().clone();
    std::thread::Builder::new()
        .name("events".to_string())
        .spawn(move || {
            for event in events.iter() {
                tracing::debug!("{:?}", event);
            }
        })?;
    Ok(())
}
