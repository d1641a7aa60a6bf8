// Wires probe, executor, controller and control API together for one process run
use crate::args::Args;
use crate::config::AppConfig;
use crate::input::{DryRunExecutor, InputExecutor};
use crate::probe::{FileFrameSource, PixelProbe};
use crate::queue::Controller;
use crate::server::{self, ApiState, ServerResult};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "desktop-input")]
pub async fn run(args: &Args, config: AppConfig, config_path: PathBuf) -> ServerResult<()> {
    if args.dry_run {
        return serve(Arc::new(DryRunExecutor::new()), config, config_path).await;
    }
    log::info!("🖱️ Clicking through the desktop input backend");
    serve(
        Arc::new(crate::input::EnigoExecutor::new()),
        config,
        config_path,
    )
    .await
}

#[cfg(not(feature = "desktop-input"))]
pub async fn run(args: &Args, config: AppConfig, config_path: PathBuf) -> ServerResult<()> {
    if !args.dry_run {
        log::warn!("⚠️ Built without `desktop-input`; clicks will only be logged");
    }
    serve(Arc::new(DryRunExecutor::new()), config, config_path).await
}

/// Runs until Ctrl-C, then stops the controller (detection and timers included)
pub async fn serve<E: InputExecutor>(
    executor: Arc<E>,
    config: AppConfig,
    config_path: PathBuf,
) -> ServerResult<()> {
    let listener = server::bind_listener(&config).await?;

    let source = FileFrameSource::new(&config.capture_path);
    log::info!("📸 Reading frames from {}", source.path().display());
    let probe = Arc::new(PixelProbe::new(source));
    let (controller, controller_task) =
        Controller::spawn(probe, executor, config.controller_settings());

    let state = ApiState::new(controller.clone(), config, config_path);
    let result = server::start_http_server(listener, state, shutdown_signal()).await;

    controller.shutdown().await;
    if let Err(e) = controller_task.await {
        log::error!("❌ Controller task ended abnormally: {}", e);
    }
    result
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("🛑 Ctrl-C received, shutting down"),
        Err(e) => log::error!("❌ Failed to listen for Ctrl-C: {}", e),
    }
}
