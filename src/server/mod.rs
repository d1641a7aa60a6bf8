// HTTP + WebSocket control surface for the queue controller
pub mod auth;
pub mod error;
pub mod pairing;
pub mod routes;
pub mod ws;

#[cfg(test)]
mod tests;

pub use error::{ApiError, ServerError, ServerResult};

use crate::config::AppConfig;
use crate::queue::ControllerHandle;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Shared state behind every handler
#[derive(Clone)]
pub struct ApiState {
    pub controller: ControllerHandle,
    pub config: Arc<RwLock<AppConfig>>,
    pub config_path: Arc<PathBuf>,
}

impl ApiState {
    pub fn new(controller: ControllerHandle, config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            controller,
            config: Arc::new(RwLock::new(config)),
            config_path: Arc::new(config_path),
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/status", get(routes::status))
        .route("/toggle-auto-accept", post(routes::toggle_auto_accept))
        .route("/start-queue", post(routes::start_queue))
        .route("/stop-queue", post(routes::stop_queue))
        .route("/reset", post(routes::reset))
        .route("/config", get(routes::get_config).post(routes::update_config))
        .route("/pairing-qr", get(routes::pairing_qr))
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .with_state(state)
}

pub async fn bind_listener(config: &AppConfig) -> ServerResult<TcpListener> {
    let address = format!("{}:{}", config.bind_host, config.bind_port);
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ServerError::InvalidAddress {
            address: address.clone(),
            source,
        })?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { address, source })
}

/// Serve until `shutdown` resolves
pub async fn start_http_server(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("🌐 Control API listening on http://{}", addr);
    }
    let router = create_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
