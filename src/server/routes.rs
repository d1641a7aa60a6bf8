// HTTP handlers for the control surface
use super::error::ApiError;
use super::pairing::{PairingResponse, build_pairing};
use super::ApiState;
use crate::config::{AppConfig, ConfigUpdate};
use crate::queue::ControllerSnapshot;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub auto_accept_enabled: bool,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<ApiState>) -> Json<ControllerSnapshot> {
    Json(state.controller.snapshot())
}

pub async fn toggle_auto_accept(
    State(state): State<ApiState>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let snapshot = state.controller.set_auto_accept(request.enabled).await?;

    let mut config = state.config.write().await;
    config.auto_accept_enabled = snapshot.auto_accept_enabled;
    config.save(&state.config_path)?;

    Ok(Json(ToggleResponse {
        auto_accept_enabled: snapshot.auto_accept_enabled,
    }))
}

pub async fn start_queue(
    State(state): State<ApiState>,
) -> Result<Json<ControllerSnapshot>, ApiError> {
    Ok(Json(state.controller.start_queue().await?))
}

pub async fn stop_queue(
    State(state): State<ApiState>,
) -> Result<Json<ControllerSnapshot>, ApiError> {
    Ok(Json(state.controller.stop_queue().await?))
}

pub async fn reset(State(state): State<ApiState>) -> Result<Json<ControllerSnapshot>, ApiError> {
    Ok(Json(state.controller.reset().await?))
}

pub async fn get_config(State(state): State<ApiState>) -> Json<AppConfig> {
    Json(state.config.read().await.clone())
}

/// Merge, validate, persist, then hand the new settings to the controller
pub async fn update_config(
    State(state): State<ApiState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<AppConfig>, ApiError> {
    let mut config = state.config.write().await;
    let next = update.apply(&config)?;
    next.save(&state.config_path)?;

    state.controller.reconfigure(next.controller_settings()).await?;
    if let Some(enabled) = update.auto_accept_enabled {
        state.controller.set_auto_accept(enabled).await?;
    }

    log::info!("🔧 Config updated via API");
    *config = next.clone();
    Ok(Json(next))
}

pub async fn pairing_qr(State(state): State<ApiState>) -> Result<Json<PairingResponse>, ApiError> {
    let config = state.config.read().await;
    Ok(Json(build_pairing(&config)?))
}
