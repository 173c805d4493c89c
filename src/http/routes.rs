//! HTTP route definitions

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::app::AppState;
use crate::config::{ConfigError, RangeConfig};
use crate::http::middleware::require_admin;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Admin commands (bearer token required)
    let admin_routes = Router::new()
        .route("/admin/help", get(help_handler))
        .route("/admin/config", get(config_handler))
        .route("/admin/radius", post(radius_handler))
        .route("/admin/debug", post(debug_handler))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    online_players: usize,
    connected_sessions: usize,
    active_impacts: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        online_players: state.sound_loop.online_players(),
        connected_sessions: state.sessions.len(),
        active_impacts: state.sound_loop.retained_events(),
    })
}

// ============================================================================
// Admin commands
// ============================================================================

const ADMIN_COMMANDS: [(&str, &str); 4] = [
    ("GET /admin/help", "List all available commands"),
    ("GET /admin/config", "Show the current sound range config"),
    ("POST /admin/radius {\"radius\": <blocks>}", "Set the sound range radius"),
    ("POST /admin/debug {\"enabled\": <true|false>}", "Toggle debug logging"),
];

#[derive(Serialize)]
struct HelpResponse {
    commands: Vec<CommandHelp>,
}

#[derive(Serialize)]
struct CommandHelp {
    command: &'static str,
    description: &'static str,
}

async fn help_handler() -> Json<HelpResponse> {
    Json(HelpResponse {
        commands: ADMIN_COMMANDS
            .iter()
            .map(|&(command, description)| CommandHelp {
                command,
                description,
            })
            .collect(),
    })
}

async fn config_handler(State(state): State<AppState>) -> Json<RangeConfig> {
    Json(*state.range_store.shared().snapshot())
}

#[derive(Deserialize)]
struct RadiusRequest {
    radius: f64,
}

async fn radius_handler(
    State(state): State<AppState>,
    Json(req): Json<RadiusRequest>,
) -> Result<Json<RangeConfig>, AppError> {
    let config = state.range_store.set_radius(req.radius)?;
    info!(radius = config.radius, "Sound range radius updated");
    Ok(Json(config))
}

#[derive(Deserialize)]
struct DebugRequest {
    enabled: bool,
}

async fn debug_handler(
    State(state): State<AppState>,
    Json(req): Json<DebugRequest>,
) -> Result<Json<RangeConfig>, AppError> {
    let config = state.range_store.set_debug_logging(req.enabled)?;
    info!(enabled = config.debug_logging, "Debug logging updated");
    Ok(Json(config))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidRadius(_) => AppError::BadRequest(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
