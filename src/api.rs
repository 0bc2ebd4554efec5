//! HTTP API surface.
//!
//! This module owns query parsing and validation and maps cascade outcomes to
//! responses, while resolution itself is delegated to [`ResolutionCascade`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::cascade::{CascadeOutcome, ResolutionCascade};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::providers::ResolutionRequest;

/// Human-readable service name returned by health endpoints.
pub const APP_NAME: &str = "audio-resolver";
/// Service version string returned by health endpoints.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    pub cascade: Arc<ResolutionCascade>,
}

impl AppState {
    pub fn new(cfg: AppConfig, cascade: Arc<ResolutionCascade>) -> Self {
        Self { cfg, cascade }
    }
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/resolve", get(resolve))
        .with_state(state)
}

/// Liveness endpoint (`GET /health`).
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": APP_NAME,
        "version": APP_VERSION,
    }))
}

/// Resolves a playable audio URL (`GET /resolve`).
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Query(params) = query.map_err(query_rejection)?;
    let request = parse_resolution_request(&params, state.cfg.require_video_id)?;

    match state.cascade.resolve(&request).await {
        CascadeOutcome::Success(audio) => {
            let mut body = serde_json::to_value(&audio)
                .map_err(|err| AppError::internal(format!("failed to encode response: {err}")))?;
            body["status"] = json!("ok");
            Ok(Json(body))
        }
        CascadeOutcome::NotFound { attempted_sources } => {
            Err(AppError::not_found(attempted_sources))
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> AppError {
    AppError::invalid_request(format!("invalid query string: {}", rejection.body_text()), None)
}

/// Returns the first non-blank value among `names`.
fn param(params: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| params.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Validates query parameters into a [`ResolutionRequest`].
fn parse_resolution_request(
    params: &HashMap<String, String>,
    require_video_id: bool,
) -> Result<ResolutionRequest, AppError> {
    let video_id = param(params, &["v", "videoId"]);
    let free_text_query = param(params, &["q"]);
    let title = param(params, &["title", "track_name"]);
    let artist = param(params, &["artist", "artist_name"]);

    if require_video_id && video_id.is_none() {
        return Err(AppError::invalid_request(
            "missing required parameter: v (or videoId)",
            Some("v"),
        ));
    }

    if free_text_query.is_none() && (title.is_none() || artist.is_none()) {
        return Err(AppError::invalid_request(
            "provide q, or both title and artist",
            Some(if title.is_some() { "artist" } else { "title" }),
        ));
    }

    let duration_seconds = match param(params, &["duration"]) {
        Some(raw) => {
            let value = raw.parse::<f64>().map_err(|_| {
                AppError::invalid_request(
                    format!("invalid duration={raw:?}; expected seconds"),
                    Some("duration"),
                )
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::invalid_request(
                    format!("invalid duration={raw:?}; expected a finite non-negative number"),
                    Some("duration"),
                ));
            }
            Some(value)
        }
        None => None,
    };

    Ok(ResolutionRequest {
        video_id,
        free_text_query,
        title,
        artist,
        duration_seconds,
    })
}
