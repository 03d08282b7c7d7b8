//! REST API endpoints.
//!
//! Axum-based HTTP API serving player data extracted from upstream pages.
//! Every body is wrapped in a `{success, data, meta}` or
//! `{success, error}` envelope.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::fetch::FetchError;
use state::AppState;

/// Attribution reported in every success envelope.
pub const SOURCE_NAME: &str = "royaleapi.com";
pub const API_VERSION: &str = "v1";

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid player tag format: {0}")]
    InvalidTag(String),

    #[error("{0}")]
    PlayerNotFound(String),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    Parsing(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidTag(_) => StatusCode::BAD_REQUEST,
            ApiError::PlayerNotFound(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Parsing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidTag(_) => "INVALID_TAG",
            ApiError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::Parsing(_) => "PARSING_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound(_) => ApiError::PlayerNotFound(e.to_string()),
            other => ApiError::Network(format!("Failed to fetch player data: {}", other)),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Parsing(format!("Failed to process player data: {}", e))
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), "Request failed: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Metadata attached to every successful response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
    pub source: &'static str,
    pub version: &'static str,
}

impl ResponseMeta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            cached: false,
            source: SOURCE_NAME,
            version: API_VERSION,
        }
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: ResponseMeta::now(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    let player = Router::new()
        .route("/:tag", get(routes::player::get_player))
        .route("/:tag/cards", get(routes::player::get_cards))
        .route("/:tag/collections", get(routes::player::get_collections))
        .route("/:tag/cards-by-level", get(routes::player::get_cards_by_level))
        .route("/:tag/battles", get(routes::player::get_battles));

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1/player", player)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".to_string())
}
