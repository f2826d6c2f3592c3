//! HTTP surface over [`TranslationService`].
//!
//! Handlers stay thin: parse the request, resolve the caller's IP and
//! credential, call the service, map the outcome to a status code.

use crate::error::{BackendError, TranslateError};
use crate::ratelimit::ServiceTier;
use crate::security::constant_time_compare;
use crate::service::TranslationService;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Header carrying the caller's API credential.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the admin key for operational endpoints.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

const DEFAULT_TARGET: &str = "ES";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
    /// When set, population and metrics endpoints require this key
    pub admin_key: Option<Arc<str>>,
    /// Honour `X-Forwarded-For` / `X-Real-IP` (only behind a trusted proxy)
    pub trust_proxy_headers: bool,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Translate(e) => e.code(),
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Translate(e) => status_for(e),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Translate(e) => json!({ "success": false, "error": e }),
            other => json!({
                "success": false,
                "error": { "code": other.code(), "message": other.to_string() }
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(error: &TranslateError) -> StatusCode {
    match error {
        TranslateError::NoTextProvided
        | TranslateError::UnsupportedLanguage(_)
        | TranslateError::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,
        TranslateError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        TranslateError::BackendAuthOrQuota(BackendError::Quota { .. }) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        TranslateError::BackendAuthOrQuota(_) => StatusCode::FORBIDDEN,
        TranslateError::BackendTransient(_) => StatusCode::BAD_GATEWAY,
        TranslateError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/translate", post(translate))
        .route("/demo-translate", post(demo_translate))
        .route("/translate-batch", post(translate_batch))
        .route("/cache-populate", post(cache_populate))
        .route("/cache-status", get(cache_status))
        .route("/rate-limit-status", get(rate_limit_status))
        .route("/performance-metrics", get(performance_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

// ==================== Request Types ====================

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PopulateRequest {
    #[serde(default)]
    pub target_lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CacheStatusQuery {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitQuery {
    #[serde(rename = "type")]
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchResponse<T: Serialize> {
    success: bool,
    results: T,
}

// ==================== Handlers ====================

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "translation-gateway" }))
}

async fn translate(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<TranslateRequest>,
) -> Response {
    let ip = client_ip(&headers, connect_info, state.trust_proxy_headers);
    let credential = header_value(&headers, API_KEY_HEADER);
    translate_for(&state, request, credential, &ip).await
}

async fn demo_translate(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<TranslateRequest>,
) -> Response {
    let ip = client_ip(&headers, connect_info, state.trust_proxy_headers);
    translate_for(&state, request, None, &ip).await
}

async fn translate_for(
    state: &AppState,
    request: TranslateRequest,
    credential: Option<&str>,
    ip: &str,
) -> Response {
    let target = request.target.as_deref().unwrap_or(DEFAULT_TARGET);
    let response = state
        .service
        .handle_translate(&request.text, target, credential, ip)
        .await;

    let status = response
        .error
        .as_ref()
        .map(status_for)
        .unwrap_or(StatusCode::OK);
    (status, Json(response)).into_response()
}

async fn translate_batch(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, connect_info, state.trust_proxy_headers);
    let credential = header_value(&headers, API_KEY_HEADER);
    let target = request.target.as_deref().unwrap_or(DEFAULT_TARGET);

    let results = state
        .service
        .handle_batch(&request.texts, target, credential, &ip)
        .await?;

    Ok(Json(BatchResponse {
        success: true,
        results,
    })
    .into_response())
}

async fn cache_populate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PopulateRequest>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let target = request.target_lang.as_deref().unwrap_or(DEFAULT_TARGET);
    let populate = state.service.handle_populate(target)?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Cache population {} for {}", populate.status, populate.language),
        "language": populate.language,
        "status": populate.status,
    }))
    .into_response())
}

async fn cache_status(
    State(state): State<AppState>,
    Query(query): Query<CacheStatusQuery>,
) -> Result<Response, ApiError> {
    let target = query.lang.as_deref().unwrap_or(DEFAULT_TARGET);
    let status = state.service.handle_cache_status(target).await?;
    Ok(Json(status).into_response())
}

async fn rate_limit_status(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<RateLimitQuery>,
) -> Result<Response, ApiError> {
    let requested = query.tier.as_deref().unwrap_or("demo");
    let tier = ServiceTier::parse(requested).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "invalid endpoint type '{}', use \"demo\" or \"paid\"",
            requested
        ))
    })?;
    let ip = client_ip(&headers, connect_info, state.trust_proxy_headers);
    let status = state.service.handle_rate_limit_status(&ip, tier);

    Ok(Json(json!({
        "success": true,
        "ip_address": ip,
        "endpoint_type": tier,
        "status": status,
    }))
    .into_response())
}

async fn performance_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.service.handle_metrics()).into_response())
}

// ==================== Helpers ====================

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Ok(());
    };
    match header_value(headers, ADMIN_KEY_HEADER) {
        Some(provided) if constant_time_compare(provided, expected) => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("invalid admin key".to_string())),
        None => Err(ApiError::Unauthorized("admin key required".to_string())),
    }
}

/// Resolve the address rate limits are charged against.
///
/// Forwarded headers are only read when `trust_proxy_headers` is set;
/// otherwise a client could pick its own identity.
fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    // First entry of X-Forwarded-For is the originating client
    if let Some(first) = header_value(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first.to_string());
    }

    header_value(headers, "x-real-ip").map(str::to_string)
}
