mod analyses;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use virality_auth::AuthClient;
use virality_core::LifecycleError;
use virality_db::DbError;

use crate::middleware::{request_id, session_gate, CurrentSession, GateState, RequestId};
use crate::pages;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Present when the auth service is configured; used to build sign-in links.
    pub auth: Option<Arc<AuthClient>>,
    pub public_url: String,
    pub secure_cookies: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

/// JSON error body: `error` carries the human-readable message callers
/// display unchanged; `code` selects the HTTP status.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "insufficient_credits" => StatusCode::PAYMENT_REQUIRED,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

/// The signed-in user, or `401 unauthorized`.
pub(crate) fn require_user(request_id: &str, session: &CurrentSession) -> Result<Uuid, ApiError> {
    session
        .user_id()
        .ok_or_else(|| ApiError::new(request_id, "unauthorized", "authentication required"))
}

pub(crate) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "not found"),
        DbError::InsufficientCredits => {
            ApiError::new(request_id, "insufficient_credits", "Insufficient credits")
        }
        DbError::InvalidTransition { .. }
        | DbError::Lifecycle(LifecycleError::Terminal(_) | LifecycleError::InvalidTransition { .. }) => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        DbError::Lifecycle(_) | DbError::PlatformNotSelected { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        DbError::Corrupt { .. } | DbError::Sqlx(_) | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/analysis", post(analyses::create_analysis))
        .route("/api/analyses", get(analyses::list_analyses))
        .route(
            "/api/analyses/{id}",
            get(analyses::get_analysis).patch(analyses::update_analysis),
        )
        .route("/api/credits", get(analyses::get_credits))
}

fn page_router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::landing))
        .route("/login", get(pages::login))
        .route("/dashboard", get(pages::dashboard))
        .route("/wizard", get(pages::wizard).post(pages::submit_wizard))
        .route("/auth/signout", post(pages::sign_out))
        .fallback(pages::not_found)
}

pub fn build_app(state: AppState, gate: GateState) -> Router {
    Router::new()
        .merge(api_router())
        .merge(page_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(gate, session_gate)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match virality_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
