//! Analysis and credit handlers. Every handler is scoped to the signed-in user.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use virality_core::{
    Analysis, AnalysisPatch, AnalysisWithInsights, CreateAnalysisRequest, Credits,
};

use crate::middleware::{CurrentSession, RequestId};

use super::{map_db_error, require_user, ApiError, ApiResponse, AppState, ResponseMeta};

fn body_or_validation_error<T>(
    req_id: &str,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::new(req_id, "validation_error", rejection.body_text()))
}

/// POST /api/analysis: validate, spend a credit, and record a `pending`
/// analysis. Responds with the bare record.
pub(super) async fn create_analysis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<CurrentSession>,
    body: Result<Json<CreateAnalysisRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Analysis>), ApiError> {
    let rid = &req_id.0;
    let user_id = require_user(rid, &session)?;
    let request = body_or_validation_error(rid, body)?;

    let new = request
        .validate()
        .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;

    virality_db::ensure_profile(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let analysis = virality_db::create_analysis(&state.pool, user_id, &new)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(
        analysis_id = %analysis.id,
        %user_id,
        platforms = analysis.platforms.len(),
        "analysis submitted"
    );

    Ok((StatusCode::CREATED, Json(analysis)))
}

/// GET /api/analyses: the caller's analyses, newest first.
pub(super) async fn list_analyses(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<ApiResponse<Vec<AnalysisWithInsights>>>, ApiError> {
    let user_id = require_user(&req_id.0, &session)?;
    let data = virality_db::list_analyses(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_analysis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AnalysisWithInsights>>, ApiError> {
    let user_id = require_user(&req_id.0, &session)?;
    let data = virality_db::get_analysis(&state.pool, user_id, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PATCH /api/analyses/{id}: apply one lifecycle step.
pub(super) async fn update_analysis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    body: Result<Json<AnalysisPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<Analysis>>, ApiError> {
    let rid = &req_id.0;
    let user_id = require_user(rid, &session)?;
    let patch = body_or_validation_error(rid, body)?;

    let data = virality_db::update_analysis(&state.pool, user_id, id, &patch)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(analysis_id = %id, status = %data.status, "analysis updated");

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// GET /api/credits: provisions a default profile on first use.
pub(super) async fn get_credits(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<ApiResponse<Credits>>, ApiError> {
    let user_id = require_user(&req_id.0, &session)?;
    let profile = virality_db::ensure_profile(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = Credits {
        credits_remaining: profile.credits_remaining,
        subscription_tier: profile.subscription_tier,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
