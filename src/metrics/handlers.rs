use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateMetricBody, MetricQueryParams, StatsQueryParams, UpdateMetricBody};
use super::repo_types::{HealthMetric, MetricStats, MetricWithType};
use super::validation::{validate_create, validate_query, validate_stats, validate_update};
use crate::{
    auth::extractors::AuthUser,
    envelope::{ApiResponse, MessageResponse},
    error::{AppError, Result},
    state::AppState,
};

const NOT_FOUND: AppError = AppError::NotFound("Metric not found");

pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(list_metrics).post(create_metric))
        .route("/metrics/stats/:metric_type_id", get(get_metric_stats))
        .route(
            "/metrics/:id",
            get(get_metric).put(update_metric).delete(delete_metric),
        )
}

/// Unparsable ids can't belong to anyone, so they read as "not found".
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| NOT_FOUND)
}

#[instrument(skip(state, identity, params))]
pub async fn list_metrics(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    params: std::result::Result<Query<MetricQueryParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<MetricWithType>>>> {
    let Query(params) = params?;
    let filter = validate_query(params)?;

    let metrics = state
        .metrics
        .find_by_user(&identity.username, &filter)
        .await
        .map_err(AppError::infra("Failed to fetch metrics"))?;

    Ok(Json(ApiResponse::list(metrics)))
}

#[instrument(skip(state, identity))]
pub async fn get_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MetricWithType>>> {
    let id = parse_id(&id)?;
    let metric = state
        .metrics
        .find_by_id(id, &identity.username)
        .await
        .map_err(AppError::infra("Failed to fetch metric"))?
        .ok_or(NOT_FOUND)?;

    Ok(Json(ApiResponse::ok(metric)))
}

#[instrument(skip(state, identity, payload))]
pub async fn create_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: std::result::Result<Json<CreateMetricBody>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<ApiResponse<HealthMetric>>)> {
    let Json(body) = payload?;
    let input = validate_create(body)?;

    let metric = state
        .metrics
        .create(&identity.username, input)
        .await
        .map_err(AppError::infra("Failed to create metric"))?;

    info!(metric_id = %metric.id, user = %identity.username, "metric created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/metrics/{}", metric.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(ApiResponse::ok(metric))))
}

#[instrument(skip(state, identity, payload))]
pub async fn update_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateMetricBody>, JsonRejection>,
) -> Result<Json<ApiResponse<HealthMetric>>> {
    let Json(body) = payload?;
    let patch = validate_update(body)?;
    let id = parse_id(&id)?;

    // An empty patch and a foreign/absent id both come back as None.
    let metric = state
        .metrics
        .update(id, &identity.username, patch)
        .await
        .map_err(AppError::infra("Failed to update metric"))?
        .ok_or(NOT_FOUND)?;

    Ok(Json(ApiResponse::ok(metric)))
}

#[instrument(skip(state, identity))]
pub async fn delete_metric(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let deleted = state
        .metrics
        .delete(id, &identity.username)
        .await
        .map_err(AppError::infra("Failed to delete metric"))?;

    if !deleted {
        return Err(NOT_FOUND);
    }

    info!(metric_id = %id, user = %identity.username, "metric deleted");
    Ok(Json(MessageResponse::ok("Metric deleted successfully")))
}

#[instrument(skip(state, identity, params))]
pub async fn get_metric_stats(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(metric_type_id): Path<String>,
    params: std::result::Result<Query<StatsQueryParams>, QueryRejection>,
) -> Result<Json<ApiResponse<MetricStats>>> {
    let Query(params) = params?;
    let (metric_type_id, range) = validate_stats(&metric_type_id, params)?;

    let stats = state
        .metrics
        .get_stats(&identity.username, metric_type_id, &range)
        .await
        .map_err(AppError::infra("Failed to fetch statistics"))?;

    Ok(Json(ApiResponse::ok(stats)))
}
