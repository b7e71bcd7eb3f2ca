use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::repo_types::{MetricCategory, MetricTypeWithCategory};
use crate::{
    auth::extractors::AuthUser,
    envelope::ApiResponse,
    error::{AppError, FieldErrors, Result},
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/categories", get(list_categories))
        .route("/metrics/types", get(list_metric_types))
        .route("/metrics/types/:id", get(get_metric_type))
}

#[derive(Debug, Deserialize)]
pub struct TypesQuery {
    pub category: Option<String>,
}

#[instrument(skip(state, _user, params))]
pub async fn list_metric_types(
    State(state): State<AppState>,
    _user: AuthUser,
    params: std::result::Result<Query<TypesQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<MetricTypeWithCategory>>>> {
    let Query(q) = params?;
    let types = match q.category.as_deref().filter(|c| !c.is_empty()) {
        Some(category) => state.catalog.find_by_category(category).await,
        None => state.catalog.find_all().await,
    }
    .map_err(AppError::infra("Failed to fetch metric types"))?;

    Ok(Json(ApiResponse::list(types)))
}

#[instrument(skip(state, _user))]
pub async fn get_metric_type(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MetricTypeWithCategory>>> {
    let id: i32 = id
        .parse()
        .map_err(|_| AppError::Validation(FieldErrors::single("id", "Expected integer")))?;

    let metric_type = state
        .catalog
        .find_by_id(id)
        .await
        .map_err(AppError::infra("Failed to fetch metric type"))?
        .ok_or(AppError::NotFound("Metric type not found"))?;

    Ok(Json(ApiResponse::ok(metric_type)))
}

#[instrument(skip(state, _user))]
pub async fn list_categories(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<ApiResponse<Vec<MetricCategory>>>> {
    let categories = state
        .catalog
        .find_all_categories()
        .await
        .map_err(AppError::infra("Failed to fetch categories"))?;

    Ok(Json(ApiResponse::list(categories)))
}
