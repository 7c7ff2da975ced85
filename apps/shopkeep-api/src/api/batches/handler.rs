//! Batch API Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use shopkeep_core::batch::{group_batches, BatchView, VariantGroup};
use shopkeep_core::validation::validate_stock_delta;
use shopkeep_core::CoreError;
use shopkeep_db::repository::batch::{BatchUpdate, NewBatch};

use crate::api::SearchQuery;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESOURCE: &str = "Batch";

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add (positive) or write off (negative).
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct StorefrontVisibility {
    pub visible: bool,
}

/// Active batches, or those matching `?q=`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<BatchView>>> {
    let repo = state.db.batches();
    let batches = match query.term() {
        Some(term) => repo.search(term).await?,
        None => repo.list_active().await?,
    };
    let threshold = state.low_stock_threshold();
    Ok(Json(
        batches
            .into_iter()
            .map(|b| BatchView::new(b, threshold))
            .collect(),
    ))
}

/// Active batches grouped by variant.
pub async fn groups(State(state): State<AppState>) -> ApiResult<Json<Vec<VariantGroup>>> {
    let batches = state.db.batches().list_active().await?;
    Ok(Json(group_batches(batches, state.low_stock_threshold())))
}

/// Receive a new batch
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewBatch>,
) -> ApiResult<(StatusCode, Json<BatchView>)> {
    let batch = state.db.batches().insert(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(BatchView::new(batch, state.low_stock_threshold())),
    ))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BatchView>> {
    let batch = state
        .db
        .batches()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, &id))?;
    Ok(Json(BatchView::new(batch, state.low_stock_threshold())))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<BatchUpdate>,
) -> ApiResult<Json<BatchView>> {
    let batch = state.db.batches().update(&id, &payload).await?;
    Ok(Json(BatchView::new(batch, state.low_stock_threshold())))
}

/// Soft-deletes and renumbers the rest of the variant group.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.batches().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StockAdjustment>,
) -> ApiResult<Json<BatchView>> {
    validate_stock_delta(payload.delta).map_err(CoreError::from)?;
    let batch = state.db.batches().adjust_stock(&id, payload.delta).await?;
    Ok(Json(BatchView::new(batch, state.low_stock_threshold())))
}

pub async fn set_storefront(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StorefrontVisibility>,
) -> ApiResult<Json<BatchView>> {
    let batch = state
        .db
        .batches()
        .set_storefront_visibility(&id, payload.visible)
        .await?;
    Ok(Json(BatchView::new(batch, state.low_stock_threshold())))
}
