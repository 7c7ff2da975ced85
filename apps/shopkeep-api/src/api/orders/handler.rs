//! Order API Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use shopkeep_core::{Money, Order, OrderStatus};
use shopkeep_db::repository::order::{OrderCompletion, PlaceOrder};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESOURCE: &str = "Order";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// Amount collected; the full total when absent.
    pub paid_cents: Option<i64>,
}

/// Places an order from the storefront.
pub async fn place(
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.db.orders().place(&payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list(query.status).await?))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state
        .db
        .orders()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, &id))?;
    Ok(Json(order))
}

/// Confirms, cancels or flags an order for cancellation.
///
/// Completion goes through `/complete`, which also writes the invoice.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusChange>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.db.orders().set_status(&id, payload.status).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CompleteRequest>,
) -> ApiResult<Json<OrderCompletion>> {
    let completion = state
        .db
        .orders()
        .complete(
            &id,
            payload.paid_cents.map(Money::from_cents),
            &state.config.loyalty,
        )
        .await?;
    Ok(Json(completion))
}
