//! Supplier API Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use shopkeep_core::{Debt, DebtParty, Money, Supplier};
use shopkeep_db::repository::debt::PaymentReceipt;
use shopkeep_db::repository::supplier::NewSupplier;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESOURCE: &str = "Supplier";

#[derive(Debug, Deserialize)]
pub struct NewSupplierDebt {
    pub amount_cents: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(state.db.suppliers().list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewSupplier>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.db.suppliers().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    let supplier = state
        .db
        .suppliers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, &id))?;
    Ok(Json(supplier))
}

pub async fn debts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Debt>>> {
    state.db.suppliers().require(&id).await?;
    let debts = state.db.debts().list_for(DebtParty::Supplier, &id).await?;
    Ok(Json(debts))
}

/// Records a purchase the shop has not fully paid for.
pub async fn record_debt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<NewSupplierDebt>,
) -> ApiResult<(StatusCode, Json<Debt>)> {
    let debt = state
        .db
        .debts()
        .create_supplier_debt(&id, Money::from_cents(payload.amount_cents), payload.note)
        .await?;
    Ok((StatusCode::CREATED, Json(debt)))
}

pub async fn pay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentReceipt>> {
    let receipt = state
        .db
        .debts()
        .pay_supplier(&id, Money::from_cents(payload.amount_cents))
        .await?;
    Ok(Json(receipt))
}
