//! Invoice API Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shopkeep_core::invoice::InvoiceDraft;
use shopkeep_core::returns::ReturnRequestLine;
use shopkeep_core::{Invoice, Money, ReturnRecord};
use shopkeep_db::repository::invoice::{CheckoutReceipt, ReturnReceipt};
use tracing::debug;

use crate::api::checkout::handler::{build_cart, resolve_customer, CheckoutLine};
use crate::api::RangeQuery;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESOURCE: &str = "Invoice";

#[derive(Debug, Deserialize)]
pub struct CreateInvoice {
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
    /// Cash handed over; anything short becomes the customer's debt.
    pub tendered_cents: i64,
    pub note: Option<String>,
}

/// `?limit=` for the most recent invoices, or `?from=&to=` for a window.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub lines: Vec<ReturnRequestLine>,
}

/// Records a counter sale in one transaction.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoice>,
) -> ApiResult<(StatusCode, Json<CheckoutReceipt>)> {
    let policy = &state.config.loyalty;
    let customer = resolve_customer(&state.db, payload.customer_id.as_deref()).await?;
    let cart = build_cart(&state.db, &payload.lines).await?;

    let draft = InvoiceDraft::from_cart(
        &cart,
        customer.as_ref(),
        Money::from_cents(payload.tendered_cents),
        policy,
    )?
    .with_note(payload.note);
    debug!(total = draft.total_cents, debt = draft.debt_cents, "Invoice drafted");

    let receipt = state.db.invoices().create(&draft, policy).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let repo = state.db.invoices();
    let invoices = if query.from.is_some() || query.to.is_some() {
        let (from, to) = RangeQuery {
            from: query.from,
            to: query.to,
        }
        .resolve(Utc::now())?;
        repo.list_between(from, to).await?
    } else {
        repo.list_recent(query.limit.clamp(1, 500)).await?
    };
    Ok(Json(invoices))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let invoice = state
        .db
        .invoices()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(RESOURCE, &id))?;
    Ok(Json(invoice))
}

pub async fn returns(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ReturnRecord>>> {
    let repo = state.db.invoices();
    if repo.get_by_id(&id).await?.is_none() {
        return Err(ApiError::not_found(RESOURCE, &id));
    }
    Ok(Json(repo.returns_for(&id).await?))
}

/// Takes back some or all of the units sold on an invoice.
pub async fn apply_return(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReturnRequest>,
) -> ApiResult<(StatusCode, Json<ReturnReceipt>)> {
    let receipt = state
        .db
        .invoices()
        .apply_return(&id, &payload.lines, &state.config.loyalty)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
