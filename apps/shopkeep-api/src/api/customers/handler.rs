//! Customer API Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shopkeep_core::debt::outstanding;
use shopkeep_core::{Customer, Debt, DebtParty, Invoice, Money, VipTier};
use shopkeep_db::repository::customer::NewCustomer;
use shopkeep_db::repository::debt::PaymentReceipt;

use crate::api::SearchQuery;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const RESOURCE: &str = "Customer";

/// A customer with the figures the counter shows next to the name.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub discount_bps: u32,
    pub next_tier: Option<VipTier>,
    /// Spend still needed to reach `next_tier`.
    pub spend_to_next_tier_cents: Option<i64>,
    pub outstanding_debt_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
}

/// All active customers, or those matching `?q=` on name or phone.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    let customers = state.db.customers().list(query.term()).await?;
    Ok(Json(customers))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = state.db.customers().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerDetail>> {
    let customer = require(&state, &id).await?;
    let open = state.db.debts().list_open(DebtParty::Customer, &id).await?;

    let policy = &state.config.loyalty;
    let next = policy.next_tier(customer.total_spent());
    Ok(Json(CustomerDetail {
        discount_bps: policy.discount_rate(customer.vip_tier).bps(),
        next_tier: next.map(|(tier, _)| tier),
        spend_to_next_tier_cents: next.map(|(_, gap)| gap.cents()),
        outstanding_debt_cents: outstanding(&open).cents(),
        customer,
    }))
}

pub async fn invoices(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Invoice>>> {
    require(&state, &id).await?;
    let invoices = state.db.invoices().list_by_customer(&id).await?;
    Ok(Json(invoices))
}

/// Every debt of the customer, settled included.
pub async fn debts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Debt>>> {
    require(&state, &id).await?;
    let debts = state.db.debts().list_for(DebtParty::Customer, &id).await?;
    Ok(Json(debts))
}

/// Spreads a payment over the customer's open debts, oldest first.
pub async fn pay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentReceipt>> {
    let receipt = state
        .db
        .debts()
        .pay_customer(
            &id,
            Money::from_cents(payload.amount_cents),
            &state.config.loyalty,
        )
        .await?;
    Ok(Json(receipt))
}

async fn require(state: &AppState, id: &str) -> ApiResult<Customer> {
    state
        .db
        .customers()
        .get_by_id(id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::not_found(RESOURCE, id))
}
