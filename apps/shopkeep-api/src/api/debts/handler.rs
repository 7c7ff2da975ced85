//! Debt API Handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use shopkeep_core::debt::DebtSummary;
use shopkeep_core::{Debt, DebtParty};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub party: Option<DebtParty>,
}

#[derive(Debug, Serialize)]
pub struct DebtOverview {
    pub customer_outstanding_cents: i64,
    pub supplier_outstanding_cents: i64,
    pub parties: Vec<DebtSummary>,
}

/// Per-party balances, largest first, plus the totals each way.
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<DebtOverview>> {
    let repo = state.db.debts();
    Ok(Json(DebtOverview {
        customer_outstanding_cents: repo.outstanding_total(DebtParty::Customer).await?.cents(),
        supplier_outstanding_cents: repo.outstanding_total(DebtParty::Supplier).await?.cents(),
        parties: repo.summaries(query.party).await?,
    }))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debt>> {
    let debt = state
        .db
        .debts()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Debt", &id))?;
    Ok(Json(debt))
}
