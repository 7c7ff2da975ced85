//! Analytics API Handlers

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shopkeep_core::analytics::{
    CustomerSegment, HourlySales, ProductSales, SalesSummary, SlowMover,
};

use crate::api::RangeQuery;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_top")]
    pub limit: usize,
}

fn default_top() -> usize {
    10
}

/// Overrides for the configured slow-moving thresholds.
#[derive(Debug, Deserialize)]
pub struct SlowMovingQuery {
    pub days: Option<i64>,
    pub max_units: Option<i64>,
}

pub async fn summary(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<SalesSummary>> {
    let (from, to) = range.resolve(Utc::now())?;
    Ok(Json(state.db.reports().summary(from, to).await?))
}

/// Sales per local hour of day (24 buckets).
pub async fn hourly(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<HourlySales>>> {
    let (from, to) = range.resolve(Utc::now())?;
    let offset = state.config.store.utc_offset_minutes;
    Ok(Json(state.db.reports().hourly(from, to, offset).await?))
}

pub async fn slow_moving(
    State(state): State<AppState>,
    Query(query): Query<SlowMovingQuery>,
) -> ApiResult<Json<Vec<SlowMover>>> {
    let analytics = &state.config.analytics;
    let days = query.days.unwrap_or(analytics.slow_moving_days).max(1);
    let max_units = query
        .max_units
        .unwrap_or(analytics.slow_moving_max_units)
        .max(0);
    Ok(Json(
        state
            .db
            .reports()
            .slow_moving(Utc::now(), days, max_units)
            .await?,
    ))
}

pub async fn segments(State(state): State<AppState>) -> ApiResult<Json<Vec<CustomerSegment>>> {
    Ok(Json(state.db.reports().segments(Utc::now()).await?))
}

pub async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> ApiResult<Json<Vec<ProductSales>>> {
    let (from, to) = RangeQuery {
        from: query.from,
        to: query.to,
    }
    .resolve(Utc::now())?;
    let limit = query.limit.clamp(1, 100);
    Ok(Json(state.db.reports().top_products(from, to, limit).await?))
}
