//! Storefront API
//!
//! The public catalogue: visible, in-stock batches folded into products
//! with one option per color/size/quality. Orders are placed through
//! `POST /api/orders`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use shopkeep_core::storefront::{filter, listing, StorefrontProduct};

use crate::api::SearchQuery;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/storefront", get(catalogue))
}

async fn catalogue(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<StorefrontProduct>>> {
    let batches = state.db.batches().list_storefront().await?;
    let products = listing(&batches);
    Ok(Json(match query.term() {
        Some(term) => filter(products, term),
        None => products,
    }))
}
