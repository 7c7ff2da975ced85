//! Checkout API
//!
//! Prices a basket against live stock without writing anything. The sale
//! itself is `POST /api/invoices`.

pub(crate) mod handler;

use axum::routing::post;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/checkout", routes())
}

fn routes() -> Router<AppState> {
    Router::new().route("/quote", post(handler::quote))
}
