//! Order API
//!
//! Storefront orders and their fulfilment. Completing an order turns it
//! into an invoice.

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::place))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", post(handler::set_status))
        .route("/{id}/complete", post(handler::complete))
}
