//! Supplier API
//!
//! Suppliers and the purchase debts the shop owes them.

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/suppliers", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/debts", get(handler::debts).post(handler::record_debt))
        .route("/{id}/payments", post(handler::pay))
}
