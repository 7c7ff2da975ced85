//! Customer API
//!
//! Registration, standing (tier and points), purchase history and debt
//! repayment.

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/customers", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/invoices", get(handler::invoices))
        .route("/{id}/debts", get(handler::debts))
        .route("/{id}/payments", post(handler::pay))
}
