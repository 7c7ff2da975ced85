//! Debt API
//!
//! Read side of customer and supplier debts. Payments are posted against a
//! party (`/api/customers/{id}/payments`, `/api/suppliers/{id}/payments`).

mod handler;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/debts", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(handler::summary))
        .route("/{id}", get(handler::get_by_id))
}
