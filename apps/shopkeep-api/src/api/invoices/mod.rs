//! Invoice API
//!
//! Counter sales (with optional debt for the unpaid part), history and
//! partial returns.

mod handler;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/invoices", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route(
            "/{id}/returns",
            get(handler::returns).post(handler::apply_return),
        )
}
