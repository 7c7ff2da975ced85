//! Analytics API
//!
//! Read-only reports derived from invoice history.

mod handler;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/analytics", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(handler::summary))
        .route("/hourly", get(handler::hourly))
        .route("/slow-moving", get(handler::slow_moving))
        .route("/segments", get(handler::segments))
        .route("/top-products", get(handler::top_products))
}
