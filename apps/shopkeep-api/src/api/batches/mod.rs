//! Batch inventory API
//!
//! Every stock receipt is its own batch; listings come back decorated with
//! the batch color tag and stock level, or grouped by variant.

mod handler;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/batches", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/groups", get(handler::groups))
        .route(
            "/{id}",
            get(handler::get_by_id)
                .put(handler::update)
                .delete(handler::delete),
        )
        .route("/{id}/stock", post(handler::adjust_stock))
        .route("/{id}/storefront", post(handler::set_storefront))
}
