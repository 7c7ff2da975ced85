//! # shopkeep-api: HTTP Surface for Shopkeep
//!
//! JSON over HTTP for the shop's back office and its storefront. Every
//! handler validates input, calls one repository operation in
//! `shopkeep-db` and maps the outcome to a status code.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Request Lifecycle                               │
//! │                                                                         │
//! │  HTTP ──► TraceLayer ──► CorsLayer ──► Router ──► Handler              │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                        state.db.<repo>().<op>()         │
//! │                                                      │                  │
//! │                                     Ok(Json<T>) ◄────┴────► ApiError    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Layered configuration (file + environment)
//! - [`error`] - `ApiError` and its HTTP mapping
//! - [`state`] - Shared handler state
//! - [`api`] - Route modules, one per resource

pub mod api;
pub mod config;
pub mod error;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(api::health::router())
        .merge(api::batches::router())
        .merge(api::customers::router())
        .merge(api::suppliers::router())
        .merge(api::checkout::router())
        .merge(api::invoices::router())
        .merge(api::debts::router())
        .merge(api::orders::router())
        .merge(api::storefront::router())
        .merge(api::analytics::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
