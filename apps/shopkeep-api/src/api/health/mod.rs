//! Liveness and database reachability.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use shopkeep_db::MigrationStatus;
use tracing::warn;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub database: bool,
    /// Absent when the status query itself failed.
    pub migrations: Option<MigrationStatus>,
    pub store: String,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let database = state.db.health_check().await;
    let migrations = match state.db.migration_status().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "Migration status unavailable");
            None
        }
    };
    let healthy = database && migrations.is_some_and(|m| m.is_current());

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Health {
            status: if healthy { "ok" } else { "degraded" },
            database,
            migrations,
            store: state.config.store.name.clone(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
