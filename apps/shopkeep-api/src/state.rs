//! Shared application state handed to every handler.

use std::sync::Arc;

use shopkeep_db::Database;

use crate::config::AppConfig;

/// Cloned per request; both fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        AppState {
            db,
            config: Arc::new(config),
        }
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.config.inventory.low_stock_threshold
    }
}
