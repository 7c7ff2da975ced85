//! # HTTP Routes
//!
//! One module per resource. Each exposes `router()` nesting its routes
//! under the resource path and keeps its handlers in `handler.rs`.
//!
//! | Module         | Path                  |
//! |----------------|-----------------------|
//! | [`health`]     | `/health`             |
//! | [`batches`]    | `/api/batches`        |
//! | [`customers`]  | `/api/customers`      |
//! | [`suppliers`]  | `/api/suppliers`      |
//! | [`checkout`]   | `/api/checkout`       |
//! | [`invoices`]   | `/api/invoices`       |
//! | [`debts`]      | `/api/debts`          |
//! | [`orders`]     | `/api/orders`         |
//! | [`storefront`] | `/api/storefront`     |
//! | [`analytics`]  | `/api/analytics`      |

pub mod analytics;
pub mod batches;
pub mod checkout;
pub mod customers;
pub mod debts;
pub mod health;
pub mod invoices;
pub mod orders;
pub mod storefront;
pub mod suppliers;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// Reporting window used when a query gives no bounds.
const DEFAULT_WINDOW_DAYS: i64 = 30;

/// `?from=&to=` window (RFC 3339). Defaults to the last 30 days.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeQuery {
    /// Resolves the window, rejecting `from >= to`.
    pub fn resolve(&self, now: DateTime<Utc>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_WINDOW_DAYS));
        if from >= to {
            return Err(ApiError::validation("'from' must be before 'to'"));
        }
        Ok((from, to))
    }
}

/// `?q=` free-text search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// The trimmed query, if it has any content.
    pub fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_defaults_to_window() {
        let now = Utc::now();
        let (from, to) = RangeQuery::default().resolve(now).unwrap();
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(DEFAULT_WINDOW_DAYS));
    }

    #[test]
    fn test_range_rejects_inverted() {
        let now = Utc::now();
        let query = RangeQuery {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
        };
        assert!(query.resolve(now).is_err());
    }

    #[test]
    fn test_blank_search_is_none() {
        let query = SearchQuery {
            q: Some("   ".to_string()),
        };
        assert_eq!(query.term(), None);
    }
}
