//! # shopkeep-core: Pure Business Rules for Shopkeep
//!
//! This crate holds every business rule of the shop as pure functions with
//! zero I/O dependencies. The database layer and the HTTP service call into it;
//! it never calls out.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 shopkeep-api (axum handlers)                    │   │
//! │  │   /api/batches, /api/invoices, /api/orders, /api/analytics ...  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ shopkeep-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   batch   cart   loyalty   invoice   debt   order   returns    │   │
//! │  │   storefront   analytics   money   types   validation          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               shopkeep-db (Database Layer)                      │   │
//! │  │       SQLite queries, migrations, atomic transactions           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Batch, Customer, Invoice, Debt, Order, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`batch`] - Batch numbering, coloring and variant grouping
//! - [`cart`] - Point-of-sale cart and discount engine
//! - [`loyalty`] - VIP tiers and loyalty points
//! - [`invoice`] - Invoice drafting from a cart
//! - [`debt`] - Debt aggregation and FIFO payment planning
//! - [`order`] - Order fulfillment state machine
//! - [`returns`] - Partial return calculation
//! - [`storefront`] - Customer-facing catalogue
//! - [`analytics`] - Reporting derivations over invoice history
//!
//! ## Example Usage
//!
//! ```rust
//! use shopkeep_core::loyalty::LoyaltyPolicy;
//! use shopkeep_core::VipTier;
//! use shopkeep_core::money::Money;
//!
//! let policy = LoyaltyPolicy::default();
//! let tier = policy.tier_for(Money::from_cents(2_500_000));
//! assert_eq!(tier, VipTier::Gold);
//!
//! // Gold customers get 5% off
//! let discount = Money::from_cents(10_000).percentage(policy.discount_rate(tier).bps());
//! assert_eq!(discount.cents(), 500);
//! ```

pub mod analytics;
pub mod batch;
pub mod cart;
pub mod debt;
pub mod error;
pub mod invoice;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod returns;
pub mod storefront;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart or order.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest cost or sale price a batch may carry, in cents.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Highest stock a single batch may hold, and the largest single adjustment.
///
/// Together with `MAX_PRICE_CENTS` this keeps `price * quantity` and the
/// group totals built from it well inside i64.
pub const MAX_STOCK: i64 = 1_000_000;

/// Default low-stock threshold used when no configuration overrides it.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
