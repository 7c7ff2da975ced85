//! # Error Types
//!
//! Domain-specific error types for shopkeep-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shopkeep-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopkeep-db errors                                                    │
//! │  └── DbError          - Database failures (wraps CoreError)            │
//! │                                                                         │
//! │  shopkeep-api errors                                                   │
//! │  └── ApiError         - What HTTP clients see                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Batch cannot be found or is no longer active.
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// Requested more units than the batch holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Live stock: 3
    ///      │
    ///      ▼
    /// InsufficientStock { item: "Linen Shirt (Blue, M) #2", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// Batch exists but is hidden from the storefront.
    #[error("Batch {0} is not available on the storefront")]
    NotOnStorefront(String),

    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Line is not in the cart.
    #[error("Batch {0} is not in the cart")]
    NotInCart(String),

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Discount larger than the line it applies to.
    #[error("Discount {discount} exceeds line total {line_total}")]
    DiscountExceedsLine { discount: i64, line_total: i64 },

    /// Walk-in sale without full payment.
    #[error("Underpaid sale requires a customer to carry the debt (short by {short_cents} cents)")]
    DebtWithoutCustomer { short_cents: i64 },

    /// Payment is larger than everything owed.
    #[error("Payment {amount} exceeds outstanding debt {outstanding}")]
    PaymentExceedsDebt { amount: i64, outstanding: i64 },

    /// No open debts to apply a payment against.
    #[error("No outstanding debt for {0}")]
    NoOutstandingDebt(String),

    /// Order status change that the state machine forbids.
    #[error("Order cannot move from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    /// Return quantity larger than what is left to return.
    #[error("Cannot return {requested} of {item}: only {returnable} returnable")]
    ReturnExceedsSold {
        item: String,
        returnable: i64,
        requested: i64,
    },

    /// Return line references a batch the invoice never sold.
    #[error("Batch {0} is not on this invoice")]
    NotOnInvoice(String),

    /// The invoice has already been fully returned.
    #[error("Invoice {0} has already been fully returned")]
    AlreadyReturned(String),

    /// Loyalty policy is not well formed.
    #[error("Invalid loyalty policy: {0}")]
    InvalidPolicy(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements, before any
/// business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
