//! # Order Fulfillment State Machine
//!
//! ```text
//!                ┌──────────────────────────────┐
//!                │                              ▼
//!   Pending ──► Confirmed ──► Completed     Cancelled
//!      │  ▲         │  ▲                        ▲
//!      │  │         ▼  │                        │
//!      │  └──── CancelRequested ────────────────┤
//!      └──────────────┴─────────────────────────┘
//! ```
//!
//! | from            | allowed targets                           |
//! |-----------------|-------------------------------------------|
//! | Pending         | Confirmed, CancelRequested, Cancelled     |
//! | Confirmed       | CancelRequested, Completed, Cancelled     |
//! | CancelRequested | Cancelled, Confirmed                      |
//! | Completed       | (terminal)                                |
//! | Cancelled       | (terminal)                                |
//!
//! Completion itself (building the invoice) lives in shopkeep-db; this
//! module only decides whether a move is legal.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{OrderItem, OrderStatus};

impl OrderStatus {
    /// Statuses reachable from this one.
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, CancelRequested, Cancelled],
            Confirmed => &[CancelRequested, Completed, Cancelled],
            CancelRequested => &[Cancelled, Confirmed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_targets().contains(&next)
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Still waiting on the shop (shown in the work queue).
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

/// Validates a move and returns the new status.
pub fn transition(from: OrderStatus, to: OrderStatus) -> CoreResult<OrderStatus> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(CoreError::InvalidOrderTransition { from, to })
    }
}

/// Sum of the order's line totals at placement prices.
pub fn order_total(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::line_total).sum()
}
