//! Checkout API Handlers

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use shopkeep_core::cart::{Cart, CartLine, CartTotals};
use shopkeep_core::{CoreError, Customer, VipTier};
use shopkeep_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One basket line as sent by the counter.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLine {
    pub batch_id: String,
    pub quantity: i64,
    /// Whole-line discount in cents.
    #[serde(default)]
    pub discount_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub customer_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
}

#[derive(Debug, Serialize)]
pub struct Quote {
    pub tier: VipTier,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
}

/// Prices the basket, including the customer's tier discount.
pub async fn quote(
    State(state): State<AppState>,
    Json(payload): Json<QuoteRequest>,
) -> ApiResult<Json<Quote>> {
    let customer = resolve_customer(&state.db, payload.customer_id.as_deref()).await?;
    let cart = build_cart(&state.db, &payload.lines).await?;

    let tier = customer.as_ref().map_or(VipTier::Regular, |c| c.vip_tier);
    let totals = cart.totals(state.config.loyalty.discount_rate(tier));
    Ok(Json(Quote {
        tier,
        lines: cart.lines,
        totals,
    }))
}

/// Builds a cart from live batch rows.
///
/// Repeated lines for one batch merge: quantities add up and so do their
/// discounts. Stock and activity are checked here and again inside the
/// checkout transaction.
pub(crate) async fn build_cart(db: &Database, lines: &[CheckoutLine]) -> ApiResult<Cart> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let mut cart = Cart::new();
    let mut discounts: Vec<(&str, i64)> = Vec::new();
    for line in lines {
        if line.discount_cents < 0 {
            return Err(ApiError::validation("discount_cents must not be negative"));
        }
        let batch = db
            .batches()
            .get_by_id(&line.batch_id)
            .await?
            .ok_or_else(|| CoreError::BatchNotFound(line.batch_id.clone()))?;
        cart.add_item(&batch, line.quantity)?;

        match discounts.iter_mut().find(|(id, _)| *id == line.batch_id) {
            Some((_, total)) => *total = total.saturating_add(line.discount_cents),
            None => discounts.push((line.batch_id.as_str(), line.discount_cents)),
        }
    }

    for (batch_id, discount) in discounts {
        if discount != 0 {
            cart.set_discount(batch_id, discount)?;
        }
    }
    Ok(cart)
}

pub(crate) async fn resolve_customer(
    db: &Database,
    customer_id: Option<&str>,
) -> ApiResult<Option<Customer>> {
    let Some(id) = customer_id else {
        return Ok(None);
    };
    db.customers()
        .get_by_id(id)
        .await?
        .filter(|c| c.is_active)
        .map(Some)
        .ok_or_else(|| ApiError::not_found("Customer", id))
}
