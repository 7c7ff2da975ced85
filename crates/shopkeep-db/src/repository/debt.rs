//! # Debt Repository
//!
//! Customer debts (opened by underpaid checkouts) and supplier debts
//! (recorded by hand), plus payments against them.
//!
//! ## Payment Flow
//! ```text
//! pay_customer(id, 250.00)
//!      │
//!      ▼
//! open debts ──► plan_payment (core, oldest first)
//!      │
//!      ▼  one transaction
//! ┌──────────────────────────────────────────────────────────┐
//! │ per allocation: debt.remaining -= a   (settled at zero) │
//! │                 INSERT debt_payment                      │
//! │                 invoice.paid += a, remaining -= a        │
//! │ customer standing credited with the whole payment        │
//! └──────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::customer::{require_customer, save_standing};
use crate::repository::invoice::apply_invoice_payment;
use crate::repository::new_id;
use shopkeep_core::debt::{plan_payment, summarize, DebtSummary, PaymentPlan};
use shopkeep_core::loyalty::{LoyaltyPolicy, Standing};
use shopkeep_core::validation::validate_payment_amount;
use shopkeep_core::{CoreError, Customer, Debt, DebtParty, DebtPayment, DebtStatus, Money};

macro_rules! select_debt {
    () => {
        r#"
        SELECT id, party, party_id, invoice_id, original_cents, remaining_cents,
               status, note, created_at, updated_at
        FROM debts
        "#
    };
}

/// Result of a payment against a party's debts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub plan: PaymentPlan,
    pub payments: Vec<DebtPayment>,
    /// Customer after the standing update (customer payments only).
    pub customer: Option<Customer>,
}

/// Repository for debts and debt payments.
#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
}

impl DebtRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DebtRepository { pool }
    }

    /// Applies a customer payment to their open debts, oldest first.
    pub async fn pay_customer(
        &self,
        customer_id: &str,
        amount: Money,
        policy: &LoyaltyPolicy,
    ) -> DbResult<PaymentReceipt> {
        let mut tx = self.pool.begin().await?;

        let customer = require_customer(&mut tx, customer_id).await?;
        let (plan, payments) = settle(&mut tx, DebtParty::Customer, customer_id, amount).await?;

        let (standing, earned) = policy.credit(Standing::of(&customer), amount);
        save_standing(&mut tx, customer_id, standing).await?;

        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            amount = amount.cents(),
            debts = plan.allocations.len(),
            points = earned,
            "Customer payment applied"
        );

        Ok(PaymentReceipt {
            plan,
            payments,
            customer: Some(Customer {
                total_spent_cents: standing.total_spent_cents,
                loyalty_points: standing.loyalty_points,
                vip_tier: standing.vip_tier,
                ..customer
            }),
        })
    }

    /// Records money the shop owes a supplier.
    pub async fn create_supplier_debt(
        &self,
        supplier_id: &str,
        amount: Money,
        note: Option<String>,
    ) -> DbResult<Debt> {
        validate_payment_amount(amount.cents()).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;
        require_supplier(&mut tx, supplier_id).await?;
        let debt = insert_debt(
            &mut tx,
            DebtParty::Supplier,
            supplier_id,
            None,
            amount,
            note.filter(|n| !n.trim().is_empty()),
            Utc::now(),
        )
        .await?;
        tx.commit().await?;

        info!(supplier_id = %supplier_id, amount = amount.cents(), "Supplier debt recorded");
        Ok(debt)
    }

    /// Applies a payment to a supplier's open debts, oldest first.
    pub async fn pay_supplier(&self, supplier_id: &str, amount: Money) -> DbResult<PaymentReceipt> {
        let mut tx = self.pool.begin().await?;
        require_supplier(&mut tx, supplier_id).await?;
        let (plan, payments) = settle(&mut tx, DebtParty::Supplier, supplier_id, amount).await?;
        tx.commit().await?;

        info!(supplier_id = %supplier_id, amount = amount.cents(), "Supplier payment applied");
        Ok(PaymentReceipt {
            plan,
            payments,
            customer: None,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Debt>> {
        let debt = sqlx::query_as::<_, Debt>(concat!(select_debt!(), "WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(debt)
    }

    /// Open debts of one party, oldest first.
    pub async fn list_open(&self, party: DebtParty, party_id: &str) -> DbResult<Vec<Debt>> {
        let mut conn = self.pool.acquire().await?;
        open_debts(&mut conn, party, party_id).await
    }

    /// Every debt of one party, oldest first.
    pub async fn list_for(&self, party: DebtParty, party_id: &str) -> DbResult<Vec<Debt>> {
        let debts = sqlx::query_as::<_, Debt>(concat!(
            select_debt!(),
            "WHERE party = ?1 AND party_id = ?2 ORDER BY julianday(created_at), rowid"
        ))
        .bind(party)
        .bind(party_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(debts)
    }

    /// Per-party totals, largest outstanding balance first.
    pub async fn summaries(&self, party: Option<DebtParty>) -> DbResult<Vec<DebtSummary>> {
        let debts = match party {
            Some(party) => {
                sqlx::query_as::<_, Debt>(concat!(
                    select_debt!(),
                    "WHERE party = ?1 ORDER BY julianday(created_at), rowid"
                ))
                .bind(party)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Debt>(concat!(
                    select_debt!(),
                    "ORDER BY julianday(created_at), rowid"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        debug!(party = ?party, debts = debts.len(), "Summarizing debts");
        Ok(summarize(&debts))
    }

    /// Payments received from (or made to) one party, newest first.
    pub async fn payments_for(&self, party: DebtParty, party_id: &str) -> DbResult<Vec<DebtPayment>> {
        let payments = sqlx::query_as::<_, DebtPayment>(
            r#"
            SELECT id, debt_id, party, party_id, amount_cents, created_at
            FROM debt_payments
            WHERE party = ?1 AND party_id = ?2
            ORDER BY julianday(created_at) DESC, rowid DESC
            "#,
        )
        .bind(party)
        .bind(party_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Total still owed on one side of the ledger.
    pub async fn outstanding_total(&self, party: DebtParty) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(remaining_cents), 0) FROM debts WHERE party = ?1 AND status = 'open'",
        )
        .bind(party)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(cents))
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn insert_debt(
    conn: &mut SqliteConnection,
    party: DebtParty,
    party_id: &str,
    invoice_id: Option<&str>,
    amount: Money,
    note: Option<String>,
    now: DateTime<Utc>,
) -> DbResult<Debt> {
    let debt = Debt {
        id: new_id(),
        party,
        party_id: party_id.to_string(),
        invoice_id: invoice_id.map(str::to_string),
        original_cents: amount.cents(),
        remaining_cents: amount.cents(),
        status: DebtStatus::Open,
        note,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO debts (
            id, party, party_id, invoice_id, original_cents, remaining_cents,
            status, note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7, ?8, ?8)
        "#,
    )
    .bind(&debt.id)
    .bind(debt.party)
    .bind(&debt.party_id)
    .bind(&debt.invoice_id)
    .bind(debt.original_cents)
    .bind(debt.status)
    .bind(&debt.note)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(debt_id = %debt.id, party = ?party, amount = amount.cents(), "Debt opened");
    Ok(debt)
}

/// Lowers the open debt linked to an invoice (returns against credit sales).
pub(crate) async fn reduce_invoice_debt(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    amount: Money,
) -> DbResult<()> {
    let debts = sqlx::query_as::<_, Debt>(concat!(
        select_debt!(),
        "WHERE invoice_id = ?1 AND status = 'open' ORDER BY julianday(created_at), rowid"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut left = amount;
    for debt in debts {
        if left.is_zero() {
            break;
        }
        let take = debt.remaining().min(left);
        left -= take;
        set_remaining(conn, &debt.id, debt.remaining() - take).await?;
    }
    Ok(())
}

async fn open_debts(
    conn: &mut SqliteConnection,
    party: DebtParty,
    party_id: &str,
) -> DbResult<Vec<Debt>> {
    let debts = sqlx::query_as::<_, Debt>(concat!(
        select_debt!(),
        r#"
        WHERE party = ?1 AND party_id = ?2 AND status = 'open' AND remaining_cents > 0
        ORDER BY julianday(created_at), rowid
        "#
    ))
    .bind(party)
    .bind(party_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(debts)
}

async fn set_remaining(conn: &mut SqliteConnection, debt_id: &str, remaining: Money) -> DbResult<()> {
    let status = if remaining.is_positive() {
        DebtStatus::Open
    } else {
        DebtStatus::Settled
    };

    sqlx::query("UPDATE debts SET remaining_cents = ?2, status = ?3, updated_at = ?4 WHERE id = ?1")
        .bind(debt_id)
        .bind(remaining.non_negative().cents())
        .bind(status)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Plans and applies a payment against one party's open debts.
async fn settle(
    conn: &mut SqliteConnection,
    party: DebtParty,
    party_id: &str,
    amount: Money,
) -> DbResult<(PaymentPlan, Vec<DebtPayment>)> {
    let debts = open_debts(conn, party, party_id).await?;
    if debts.is_empty() {
        validate_payment_amount(amount.cents()).map_err(CoreError::from)?;
        return Err(CoreError::NoOutstandingDebt(party_id.to_string()).into());
    }

    let plan = plan_payment(&debts, amount)?;
    let now = Utc::now();

    let mut payments = Vec::with_capacity(plan.allocations.len());
    for allocation in &plan.allocations {
        set_remaining(
            conn,
            &allocation.debt_id,
            Money::from_cents(allocation.remaining_after_cents),
        )
        .await?;

        let payment = DebtPayment {
            id: new_id(),
            debt_id: allocation.debt_id.clone(),
            party,
            party_id: party_id.to_string(),
            amount_cents: allocation.amount_cents,
            created_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO debt_payments (id, debt_id, party, party_id, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.debt_id)
        .bind(payment.party)
        .bind(&payment.party_id)
        .bind(payment.amount_cents)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        if let Some(invoice_id) = allocation.invoice_id.as_deref() {
            apply_invoice_payment(conn, invoice_id, Money::from_cents(allocation.amount_cents))
                .await?;
        }
        payments.push(payment);
    }

    Ok((plan, payments))
}

async fn require_supplier(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM suppliers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| DbError::not_found("Supplier", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::batch::NewBatch;
    use crate::repository::customer::NewCustomer;
    use crate::repository::supplier::NewSupplier;
    use shopkeep_core::cart::Cart;
    use shopkeep_core::invoice::InvoiceDraft;
    use shopkeep_core::InvoiceStatus;

    /// Two credit sales: 100.00 owed on the first, 50.00 on the second.
    async fn customer_with_debts() -> (Database, Customer, Vec<String>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let policy = LoyaltyPolicy::default();
        let batch = db
            .batches()
            .insert(&NewBatch {
                name: "Wool Coat".to_string(),
                unit: "pc".to_string(),
                cost_price_cents: 5_000,
                sale_price_cents: 15_000,
                quantity: 10,
                ..NewBatch::default()
            })
            .await
            .unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Hoa".to_string(),
                phone: Some("0987654321".to_string()),
                address: None,
            })
            .await
            .unwrap();

        let mut invoice_ids = Vec::new();
        for paid in [5_000, 10_000] {
            let mut cart = Cart::new();
            cart.add_item(&batch, 1).unwrap();
            let draft =
                InvoiceDraft::from_cart(&cart, Some(&customer), Money::from_cents(paid), &policy)
                    .unwrap();
            let receipt = db.invoices().create(&draft, &policy).await.unwrap();
            invoice_ids.push(receipt.invoice.id);
        }

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        (db, customer, invoice_ids)
    }

    #[tokio::test]
    async fn test_customer_payment_fifo() {
        let (db, customer, invoices) = customer_with_debts().await;
        let policy = LoyaltyPolicy::default();
        assert_eq!(customer.total_spent_cents, 15_000);

        let receipt = db
            .debts()
            .pay_customer(&customer.id, Money::from_cents(12_000), &policy)
            .await
            .unwrap();

        assert_eq!(receipt.plan.allocations.len(), 2);
        assert_eq!(receipt.plan.allocations[0].amount_cents, 10_000);
        assert!(receipt.plan.allocations[0].settles);
        assert_eq!(receipt.plan.allocations[1].amount_cents, 2_000);
        assert_eq!(receipt.plan.outstanding_after_cents, 3_000);
        assert_eq!(receipt.payments.len(), 2);

        let open = db.debts().list_open(DebtParty::Customer, &customer.id).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].remaining_cents, 3_000);

        let first = db.invoices().get_by_id(&invoices[0]).await.unwrap().unwrap();
        assert_eq!(first.status, InvoiceStatus::Paid);
        assert_eq!(first.paid_cents, 15_000);
        let second = db.invoices().get_by_id(&invoices[1]).await.unwrap().unwrap();
        assert_eq!(second.remaining_cents, 3_000);
        assert_eq!(second.status, InvoiceStatus::Partial);

        let after = receipt.customer.unwrap();
        assert_eq!(after.total_spent_cents, 27_000);
        assert_eq!(after.loyalty_points, 2);

        let payments = db
            .debts()
            .payments_for(DebtParty::Customer, &customer.id)
            .await
            .unwrap();
        assert_eq!(payments.len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_rejected_atomically() {
        let (db, customer, _) = customer_with_debts().await;
        let err = db
            .debts()
            .pay_customer(&customer.id, Money::from_cents(15_001), &LoyaltyPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::PaymentExceedsDebt {
                outstanding: 15_000,
                ..
            })
        ));

        let total = db.debts().outstanding_total(DebtParty::Customer).await.unwrap();
        assert_eq!(total.cents(), 15_000);
    }

    #[tokio::test]
    async fn test_payment_without_debt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Lan".to_string(),
                ..NewCustomer::default()
            })
            .await
            .unwrap();

        let err = db
            .debts()
            .pay_customer(&customer.id, Money::from_cents(100), &LoyaltyPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NoOutstandingDebt(_))));
    }

    #[tokio::test]
    async fn test_supplier_debts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mill = db
            .suppliers()
            .create(&NewSupplier {
                name: "Northern Mill".to_string(),
                ..NewSupplier::default()
            })
            .await
            .unwrap();

        db.debts()
            .create_supplier_debt(&mill.id, Money::from_cents(80_000), Some("Spring stock".into()))
            .await
            .unwrap();
        db.debts()
            .create_supplier_debt(&mill.id, Money::from_cents(20_000), None)
            .await
            .unwrap();
        assert!(db
            .debts()
            .create_supplier_debt("missing", Money::from_cents(1), None)
            .await
            .is_err());

        let receipt = db
            .debts()
            .pay_supplier(&mill.id, Money::from_cents(90_000))
            .await
            .unwrap();
        assert_eq!(receipt.plan.outstanding_after_cents, 10_000);
        assert!(receipt.customer.is_none());

        let summaries = db.debts().summaries(Some(DebtParty::Supplier)).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].remaining_total_cents, 10_000);
        assert_eq!(summaries[0].open_count, 1);
        assert!(db
            .debts()
            .summaries(Some(DebtParty::Customer))
            .await
            .unwrap()
            .is_empty());
    }
}
