//! # Customer Repository
//!
//! Customers, looked up by id or by normalised phone number, and their
//! loyalty standing (paid spend, points, VIP tier).
//!
//! Standing is only ever written by the checkout, payment and return
//! transactions through [`save_standing`]; there is no public setter.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use shopkeep_core::loyalty::Standing;
use shopkeep_core::validation::{normalize_phone, validate_name, validate_phone};
use shopkeep_core::{Customer, ValidationError, VipTier};

macro_rules! select_customer {
    () => {
        r#"
        SELECT id, name, phone, address, total_spent_cents, loyalty_points,
               vip_tier, is_active, created_at, updated_at
        FROM customers
        "#
    };
}

/// A customer to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewCustomer {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a customer. Phones are unique once normalised.
    pub async fn create(&self, new: &NewCustomer) -> DbResult<Customer> {
        new.validate()?;
        let mut conn = self.pool.acquire().await?;
        let customer = insert_customer(&mut conn, new).await?;
        info!(id = %customer.id, "Customer registered");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    /// Looks a customer up by phone in any formatting.
    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_phone(&mut conn, phone).await
    }

    /// Lists active customers, optionally filtered by name or phone.
    pub async fn list(&self, query: Option<&str>) -> DbResult<Vec<Customer>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        debug!(query = ?query, "Listing customers");

        let customers = match query {
            Some(q) => {
                let pattern = format!("%{}%", q.to_lowercase());
                // A query of bare separators ("-", "()") must not match every phone
                let digits = normalize_phone(q);
                let phone_pattern = (!digits.is_empty()).then(|| format!("%{}%", digits));
                sqlx::query_as::<_, Customer>(concat!(
                    select_customer!(),
                    r#"
                    WHERE is_active = 1
                      AND (LOWER(name) LIKE ?1 OR phone LIKE ?2)
                    ORDER BY name COLLATE NOCASE
                    "#
                ))
                .bind(pattern)
                .bind(phone_pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Customer>(concat!(
                    select_customer!(),
                    "WHERE is_active = 1 ORDER BY name COLLATE NOCASE"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(customers)
    }

    /// All customers including inactive ones (analytics input).
    pub async fn list_all(&self) -> DbResult<Vec<Customer>> {
        let customers =
            sqlx::query_as::<_, Customer>(concat!(select_customer!(), "ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await?;
        Ok(customers)
    }

    /// Customers at or above a tier, best first.
    pub async fn list_by_min_tier(&self, tier: VipTier) -> DbResult<Vec<Customer>> {
        let customers = self.list(None).await?;
        let mut selected: Vec<Customer> =
            customers.into_iter().filter(|c| c.vip_tier >= tier).collect();
        selected.sort_by(|a, b| b.total_spent_cents.cmp(&a.total_spent_cents));
        Ok(selected)
    }
}

// =============================================================================
// Connection-level helpers (shared with the transactions)
// =============================================================================

pub(crate) async fn fetch_customer(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(concat!(select_customer!(), "WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

pub(crate) async fn require_customer(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
    fetch_customer(conn, id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| DbError::not_found("Customer", id))
}

async fn fetch_by_phone(conn: &mut SqliteConnection, phone: &str) -> DbResult<Option<Customer>> {
    let normalized = normalize_phone(phone);
    if normalized.is_empty() {
        return Ok(None);
    }
    let customer = sqlx::query_as::<_, Customer>(concat!(select_customer!(), "WHERE phone = ?1"))
        .bind(normalized)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

async fn insert_customer(conn: &mut SqliteConnection, new: &NewCustomer) -> DbResult<Customer> {
    let now = Utc::now();
    let phone = new
        .phone
        .as_deref()
        .map(normalize_phone)
        .filter(|p| !p.is_empty());

    let customer = Customer {
        id: new_id(),
        name: new.name.trim().to_string(),
        phone,
        address: new.address.clone().filter(|a| !a.trim().is_empty()),
        total_spent_cents: 0,
        loyalty_points: 0,
        vip_tier: VipTier::Regular,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO customers (
            id, name, phone, address, total_spent_cents, loyalty_points,
            vip_tier, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, 1, ?6, ?7)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.address)
    .bind(customer.vip_tier)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => {
            DbError::duplicate(field, customer.phone.clone().unwrap_or_default())
        }
        other => other,
    })?;

    Ok(customer)
}

/// Finds the customer owning `phone`, registering one if none exists.
pub(crate) async fn find_or_create_by_phone(
    conn: &mut SqliteConnection,
    name: &str,
    phone: &str,
    address: Option<&str>,
) -> DbResult<Customer> {
    if let Some(existing) = fetch_by_phone(conn, phone).await? {
        return Ok(existing);
    }

    let new = NewCustomer {
        name: name.to_string(),
        phone: Some(phone.to_string()),
        address: address.map(str::to_string),
    };
    new.validate()?;
    let customer = insert_customer(conn, &new).await?;
    info!(id = %customer.id, "Customer registered from order");
    Ok(customer)
}

/// Persists a recomputed loyalty standing.
pub(crate) async fn save_standing(
    conn: &mut SqliteConnection,
    customer_id: &str,
    standing: Standing,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE customers SET
            total_spent_cents = ?2,
            loyalty_points = ?3,
            vip_tier = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(customer_id)
    .bind(standing.total_spent_cents)
    .bind(standing.loyalty_points)
    .bind(standing.vip_tier)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(
        customer_id = %customer_id,
        spent = standing.total_spent_cents,
        points = standing.loyalty_points,
        tier = ?standing.vip_tier,
        "Customer standing updated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn mai() -> NewCustomer {
        NewCustomer {
            name: "Mai".to_string(),
            phone: Some("0912-345-678".to_string()),
            address: Some("  ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_phone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let created = repo.create(&mai()).await.unwrap();
        assert_eq!(created.phone.as_deref(), Some("0912345678"));
        assert_eq!(created.address, None);
        assert_eq!(created.vip_tier, VipTier::Regular);

        let found = repo.get_by_phone("0912 345 678").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(repo.list(Some("mai")).await.unwrap().len(), 1);
        assert_eq!(repo.list(Some("345")).await.unwrap().len(), 1);
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        repo.create(&mai()).await.unwrap();
        let err = repo.create(&mai()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_find_or_create_and_standing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let first = find_or_create_by_phone(&mut conn, "Lan", "0901234567", None)
            .await
            .unwrap();
        let again = find_or_create_by_phone(&mut conn, "Someone Else", "090 123 4567", None)
            .await
            .unwrap();
        assert_eq!(first.id, again.id);

        save_standing(
            &mut conn,
            &first.id,
            Standing {
                total_spent_cents: 2_100_000,
                loyalty_points: 210,
                vip_tier: VipTier::Gold,
            },
        )
        .await
        .unwrap();
        drop(conn);

        let gold = db.customers().list_by_min_tier(VipTier::Gold).await.unwrap();
        assert_eq!(gold.len(), 1);
        assert_eq!(gold[0].loyalty_points, 210);
    }
}
