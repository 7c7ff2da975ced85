//! # Batch Repository
//!
//! Database operations for inventory batches.
//!
//! ## Numbering Inside Transactions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(new)                          soft_delete(id)                   │
//! │  ──────────                           ──────────────                    │
//! │  BEGIN                                BEGIN                             │
//! │  load active group (variant_key)      is_active = 0                     │
//! │  number = next_batch_number(group)    load remaining group              │
//! │  INSERT batch                         renumber(group) → UPDATE changes  │
//! │  COMMIT                               COMMIT                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Reading the group and writing the new number happen in one transaction,
//! so a group is always numbered `1..=n`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use shopkeep_core::batch::{next_batch_number, renumber, VariantKey};
use shopkeep_core::validation::{
    validate_attribute, validate_name, validate_price_cents, validate_search_query,
    validate_stock, validate_stock_delta,
};
use shopkeep_core::{Batch, CoreError, ValidationError, MAX_STOCK};

/// Column list shared by every batch query.
macro_rules! select_batch {
    () => {
        r#"
        SELECT id, name, color, quality, size, unit, batch_number,
               cost_price_cents, sale_price_cents, quantity, storefront_visible,
               description, image_url, supplier_id, is_active, created_at, updated_at
        FROM batches
        "#
    };
}

// =============================================================================
// Inputs
// =============================================================================

/// A batch to be received into stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBatch {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub unit: String,
    pub cost_price_cents: i64,
    pub sale_price_cents: i64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub storefront_visible: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub supplier_id: Option<String>,
}

impl NewBatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        validate_attribute("color", &self.color)?;
        validate_attribute("quality", &self.quality)?;
        validate_attribute("size", &self.size)?;
        validate_attribute("unit", &self.unit)?;
        validate_price_cents("cost price", self.cost_price_cents)?;
        validate_price_cents("sale price", self.sale_price_cents)?;
        validate_stock(self.quantity)
    }

    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(&self.name, &self.color, &self.quality, &self.size, &self.unit)
    }
}

/// Editable batch fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub cost_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub storefront_visible: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl BatchUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(cents) = self.cost_price_cents {
            validate_price_cents("cost price", cents)?;
        }
        if let Some(cents) = self.sale_price_cents {
            validate_price_cents("sale price", cents)?;
        }
        if let Some(qty) = self.quantity {
            validate_stock(qty)?;
        }
        Ok(())
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for batch database operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Receives a new batch, numbering it inside its variant group.
    pub async fn insert(&self, new: &NewBatch) -> DbResult<Batch> {
        new.validate()?;
        let key = new.variant_key().storage_key();

        let mut tx = self.pool.begin().await?;

        let group = active_group(&mut tx, &key).await?;
        let batch_number = next_batch_number(&group);
        let now = Utc::now();

        let batch = Batch {
            id: new_id(),
            name: new.name.trim().to_string(),
            color: new.color.trim().to_string(),
            quality: new.quality.trim().to_string(),
            size: new.size.trim().to_string(),
            unit: new.unit.trim().to_string(),
            batch_number,
            cost_price_cents: new.cost_price_cents,
            sale_price_cents: new.sale_price_cents,
            quantity: new.quantity,
            storefront_visible: new.storefront_visible,
            description: new.description.clone(),
            image_url: new.image_url.clone(),
            supplier_id: new.supplier_id.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(name = %batch.name, batch_number, "Inserting batch");

        sqlx::query(
            r#"
            INSERT INTO batches (
                id, name, color, quality, size, unit, variant_key, batch_number,
                cost_price_cents, sale_price_cents, quantity, storefront_visible,
                description, image_url, supplier_id, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, 1, ?16, ?17
            )
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.name)
        .bind(&batch.color)
        .bind(&batch.quality)
        .bind(&batch.size)
        .bind(&batch.unit)
        .bind(&key)
        .bind(batch.batch_number)
        .bind(batch.cost_price_cents)
        .bind(batch.sale_price_cents)
        .bind(batch.quantity)
        .bind(batch.storefront_visible)
        .bind(&batch.description)
        .bind(&batch.image_url)
        .bind(&batch.supplier_id)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %batch.id, label = %batch.label(), "Batch received");
        Ok(batch)
    }

    /// Gets a batch by its ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_batch(&mut conn, id).await
    }

    /// Lists active batches ordered by name, variant and number.
    pub async fn list_active(&self) -> DbResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(concat!(
            select_batch!(),
            "WHERE is_active = 1 ORDER BY name COLLATE NOCASE, variant_key, batch_number"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Case-insensitive substring search over name, color and size.
    ///
    /// An empty query lists every active batch.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Batch>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, "Searching batches");

        if query.is_empty() {
            return self.list_active().await;
        }

        let pattern = like_pattern(&query);
        let batches = sqlx::query_as::<_, Batch>(concat!(
            select_batch!(),
            r#"
            WHERE is_active = 1
              AND (LOWER(name) LIKE ?1 ESCAPE '\'
                   OR LOWER(color) LIKE ?1 ESCAPE '\'
                   OR LOWER(size) LIKE ?1 ESCAPE '\')
            ORDER BY name COLLATE NOCASE, variant_key, batch_number
            "#
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = batches.len(), "Search returned batches");
        Ok(batches)
    }

    /// Active batches of one variant group, by number.
    pub async fn list_variant(&self, key: &VariantKey) -> DbResult<Vec<Batch>> {
        let mut conn = self.pool.acquire().await?;
        active_group(&mut conn, &key.storage_key()).await
    }

    /// Batches currently listed on the storefront.
    pub async fn list_storefront(&self) -> DbResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(concat!(
            select_batch!(),
            r#"
            WHERE is_active = 1 AND storefront_visible = 1 AND quantity > 0
            ORDER BY name COLLATE NOCASE, batch_number
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Applies the set fields of `update` to an active batch.
    pub async fn update(&self, id: &str, update: &BatchUpdate) -> DbResult<Batch> {
        update.validate()?;
        debug!(id = %id, "Updating batch");

        let result = sqlx::query(
            r#"
            UPDATE batches SET
                cost_price_cents = COALESCE(?2, cost_price_cents),
                sale_price_cents = COALESCE(?3, sale_price_cents),
                quantity = COALESCE(?4, quantity),
                storefront_visible = COALESCE(?5, storefront_visible),
                description = COALESCE(?6, description),
                image_url = COALESCE(?7, image_url),
                updated_at = ?8
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(update.cost_price_cents)
        .bind(update.sale_price_cents)
        .bind(update.quantity)
        .bind(update.storefront_visible)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", id));
        }

        self.require(id).await
    }

    /// Adds `delta` (possibly negative) to a batch's stock.
    ///
    /// Rejects changes that would take the quantity below zero or above
    /// `MAX_STOCK`. The guard compares against `-?2` and `?4 - ?2` so the
    /// sum is never formed for a change that would not fit.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Batch> {
        validate_stock_delta(delta)?;
        debug!(id = %id, delta, "Adjusting stock");

        let result = sqlx::query(
            r#"
            UPDATE batches SET quantity = quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND is_active = 1
              AND quantity >= -?2 AND quantity <= ?4 - ?2
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .bind(MAX_STOCK)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let batch = self
                .get_by_id(id)
                .await?
                .filter(|b| b.is_active)
                .ok_or_else(|| DbError::not_found("Batch", id))?;
            warn!(id = %id, delta, quantity = batch.quantity, "Stock adjustment rejected");
            if delta > 0 {
                return Err(ValidationError::OutOfRange {
                    field: "stock".to_string(),
                    min: 0,
                    max: MAX_STOCK,
                }
                .into());
            }
            return Err(CoreError::InsufficientStock {
                item: batch.label(),
                available: batch.quantity,
                requested: delta.saturating_neg(),
            }
            .into());
        }

        self.require(id).await
    }

    /// Shows or hides a batch on the storefront.
    pub async fn set_storefront_visibility(&self, id: &str, visible: bool) -> DbResult<Batch> {
        self.update(
            id,
            &BatchUpdate {
                storefront_visible: Some(visible),
                ..BatchUpdate::default()
            },
        )
        .await
    }

    /// Deactivates a batch and renumbers what is left of its group.
    ///
    /// Invoices keep their snapshots, so history is unaffected.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let batch = fetch_batch(&mut tx, id)
            .await?
            .filter(|b| b.is_active)
            .ok_or_else(|| DbError::not_found("Batch", id))?;
        let now = Utc::now();

        sqlx::query("UPDATE batches SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let key = batch.variant_key().storage_key();
        let group = active_group(&mut tx, &key).await?;
        let changes = renumber(&group);
        for (batch_id, number) in &changes {
            sqlx::query("UPDATE batches SET batch_number = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(batch_id)
                .bind(number)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(id = %id, renumbered = changes.len(), "Batch removed");
        Ok(())
    }

    /// Number of active batches.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM batches WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn require(&self, id: &str) -> DbResult<Batch> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Batch", id))
    }
}

// =============================================================================
// Connection-level helpers (shared with the transactions)
// =============================================================================

pub(crate) async fn fetch_batch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Batch>> {
    let batch = sqlx::query_as::<_, Batch>(concat!(select_batch!(), "WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(batch)
}

async fn active_group(conn: &mut SqliteConnection, key: &str) -> DbResult<Vec<Batch>> {
    let group = sqlx::query_as::<_, Batch>(concat!(
        select_batch!(),
        "WHERE variant_key = ?1 AND is_active = 1 ORDER BY batch_number"
    ))
    .bind(key)
    .fetch_all(&mut *conn)
    .await?;

    Ok(group)
}

/// Changes a batch's stock inside a transaction, failing if it would go
/// negative or the batch is inactive.
pub(crate) async fn change_stock(
    conn: &mut SqliteConnection,
    batch: &Batch,
    delta: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE batches SET quantity = quantity + ?2, updated_at = ?3
        WHERE id = ?1 AND quantity + ?2 >= 0
        "#,
    )
    .bind(&batch.id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InsufficientStock {
            item: batch.label(),
            available: batch.quantity,
            requested: -delta,
        }
        .into());
    }
    Ok(())
}

/// Lower-cased `%query%` with LIKE wildcards escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// =============================================================================
// Unit Tests
// =============================================================================
