//! # Supplier Repository
//!
//! Suppliers the shop buys from. What the shop owes them lives in the
//! debt repository.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use shopkeep_core::validation::{normalize_phone, validate_name, validate_phone};
use shopkeep_core::{Supplier, ValidationError};

/// A supplier to register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewSupplier {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name)?;
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn create(&self, new: &NewSupplier) -> DbResult<Supplier> {
        new.validate()?;

        let supplier = Supplier {
            id: new_id(),
            name: new.name.trim().to_string(),
            phone: new
                .phone
                .as_deref()
                .map(normalize_phone)
                .filter(|p| !p.is_empty()),
            address: new.address.clone().filter(|a| !a.trim().is_empty()),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO suppliers (id, name, phone, address, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %supplier.id, name = %supplier.name, "Supplier registered");
        Ok(supplier)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, phone, address, created_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(supplier)
    }

    pub async fn require(&self, id: &str) -> DbResult<Supplier> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, phone, address, created_at FROM suppliers ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.suppliers();

        let mill = repo
            .create(&NewSupplier {
                name: "Northern Mill".to_string(),
                phone: Some("024 3826 1111".to_string()),
                address: None,
            })
            .await
            .unwrap();
        assert_eq!(mill.phone.as_deref(), Some("02438261111"));

        repo.create(&NewSupplier {
            name: "atelier".to_string(),
            ..NewSupplier::default()
        })
        .await
        .unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["atelier", "Northern Mill"]);
        assert!(repo.require("missing").await.is_err());
        assert!(repo.create(&NewSupplier::default()).await.is_err());
    }
}
