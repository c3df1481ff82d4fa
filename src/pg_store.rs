//! # Postgres Inventory Store
//!
//! [`InventoryStore`] backed by a Postgres table, one row per inventory record,
//! scoped by owner so several users can share a database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::errors::PantryError;
use crate::inventory_model::{InventoryItem, ItemPatch};
use crate::store::InventoryStore;

const ITEM_COLUMNS: &str = "id, name, quantity, unit, icon, created_at, updated_at";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing inventory schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory_items (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            quantity DOUBLE PRECISION NOT NULL,
            unit TEXT NOT NULL,
            icon TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_items table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS inventory_items_owner_idx ON inventory_items (owner_id, id)",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_items owner index")?;

    info!("Inventory schema initialized successfully");
    Ok(())
}

/// Postgres-backed inventory for one owner
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    owner_id: String,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool, owner_id: &str) -> Self {
        Self {
            pool,
            owner_id: owner_id.to_string(),
        }
    }

    /// Connect, make sure the schema exists, and scope to `owner_id`
    pub async fn connect(database_url: &str, owner_id: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to inventory database")?;
        init_database_schema(&pool).await?;
        Ok(Self::new(pool, owner_id))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_id(id: &str) -> Result<i64, PantryError> {
    id.parse::<i64>()
        .map_err(|_| PantryError::NotFound(id.to_string()))
}

fn row_to_item(row: &PgRow) -> Result<InventoryItem, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(InventoryItem {
        id: Some(id.to_string()),
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        icon: row.try_get("icon")?,
        created_at: Some(created_at),
        updated_at: Some(updated_at),
    })
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn create(&self, item: &InventoryItem) -> Result<InventoryItem, PantryError> {
        debug!(owner = %self.owner_id, item = %item.name, "Creating inventory row");

        let row = sqlx::query(&format!(
            "INSERT INTO inventory_items (owner_id, name, quantity, unit, icon)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&self.owner_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(&item.icon)
        .fetch_one(&self.pool)
        .await?;

        let stored = row_to_item(&row)?;
        info!(owner = %self.owner_id, id = ?stored.id, "Inventory row created");
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: &ItemPatch) -> Result<InventoryItem, PantryError> {
        debug!(owner = %self.owner_id, id, "Updating inventory row");
        let row_id = parse_id(id)?;

        let row = sqlx::query(&format!(
            "UPDATE inventory_items
             SET name = COALESCE($3, name),
                 quantity = COALESCE($4, quantity),
                 unit = COALESCE($5, unit),
                 icon = COALESCE($6, icon),
                 updated_at = NOW()
             WHERE id = $1 AND owner_id = $2
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(row_id)
        .bind(&self.owner_id)
        .bind(&patch.name)
        .bind(patch.quantity)
        .bind(&patch.unit)
        .bind(&patch.icon)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_item(&row)?),
            None => Err(PantryError::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), PantryError> {
        debug!(owner = %self.owner_id, id, "Deleting inventory row");
        let row_id = parse_id(id)?;

        let result = sqlx::query("DELETE FROM inventory_items WHERE id = $1 AND owner_id = $2")
            .bind(row_id)
            .bind(&self.owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PantryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<InventoryItem>, PantryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE owner_id = $1 ORDER BY id"
        ))
        .bind(&self.owner_id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(owner = %self.owner_id, count = items.len(), "Listed inventory rows");
        Ok(items)
    }
}
