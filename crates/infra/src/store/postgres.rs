//! Postgres-backed CRM store.
//!
//! The jobs run on plain threads, so this adapter owns a small tokio runtime
//! and drives `sqlx` futures with `block_on`. Every statement is independent;
//! no transaction spans multiple items.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crmjobs_core::{ItemId, Money};
use crmjobs_inventory::InventoryItem;
use crmjobs_sales::CrmSummary;

use super::{CrmStatsStore, InventoryStore, StoreError};

/// Postgres store over the CRM tables (`crm_product`, `crm_customer`, `crm_order`).
pub struct PostgresCrmStore {
    pool: PgPool,
    runtime: Runtime,
}

impl PostgresCrmStore {
    /// Connect to `database_url`; `acquire_timeout` bounds every statement's wait
    /// for a connection.
    pub fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("crm-store")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to start store runtime: {e}")))?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(4)
                    .acquire_timeout(acquire_timeout)
                    .connect(database_url),
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("connected to postgres CRM store");
        Ok(Self { pool, runtime })
    }
}

impl core::fmt::Debug for PostgresCrmStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostgresCrmStore").finish_non_exhaustive()
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

impl InventoryStore for PostgresCrmStore {
    fn list_below(&self, threshold: u32) -> Result<Vec<InventoryItem>, StoreError> {
        let rows = self
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT
                        id::text AS id,
                        name,
                        stock::bigint AS stock,
                        price::text AS price
                    FROM crm_product
                    WHERE stock < $1
                    ORDER BY id
                    "#,
                )
                .bind(i64::from(threshold))
                .fetch_all(&self.pool),
            )
            .map_err(query_error)?;

        debug!(rows = rows.len(), threshold, "listed low-stock items");

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(query_error)?;
                let name: String = row.try_get("name").map_err(query_error)?;
                let stock: i64 = row.try_get("stock").map_err(query_error)?;
                let price: String = row.try_get("price").map_err(query_error)?;

                let item_id =
                    ItemId::new(id).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
                let price = Money::parse_decimal(&price)
                    .map_err(|e| StoreError::InvalidRecord(format!("item {item_id}: {e}")))?;
                InventoryItem::from_raw_stock(item_id, name, stock, price)
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))
            })
            .collect()
    }

    fn set_stock(&self, item_id: &ItemId, stock: u32) -> Result<(), StoreError> {
        let stock = i32::try_from(stock).map_err(|_| StoreError::WriteRejected {
            item_id: item_id.clone(),
            reason: format!("stock {stock} exceeds column range"),
        })?;

        let result = self
            .runtime
            .block_on(
                sqlx::query("UPDATE crm_product SET stock = $2 WHERE id::text = $1")
                    .bind(item_id.as_str())
                    .bind(stock)
                    .execute(&self.pool),
            )
            .map_err(|e| StoreError::WriteRejected {
                item_id: item_id.clone(),
                reason: e.to_string(),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(item_id.clone()));
        }
        Ok(())
    }
}

impl CrmStatsStore for PostgresCrmStore {
    fn summary(&self) -> Result<CrmSummary, StoreError> {
        let row = self
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT
                        (SELECT COUNT(*) FROM crm_customer) AS customers,
                        (SELECT COUNT(*) FROM crm_order) AS orders,
                        (SELECT COALESCE(SUM(total_amount), 0)::text FROM crm_order) AS revenue
                    "#,
                )
                .fetch_one(&self.pool),
            )
            .map_err(query_error)?;

        let customers: i64 = row.try_get("customers").map_err(query_error)?;
        let orders: i64 = row.try_get("orders").map_err(query_error)?;
        let revenue: String = row.try_get("revenue").map_err(query_error)?;

        Ok(CrmSummary {
            customers: u64::try_from(customers)
                .map_err(|_| StoreError::InvalidRecord(format!("customer count {customers}")))?,
            orders: u64::try_from(orders)
                .map_err(|_| StoreError::InvalidRecord(format!("order count {orders}")))?,
            revenue: Money::parse_decimal(&revenue)
                .map_err(|e| StoreError::InvalidRecord(format!("revenue: {e}")))?,
        })
    }
}
