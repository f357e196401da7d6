//! Authoritative CRM data store abstractions.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use crmjobs_core::ItemId;
use crmjobs_inventory::InventoryItem;
use crmjobs_sales::CrmSummary;

pub use in_memory::InMemoryCrmStore;
pub use postgres::PostgresCrmStore;

/// Store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("write rejected for item {item_id}: {reason}")]
    WriteRejected { item_id: ItemId, reason: String },

    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Direct access to inventory records.
///
/// There is no multi-item transaction: every `set_stock` is an independent
/// write, so a batch of writes may complete partially.
pub trait InventoryStore: Send + Sync {
    /// Items whose stock is strictly below `threshold`, ordered by id.
    fn list_below(&self, threshold: u32) -> Result<Vec<InventoryItem>, StoreError>;

    /// Overwrite the stock of a single item.
    fn set_stock(&self, item_id: &ItemId, stock: u32) -> Result<(), StoreError>;
}

/// Aggregate figures for the periodic report.
pub trait CrmStatsStore: Send + Sync {
    fn summary(&self) -> Result<CrmSummary, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn list_below(&self, threshold: u32) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_below(threshold)
    }

    fn set_stock(&self, item_id: &ItemId, stock: u32) -> Result<(), StoreError> {
        (**self).set_stock(item_id, stock)
    }
}

impl<S> CrmStatsStore for Arc<S>
where
    S: CrmStatsStore + ?Sized,
{
    fn summary(&self) -> Result<CrmSummary, StoreError> {
        (**self).summary()
    }
}
