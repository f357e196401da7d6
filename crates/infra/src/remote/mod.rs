//! Remote CRM API boundary.
//!
//! Pure I/O: implementations translate calls into requests and strictly
//! validate the responses. A response that does not match the expected shape
//! is an error, never a partial success.

pub mod graphql;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crmjobs_core::ItemId;
use crmjobs_sales::OrderReminder;

pub use graphql::GraphQlCrmClient;

/// Remote call error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote call timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote reported errors: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// One item reported as replenished by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishedItem {
    pub item_id: ItemId,
    pub name: String,
    pub stock: u32,
}

/// Validated result of the bulk replenishment mutation.
///
/// Invariant: `count == items.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReplenishment {
    pub items: Vec<ReplenishedItem>,
    pub message: String,
    pub count: usize,
}

impl BulkReplenishment {
    pub fn new(items: Vec<ReplenishedItem>, message: impl Into<String>, count: usize) -> Result<Self, RemoteError> {
        if count != items.len() {
            return Err(RemoteError::malformed(format!(
                "count {count} does not match {} returned items",
                items.len()
            )));
        }
        Ok(Self {
            items,
            message: message.into(),
            count,
        })
    }
}

/// Operations the jobs need from the remote CRM API.
pub trait CrmRemote: Send + Sync {
    /// Lightweight liveness probe; returns the remote's greeting.
    fn probe(&self) -> Result<String, RemoteError>;

    /// Bulk-replenish every low-stock item (the remote applies its own filter).
    fn bulk_replenish_low_stock(&self) -> Result<BulkReplenishment, RemoteError>;

    /// Orders placed at or after `since`.
    fn orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderReminder>, RemoteError>;
}

impl<R> CrmRemote for Arc<R>
where
    R: CrmRemote + ?Sized,
{
    fn probe(&self) -> Result<String, RemoteError> {
        (**self).probe()
    }

    fn bulk_replenish_low_stock(&self) -> Result<BulkReplenishment, RemoteError> {
        (**self).bulk_replenish_low_stock()
    }

    fn orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderReminder>, RemoteError> {
        (**self).orders_since(since)
    }
}
