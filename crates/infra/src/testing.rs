//! Test doubles shared by the unit and scenario tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crmjobs_core::{ItemId, Money};
use crmjobs_inventory::InventoryItem;
use crmjobs_sales::OrderReminder;

use crate::remote::{BulkReplenishment, CrmRemote, RemoteError, ReplenishedItem};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Remote whose answers are fixed up front.
pub(crate) struct ScriptedRemote {
    probe: Result<String, RemoteError>,
    bulk: Result<BulkReplenishment, RemoteError>,
    orders: Result<Vec<OrderReminder>, RemoteError>,
    on_bulk: Mutex<Option<Hook>>,
    bulk_calls: AtomicUsize,
    order_queries: Mutex<Vec<DateTime<Utc>>>,
}

impl ScriptedRemote {
    fn with_bulk(bulk: Result<BulkReplenishment, RemoteError>) -> Self {
        Self {
            probe: Ok("Hello, GraphQL!".to_string()),
            bulk,
            orders: Ok(Vec::new()),
            on_bulk: Mutex::new(None),
            bulk_calls: AtomicUsize::new(0),
            order_queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replenishing(items: Vec<ReplenishedItem>) -> Self {
        let count = items.len();
        Self::with_bulk(Ok(BulkReplenishment {
            items,
            message: "Low stock products updated".to_string(),
            count,
        }))
    }

    pub(crate) fn failing(error: RemoteError) -> Self {
        let mut remote = Self::with_bulk(Err(error.clone()));
        remote.probe = Err(error.clone());
        remote.orders = Err(error);
        remote
    }

    pub(crate) fn with_orders(mut self, orders: Vec<OrderReminder>) -> Self {
        self.orders = Ok(orders);
        self
    }

    /// Run `hook` inside every bulk call, before the scripted answer is returned.
    pub(crate) fn on_bulk_call(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_bulk.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn order_queries(&self) -> Vec<DateTime<Utc>> {
        self.order_queries.lock().unwrap().clone()
    }
}

impl CrmRemote for ScriptedRemote {
    fn probe(&self) -> Result<String, RemoteError> {
        self.probe.clone()
    }

    fn bulk_replenish_low_stock(&self) -> Result<BulkReplenishment, RemoteError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_bulk.lock().unwrap().as_ref() {
            hook();
        }
        self.bulk.clone()
    }

    fn orders_since(&self, since: DateTime<Utc>) -> Result<Vec<OrderReminder>, RemoteError> {
        self.order_queries.lock().unwrap().push(since);
        self.orders.clone()
    }
}

pub(crate) fn item(key: &str, stock: u32) -> InventoryItem {
    InventoryItem::new(ItemId::new(key).unwrap(), format!("Product {key}"), stock, Money::from_minor(1000))
        .unwrap()
}

pub(crate) fn replenished(key: &str, stock: u32) -> ReplenishedItem {
    ReplenishedItem {
        item_id: ItemId::new(key).unwrap(),
        name: format!("Product {key}"),
        stock,
    }
}
