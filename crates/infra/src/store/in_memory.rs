use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crmjobs_core::{Entity, ItemId, Money};
use crmjobs_inventory::InventoryItem;
use crmjobs_sales::{Customer, CrmSummary};

use super::{CrmStatsStore, InventoryStore, StoreError};

/// In-memory CRM store for tests/dev.
///
/// Supports failure injection so every failure category of the jobs can be
/// exercised without a database.
#[derive(Debug, Default)]
pub struct InMemoryCrmStore {
    items: RwLock<BTreeMap<ItemId, InventoryItem>>,
    customers: RwLock<Vec<Customer>>,
    orders: RwLock<Vec<Money>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    // Number of writes allowed to succeed before writes start failing.
    writes_before_failure: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert_item(item);
        }
        store
    }

    pub fn insert_item(&self, item: InventoryItem) {
        let mut map = self.items.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(item.id().clone(), item);
    }

    pub fn add_customer(&self, customer: Customer) {
        self.customers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(customer);
    }

    pub fn add_order(&self, total_amount: Money) {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(total_amount);
    }

    pub fn item(&self, item_id: &ItemId) -> Option<InventoryItem> {
        let map = self.items.read().unwrap_or_else(PoisonError::into_inner);
        map.get(item_id).cloned()
    }

    pub fn stock_of(&self, key: &str) -> Option<u32> {
        let item_id = ItemId::new(key).ok()?;
        self.item(&item_id).map(|i| i.stock())
    }

    /// Number of successful `set_stock` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more writes succeed, then reject every later write.
    pub fn fail_writes_after(&self, n: usize) {
        *self
            .writes_before_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(n);
    }

    fn check_write_allowed(&self, item_id: &ItemId) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected {
                item_id: item_id.clone(),
                reason: "store is read-only".to_string(),
            });
        }
        let mut budget = self
            .writes_before_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match budget.as_mut() {
            Some(0) => Err(StoreError::WriteRejected {
                item_id: item_id.clone(),
                reason: "write budget exhausted".to_string(),
            }),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_read_allowed(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl InventoryStore for InMemoryCrmStore {
    fn list_below(&self, threshold: u32) -> Result<Vec<InventoryItem>, StoreError> {
        self.check_read_allowed()?;
        let map = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .values()
            .filter(|item| item.stock() < threshold)
            .cloned()
            .collect())
    }

    fn set_stock(&self, item_id: &ItemId, stock: u32) -> Result<(), StoreError> {
        self.check_write_allowed(item_id)?;
        let mut map = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let item = map
            .get_mut(item_id)
            .ok_or_else(|| StoreError::NotFound(item_id.clone()))?;
        *item = item.with_stock(stock);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CrmStatsStore for InMemoryCrmStore {
    fn summary(&self) -> Result<CrmSummary, StoreError> {
        self.check_read_allowed()?;
        let customers = self.customers.read().unwrap_or_else(PoisonError::into_inner);
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        Ok(CrmSummary {
            customers: customers.len() as u64,
            orders: orders.len() as u64,
            revenue: orders.iter().copied().sum(),
        })
    }
}
