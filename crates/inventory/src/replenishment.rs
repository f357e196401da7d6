//! Low-stock replenishment rules.

use serde::{Deserialize, Serialize};

use crmjobs_core::{DomainError, DomainResult, Entity, ItemId, ValueObject};

use crate::item::InventoryItem;

/// Items with stock strictly below this value are eligible for replenishment.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// Units added to each eligible item by the local fallback path.
pub const REPLENISH_QUANTITY: u32 = 10;

/// Which inventory path produced a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplenishmentPath {
    #[serde(rename = "remote")]
    Remote,
    #[serde(rename = "local-fallback")]
    LocalFallback,
}

impl ReplenishmentPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplenishmentPath::Remote => "remote",
            ReplenishmentPath::LocalFallback => "local-fallback",
        }
    }
}

impl core::fmt::Display for ReplenishmentPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item adjustment made during one reconciliation run.
///
/// `previous_stock` is `None` when the remote path reports an item that was
/// not part of the local snapshot taken at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentDelta {
    pub item_id: ItemId,
    pub name: String,
    pub previous_stock: Option<u32>,
    pub new_stock: u32,
    pub path: ReplenishmentPath,
}

impl ValueObject for ReplenishmentDelta {}

impl core::fmt::Display for ReplenishmentDelta {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.previous_stock {
            Some(prev) => write!(
                f,
                "Updated {} ({}): stock {} -> {}",
                self.name, self.item_id, prev, self.new_stock
            ),
            None => write!(
                f,
                "Updated {} ({}): new stock level {}",
                self.name, self.item_id, self.new_stock
            ),
        }
    }
}

/// Replenishment rule set: which items qualify and by how much they grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplenishmentPolicy {
    threshold: u32,
    quantity: u32,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self {
            threshold: LOW_STOCK_THRESHOLD,
            quantity: REPLENISH_QUANTITY,
        }
    }
}

impl ReplenishmentPolicy {
    pub fn new(threshold: u32, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("replenish quantity cannot be zero"));
        }
        Ok(Self {
            threshold,
            quantity,
        })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn is_low(&self, item: &InventoryItem) -> bool {
        item.stock() < self.threshold
    }

    /// Items eligible for replenishment, in input order.
    pub fn targets<'a>(&self, items: &'a [InventoryItem]) -> Vec<&'a InventoryItem> {
        items.iter().filter(|item| self.is_low(item)).collect()
    }

    /// Compute the fallback adjustment for one item.
    ///
    /// Fails when the item is no longer below the threshold (it must be left
    /// untouched) or when the increment would overflow.
    pub fn replenish(&self, item: &InventoryItem) -> DomainResult<ReplenishmentDelta> {
        if !self.is_low(item) {
            return Err(DomainError::invariant(format!(
                "item {} is not below the low-stock threshold ({} >= {})",
                item.id(),
                item.stock(),
                self.threshold
            )));
        }
        let new_stock = item.stock().checked_add(self.quantity).ok_or_else(|| {
            DomainError::invariant(format!("stock overflow for item {}", item.id()))
        })?;

        Ok(ReplenishmentDelta {
            item_id: item.id().clone(),
            name: item.name().to_string(),
            previous_stock: Some(item.stock()),
            new_stock,
            path: ReplenishmentPath::LocalFallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmjobs_core::Money;
    use proptest::prelude::*;

    fn item(key: &str, stock: u32) -> InventoryItem {
        InventoryItem::new(ItemId::new(key).unwrap(), format!("Item {key}"), stock, Money::ZERO)
            .unwrap()
    }

    #[test]
    fn threshold_is_strict() {
        let policy = ReplenishmentPolicy::default();
        assert!(policy.is_low(&item("a", 9)));
        assert!(!policy.is_low(&item("b", 10)));
        assert!(!policy.is_low(&item("c", 12)));
    }

    #[test]
    fn targets_keep_only_low_items() {
        let policy = ReplenishmentPolicy::default();
        let items = vec![item("x", 5), item("y", 12), item("z", 0)];
        let ids: Vec<_> = policy
            .targets(&items)
            .into_iter()
            .map(|i| i.id().as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["x", "z"]);
    }

    #[test]
    fn replenish_adds_fixed_quantity() {
        let delta = ReplenishmentPolicy::default().replenish(&item("x", 5)).unwrap();
        assert_eq!(delta.previous_stock, Some(5));
        assert_eq!(delta.new_stock, 15);
        assert_eq!(delta.path, ReplenishmentPath::LocalFallback);
    }

    #[test]
    fn replenish_refuses_items_at_or_above_threshold() {
        let err = ReplenishmentPolicy::default().replenish(&item("y", 10)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn zero_quantity_policy_is_rejected() {
        assert!(ReplenishmentPolicy::new(10, 0).is_err());
    }

    #[test]
    fn path_serializes_with_audit_names() {
        assert_eq!(
            serde_json::to_string(&ReplenishmentPath::LocalFallback).unwrap(),
            "\"local-fallback\""
        );
        assert_eq!(ReplenishmentPath::Remote.to_string(), "remote");
    }

    #[test]
    fn delta_renders_old_and_new_stock() {
        let delta = ReplenishmentPolicy::default().replenish(&item("x", 5)).unwrap();
        assert_eq!(delta.to_string(), "Updated Item x (x): stock 5 -> 15");
    }

    proptest! {
        /// Property: every eligible item ends up exactly `quantity` units higher
        /// and items at or above the threshold are never adjusted.
        #[test]
        fn replenish_is_exact_for_low_items(stock in 0u32..1_000u32) {
            let policy = ReplenishmentPolicy::default();
            let it = item("p", stock);
            match policy.replenish(&it) {
                Ok(delta) => {
                    prop_assert!(stock < LOW_STOCK_THRESHOLD);
                    prop_assert_eq!(delta.new_stock, stock + REPLENISH_QUANTITY);
                }
                Err(_) => prop_assert!(stock >= LOW_STOCK_THRESHOLD),
            }
        }
    }
}
