//! Inventory domain module.
//!
//! This crate contains the business rules for low-stock replenishment,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod replenishment;

pub use item::InventoryItem;
pub use replenishment::{
    LOW_STOCK_THRESHOLD, REPLENISH_QUANTITY, ReplenishmentDelta, ReplenishmentPath,
    ReplenishmentPolicy,
};
