use serde::{Deserialize, Serialize};

use crmjobs_core::{DomainError, Entity, ItemId, Money};

/// Entity: InventoryItem.
///
/// Owned by the store; tasks only ever hold a transient copy for the
/// duration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    name: String,
    stock: u32,
    price: Money,
}

impl InventoryItem {
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        stock: u32,
        price: Money,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            stock,
            price,
        })
    }

    /// Build an item from a raw stock column, rejecting negative counts.
    pub fn from_raw_stock(
        id: ItemId,
        name: impl Into<String>,
        stock: i64,
        price: Money,
    ) -> Result<Self, DomainError> {
        let stock = u32::try_from(stock).map_err(|_| {
            DomainError::invariant(format!("stock out of range for item {id}: {stock}"))
        })?;
        Self::new(id, name, stock, price)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn price(&self) -> Money {
        self.price
    }

    /// Return a copy of this item with a different stock count.
    pub fn with_stock(&self, stock: u32) -> Self {
        Self {
            stock,
            ..self.clone()
        }
    }
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
