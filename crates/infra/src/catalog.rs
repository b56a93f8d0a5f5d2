use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use lotstock_core::ItemId;

/// Stock thresholds of an item, as maintained by the item master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemThresholds {
    pub item_id: ItemId,
    pub name: String,
    pub unit: String,
    pub reorder_level: Option<i64>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
    pub active: bool,
}

impl ItemThresholds {
    pub fn new(item_id: ItemId, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            item_id,
            name: name.into(),
            unit: unit.into(),
            reorder_level: None,
            min_stock: None,
            max_stock: None,
            active: true,
        }
    }

    pub fn with_reorder_level(mut self, level: i64) -> Self {
        self.reorder_level = Some(level);
        self
    }

    pub fn with_min_stock(mut self, min: i64) -> Self {
        self.min_stock = Some(min);
        self
    }

    pub fn with_max_stock(mut self, max: i64) -> Self {
        self.max_stock = Some(max);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Low-stock threshold: reorder level, falling back to minimum stock.
    pub fn threshold(&self) -> Option<i64> {
        self.reorder_level.or(self.min_stock)
    }
}

/// Read-only view of item master data.
pub trait ItemCatalog: Send + Sync {
    fn get(&self, item_id: ItemId) -> Option<ItemThresholds>;
    fn list(&self) -> Vec<ItemThresholds>;
}

impl<C> ItemCatalog for Arc<C>
where
    C: ItemCatalog + ?Sized,
{
    fn get(&self, item_id: ItemId) -> Option<ItemThresholds> {
        (**self).get(item_id)
    }

    fn list(&self) -> Vec<ItemThresholds> {
        (**self).list()
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryItemCatalog {
    inner: RwLock<BTreeMap<ItemId, ItemThresholds>>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, item: ItemThresholds) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(item.item_id, item);
        }
    }
}

impl FromIterator<ItemThresholds> for InMemoryItemCatalog {
    fn from_iter<T: IntoIterator<Item = ItemThresholds>>(iter: T) -> Self {
        let map = iter.into_iter().map(|i| (i.item_id, i)).collect();
        Self {
            inner: RwLock::new(map),
        }
    }
}

impl ItemCatalog for InMemoryItemCatalog {
    fn get(&self, item_id: ItemId) -> Option<ItemThresholds> {
        let map = self.inner.read().ok()?;
        map.get(&item_id).cloned()
    }

    fn list(&self) -> Vec<ItemThresholds> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_prefers_reorder_level() {
        let id = ItemId::new();
        let both = ItemThresholds::new(id, "Gauze", "pack")
            .with_reorder_level(20)
            .with_min_stock(5);
        assert_eq!(both.threshold(), Some(20));

        let min_only = ItemThresholds::new(id, "Gauze", "pack").with_min_stock(5);
        assert_eq!(min_only.threshold(), Some(5));

        assert_eq!(ItemThresholds::new(id, "Gauze", "pack").threshold(), None);
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let catalog = InMemoryItemCatalog::new();
        let id = ItemId::new();
        catalog.upsert(ItemThresholds::new(id, "Saline", "bag"));
        catalog.upsert(ItemThresholds::new(id, "Saline 0.9%", "bag").inactive());

        assert_eq!(catalog.list().len(), 1);
        let item = catalog.get(id).unwrap();
        assert_eq!(item.name, "Saline 0.9%");
        assert!(!item.active);
    }
}
