use serde::{Deserialize, Serialize};

use crate::shared::*;

pub const WAREHOUSE_CAPACITY: usize = 200;

/// Crop items waiting in a zone's warehouse. Harvest bots and the farmer fill
/// it, transport bots and vendor sales drain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    items: Vec<CropItem>,
    capacity: usize,
}

impl Default for Warehouse {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            capacity: WAREHOUSE_CAPACITY,
        }
    }
}

impl Warehouse {
    pub fn items(&self) -> &[CropItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn fill_ratio(&self) -> f32 {
        self.items.len() as f32 / self.capacity.max(1) as f32
    }

    pub fn count(&self, crop: CropKind) -> u32 {
        self.items.iter().filter(|i| i.crop == crop).count() as u32
    }

    /// Stores as many items as fit. Returns the ones that did not.
    pub fn store(&mut self, items: impl IntoIterator<Item = CropItem>) -> Vec<CropItem> {
        let mut leftover = Vec::new();
        for item in items {
            if self.is_full() {
                leftover.push(item);
            } else {
                self.items.push(item);
            }
        }
        leftover
    }

    /// Takes up to `max` items whose crop passes `filter`, oldest first.
    pub fn take(&mut self, max: usize, mut filter: impl FnMut(CropKind) -> bool) -> Vec<CropItem> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if taken.len() < max && filter(item.crop) {
                taken.push(item);
            } else {
                kept.push(item);
            }
        }
        self.items = kept;
        taken
    }

    pub fn take_crop(&mut self, crop: CropKind, quantity: u32) -> Vec<CropItem> {
        self.take(quantity as usize, |c| c == crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_respects_capacity() {
        let mut warehouse = Warehouse::default();
        let leftover = warehouse.store(vec![CropItem::new(CropKind::Wheat); WAREHOUSE_CAPACITY + 3]);
        assert_eq!(leftover.len(), 3);
        assert!(warehouse.is_full());
        assert_eq!(warehouse.fill_ratio(), 1.0);
    }

    #[test]
    fn test_take_filters_and_keeps_order() {
        let mut warehouse = Warehouse::default();
        warehouse.store([
            CropItem::new(CropKind::Corn),
            CropItem::new(CropKind::Melon),
            CropItem::new(CropKind::Corn),
            CropItem::new(CropKind::Corn),
        ]);
        let taken = warehouse.take(2, |c| c == CropKind::Corn);
        assert_eq!(taken.len(), 2);
        assert_eq!(warehouse.count(CropKind::Corn), 1);
        assert_eq!(warehouse.items()[0].crop, CropKind::Melon);
    }
}
