use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::market::Market;
use crate::shared::*;

/// Sales history keeps only the most recent records.
pub const SALES_HISTORY_CAP: usize = 100;

/// Running totals for the HUD and save data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomyStats {
    pub total_gold_earned: u64,
    pub total_gold_spent: u64,
    pub total_items_sold: u64,
    pub total_transactions: u64,
}

/// The single money counter plus everything that moves it.
///
/// Every mutation is all-or-nothing: a spend that cannot be covered leaves
/// the ledger untouched and reports `InsufficientFunds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    money: u64,
    sales_history: VecDeque<SaleRecord>,
    pub seed_stock: BTreeMap<CropKind, u32>,
    pub stats: EconomyStats,
}

impl Ledger {
    pub fn new(money: u64) -> Self {
        Self {
            money,
            sales_history: VecDeque::new(),
            seed_stock: BTreeMap::new(),
            stats: EconomyStats::default(),
        }
    }

    pub fn money(&self) -> u64 {
        self.money
    }

    pub fn sales_history(&self) -> &VecDeque<SaleRecord> {
        &self.sales_history
    }

    pub fn can_afford(&self, amount: u64) -> bool {
        self.money >= amount
    }

    pub fn credit(&mut self, amount: u64, reason: &str) {
        self.money = self.money.saturating_add(amount);
        self.stats.total_gold_earned = self.stats.total_gold_earned.saturating_add(amount);
        self.stats.total_transactions += 1;
        debug!("[Economy] Gold +{}: {}. New balance: {}g", amount, reason, self.money);
    }

    pub fn spend(&mut self, amount: u64, reason: &str) -> SchedulerResult<()> {
        if self.money < amount {
            return Err(SchedulerError::InsufficientFunds {
                needed: amount,
                available: self.money,
            });
        }
        self.money -= amount;
        self.stats.total_gold_spent = self.stats.total_gold_spent.saturating_add(amount);
        self.stats.total_transactions += 1;
        debug!("[Economy] Gold -{}: {}. New balance: {}g", amount, reason, self.money);
        Ok(())
    }

    fn record(&mut self, record: SaleRecord) {
        self.stats.total_items_sold += record.quantity as u64;
        self.sales_history.push_back(record);
        while self.sales_history.len() > SALES_HISTORY_CAP {
            self.sales_history.pop_front();
        }
    }

    /// Sells a batch at current market prices. Each item earns
    /// `floor(price × quality)`; the batch is credited in one step and one
    /// record is written per crop.
    pub fn settle_batch(
        &mut self,
        items: &[CropItem],
        market: &Market,
        zone: Option<ZoneId>,
        at: Duration,
    ) -> Vec<SaleRecord> {
        let mut by_crop: BTreeMap<CropKind, (u32, u64)> = BTreeMap::new();
        for item in items {
            let unit = market.price(item.crop);
            let earned = (unit as f32 * item.quality).floor() as u64;
            let entry = by_crop.entry(item.crop).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += earned;
        }

        let records: Vec<SaleRecord> = by_crop
            .into_iter()
            .map(|(crop, (quantity, total_revenue))| SaleRecord {
                crop,
                quantity,
                price_per_unit: market.price(crop),
                total_revenue,
                zone,
                at,
            })
            .collect();

        let total: u64 = records.iter().map(|r| r.total_revenue).sum();
        if !records.is_empty() {
            self.credit(total, "crop sale");
        }
        for record in &records {
            info!(
                "[Economy] Sold {} × {} @ {}g = {}g",
                record.quantity, record.crop, record.price_per_unit, record.total_revenue
            );
            self.record(record.clone());
        }
        records
    }

    /// Records a manual sale at a caller-chosen unit price.
    pub fn settle_vendor_sale(
        &mut self,
        crop: CropKind,
        quantity: u32,
        unit_price: u32,
        at: Duration,
    ) -> SaleRecord {
        let record = SaleRecord {
            crop,
            quantity,
            price_per_unit: unit_price,
            total_revenue: quantity as u64 * unit_price as u64,
            zone: None,
            at,
        };
        self.credit(record.total_revenue, "vendor sale");
        info!(
            "[Economy] Vendor bought {} × {} @ {}g = {}g",
            quantity, crop, unit_price, record.total_revenue
        );
        self.record(record.clone());
        record
    }

    pub fn seeds(&self, crop: CropKind) -> u32 {
        self.seed_stock.get(&crop).copied().unwrap_or(0)
    }

    pub fn add_seeds(&mut self, crop: CropKind, quantity: u32) {
        *self.seed_stock.entry(crop).or_insert(0) += quantity;
    }

    /// Takes one seed from stock. False when there is none.
    pub fn take_seed(&mut self, crop: CropKind) -> bool {
        match self.seed_stock.get_mut(&crop) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}
