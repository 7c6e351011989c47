//! Economy domain — money, sales, seeds, warehouses and the bot shop.
//!
//! Money is one counter shared by every zone. It only moves through the
//! [`Ledger`], which also keeps the bounded sales history.

use bevy::prelude::*;

use crate::shared::*;
use crate::sim::{LastTickReport, Simulation};

pub mod gold;
pub mod shop;
pub mod warehouse;

pub use gold::{EconomyStats, Ledger, SALES_HISTORY_CAP};
pub use warehouse::{Warehouse, WAREHOUSE_CAPACITY};

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// A manual sale to a vendor at a price the vendor chose.
#[derive(Event, Debug, Clone)]
pub struct VendorSaleEvent {
    pub crop: CropKind,
    pub quantity: u32,
    pub unit_price: u32,
}

#[derive(Event, Debug, Clone)]
pub struct BuySeedsEvent {
    pub crop: CropKind,
    pub quantity: u32,
}

/// One per sale record, from the export dock or a vendor.
#[derive(Event, Debug, Clone)]
pub struct CropSoldEvent {
    pub record: SaleRecord,
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct EconomyPlugin;

impl Plugin for EconomyPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<VendorSaleEvent>()
            .add_event::<BuySeedsEvent>()
            .add_event::<CropSoldEvent>()
            .add_systems(
                Update,
                (handle_vendor_sales, handle_buy_seeds).in_set(SimSet::Requests),
            )
            .add_systems(Update, publish_sales.in_set(SimSet::Report));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════

impl Simulation {
    /// Sells `quantity` of `crop` from the warehouses, drawing from zones in
    /// order. Nothing is taken unless the whole quantity is in stock.
    pub fn sell_to_vendor(
        &mut self,
        crop: CropKind,
        quantity: u32,
        unit_price: u32,
    ) -> SchedulerResult<SaleRecord> {
        if quantity == 0 {
            return Err(SchedulerError::InvalidTarget("nothing to sell".to_string()));
        }
        let available: u32 = self
            .zones
            .iter()
            .filter(|z| z.owned)
            .map(|z| z.warehouse.count(crop))
            .sum();
        if available < quantity {
            return Err(SchedulerError::OutOfStock {
                crop,
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        for zone in self.zones.iter_mut().filter(|z| z.owned) {
            if remaining == 0 {
                break;
            }
            remaining -= zone.warehouse.take_crop(crop, remaining).len() as u32;
        }
        let now = self.clock;
        Ok(self.ledger.settle_vendor_sale(crop, quantity, unit_price, now))
    }

    /// Buys seeds into the stock at the current seed price. Returns the cost.
    pub fn buy_seeds(&mut self, crop: CropKind, quantity: u32) -> SchedulerResult<u64> {
        let cost = self.market.seed_price(crop) as u64 * quantity as u64;
        self.ledger.spend(cost, "seeds")?;
        self.ledger.add_seeds(crop, quantity);
        info!("[Economy] Bought {} {} seeds for {}g", quantity, crop, cost);
        Ok(cost)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

fn handle_vendor_sales(
    mut events: EventReader<VendorSaleEvent>,
    mut sim: ResMut<Simulation>,
    mut sold: EventWriter<CropSoldEvent>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        match sim.sell_to_vendor(ev.crop, ev.quantity, ev.unit_price) {
            Ok(record) => {
                sold.send(CropSoldEvent { record });
            }
            Err(error) => {
                info!("[Economy] Vendor sale of {} rejected: {}", ev.crop, error);
                rejected.send(RequestRejectedEvent {
                    request: format!("sell {} x {}", ev.quantity, ev.crop),
                    error,
                });
            }
        }
    }
}

fn handle_buy_seeds(
    mut events: EventReader<BuySeedsEvent>,
    mut sim: ResMut<Simulation>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        if let Err(error) = sim.buy_seeds(ev.crop, ev.quantity) {
            rejected.send(RequestRejectedEvent {
                request: format!("buy {} x {} seeds", ev.quantity, ev.crop),
                error,
            });
        }
    }
}

fn publish_sales(report: Res<LastTickReport>, mut writer: EventWriter<CropSoldEvent>) {
    if !report.is_changed() {
        return;
    }
    for record in &report.0.sales {
        writer.send(CropSoldEvent {
            record: record.clone(),
        });
    }
}
