//! Transport bot: warehouse → export dock shuttle.
//!
//! In `Everything` mode any warehouse item goes. In `MarketBased` mode a crop
//! only goes while it is high-demand or epic (per its flags), or when the
//! warehouse is past the saturation ratio; a load taken under saturation is
//! sold whole. Items that stop being eligible between loading and selling are
//! carried back to the warehouse.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::{Chassis, Stall};
use crate::market::Market;
use crate::shared::*;

pub const TRANSPORT_CAPACITY: usize = 10;
pub const TRANSPORT_HOPPER_CAPACITY: usize = 20;
pub const DEFAULT_SATURATION_RATIO: f32 = 0.8;
const LOAD_SECS: f32 = 1.0;
const SELL_SECS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellMode {
    Everything,
    MarketBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellFlags {
    pub sell_on_high_demand: bool,
    pub sell_on_epic: bool,
}

impl Default for SellFlags {
    fn default() -> Self {
        Self {
            sell_on_high_demand: true,
            sell_on_epic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub sell_mode: SellMode,
    /// Crops missing from the map use `SellFlags::default()`.
    pub flags: BTreeMap<CropKind, SellFlags>,
    pub saturation_ratio: f32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            sell_mode: SellMode::Everything,
            flags: BTreeMap::new(),
            saturation_ratio: DEFAULT_SATURATION_RATIO,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if !(self.saturation_ratio > 0.0 && self.saturation_ratio <= 1.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "saturation ratio {} outside (0, 1]",
                self.saturation_ratio
            )));
        }
        Ok(())
    }

    pub fn flags(&self, crop: CropKind) -> SellFlags {
        self.flags.get(&crop).copied().unwrap_or_default()
    }

    /// Whether `crop` may be sold right now.
    pub fn is_eligible(&self, crop: CropKind, market: &Market, saturated: bool) -> bool {
        match self.sell_mode {
            SellMode::Everything => true,
            SellMode::MarketBased => {
                let flags = self.flags(crop);
                saturated
                    || (flags.sell_on_high_demand && market.is_high_demand(crop))
                    || (flags.sell_on_epic && market.is_epic(crop))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportErrand {
    Load,
    Sell,
    /// Carry unsellable cargo back to the warehouse.
    Return,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportBot {
    pub config: TransportConfig,
    pub inventory: Vec<CropItem>,
    /// The cargo was loaded because the warehouse was saturated.
    pub saturated_load: bool,
    pub activity: Activity<TransportErrand>,
}

impl TransportBot {
    pub fn capacity(chassis: &Chassis) -> usize {
        if chassis.hopper_upgrade {
            TRANSPORT_HOPPER_CAPACITY
        } else {
            TRANSPORT_CAPACITY
        }
    }

    fn warehouse_saturated(&self, view: &ZoneView) -> bool {
        view.warehouse.fill_ratio() >= self.config.saturation_ratio
    }

    fn sellable(&self, crop: CropKind, view: &ZoneView) -> bool {
        let saturated = self.saturated_load || self.warehouse_saturated(view);
        self.config.is_eligible(crop, view.market, saturated)
    }
}

impl Behavior for TransportBot {
    type Errand = TransportErrand;

    fn activity(&self) -> &Activity<TransportErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<TransportErrand> {
        &mut self.activity
    }

    fn discover(&mut self, _: &Chassis, view: &ZoneView, _: &Claims) -> Discovery<TransportErrand> {
        let dock = view.site(BuildingKind::ExportDock);
        let warehouse = view.site(BuildingKind::Warehouse);

        if !self.inventory.is_empty() {
            let any_sellable = self.inventory.iter().any(|i| self.sellable(i.crop, view));
            let (errand, site, needed) = if any_sellable {
                (TransportErrand::Sell, dock, BuildingKind::ExportDock)
            } else {
                (TransportErrand::Return, warehouse, BuildingKind::Warehouse)
            };
            return match site {
                Some(at) => Discovery::Work { errand, at },
                None => Discovery::Stalled(Stall::UnreachableResource(needed)),
            };
        }

        let Some(warehouse) = warehouse else {
            return Discovery::Nothing;
        };
        let saturated = self.warehouse_saturated(view);
        let any_eligible = view
            .warehouse
            .items()
            .iter()
            .any(|i| self.config.is_eligible(i.crop, view.market, saturated));
        if !any_eligible {
            return Discovery::Nothing;
        }
        if dock.is_none() {
            return Discovery::Stalled(Stall::UnreachableResource(BuildingKind::ExportDock));
        }
        Discovery::Work {
            errand: TransportErrand::Load,
            at: warehouse,
        }
    }

    fn arrive(&mut self, errand: &TransportErrand, _: &Chassis, _: &ZoneView) -> Arrival {
        match errand {
            TransportErrand::Load => Arrival::Act(Duration::from_secs_f32(LOAD_SECS)),
            TransportErrand::Sell => Arrival::Act(Duration::from_secs_f32(SELL_SECS)),
            TransportErrand::Return => Arrival::Instant,
        }
    }

    fn complete(&mut self, errand: &TransportErrand, chassis: &Chassis, view: &ZoneView) -> Option<Intent> {
        match errand {
            TransportErrand::Load => {
                let max = Self::capacity(chassis).saturating_sub(self.inventory.len());
                if max == 0 {
                    return None;
                }
                let saturated = self.warehouse_saturated(view);
                let crops = match self.config.sell_mode {
                    SellMode::Everything => None,
                    SellMode::MarketBased if saturated => None,
                    SellMode::MarketBased => Some(
                        CropKind::ALL
                            .iter()
                            .copied()
                            .filter(|&c| self.config.is_eligible(c, view.market, false))
                            .collect::<BTreeSet<_>>(),
                    ),
                };
                self.saturated_load = saturated && self.config.sell_mode == SellMode::MarketBased;
                Some(Intent::Load { max, crops })
            }
            TransportErrand::Sell => {
                let (sell, keep): (Vec<CropItem>, Vec<CropItem>) = std::mem::take(&mut self.inventory)
                    .into_iter()
                    .partition(|i| self.sellable(i.crop, view));
                self.inventory = keep;
                (!sell.is_empty()).then_some(Intent::Sell(sell))
            }
            TransportErrand::Return => Some(Intent::Deposit(std::mem::take(&mut self.inventory))),
        }
    }

    fn resolve(
        &mut self,
        _: TransportErrand,
        intent: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(TransportErrand, GridPos)> {
        match (intent, outcome) {
            (_, Outcome::Loaded(items)) => self.inventory.extend(items.iter().copied()),
            (_, Outcome::Deposited { leftover }) => self.inventory.extend(leftover.iter().copied()),
            (Intent::Sell(items) | Intent::Deposit(items), Outcome::Rejected(_)) => {
                self.inventory.extend(items)
            }
            _ => {}
        }
        if self.inventory.is_empty() {
            self.saturated_load = false;
        }
        None
    }

    fn claim(_: &TransportErrand) -> Option<Claim> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::BotConfig;
    use crate::sim::testing::*;

    fn stock(sim: &mut crate::sim::Simulation, crop: CropKind, n: usize) {
        let home = sim.home_zone();
        let leftover = sim
            .zone_mut(home)
            .unwrap()
            .warehouse
            .store(vec![CropItem::new(crop); n]);
        assert!(leftover.is_empty());
    }

    fn market_based() -> BotConfig {
        BotConfig::Transport(TransportConfig {
            sell_mode: SellMode::MarketBased,
            ..TransportConfig::default()
        })
    }

    #[test]
    fn test_market_based_ignores_ordinary_crops() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Warehouse, (2, 2));
        build(&mut sim, BuildingKind::ExportDock, (20, 2));
        stock(&mut sim, CropKind::Wheat, 5);
        sim.buy_bot(BotKind::Transport, home, None, Some(market_based()))
            .unwrap();

        run(&mut sim, 30.0);
        assert_eq!(sim.zone(home).unwrap().warehouse.count(CropKind::Wheat), 5);
        assert!(sim.ledger.sales_history().is_empty());
    }

    #[test]
    fn test_market_based_sells_epic_crop_only() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Warehouse, (2, 2));
        build(&mut sim, BuildingKind::ExportDock, (20, 2));
        stock(&mut sim, CropKind::Wheat, 3);
        stock(&mut sim, CropKind::Melon, 2);
        let now = sim.now();
        sim.market.start_epic(CropKind::Melon, now);
        sim.buy_bot(BotKind::Transport, home, None, Some(market_based()))
            .unwrap();

        run(&mut sim, 30.0);
        let zone = sim.zone(home).unwrap();
        assert_eq!(zone.warehouse.count(CropKind::Wheat), 3);
        assert_eq!(zone.warehouse.count(CropKind::Melon), 0);
        assert!(sim
            .ledger
            .sales_history()
            .iter()
            .all(|r| r.crop == CropKind::Melon));
    }

    #[test]
    fn test_saturated_warehouse_sells_anything() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Warehouse, (2, 2));
        build(&mut sim, BuildingKind::ExportDock, (20, 2));
        stock(&mut sim, CropKind::Wheat, 170);
        sim.buy_bot(BotKind::Transport, home, None, Some(market_based()))
            .unwrap();

        run(&mut sim, 30.0);
        assert!(sim.zone(home).unwrap().warehouse.count(CropKind::Wheat) < 170);
        assert!(!sim.ledger.sales_history().is_empty());
    }

    #[test]
    fn test_no_dock_stalls() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Warehouse, (2, 2));
        stock(&mut sim, CropKind::Wheat, 1);
        let id = sim.buy_bot(BotKind::Transport, home, None, None).unwrap();
        run(&mut sim, 2.0);
        assert_eq!(
            sim.bot(id).unwrap().chassis.stall,
            Some(Stall::UnreachableResource(BuildingKind::ExportDock))
        );
    }

    #[test]
    fn test_invalid_saturation_is_rejected() {
        let config = TransportConfig {
            saturation_ratio: 1.5,
            ..TransportConfig::default()
        };
        assert!(matches!(config.validate(), Err(SchedulerError::InvalidConfig(_))));
    }
}
