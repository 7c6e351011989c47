use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::{Chassis, Stall};
use crate::shared::*;

pub const HARVEST_CAPACITY: usize = 8;
pub const HARVEST_HOPPER_CAPACITY: usize = 16;
const HARVEST_SECS: f32 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HarvestErrand {
    Harvest(GridPos),
    Deposit,
}

/// Picks ripe crops until full (or nothing is ripe), then empties itself into
/// the warehouse in one go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestBot {
    pub inventory: Vec<CropItem>,
    pub activity: Activity<HarvestErrand>,
}

impl HarvestBot {
    pub fn capacity(chassis: &Chassis) -> usize {
        if chassis.hopper_upgrade {
            HARVEST_HOPPER_CAPACITY
        } else {
            HARVEST_CAPACITY
        }
    }
}

fn is_ripe(tile: &Tile) -> bool {
    tile.crop.as_ref().is_some_and(|c| c.is_ripe())
}

impl Behavior for HarvestBot {
    type Errand = HarvestErrand;

    fn activity(&self) -> &Activity<HarvestErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<HarvestErrand> {
        &mut self.activity
    }

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<HarvestErrand> {
        if self.inventory.len() < Self::capacity(chassis) {
            if let Some(tile) = view
                .grid
                .nearest(chassis.pos, |pos, t| is_ripe(t) && !claims.tile(pos))
            {
                return Discovery::Work {
                    errand: HarvestErrand::Harvest(tile),
                    at: tile,
                };
            }
        }
        if self.inventory.is_empty() {
            return Discovery::Nothing;
        }
        match view.site(BuildingKind::Warehouse) {
            None => Discovery::Stalled(Stall::UnreachableResource(BuildingKind::Warehouse)),
            Some(_) if view.warehouse.is_full() => {
                Discovery::Stalled(Stall::ResourceExhausted(BuildingKind::Warehouse))
            }
            Some(warehouse) => Discovery::Work {
                errand: HarvestErrand::Deposit,
                at: warehouse,
            },
        }
    }

    fn arrive(&mut self, errand: &HarvestErrand, _: &Chassis, view: &ZoneView) -> Arrival {
        match errand {
            HarvestErrand::Harvest(tile) if view.grid.get(*tile).is_some_and(is_ripe) => {
                Arrival::Act(Duration::from_secs_f32(HARVEST_SECS))
            }
            HarvestErrand::Harvest(_) => Arrival::Abandon,
            HarvestErrand::Deposit => Arrival::Instant,
        }
    }

    fn complete(&mut self, errand: &HarvestErrand, chassis: &Chassis, _: &ZoneView) -> Option<Intent> {
        match errand {
            HarvestErrand::Harvest(tile) => {
                (self.inventory.len() < Self::capacity(chassis)).then_some(Intent::Harvest(*tile))
            }
            HarvestErrand::Deposit => Some(Intent::Deposit(std::mem::take(&mut self.inventory))),
        }
    }

    fn resolve(
        &mut self,
        _: HarvestErrand,
        intent: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(HarvestErrand, GridPos)> {
        match (intent, outcome) {
            (_, Outcome::Harvested(item)) => self.inventory.push(*item),
            (_, Outcome::Deposited { leftover }) => self.inventory = leftover.clone(),
            (Intent::Deposit(items), Outcome::Rejected(_)) => self.inventory = items,
            _ => {}
        }
        None
    }

    fn claim(errand: &HarvestErrand) -> Option<Claim> {
        match errand {
            HarvestErrand::Harvest(tile) => Some(Claim::Tile(*tile)),
            HarvestErrand::Deposit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::BotRole;
    use crate::sim::testing::*;

    fn inventory_len(sim: &crate::sim::Simulation, id: BotId) -> usize {
        match &sim.bot(id).unwrap().role {
            BotRole::Harvest(h) => h.inventory.len(),
            _ => unreachable!(),
        }
    }

    fn ripe_row(sim: &mut crate::sim::Simulation, y: i32, count: i32) {
        let home = sim.home_zone();
        let grid = &mut sim.zone_mut(home).unwrap().grid;
        for x in 0..count {
            grid.plant((x, y), CropKind::Potato);
            grid.set_growth((x, y), 100.0);
        }
    }

    #[test]
    fn test_inventory_never_exceeds_capacity() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        ripe_row(&mut sim, 2, 12);
        let id = sim.buy_bot(BotKind::Harvest, home, None, None).unwrap();

        for _ in 0..200 {
            sim.tick(Duration::from_millis(250));
            assert!(inventory_len(&sim, id) <= HARVEST_CAPACITY);
        }
        assert_eq!(inventory_len(&sim, id), HARVEST_CAPACITY);
        let bot = sim.bot(id).unwrap();
        assert_eq!(
            bot.chassis.stall,
            Some(Stall::UnreachableResource(BuildingKind::Warehouse))
        );
    }

    #[test]
    fn test_deposits_when_nothing_left_to_pick() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Warehouse, (10, 10));
        ripe_row(&mut sim, 2, 3);
        let id = sim.buy_bot(BotKind::Harvest, home, None, None).unwrap();

        run(&mut sim, 40.0);
        assert_eq!(inventory_len(&sim, id), 0);
        assert_eq!(sim.zone(home).unwrap().warehouse.count(CropKind::Potato), 3);
    }

    #[test]
    fn test_hopper_doubles_capacity() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Hopper, (20, 12));
        ripe_row(&mut sim, 2, 20);
        let id = sim.buy_bot(BotKind::Harvest, home, None, None).unwrap();
        assert!(sim.bot(id).unwrap().chassis.hopper_upgrade);

        run(&mut sim, 80.0);
        assert_eq!(inventory_len(&sim, id), HARVEST_HOPPER_CAPACITY);
    }
}
