//! The farmer: one per zone, working through the zone's task queue.
//!
//! `Idle → Traveling → Working → Idle`. The farmer takes at most one
//! transition per tick and re-checks the target when the work is done; a
//! task that is no longer valid (or no longer affordable) is dropped.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{building_spec, SPRINKLER_COST};
use crate::economy::Ledger;
use crate::grid::Motion;
use crate::market::Market;
use crate::shared::*;
use crate::world::Zone;

/// Tiles per second. The supercharger does not apply to the farmer.
pub const FARMER_SPEED: f32 = 4.0;
pub const BASKET_CAPACITY: usize = 12;

pub fn base_duration(kind: TaskKind) -> Duration {
    let secs = match kind {
        TaskKind::Clear => 3.0,
        TaskKind::Water => 1.0,
        TaskKind::Harvest => 1.5,
        TaskKind::Plant(_) => 2.0,
        TaskKind::Uproot => 1.5,
        TaskKind::PlaceSprinkler => 2.0,
        TaskKind::PlaceBuilding(_) => 4.0,
        TaskKind::Deposit => 1.0,
    };
    Duration::from_secs_f32(secs)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FarmerState {
    Idle,
    Traveling(Motion),
    Working { started: Duration, duration: Duration },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farmer {
    pub pos: GridPos,
    pub state: FarmerState,
    pub basket: Vec<CropItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FarmerOutcome {
    Completed(Task),
    Aborted(Task, SchedulerError),
}

impl Farmer {
    pub fn new(pos: GridPos) -> Self {
        Self {
            pos,
            state: FarmerState::Idle,
            basket: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == FarmerState::Idle
    }

    /// Drops whatever the farmer was doing, progress included. A farmer
    /// on the move stops on the cell it has reached by `now`.
    pub fn abandon(&mut self, now: Duration) {
        if let FarmerState::Traveling(motion) = &self.state {
            self.pos = motion.cell_at(now);
        }
        self.state = FarmerState::Idle;
    }
}

impl Zone {
    /// Advances the farmer by one transition.
    pub(crate) fn step_farmer(
        &mut self,
        ledger: &mut Ledger,
        market: &Market,
        now: Duration,
    ) -> Option<FarmerOutcome> {
        if self.current_task.is_none() {
            self.farmer.state = FarmerState::Idle;
            self.promote_task();
        }
        let target = self.current_task.as_ref()?.target;

        match self.farmer.state.clone() {
            FarmerState::Idle => {
                self.farmer.state =
                    FarmerState::Traveling(Motion::new(self.farmer.pos, target, now, FARMER_SPEED));
                None
            }
            FarmerState::Traveling(motion) => {
                self.farmer.pos = motion.cell_at(now);
                if motion.arrived(now) {
                    let kind = self.current_task.as_ref()?.kind;
                    self.farmer.state = FarmerState::Working {
                        started: now,
                        duration: base_duration(kind),
                    };
                }
                None
            }
            FarmerState::Working { started, duration } => {
                let elapsed = now.saturating_sub(started);
                let progress = if duration.is_zero() {
                    100
                } else {
                    (elapsed.as_secs_f32() / duration.as_secs_f32() * 100.0).min(100.0) as u8
                };
                if let Some(task) = self.current_task.as_mut() {
                    task.progress = progress;
                }
                if elapsed < duration {
                    return None;
                }

                let mut task = self.current_task.take()?;
                task.progress = 100;
                self.farmer.state = FarmerState::Idle;
                self.promote_task();
                Some(match self.complete_task(&task, ledger, market, now) {
                    Ok(()) => {
                        info!("[Farmer] Finished {} {:?} at {:?}", task.id, task.kind, task.target);
                        FarmerOutcome::Completed(task)
                    }
                    Err(e) => {
                        info!("[Farmer] Dropped {} {:?} at {:?}: {}", task.id, task.kind, task.target, e);
                        FarmerOutcome::Aborted(task, e)
                    }
                })
            }
        }
    }

    /// Completion effects. Validation and payment happen before any tile
    /// changes, so a failure leaves the zone as it was.
    fn complete_task(
        &mut self,
        task: &Task,
        ledger: &mut Ledger,
        market: &Market,
        now: Duration,
    ) -> SchedulerResult<()> {
        let tile = task.target;
        self.validate_task(task.kind, tile)?;

        match task.kind {
            TaskKind::Clear => {
                self.grid.clear_obstacle(tile);
            }
            TaskKind::Water => {
                self.grid.water(tile);
            }
            TaskKind::Harvest => {
                if self.farmer.basket.len() >= BASKET_CAPACITY {
                    return Err(SchedulerError::CapacityExceeded(CapacityKind::Basket));
                }
                if let Some(item) = self.grid.harvest(tile) {
                    self.farmer.basket.push(item);
                }
            }
            TaskKind::Plant(crop) => {
                ledger.spend(market.seed_price(crop) as u64, "seeds")?;
                self.grid.plant(tile, crop);
            }
            TaskKind::Uproot => {
                self.grid.uproot(tile);
            }
            TaskKind::PlaceSprinkler => {
                ledger.spend(SPRINKLER_COST, "sprinkler")?;
                self.grid.place_sprinkler(tile);
            }
            TaskKind::PlaceBuilding(kind) => {
                let spec = building_spec(kind);
                ledger.spend(spec.cost, "building")?;
                self.grid.begin_construction(tile, kind, now, spec.build_time);
                self.buildings.insert(kind, tile);
            }
            TaskKind::Deposit => {
                let basket = std::mem::take(&mut self.farmer.basket);
                self.farmer.basket = self.warehouse.store(basket);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SimConfig;
    use crate::sim::testing::*;
    use crate::sim::Simulation;

    #[test]
    fn test_farmer_waters_target() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        sim.zone_mut(home).unwrap().grid.plant((2, 2), CropKind::Carrot);
        sim.add_task(home, TaskKind::Water, (2, 2)).unwrap();

        run(&mut sim, 10.0);
        let zone = sim.zone(home).unwrap();
        assert!(zone.grid.crop((2, 2)).unwrap().watered_today);
        assert_eq!(zone.task_count(), 0);
        assert_eq!(zone.farmer.pos, (2, 2));
        assert!(zone.farmer.is_idle());
    }

    #[test]
    fn test_plant_charges_seed_price_at_completion() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        let money = sim.ledger.money();
        sim.add_task(home, TaskKind::Plant(CropKind::Carrot), (3, 3)).unwrap();
        assert_eq!(sim.ledger.money(), money, "nothing is charged at queue time");

        let price = sim.market.seed_price(CropKind::Carrot) as u64;
        run(&mut sim, 10.0);
        assert_eq!(sim.ledger.money(), money - price);
        assert_eq!(sim.zone(home).unwrap().grid.crop((3, 3)).unwrap().kind, CropKind::Carrot);
    }

    #[test]
    fn test_plant_without_funds_is_dropped() {
        let mut sim = Simulation::new(SimConfig {
            starting_money: 0,
            ..quiet_config()
        });
        let home = sim.home_zone();
        sim.add_task(home, TaskKind::Plant(CropKind::Melon), (3, 3)).unwrap();
        run(&mut sim, 10.0);
        let zone = sim.zone(home).unwrap();
        assert!(zone.grid.crop((3, 3)).is_none());
        assert_eq!(zone.task_count(), 0);
        assert_eq!(sim.ledger.money(), 0);
    }

    #[test]
    fn test_cancel_mid_work_discards_progress() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        sim.zone_mut(home).unwrap().grid.set_terrain((12, 8), Terrain::Rock);
        let id = sim.add_task(home, TaskKind::Clear, (12, 8)).unwrap();
        // Farmer starts at the grid center, which is the rock itself.
        run(&mut sim, 1.0);
        assert!(matches!(sim.zone(home).unwrap().farmer.state, FarmerState::Working { .. }));

        sim.remove_task(id).unwrap();
        run(&mut sim, 5.0);
        let zone = sim.zone(home).unwrap();
        assert!(zone.grid.get((12, 8)).unwrap().is_obstacle());
        assert!(zone.farmer.is_idle());
    }

    #[test]
    fn test_harvest_fills_basket_and_deposit_empties_it() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        sim.place_building(BuildingKind::Warehouse, home, (14, 8)).unwrap();
        {
            let zone = sim.zone_mut(home).unwrap();
            zone.grid.plant((13, 8), CropKind::Wheat);
            zone.grid.set_growth((13, 8), 100.0);
        }
        sim.add_task(home, TaskKind::Harvest, (13, 8)).unwrap();
        run(&mut sim, 8.0);
        assert_eq!(sim.zone(home).unwrap().farmer.basket.len(), 1);

        sim.add_task(home, TaskKind::Deposit, (14, 8)).unwrap();
        run(&mut sim, 5.0);
        let zone = sim.zone(home).unwrap();
        assert!(zone.farmer.basket.is_empty());
        assert_eq!(zone.warehouse.count(CropKind::Wheat), 1);
    }
}
