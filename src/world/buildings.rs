//! Building placement and relocation.

use bevy::prelude::*;

use crate::bots::Stall;
use crate::data::building_spec;
use crate::shared::*;
use crate::sim::Simulation;

impl Simulation {
    /// Charges the catalogue cost and starts construction on `tile`. The
    /// building becomes usable when construction finishes.
    pub fn place_building(
        &mut self,
        kind: BuildingKind,
        zone: ZoneId,
        tile: GridPos,
    ) -> SchedulerResult<()> {
        let index = self.owned_zone_index(zone)?;
        let now = self.clock;
        let z = &mut self.zones[index];

        if z.buildings.contains_key(&kind) {
            return Err(SchedulerError::InvalidTarget(format!(
                "zone already has a {:?}",
                kind
            )));
        }
        if !z.grid.get(tile).is_some_and(|t| t.is_buildable()) {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} is not free ground",
                tile
            )));
        }

        let spec = building_spec(kind);
        self.ledger.spend(spec.cost, "building")?;
        z.grid.begin_construction(tile, kind, now, spec.build_time);
        z.buildings.insert(kind, tile);
        z.refresh_upgrades();
        info!(
            "[World] {:?} placed at {:?} in zone {:?}, ready in {:?}",
            kind, tile, zone, spec.build_time
        );
        Ok(())
    }

    /// Moves an existing building for free. Construction in progress carries
    /// over unchanged.
    pub fn relocate_building(
        &mut self,
        kind: BuildingKind,
        zone: ZoneId,
        to: GridPos,
    ) -> SchedulerResult<()> {
        let index = self.owned_zone_index(zone)?;
        let z = &mut self.zones[index];

        let from = *z.buildings.get(&kind).ok_or(SchedulerError::NotFound)?;
        if from == to {
            return Ok(());
        }
        if !z.grid.get(to).is_some_and(|t| t.is_buildable()) {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} is not free ground",
                to
            )));
        }

        let (taken, construction) = z.grid.take_building(from).ok_or(SchedulerError::NotFound)?;
        z.grid.put_building(to, taken, construction);
        z.buildings.insert(kind, to);
        z.refresh_upgrades();
        info!("[World] {:?} moved {:?} -> {:?} in zone {:?}", kind, from, to, zone);
        Ok(())
    }

    /// Bots currently stalled for want of a building or supply, per zone.
    pub fn under_provisioned(&self) -> Vec<(ZoneId, BotId, Stall)> {
        self.zones
            .iter()
            .flat_map(|z| {
                z.bots
                    .iter()
                    .filter_map(move |b| b.chassis.stall.map(|s| (z.id, b.id, s)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SimConfig;
    use std::time::Duration;

    fn sim() -> Simulation {
        Simulation::new(SimConfig {
            starting_money: 5_000,
            ..SimConfig::default()
        })
    }

    #[test]
    fn test_place_charges_and_builds() {
        let mut sim = sim();
        let home = sim.home_zone();
        sim.place_building(BuildingKind::Well, home, (2, 2)).unwrap();
        assert_eq!(sim.ledger.money(), 5_000 - building_spec(BuildingKind::Well).cost);

        let zone = sim.zone(home).unwrap();
        assert_eq!(zone.site(BuildingKind::Well), None, "still under construction");

        sim.tick(Duration::from_secs(6));
        assert_eq!(sim.zone(home).unwrap().site(BuildingKind::Well), Some((2, 2)));
    }

    #[test]
    fn test_second_building_of_a_kind_is_rejected() {
        let mut sim = sim();
        let home = sim.home_zone();
        sim.place_building(BuildingKind::Garage, home, (1, 1)).unwrap();
        let money = sim.ledger.money();
        assert!(matches!(
            sim.place_building(BuildingKind::Garage, home, (3, 3)),
            Err(SchedulerError::InvalidTarget(_))
        ));
        assert_eq!(sim.ledger.money(), money);
    }

    #[test]
    fn test_place_without_funds_changes_nothing() {
        let mut sim = Simulation::new(SimConfig {
            starting_money: 10,
            ..SimConfig::default()
        });
        let home = sim.home_zone();
        assert!(matches!(
            sim.place_building(BuildingKind::Supercharger, home, (1, 1)),
            Err(SchedulerError::InsufficientFunds { .. })
        ));
        let zone = sim.zone(home).unwrap();
        assert!(zone.buildings.is_empty());
        assert!(zone.grid.get((1, 1)).unwrap().is_buildable());
    }

    #[test]
    fn test_relocate_is_free_and_keeps_construction() {
        let mut sim = sim();
        let home = sim.home_zone();
        sim.place_building(BuildingKind::Warehouse, home, (1, 1)).unwrap();
        let money = sim.ledger.money();

        sim.relocate_building(BuildingKind::Warehouse, home, (5, 5)).unwrap();
        assert_eq!(sim.ledger.money(), money);
        let zone = sim.zone(home).unwrap();
        assert_eq!(zone.buildings[&BuildingKind::Warehouse], (5, 5));
        assert!(zone.grid.get((5, 5)).unwrap().construction.is_some());
        assert!(zone.grid.get((1, 1)).unwrap().is_buildable());
    }

    #[test]
    fn test_relocate_missing_building_is_not_found() {
        let mut sim = sim();
        let home = sim.home_zone();
        assert_eq!(
            sim.relocate_building(BuildingKind::Well, home, (1, 1)),
            Err(SchedulerError::NotFound)
        );
    }
}
