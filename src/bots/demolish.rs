use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::Chassis;
use crate::shared::*;

/// Seconds to clear each obstacle kind.
pub fn clear_secs(terrain: Terrain) -> f32 {
    match terrain {
        Terrain::Rock => 4.0,
        Terrain::Tree => 3.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DemolishErrand {
    Clear(GridPos),
}

/// Clears rocks and trees to dirt, nearest first. Does the same job as the
/// farmer's `clear` task without using the zone's queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemolishBot {
    pub cleared: u32,
    pub activity: Activity<DemolishErrand>,
}

impl Behavior for DemolishBot {
    type Errand = DemolishErrand;

    fn activity(&self) -> &Activity<DemolishErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<DemolishErrand> {
        &mut self.activity
    }

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<DemolishErrand> {
        match view
            .grid
            .nearest(chassis.pos, |pos, t| t.is_obstacle() && !claims.tile(pos))
        {
            Some(tile) => Discovery::Work {
                errand: DemolishErrand::Clear(tile),
                at: tile,
            },
            None => Discovery::Nothing,
        }
    }

    fn arrive(&mut self, errand: &DemolishErrand, _: &Chassis, view: &ZoneView) -> Arrival {
        let DemolishErrand::Clear(tile) = errand;
        match view.grid.get(*tile) {
            Some(t) if t.is_obstacle() => Arrival::Act(Duration::from_secs_f32(clear_secs(t.terrain))),
            _ => Arrival::Abandon,
        }
    }

    fn complete(&mut self, errand: &DemolishErrand, _: &Chassis, _: &ZoneView) -> Option<Intent> {
        let DemolishErrand::Clear(tile) = errand;
        Some(Intent::Clear(*tile))
    }

    fn resolve(
        &mut self,
        _: DemolishErrand,
        _: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(DemolishErrand, GridPos)> {
        if *outcome == Outcome::Applied {
            self.cleared += 1;
        }
        None
    }

    fn claim(errand: &DemolishErrand) -> Option<Claim> {
        let DemolishErrand::Clear(tile) = errand;
        Some(Claim::Tile(*tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::testing::*;

    #[test]
    fn test_clears_obstacles_then_parks() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        build(&mut sim, BuildingKind::Garage, (0, 0));
        {
            let grid = &mut sim.zone_mut(home).unwrap().grid;
            grid.set_terrain((4, 4), Terrain::Rock);
            grid.set_terrain((6, 4), Terrain::Tree);
        }
        let id = sim.buy_bot(BotKind::Demolish, home, None, None).unwrap();

        run(&mut sim, 30.0);
        let zone = sim.zone(home).unwrap();
        for pos in [(4, 4), (6, 4)] {
            let tile = zone.grid.get(pos).unwrap();
            assert_eq!(tile.terrain, Terrain::Dirt);
            assert!(tile.cleared);
        }
        let bot = sim.bot(id).unwrap();
        assert!(bot.is_parked());
        assert_eq!(bot.chassis.pos, (0, 0));
    }

    #[test]
    fn test_two_bots_split_the_work() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        {
            let grid = &mut sim.zone_mut(home).unwrap().grid;
            grid.set_terrain((10, 8), Terrain::Rock);
            grid.set_terrain((14, 8), Terrain::Rock);
        }
        let a = sim.buy_bot(BotKind::Demolish, home, None, None).unwrap();
        let b = sim.buy_bot(BotKind::Demolish, home, None, None).unwrap();
        sim.tick(Duration::from_millis(100));

        let claims: Vec<_> = [a, b]
            .iter()
            .map(|&id| sim.bot(id).unwrap().claim())
            .collect();
        assert!(claims.iter().all(Option::is_some));
        assert_ne!(claims[0], claims[1]);
    }
}
