use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::{Chassis, Stall};
use crate::shared::*;

pub const WATER_CAPACITY: u8 = 10;
const WATER_SECS: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WaterErrand {
    Water(GridPos),
    Refill,
}

/// Waters the nearest dry crop. One unit per crop; refills to full at the
/// well, instantly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterBot {
    /// 0..=WATER_CAPACITY
    pub water_level: u8,
    pub activity: Activity<WaterErrand>,
}

impl Default for WaterBot {
    fn default() -> Self {
        Self {
            water_level: WATER_CAPACITY,
            activity: Activity::Idle,
        }
    }
}

fn needs_water(tile: &Tile) -> bool {
    tile.crop.as_ref().is_some_and(|c| !c.watered_today)
}

impl Behavior for WaterBot {
    type Errand = WaterErrand;

    fn activity(&self) -> &Activity<WaterErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<WaterErrand> {
        &mut self.activity
    }

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<WaterErrand> {
        if self.water_level == 0 {
            return match view.site(BuildingKind::Well) {
                Some(well) => Discovery::Work {
                    errand: WaterErrand::Refill,
                    at: well,
                },
                None => Discovery::Stalled(Stall::ResourceExhausted(BuildingKind::Well)),
            };
        }
        match view
            .grid
            .nearest(chassis.pos, |pos, t| needs_water(t) && !claims.tile(pos))
        {
            Some(tile) => Discovery::Work {
                errand: WaterErrand::Water(tile),
                at: tile,
            },
            None => Discovery::Nothing,
        }
    }

    fn arrive(&mut self, errand: &WaterErrand, chassis: &Chassis, view: &ZoneView) -> Arrival {
        match errand {
            WaterErrand::Water(tile) if view.grid.get(*tile).is_some_and(needs_water) => {
                Arrival::Act(Duration::from_secs_f32(WATER_SECS))
            }
            WaterErrand::Refill if view.site(BuildingKind::Well) == Some(chassis.pos) => Arrival::Instant,
            _ => Arrival::Abandon,
        }
    }

    fn complete(&mut self, errand: &WaterErrand, _: &Chassis, _: &ZoneView) -> Option<Intent> {
        match errand {
            WaterErrand::Water(tile) => Some(Intent::Water(*tile)),
            WaterErrand::Refill => {
                self.water_level = WATER_CAPACITY;
                debug!("[Bots] Water bot refilled");
                None
            }
        }
    }

    fn resolve(
        &mut self,
        _: WaterErrand,
        _: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(WaterErrand, GridPos)> {
        if *outcome == Outcome::Applied {
            self.water_level = self.water_level.saturating_sub(1);
        }
        None
    }

    fn claim(errand: &WaterErrand) -> Option<Claim> {
        match errand {
            WaterErrand::Water(tile) => Some(Claim::Tile(*tile)),
            WaterErrand::Refill => None,
        }
    }
}
