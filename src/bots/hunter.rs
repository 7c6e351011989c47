use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::Chassis;
use crate::shared::*;

const CAPTURE_SECS: f32 = 1.5;
/// Escort destination when the zone has no garage.
pub const FALLBACK_ESCORT: GridPos = (0, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HunterErrand {
    Hunt(RabbitId),
    Escort,
}

/// How the hunter's activity reads from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunterPhase {
    Idle,
    Chasing,
    Capturing,
    Escorting,
    Returning,
}

/// Chases the nearest rabbit, captures it and escorts it off to the garage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HunterBot {
    pub captured: u32,
    pub activity: Activity<HunterErrand>,
}

impl HunterBot {
    pub fn phase(&self) -> HunterPhase {
        match &self.activity {
            Activity::Idle => HunterPhase::Idle,
            Activity::Traveling {
                errand: HunterErrand::Hunt(_),
                ..
            } => HunterPhase::Chasing,
            Activity::Acting { .. } => HunterPhase::Capturing,
            Activity::Traveling {
                errand: HunterErrand::Escort,
                ..
            } => HunterPhase::Escorting,
            Activity::Returning { .. } => HunterPhase::Returning,
        }
    }

    pub fn target_rabbit(&self) -> Option<RabbitId> {
        match self.activity.errand() {
            Some(HunterErrand::Hunt(id)) => Some(*id),
            _ => None,
        }
    }
}

impl Behavior for HunterBot {
    type Errand = HunterErrand;

    fn activity(&self) -> &Activity<HunterErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<HunterErrand> {
        &mut self.activity
    }

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<HunterErrand> {
        let target = view
            .rabbits
            .iter()
            .filter(|r| !claims.rabbit(r.id))
            .min_by_key(|r| (distance_sq(chassis.pos, r.pos), r.id));
        match target {
            Some(rabbit) => Discovery::Work {
                errand: HunterErrand::Hunt(rabbit.id),
                at: rabbit.pos,
            },
            None => Discovery::Nothing,
        }
    }

    fn track(&self, errand: &HunterErrand, view: &ZoneView) -> Tracking {
        match errand {
            HunterErrand::Hunt(id) => match view.rabbits.get(*id) {
                Some(rabbit) => Tracking::MovedTo(rabbit.pos),
                None => Tracking::Lost,
            },
            HunterErrand::Escort => Tracking::Fixed,
        }
    }

    fn arrive(&mut self, errand: &HunterErrand, _: &Chassis, view: &ZoneView) -> Arrival {
        match errand {
            HunterErrand::Hunt(id) if view.rabbits.get(*id).is_some() => {
                Arrival::Act(Duration::from_secs_f32(CAPTURE_SECS))
            }
            HunterErrand::Hunt(_) => Arrival::Abandon,
            HunterErrand::Escort => Arrival::Instant,
        }
    }

    fn complete(&mut self, errand: &HunterErrand, _: &Chassis, view: &ZoneView) -> Option<Intent> {
        match errand {
            HunterErrand::Hunt(id) => Some(Intent::Capture {
                rabbit: *id,
                escort_to: view.site(BuildingKind::Garage).unwrap_or(FALLBACK_ESCORT),
            }),
            HunterErrand::Escort => None,
        }
    }

    fn resolve(
        &mut self,
        _: HunterErrand,
        _: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(HunterErrand, GridPos)> {
        match outcome {
            Outcome::Captured { escort_to } => {
                self.captured += 1;
                Some((HunterErrand::Escort, *escort_to))
            }
            _ => None,
        }
    }

    fn claim(errand: &HunterErrand) -> Option<Claim> {
        match errand {
            HunterErrand::Hunt(id) => Some(Claim::Rabbit(*id)),
            HunterErrand::Escort => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::BotRole;
    use crate::sim::testing::*;

    fn hunter(sim: &crate::sim::Simulation, id: BotId) -> &HunterBot {
        match &sim.bot(id).unwrap().role {
            BotRole::Hunter(h) => h,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_captures_and_escorts_rabbit() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        let now = sim.now();
        sim.zone_mut(home).unwrap().rabbits.spawn((16, 8), now);
        let id = sim.buy_bot(BotKind::Hunter, home, None, None).unwrap();

        sim.tick(Duration::from_millis(100));
        assert_eq!(hunter(&sim, id).phase(), HunterPhase::Chasing);

        let mut escorted = false;
        for _ in 0..400 {
            sim.tick(Duration::from_millis(100));
            escorted |= hunter(&sim, id).phase() == HunterPhase::Escorting;
        }
        assert!(sim.zone(home).unwrap().rabbits.is_empty());
        assert_eq!(hunter(&sim, id).captured, 1);
        assert!(escorted);
        assert_eq!(sim.bot(id).unwrap().chassis.pos, FALLBACK_ESCORT);
    }

    #[test]
    fn test_no_rabbits_no_work() {
        let mut sim = quiet_sim();
        let home = sim.home_zone();
        let id = sim.buy_bot(BotKind::Hunter, home, None, None).unwrap();
        run(&mut sim, 2.0);
        assert_eq!(hunter(&sim, id).phase(), HunterPhase::Idle);
    }
}
