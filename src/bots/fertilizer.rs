use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::{Chassis, Stall};
use crate::shared::*;

pub const DEFAULT_FERTILIZER_CAPACITY: u32 = 5;
pub const MAX_FERTILIZER_CAPACITY: u32 = 10;
const FERTILIZE_SECS: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerConfig {
    /// Every crop kind exactly once. Earlier crops win distance ties.
    pub priority: Vec<CropKind>,
    /// Units carried without a hopper.
    pub capacity: u32,
}

impl Default for FertilizerConfig {
    fn default() -> Self {
        Self {
            priority: CropKind::ALL.to_vec(),
            capacity: DEFAULT_FERTILIZER_CAPACITY,
        }
    }
}

impl FertilizerConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if !(1..=MAX_FERTILIZER_CAPACITY).contains(&self.capacity) {
            return Err(SchedulerError::InvalidConfig(format!(
                "fertilizer capacity {} outside 1..={}",
                self.capacity, MAX_FERTILIZER_CAPACITY
            )));
        }
        let mut seen = [false; CropKind::ALL.len()];
        for crop in &self.priority {
            if std::mem::replace(&mut seen[crop.index()], true) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "{} listed twice in priority",
                    crop
                )));
            }
        }
        if self.priority.len() != CropKind::ALL.len() {
            return Err(SchedulerError::InvalidConfig(
                "priority must list every crop".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rank(&self, crop: CropKind) -> usize {
        self.priority
            .iter()
            .position(|&c| c == crop)
            .unwrap_or(self.priority.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FertilizerErrand {
    Fertilize(GridPos),
    Refill,
}

/// Fertilizes the nearest unfertilized crop, one unit each, and refills at the
/// depot the way a water bot refills at the well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerBot {
    pub fertilizer_level: u32,
    pub config: FertilizerConfig,
    pub activity: Activity<FertilizerErrand>,
}

impl Default for FertilizerBot {
    fn default() -> Self {
        Self {
            fertilizer_level: DEFAULT_FERTILIZER_CAPACITY,
            config: FertilizerConfig::default(),
            activity: Activity::Idle,
        }
    }
}

impl FertilizerBot {
    /// Doubled by the hopper.
    pub fn capacity(&self, chassis: &Chassis) -> u32 {
        if chassis.hopper_upgrade {
            self.config.capacity * 2
        } else {
            self.config.capacity
        }
    }

    pub(crate) fn set_config(&mut self, config: FertilizerConfig, chassis: &Chassis) {
        self.config = config;
        self.fertilizer_level = self.fertilizer_level.min(self.capacity(chassis));
    }

    fn target(&self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Option<GridPos> {
        view.grid
            .tiles()
            .filter(|(pos, tile)| needs_fertilizer(tile) && !claims.tile(*pos))
            .filter_map(|(pos, tile)| tile.crop.as_ref().map(|c| (pos, c.kind)))
            .min_by_key(|&(pos, crop)| {
                (distance_sq(chassis.pos, pos), self.config.rank(crop), pos.1, pos.0)
            })
            .map(|(pos, _)| pos)
    }
}

fn needs_fertilizer(tile: &Tile) -> bool {
    tile.crop.as_ref().is_some_and(|c| !c.fertilized)
}

impl Behavior for FertilizerBot {
    type Errand = FertilizerErrand;

    fn activity(&self) -> &Activity<FertilizerErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<FertilizerErrand> {
        &mut self.activity
    }

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<FertilizerErrand> {
        if self.fertilizer_level == 0 {
            return match view.site(BuildingKind::FertilizerDepot) {
                Some(depot) => Discovery::Work {
                    errand: FertilizerErrand::Refill,
                    at: depot,
                },
                None => Discovery::Stalled(Stall::ResourceExhausted(BuildingKind::FertilizerDepot)),
            };
        }
        match self.target(chassis, view, claims) {
            Some(tile) => Discovery::Work {
                errand: FertilizerErrand::Fertilize(tile),
                at: tile,
            },
            None => Discovery::Nothing,
        }
    }

    fn arrive(&mut self, errand: &FertilizerErrand, chassis: &Chassis, view: &ZoneView) -> Arrival {
        match errand {
            FertilizerErrand::Fertilize(tile) if view.grid.get(*tile).is_some_and(needs_fertilizer) => {
                Arrival::Act(Duration::from_secs_f32(FERTILIZE_SECS))
            }
            FertilizerErrand::Refill
                if view.site(BuildingKind::FertilizerDepot) == Some(chassis.pos) =>
            {
                Arrival::Instant
            }
            _ => Arrival::Abandon,
        }
    }

    fn complete(&mut self, errand: &FertilizerErrand, chassis: &Chassis, _: &ZoneView) -> Option<Intent> {
        match errand {
            FertilizerErrand::Fertilize(tile) => Some(Intent::Fertilize(*tile)),
            FertilizerErrand::Refill => {
                self.fertilizer_level = self.capacity(chassis);
                debug!("[Bots] Fertilizer bot refilled to {}", self.fertilizer_level);
                None
            }
        }
    }

    fn resolve(
        &mut self,
        _: FertilizerErrand,
        _: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(FertilizerErrand, GridPos)> {
        if *outcome == Outcome::Applied {
            self.fertilizer_level = self.fertilizer_level.saturating_sub(1);
        }
        None
    }

    fn claim(errand: &FertilizerErrand) -> Option<Claim> {
        match errand {
            FertilizerErrand::Fertilize(tile) => Some(Claim::Tile(*tile)),
            FertilizerErrand::Refill => None,
        }
    }
}
