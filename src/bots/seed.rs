use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fsm::*;
use super::Chassis;
use crate::shared::*;

pub const MAX_SEED_JOBS: usize = 3;
pub const MAX_TILES_PER_JOB: usize = 20;
pub const MAX_TILES_PER_BOT: usize = 60;
const PLANT_SECS: f32 = 1.5;

/// A planting job as the shop collaborator describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedJobSpec {
    pub crop: CropKind,
    pub tiles: Vec<GridPos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub jobs: Vec<SeedJobSpec>,
    pub auto_buy_seeds: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBotJob {
    pub id: JobId,
    pub crop: CropKind,
    pub target_tiles: Vec<GridPos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeedErrand {
    Plant {
        job: JobId,
        tile: GridPos,
        crop: CropKind,
    },
}

/// Plants its jobs' tiles in job order. Seeds are bought on the spot when
/// `auto_buy_seeds` is set, otherwise taken from the seed stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBot {
    pub jobs: Vec<SeedBotJob>,
    pub auto_buy_seeds: bool,
    /// Tiles that failed for want of money or seeds. Retried once every
    /// other tile has been tried, and only while the seed can be paid for.
    skipped: BTreeSet<GridPos>,
    pub activity: Activity<SeedErrand>,
}

impl Default for SeedBot {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            auto_buy_seeds: true,
            skipped: BTreeSet::new(),
            activity: Activity::Idle,
        }
    }
}

impl SeedBot {
    pub fn tiles(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.jobs.iter().flat_map(|j| j.target_tiles.iter().copied())
    }

    pub(crate) fn set_jobs(&mut self, jobs: Vec<SeedBotJob>, auto_buy_seeds: bool) {
        self.jobs = jobs;
        self.auto_buy_seeds = auto_buy_seeds;
        self.skipped.clear();
        self.activity = Activity::Idle;
    }
}

/// Checks a job list against the per-bot limits. Tile ownership across bots is
/// checked by the caller.
pub fn validate_jobs(jobs: &[SeedJobSpec]) -> SchedulerResult<()> {
    if jobs.len() > MAX_SEED_JOBS {
        return Err(SchedulerError::CapacityExceeded(CapacityKind::SeedJobs));
    }
    let total: usize = jobs.iter().map(|j| j.tiles.len()).sum();
    if jobs.iter().any(|j| j.tiles.len() > MAX_TILES_PER_JOB) || total > MAX_TILES_PER_BOT {
        return Err(SchedulerError::CapacityExceeded(CapacityKind::JobTiles));
    }
    let mut seen = BTreeSet::new();
    for tile in jobs.iter().flat_map(|j| j.tiles.iter()) {
        if !seen.insert(*tile) {
            return Err(SchedulerError::InvalidTarget(format!(
                "{:?} appears in more than one job",
                tile
            )));
        }
    }
    Ok(())
}

impl Behavior for SeedBot {
    type Errand = SeedErrand;

    fn activity(&self) -> &Activity<SeedErrand> {
        &self.activity
    }

    fn activity_mut(&mut self) -> &mut Activity<SeedErrand> {
        &mut self.activity
    }

    fn discover(&mut self, _: &Chassis, view: &ZoneView, claims: &Claims) -> Discovery<SeedErrand> {
        let supplied = |crop: CropKind| {
            if self.auto_buy_seeds {
                view.ledger.can_afford(view.market.seed_price(crop) as u64)
            } else {
                view.ledger.seeds(crop) > 0
            }
        };
        let mut retry = None;
        for job in &self.jobs {
            for &tile in &job.target_tiles {
                if claims.tile(tile) || !view.grid.get(tile).is_some_and(|t| t.is_plantable()) {
                    continue;
                }
                let errand = SeedErrand::Plant {
                    job: job.id,
                    tile,
                    crop: job.crop,
                };
                if !self.skipped.contains(&tile) {
                    return Discovery::Work { errand, at: tile };
                }
                if supplied(job.crop) {
                    retry.get_or_insert(Discovery::Work { errand, at: tile });
                }
            }
        }
        retry.unwrap_or(Discovery::Nothing)
    }

    fn arrive(&mut self, errand: &SeedErrand, _: &Chassis, view: &ZoneView) -> Arrival {
        let SeedErrand::Plant { tile, .. } = errand;
        if view.grid.get(*tile).is_some_and(|t| t.is_plantable()) {
            Arrival::Act(Duration::from_secs_f32(PLANT_SECS))
        } else {
            Arrival::Abandon
        }
    }

    fn complete(&mut self, errand: &SeedErrand, _: &Chassis, _: &ZoneView) -> Option<Intent> {
        let SeedErrand::Plant { tile, crop, .. } = errand;
        Some(Intent::Plant {
            tile: *tile,
            crop: *crop,
            auto_buy: self.auto_buy_seeds,
        })
    }

    fn resolve(
        &mut self,
        errand: SeedErrand,
        _: Intent,
        outcome: &Outcome,
        _: &Chassis,
    ) -> Option<(SeedErrand, GridPos)> {
        let SeedErrand::Plant { tile, .. } = errand;
        match outcome {
            Outcome::Applied => {
                self.skipped.remove(&tile);
            }
            Outcome::Rejected(_) => {
                self.skipped.insert(tile);
            }
            _ => {}
        }
        None
    }

    fn claim(errand: &SeedErrand) -> Option<Claim> {
        let SeedErrand::Plant { tile, .. } = errand;
        Some(Claim::Tile(*tile))
    }
}
