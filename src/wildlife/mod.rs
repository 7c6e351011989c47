//! Wildlife — rabbits that wander in from the zone edge and eat crops.
//!
//! Rabbits advance during the grid/time phase of a tick. Hunter bots remove
//! them; nothing else does.

use std::time::Duration;

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::shared::*;

pub const MAX_RABBITS_PER_ZONE: usize = 4;
/// Seconds between rabbit hops.
pub const RABBIT_HOP_SECS: f32 = 0.75;
/// Seconds a rabbit must sit on a crop before it is gone.
pub const RABBIT_EAT_SECS: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RabbitStatus {
    Wandering,
    Eating { tile: GridPos, since: Duration },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rabbit {
    pub id: RabbitId,
    pub pos: GridPos,
    pub status: RabbitStatus,
    next_hop: Duration,
}

/// All rabbits in one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warren {
    rabbits: Vec<Rabbit>,
    next_id: u64,
}

impl Warren {
    pub fn iter(&self) -> impl Iterator<Item = &Rabbit> {
        self.rabbits.iter()
    }

    pub fn len(&self) -> usize {
        self.rabbits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rabbits.is_empty()
    }

    pub fn get(&self, id: RabbitId) -> Option<&Rabbit> {
        self.rabbits.iter().find(|r| r.id == id)
    }

    /// Adds a wandering rabbit at `pos`.
    pub fn spawn(&mut self, pos: GridPos, now: Duration) -> RabbitId {
        self.next_id += 1;
        let id = RabbitId(self.next_id);
        self.rabbits.push(Rabbit {
            id,
            pos,
            status: RabbitStatus::Wandering,
            next_hop: now + Duration::from_secs_f32(RABBIT_HOP_SECS),
        });
        id
    }

    pub fn remove(&mut self, id: RabbitId) -> Option<Rabbit> {
        let index = self.rabbits.iter().position(|r| r.id == id)?;
        Some(self.rabbits.remove(index))
    }

    /// Spawns, moves and feeds rabbits. Returns the tiles whose crops were eaten.
    pub fn advance(
        &mut self,
        grid: &mut Grid,
        now: Duration,
        dt: Duration,
        spawn_rate: f32,
        rng: &mut impl Rng,
    ) -> Vec<GridPos> {
        if grid.has_crops() && self.rabbits.len() < MAX_RABBITS_PER_ZONE {
            let chance = (spawn_rate * dt.as_secs_f32()).clamp(0.0, 1.0) as f64;
            if rng.gen_bool(chance) {
                let pos = edge_tile(grid, rng);
                let id = self.spawn(pos, now);
                debug!("[Wildlife] {} appeared at {:?}", id, pos);
            }
        }

        let mut eaten = Vec::new();
        for rabbit in self.rabbits.iter_mut() {
            match rabbit.status {
                RabbitStatus::Eating { tile, since } => {
                    if grid.crop(tile).is_none() {
                        rabbit.status = RabbitStatus::Wandering;
                    } else if now >= since + Duration::from_secs_f32(RABBIT_EAT_SECS) {
                        grid.uproot(tile);
                        eaten.push(tile);
                        rabbit.status = RabbitStatus::Wandering;
                        info!("[Wildlife] {} ate the crop at {:?}", rabbit.id, tile);
                    }
                }
                RabbitStatus::Wandering => {
                    if grid.crop(rabbit.pos).is_some() {
                        rabbit.status = RabbitStatus::Eating {
                            tile: rabbit.pos,
                            since: now,
                        };
                        continue;
                    }
                    if now < rabbit.next_hop {
                        continue;
                    }
                    rabbit.next_hop = now + Duration::from_secs_f32(RABBIT_HOP_SECS);
                    let target = grid.nearest(rabbit.pos, |_, t| t.crop.is_some());
                    rabbit.pos = match target {
                        Some(target) => step_toward(rabbit.pos, target),
                        None => random_hop(grid, rabbit.pos, rng),
                    };
                }
            }
        }
        eaten
    }
}

fn step_toward(from: GridPos, to: GridPos) -> GridPos {
    (from.0 + (to.0 - from.0).signum(), from.1 + (to.1 - from.1).signum())
}

fn random_hop(grid: &Grid, from: GridPos, rng: &mut impl Rng) -> GridPos {
    let next = (from.0 + rng.gen_range(-1..=1), from.1 + rng.gen_range(-1..=1));
    if grid.in_bounds(next) {
        next
    } else {
        from
    }
}

fn edge_tile(grid: &Grid, rng: &mut impl Rng) -> GridPos {
    let (w, h) = (grid.width(), grid.height());
    match rng.gen_range(0..4) {
        0 => (rng.gen_range(0..w), 0),
        1 => (rng.gen_range(0..w), h - 1),
        2 => (0, rng.gen_range(0..h)),
        _ => (w - 1, rng.gen_range(0..h)),
    }
}
