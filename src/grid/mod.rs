//! Grid & tile store — one per zone.
//!
//! Owns terrain, crop and building state for every tile. All tile mutations go
//! through the methods here so the one-of {obstacle, crop, building} invariant
//! holds and `version` bumps on every change.

mod motion;

pub use motion::Motion;

use std::time::Duration;

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::crop_def;
use crate::shared::*;

/// Growth multiplier while a crop is watered today.
pub const WATERED_GROWTH_BONUS: f32 = 0.25;
/// Growth multiplier on fertilized crops (+50%).
pub const FERTILIZER_GROWTH_MULTIPLIER: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    Meadow,
    Orchard,
    Quarry,
}

impl Theme {
    /// Chances (rock, tree, decoration) per tile when generating terrain.
    fn scatter(self) -> (f64, f64, f64) {
        match self {
            Theme::Meadow => (0.04, 0.04, 0.03),
            Theme::Orchard => (0.02, 0.12, 0.02),
            Theme::Quarry => (0.14, 0.02, 0.04),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    version: u64,
}

impl Grid {
    /// An all-grass grid.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![Tile::new(Terrain::Grass); (width * height) as usize],
            version: 0,
        }
    }

    /// A grid with rocks, trees and decoration scattered according to `theme`.
    pub fn generate(width: i32, height: i32, theme: Theme, rng: &mut impl Rng) -> Self {
        let mut grid = Self::new(width, height);
        let (rock, tree, decoration) = theme.scatter();
        for tile in grid.tiles.iter_mut() {
            let roll: f64 = rng.gen();
            tile.terrain = if roll < rock {
                Terrain::Rock
            } else if roll < rock + tree {
                Terrain::Tree
            } else if roll < rock + tree + decoration {
                Terrain::Decoration
            } else {
                Terrain::Grass
            };
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Bumps on every tile mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.0 >= 0 && pos.1 >= 0 && pos.0 < self.width && pos.1 < self.height
    }

    pub fn center(&self) -> GridPos {
        (self.width / 2, self.height / 2)
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.1 * self.width + pos.0) as usize)
    }

    pub fn get(&self, pos: GridPos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    fn modify<R>(&mut self, pos: GridPos, f: impl FnOnce(&mut Tile) -> Option<R>) -> Option<R> {
        let i = self.index(pos)?;
        let result = f(&mut self.tiles[i]);
        if result.is_some() {
            self.version += 1;
        }
        result
    }

    /// Row-major iteration over every tile.
    pub fn tiles(&self) -> impl Iterator<Item = (GridPos, &Tile)> {
        let width = self.width;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, t)| ((i as i32 % width, i as i32 / width), t))
    }

    pub fn crop(&self, pos: GridPos) -> Option<&CropState> {
        self.get(pos).and_then(|t| t.crop.as_ref())
    }

    pub fn has_crops(&self) -> bool {
        self.tiles.iter().any(|t| t.crop.is_some())
    }

    /// Nearest tile to `from` satisfying `pred`. Ties break row-major.
    pub fn nearest(
        &self,
        from: GridPos,
        mut pred: impl FnMut(GridPos, &Tile) -> bool,
    ) -> Option<GridPos> {
        let mut best: Option<(i64, GridPos)> = None;
        for (pos, tile) in self.tiles() {
            if !pred(pos, tile) {
                continue;
            }
            let d = distance_sq(from, pos);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, pos));
            }
        }
        best.map(|(_, pos)| pos)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Overwrites the terrain of a tile, dropping anything that was on it.
    pub fn set_terrain(&mut self, pos: GridPos, terrain: Terrain) -> bool {
        self.modify(pos, |tile| {
            *tile = Tile::new(terrain);
            Some(())
        })
        .is_some()
    }

    /// Rock/tree → cleared dirt.
    pub fn clear_obstacle(&mut self, pos: GridPos) -> bool {
        self.modify(pos, |tile| {
            if !tile.is_obstacle() {
                return None;
            }
            tile.terrain = Terrain::Dirt;
            tile.cleared = true;
            Some(())
        })
        .is_some()
    }

    pub fn plant(&mut self, pos: GridPos, kind: CropKind) -> bool {
        self.modify(pos, |tile| {
            if !tile.is_plantable() {
                return None;
            }
            tile.crop = Some(CropState::new(kind));
            Some(())
        })
        .is_some()
    }

    pub fn water(&mut self, pos: GridPos) -> bool {
        self.modify(pos, |tile| {
            let crop = tile.crop.as_mut().filter(|c| !c.watered_today)?;
            crop.watered_today = true;
            Some(())
        })
        .is_some()
    }

    pub fn fertilize(&mut self, pos: GridPos) -> bool {
        self.modify(pos, |tile| {
            let crop = tile.crop.as_mut().filter(|c| !c.fertilized)?;
            crop.fertilized = true;
            Some(())
        })
        .is_some()
    }

    /// Takes a ripe crop off the tile, leaving cleared dirt.
    pub fn harvest(&mut self, pos: GridPos) -> Option<CropItem> {
        self.modify(pos, |tile| {
            if !tile.crop.as_ref().is_some_and(|c| c.is_ripe()) {
                return None;
            }
            let crop = tile.crop.take()?;
            tile.terrain = Terrain::Dirt;
            tile.cleared = true;
            Some(CropItem {
                crop: crop.kind,
                quality: crop.harvest_quality(),
            })
        })
    }

    /// Removes any crop, ripe or not.
    pub fn uproot(&mut self, pos: GridPos) -> Option<CropKind> {
        self.modify(pos, |tile| {
            let crop = tile.crop.take()?;
            tile.terrain = Terrain::Dirt;
            tile.cleared = true;
            Some(crop.kind)
        })
    }

    pub fn place_sprinkler(&mut self, pos: GridPos) -> bool {
        self.modify(pos, |tile| {
            if !tile.is_buildable() {
                return None;
            }
            tile.sprinkler = true;
            Some(())
        })
        .is_some()
    }

    pub fn begin_construction(
        &mut self,
        pos: GridPos,
        kind: BuildingKind,
        now: Duration,
        duration: Duration,
    ) -> bool {
        self.modify(pos, |tile| {
            if !tile.is_buildable() {
                return None;
            }
            tile.terrain = Terrain::Building(kind);
            tile.cleared = true;
            tile.construction = (!duration.is_zero()).then(|| Construction {
                started: now,
                duration,
            });
            Some(())
        })
        .is_some()
    }

    /// Lifts a building off its tile (construction state included) and leaves
    /// cleared dirt behind.
    pub fn take_building(&mut self, pos: GridPos) -> Option<(BuildingKind, Option<Construction>)> {
        self.modify(pos, |tile| {
            let kind = tile.building()?;
            let construction = tile.construction.take();
            tile.terrain = Terrain::Dirt;
            tile.cleared = true;
            Some((kind, construction))
        })
    }

    /// Puts a building lifted by `take_building` back down on `pos`.
    pub fn put_building(
        &mut self,
        pos: GridPos,
        kind: BuildingKind,
        construction: Option<Construction>,
    ) -> bool {
        self.modify(pos, |tile| {
            if !tile.is_buildable() {
                return None;
            }
            tile.terrain = Terrain::Building(kind);
            tile.cleared = true;
            tile.construction = construction;
            Some(())
        })
        .is_some()
    }

    /// Sets growth directly. Used by setup code and tests.
    pub fn set_growth(&mut self, pos: GridPos, growth: f32) -> bool {
        self.modify(pos, |tile| {
            let crop = tile.crop.as_mut()?;
            crop.growth = growth.clamp(0.0, 100.0);
            Some(())
        })
        .is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Time advance
    // ─────────────────────────────────────────────────────────────────────

    /// Grows crops by `dt` and finishes construction whose time is up.
    /// Returns the positions of buildings completed during this advance.
    pub fn advance(&mut self, now: Duration, dt: Duration) -> Vec<GridPos> {
        let secs = dt.as_secs_f32();
        let mut completed = Vec::new();
        let mut changed = false;
        let width = self.width;

        for (i, tile) in self.tiles.iter_mut().enumerate() {
            if let Some(crop) = tile.crop.as_mut() {
                if !crop.is_ripe() && secs > 0.0 {
                    crop.growth = (crop.growth + growth_rate(crop) * secs).min(100.0);
                    changed = true;
                }
            }
            let done = tile
                .construction
                .as_ref()
                .is_some_and(|c| now >= c.started + c.duration);
            if done {
                tile.construction = None;
                completed.push((i as i32 % width, i as i32 / width));
                changed = true;
            }
        }

        if changed {
            self.version += 1;
        }
        completed
    }

    /// Day rollover: everything dries out, then each sprinkler waters the
    /// crops on its four orthogonal neighbours.
    pub fn start_new_day(&mut self) -> usize {
        for tile in self.tiles.iter_mut() {
            if let Some(crop) = tile.crop.as_mut() {
                crop.watered_today = false;
            }
        }

        let sprinklers: Vec<GridPos> = self
            .tiles()
            .filter(|(_, t)| t.sprinkler)
            .map(|(pos, _)| pos)
            .collect();
        let mut watered = 0;
        for (x, y) in sprinklers {
            for pos in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                if self.water(pos) {
                    watered += 1;
                }
            }
        }
        self.version += 1;
        debug!("[Grid] New day: sprinklers watered {} crops", watered);
        watered
    }
}

/// Growth stage points per second for a crop under its current care.
pub fn growth_rate(crop: &CropState) -> f32 {
    let mut rate = 100.0 / crop_def(crop.kind).growth_secs;
    if crop.watered_today {
        rate *= 1.0 + WATERED_GROWTH_BONUS;
    }
    if crop.fertilized {
        rate *= FERTILIZER_GROWTH_MULTIPLIER;
    }
    rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_plant_requires_free_ground() {
        let mut grid = Grid::new(4, 4);
        assert!(grid.plant((1, 1), CropKind::Carrot));
        assert!(!grid.plant((1, 1), CropKind::Wheat), "tile already holds a crop");

        grid.set_terrain((2, 2), Terrain::Rock);
        assert!(!grid.plant((2, 2), CropKind::Carrot));
        assert!(grid.clear_obstacle((2, 2)));
        assert!(grid.plant((2, 2), CropKind::Carrot), "cleared dirt is plantable");
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let mut grid = Grid::new(4, 4);
        assert!(grid.get((4, 0)).is_none());
        assert!(!grid.plant((-1, 0), CropKind::Carrot));
    }

    #[test]
    fn test_harvest_only_ripe_and_resets_to_dirt() {
        let mut grid = Grid::new(3, 3);
        grid.plant((0, 0), CropKind::Tomato);
        assert!(grid.harvest((0, 0)).is_none());

        grid.set_growth((0, 0), 100.0);
        let item = grid.harvest((0, 0)).unwrap();
        assert_eq!(item.crop, CropKind::Tomato);
        assert_eq!(item.quality, 1.0);

        let tile = grid.get((0, 0)).unwrap();
        assert_eq!(tile.terrain, Terrain::Dirt);
        assert!(tile.cleared);
        assert!(tile.crop.is_none());
    }

    #[test]
    fn test_watering_speeds_growth() {
        let mut grid = Grid::new(2, 1);
        grid.plant((0, 0), CropKind::Carrot);
        grid.plant((1, 0), CropKind::Carrot);
        grid.water((1, 0));

        grid.advance(Duration::from_secs(10), Duration::from_secs(10));
        let dry = grid.crop((0, 0)).unwrap().growth;
        let wet = grid.crop((1, 0)).unwrap().growth;
        assert!(wet > dry);
        assert!((wet / dry - 1.25).abs() < 1e-3);
    }

    #[test]
    fn test_fertilizer_multiplies_growth_by_one_and_a_half() {
        let mut crop = CropState::new(CropKind::Corn);
        let base = growth_rate(&crop);
        crop.fertilized = true;
        assert!((growth_rate(&crop) / base - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_growth_caps_at_one_hundred() {
        let mut grid = Grid::new(1, 1);
        grid.plant((0, 0), CropKind::Wheat);
        grid.advance(Duration::from_secs(1_000), Duration::from_secs(1_000));
        assert_eq!(grid.crop((0, 0)).unwrap().stage(), 100);
        assert!(grid.crop((0, 0)).unwrap().is_ripe());
    }

    #[test]
    fn test_construction_completes_after_duration() {
        let mut grid = Grid::new(3, 3);
        assert!(grid.begin_construction((1, 1), BuildingKind::Well, Duration::ZERO, Duration::from_secs(5)));
        assert!(grid.advance(Duration::from_secs(4), Duration::from_secs(4)).is_empty());
        assert_eq!(grid.advance(Duration::from_secs(5), Duration::from_secs(1)), vec![(1, 1)]);
        assert!(grid.get((1, 1)).unwrap().construction.is_none());
    }

    #[test]
    fn test_new_day_resets_water_and_runs_sprinklers() {
        let mut grid = Grid::new(3, 3);
        grid.plant((0, 1), CropKind::Carrot);
        grid.plant((2, 2), CropKind::Carrot);
        grid.water((2, 2));
        grid.place_sprinkler((1, 1));

        let watered = grid.start_new_day();
        assert_eq!(watered, 1);
        assert!(grid.crop((0, 1)).unwrap().watered_today, "next to the sprinkler");
        assert!(!grid.crop((2, 2)).unwrap().watered_today, "diagonal is out of reach");
    }

    #[test]
    fn test_nearest_breaks_ties_row_major() {
        let mut grid = Grid::new(5, 5);
        grid.plant((3, 2), CropKind::Carrot);
        grid.plant((1, 2), CropKind::Carrot);
        let found = grid.nearest((2, 2), |_, t| t.crop.is_some());
        assert_eq!(found, Some((1, 2)));
    }

    #[test]
    fn test_version_bumps_on_mutation_only() {
        let mut grid = Grid::new(2, 2);
        let v0 = grid.version();
        assert!(!grid.water((0, 0)));
        assert_eq!(grid.version(), v0);
        grid.plant((0, 0), CropKind::Carrot);
        assert!(grid.version() > v0);
    }

    #[test]
    fn test_generate_is_deterministic_per_seed() {
        let a = Grid::generate(10, 10, Theme::Quarry, &mut ChaCha8Rng::seed_from_u64(7));
        let b = Grid::generate(10, 10, Theme::Quarry, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_relocated_building_keeps_construction() {
        let mut grid = Grid::new(3, 3);
        grid.begin_construction((0, 0), BuildingKind::Garage, Duration::ZERO, Duration::from_secs(5));
        let (kind, construction) = grid.take_building((0, 0)).unwrap();
        assert!(grid.put_building((2, 2), kind, construction));
        assert_eq!(grid.get((2, 2)).unwrap().building(), Some(BuildingKind::Garage));
        assert!(grid.get((2, 2)).unwrap().construction.is_some());
        assert!(grid.get((0, 0)).unwrap().is_plantable());
    }
}
