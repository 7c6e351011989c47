//! Shared types, errors, events, and states for fieldhands.
//!
//! This is the type contract. Every domain module imports from here.
//! Types that only one domain owns (bots, market, zones) live in that domain.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════
// COORDINATES
// ═══════════════════════════════════════════════════════════════════════

/// A tile coordinate inside one zone grid.
pub type GridPos = (i32, i32);

/// Key of a zone in the world map.
pub type ZoneId = (i32, i32);

/// Squared euclidean distance between two tiles. Used for all "nearest" searches
/// so that ties are exact.
pub fn distance_sq(a: GridPos, b: GridPos) -> i64 {
    let dx = (a.0 - b.0) as i64;
    let dy = (a.1 - b.1) as i64;
    dx * dx + dy * dy
}

/// Euclidean distance in tiles.
pub fn distance(a: GridPos, b: GridPos) -> f32 {
    (distance_sq(a, b) as f32).sqrt()
}

/// Scales a base duration by the supercharge flag (halved when supercharged).
pub fn scaled_duration(base: std::time::Duration, supercharged: bool) -> std::time::Duration {
    if supercharged {
        base / 2
    } else {
        base
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SIMULATION STATE & SCHEDULE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum SimState {
    #[default]
    Running,
    Paused,
}

/// Ordering of the scheduler inside `Update`: collaborator requests are
/// applied first, then the tick runs, then tick results are published.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    Requests,
    Advance,
    Report,
}

// ═══════════════════════════════════════════════════════════════════════
// SEASONS & CROPS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    pub fn next(self) -> Self {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Fall,
            Season::Fall => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Fall => 2,
            Season::Winter => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CropKind {
    Carrot,
    Wheat,
    Tomato,
    Corn,
    Potato,
    Pumpkin,
    Strawberry,
    Melon,
}

impl CropKind {
    pub const ALL: [CropKind; 8] = [
        CropKind::Carrot,
        CropKind::Wheat,
        CropKind::Tomato,
        CropKind::Corn,
        CropKind::Potato,
        CropKind::Pumpkin,
        CropKind::Strawberry,
        CropKind::Melon,
    ];

    pub fn index(self) -> usize {
        match self {
            CropKind::Carrot => 0,
            CropKind::Wheat => 1,
            CropKind::Tomato => 2,
            CropKind::Corn => 3,
            CropKind::Potato => 4,
            CropKind::Pumpkin => 5,
            CropKind::Strawberry => 6,
            CropKind::Melon => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CropKind::Carrot => "carrot",
            CropKind::Wheat => "wheat",
            CropKind::Tomato => "tomato",
            CropKind::Corn => "corn",
            CropKind::Potato => "potato",
            CropKind::Pumpkin => "pumpkin",
            CropKind::Strawberry => "strawberry",
            CropKind::Melon => "melon",
        }
    }
}

impl fmt::Display for CropKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A harvested crop instance. `quality` scales the sale price of this item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropItem {
    pub crop: CropKind,
    pub quality: f32,
}

impl CropItem {
    pub fn new(crop: CropKind) -> Self {
        Self { crop, quality: 1.0 }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TILES
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    Well,
    Garage,
    Supercharger,
    Hopper,
    FertilizerDepot,
    Warehouse,
    ExportDock,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 7] = [
        BuildingKind::Well,
        BuildingKind::Garage,
        BuildingKind::Supercharger,
        BuildingKind::Hopper,
        BuildingKind::FertilizerDepot,
        BuildingKind::Warehouse,
        BuildingKind::ExportDock,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Grass,
    Dirt,
    Rock,
    Tree,
    Building(BuildingKind),
    Decoration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropState {
    pub kind: CropKind,
    /// Growth stage, 0..=100. Ripe at 100.
    pub growth: f32,
    pub watered_today: bool,
    pub fertilized: bool,
}

impl CropState {
    pub fn new(kind: CropKind) -> Self {
        Self {
            kind,
            growth: 0.0,
            watered_today: false,
            fertilized: false,
        }
    }

    pub fn stage(&self) -> u8 {
        self.growth.clamp(0.0, 100.0) as u8
    }

    pub fn is_ripe(&self) -> bool {
        self.growth >= 100.0
    }

    /// Quality yield of the item this crop becomes when harvested.
    pub fn harvest_quality(&self) -> f32 {
        if self.fertilized {
            1.25
        } else {
            1.0
        }
    }
}

/// Construction in progress on a building tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Construction {
    pub started: std::time::Duration,
    pub duration: std::time::Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub cleared: bool,
    pub crop: Option<CropState>,
    pub sprinkler: bool,
    pub construction: Option<Construction>,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            cleared: false,
            crop: None,
            sprinkler: false,
            construction: None,
        }
    }

    /// Rock or tree that has not been cleared yet.
    pub fn is_obstacle(&self) -> bool {
        matches!(self.terrain, Terrain::Rock | Terrain::Tree) && !self.cleared
    }

    pub fn building(&self) -> Option<BuildingKind> {
        match self.terrain {
            Terrain::Building(kind) => Some(kind),
            _ => None,
        }
    }

    /// Grass or cleared dirt with nothing on it.
    pub fn is_plantable(&self) -> bool {
        let ground = match self.terrain {
            Terrain::Grass => true,
            Terrain::Dirt => self.cleared,
            _ => false,
        };
        ground && self.crop.is_none() && !self.sprinkler && self.construction.is_none()
    }

    /// Free ground that a building or sprinkler may be placed on.
    pub fn is_buildable(&self) -> bool {
        matches!(self.terrain, Terrain::Grass | Terrain::Dirt)
            && self.crop.is_none()
            && !self.sprinkler
            && self.construction.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// IDS
// ═══════════════════════════════════════════════════════════════════════

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(TaskId, "task");
id_type!(BotId, "bot");
id_type!(RabbitId, "rabbit");
id_type!(JobId, "job");

// ═══════════════════════════════════════════════════════════════════════
// BOT KINDS
// ═══════════════════════════════════════════════════════════════════════

/// Declaration order is the per-tick processing order of bots in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BotKind {
    Water,
    Harvest,
    Seed,
    Transport,
    Demolish,
    Hunter,
    Fertilizer,
}

impl BotKind {
    pub const ALL: [BotKind; 7] = [
        BotKind::Water,
        BotKind::Harvest,
        BotKind::Seed,
        BotKind::Transport,
        BotKind::Demolish,
        BotKind::Hunter,
        BotKind::Fertilizer,
    ];

    /// Whether a hopper raises this kind's cargo capacity.
    pub fn takes_hopper(self) -> bool {
        matches!(self, BotKind::Harvest | BotKind::Transport | BotKind::Fertilizer)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TASKS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Clear,
    Water,
    Harvest,
    Plant(CropKind),
    Uproot,
    PlaceSprinkler,
    PlaceBuilding(BuildingKind),
    Deposit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub target: GridPos,
    pub zone: ZoneId,
    /// 0..=100
    pub progress: u8,
}

// ═══════════════════════════════════════════════════════════════════════
// SALES
// ═══════════════════════════════════════════════════════════════════════

/// One immutable record per sale transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub crop: CropKind,
    pub quantity: u32,
    pub price_per_unit: u32,
    pub total_revenue: u64,
    /// `None` for manual vendor sales.
    pub zone: Option<ZoneId>,
    pub at: std::time::Duration,
}

// ═══════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityKind {
    TaskQueue,
    SeedJobs,
    JobTiles,
    BotOwnership,
    Basket,
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CapacityKind::TaskQueue => "task queue",
            CapacityKind::SeedJobs => "seed jobs",
            CapacityKind::JobTiles => "job tiles",
            CapacityKind::BotOwnership => "bot ownership",
            CapacityKind::Basket => "basket",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(CapacityKind),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Not found")]
    NotFound,

    #[error("Out of stock: {requested} x {crop} requested, {available} available")]
    OutOfStock {
        crop: CropKind,
        requested: u32,
        available: u32,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown zone: {0:?}")]
    UnknownZone(ZoneId),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// Sent by every request handler whose operation was rejected.
#[derive(Event, Debug, Clone)]
pub struct RequestRejectedEvent {
    pub request: String,
    pub error: SchedulerError,
}
