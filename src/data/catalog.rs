//! Shop catalogue: bot and building prices, refunds, ownership caps.

use std::time::Duration;

use crate::shared::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotSpec {
    pub kind: BotKind,
    pub display_name: &'static str,
    pub cost: u64,
    /// Percentage of `cost` returned when the bot is sold.
    pub refund_percent: u64,
    pub max_per_zone: usize,
}

impl BotSpec {
    pub fn refund(&self) -> u64 {
        self.cost * self.refund_percent / 100
    }
}

pub fn bot_spec(kind: BotKind) -> BotSpec {
    let (display_name, cost, refund_percent, max_per_zone) = match kind {
        BotKind::Water => ("Water Bot", 500, 75, 4),
        BotKind::Harvest => ("Harvest Bot", 750, 75, 4),
        BotKind::Seed => ("Seed Bot", 600, 75, 3),
        BotKind::Transport => ("Transport Bot", 1_000, 70, 2),
        BotKind::Demolish => ("Demolish Bot", 800, 75, 2),
        BotKind::Hunter => ("Hunter Bot", 900, 75, 2),
        BotKind::Fertilizer => ("Fertilizer Bot", 1_200, 70, 1),
    };
    BotSpec {
        kind,
        display_name,
        cost,
        refund_percent,
        max_per_zone,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingSpec {
    pub kind: BuildingKind,
    pub cost: u64,
    pub build_time: Duration,
}

pub fn building_spec(kind: BuildingKind) -> BuildingSpec {
    let (cost, secs) = match kind {
        BuildingKind::Well => (400, 5),
        BuildingKind::Garage => (300, 5),
        BuildingKind::Supercharger => (2_500, 10),
        BuildingKind::Hopper => (1_500, 8),
        BuildingKind::FertilizerDepot => (900, 6),
        BuildingKind::Warehouse => (600, 6),
        BuildingKind::ExportDock => (800, 6),
    };
    BuildingSpec {
        kind,
        cost,
        build_time: Duration::from_secs(secs),
    }
}

pub const SPRINKLER_COST: u64 = 50;
