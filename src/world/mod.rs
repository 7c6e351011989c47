//! World domain — zones and the buildings inside them.
//!
//! A zone is an independent simulation domain: its own grid, farmer, task
//! queue, bots, rabbits and warehouse. Nothing crosses zone boundaries except
//! money, which lives in the ledger.
//!
//! Responsible for:
//! - Zone state and building lookups
//! - Placing and relocating buildings (`buildings.rs`)
//! - Supercharger / hopper upgrades on the zone's bots
//! - Reporting completed construction

use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bots::Bot;
use crate::economy::Warehouse;
use crate::farming::Farmer;
use crate::grid::{Grid, Theme};
use crate::sim::{LastTickReport, Simulation};
use crate::shared::*;
use crate::wildlife::Warren;

pub mod buildings;

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PlaceBuildingEvent>()
            .add_event::<RelocateBuildingEvent>()
            .add_event::<BuildingCompletedEvent>()
            .add_systems(
                Update,
                (handle_place_building, handle_relocate_building).in_set(SimSet::Requests),
            )
            .add_systems(Update, publish_completed_buildings.in_set(SimSet::Report));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct PlaceBuildingEvent {
    pub kind: BuildingKind,
    pub zone: ZoneId,
    pub tile: GridPos,
}

#[derive(Event, Debug, Clone)]
pub struct RelocateBuildingEvent {
    pub kind: BuildingKind,
    pub zone: ZoneId,
    pub to: GridPos,
}

#[derive(Event, Debug, Clone)]
pub struct BuildingCompletedEvent {
    pub zone: ZoneId,
    pub kind: BuildingKind,
    pub tile: GridPos,
}

// ═══════════════════════════════════════════════════════════════════════
// ZONE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub owned: bool,
    pub theme: Theme,
    pub grid: Grid,
    /// Every building in the zone, finished or not. At most one per kind.
    pub buildings: BTreeMap<BuildingKind, GridPos>,
    pub warehouse: Warehouse,
    pub farmer: Farmer,
    pub current_task: Option<Task>,
    pub task_queue: VecDeque<Task>,
    /// Sorted by (kind, id): the per-tick processing order.
    pub bots: Vec<Bot>,
    pub rabbits: Warren,
}

impl Zone {
    pub fn new(id: ZoneId, grid: Grid, theme: Theme, owned: bool) -> Self {
        let center = grid.center();
        Self {
            id,
            owned,
            theme,
            grid,
            buildings: BTreeMap::new(),
            warehouse: Warehouse::default(),
            farmer: Farmer::new(center),
            current_task: None,
            task_queue: VecDeque::new(),
            bots: Vec::new(),
            rabbits: Warren::default(),
        }
    }

    /// Position of a finished building. Buildings under construction are not
    /// usable and do not count.
    pub fn site(&self, kind: BuildingKind) -> Option<GridPos> {
        let pos = *self.buildings.get(&kind)?;
        let tile = self.grid.get(pos)?;
        (tile.building() == Some(kind) && tile.construction.is_none()).then_some(pos)
    }

    /// All finished buildings.
    pub fn sites(&self) -> BTreeMap<BuildingKind, GridPos> {
        BuildingKind::ALL
            .iter()
            .filter_map(|&kind| self.site(kind).map(|pos| (kind, pos)))
            .collect()
    }

    pub fn bot(&self, id: BotId) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id == id)
    }

    pub fn bot_count(&self, kind: BotKind) -> usize {
        self.bots.iter().filter(|b| b.kind() == kind).count()
    }

    /// Supercharger and hopper flags follow the finished buildings in the zone.
    pub fn refresh_upgrades(&mut self) {
        let supercharged = self.site(BuildingKind::Supercharger).is_some();
        let hopper = self.site(BuildingKind::Hopper).is_some();
        for bot in self.bots.iter_mut() {
            let takes_hopper = bot.kind().takes_hopper();
            bot.chassis.supercharged = supercharged;
            bot.chassis.hopper_upgrade = hopper && takes_hopper;
        }
    }

    pub(crate) fn insert_bot(&mut self, bot: Bot) {
        self.bots.push(bot);
        self.bots.sort_by_key(|b| (b.kind(), b.id));
        self.refresh_upgrades();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

fn handle_place_building(
    mut events: EventReader<PlaceBuildingEvent>,
    mut sim: ResMut<Simulation>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        if let Err(error) = sim.place_building(ev.kind, ev.zone, ev.tile) {
            info!("[World] Cannot place {:?} at {:?}: {}", ev.kind, ev.tile, error);
            rejected.send(RequestRejectedEvent {
                request: format!("place {:?}", ev.kind),
                error,
            });
        }
    }
}

fn handle_relocate_building(
    mut events: EventReader<RelocateBuildingEvent>,
    mut sim: ResMut<Simulation>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        if let Err(error) = sim.relocate_building(ev.kind, ev.zone, ev.to) {
            info!("[World] Cannot move {:?} to {:?}: {}", ev.kind, ev.to, error);
            rejected.send(RequestRejectedEvent {
                request: format!("relocate {:?}", ev.kind),
                error,
            });
        }
    }
}

fn publish_completed_buildings(
    report: Res<LastTickReport>,
    mut writer: EventWriter<BuildingCompletedEvent>,
) {
    if !report.is_changed() {
        return;
    }
    for &(zone, kind, tile) in &report.0.completed_buildings {
        writer.send(BuildingCompletedEvent { zone, kind, tile });
    }
}
