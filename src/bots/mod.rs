//! Bots domain — autonomous agents that work a zone alongside the farmer.
//!
//! Every kind runs the same skeleton from [`fsm`] and fills in discovery,
//! arrival and completion rules in its own module. The shop operations that
//! create, configure and sell bots live in `economy::shop`; this plugin only
//! routes the shop collaborator's events to them.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::sim::{LastTickReport, Simulation};
use crate::shared::*;

pub mod demolish;
pub mod fertilizer;
pub mod fsm;
pub mod harvest;
pub mod hunter;
pub mod seed;
pub mod transport;
pub mod water;

pub use demolish::DemolishBot;
pub use fertilizer::{FertilizerBot, FertilizerConfig};
pub use fsm::{Activity, Behavior, BotStepReport, Claim, Intent, Outcome, ZoneView};
pub use harvest::HarvestBot;
pub use hunter::{HunterBot, HunterPhase};
pub use seed::{SeedBot, SeedBotJob, SeedConfig, SeedJobSpec};
pub use transport::{SellFlags, SellMode, TransportBot, TransportConfig};
pub use water::WaterBot;

/// Tiles per second, doubled by the supercharger.
pub const BOT_SPEED: f32 = 2.0;

// ═══════════════════════════════════════════════════════════════════════
// BOT
// ═══════════════════════════════════════════════════════════════════════

/// Why an idle bot cannot get on with its work. Observable, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stall {
    /// Out of water/fertilizer (or the warehouse is full) and nothing to
    /// resupply from.
    ResourceExhausted(BuildingKind),
    /// The building this bot needs next does not exist in the zone.
    UnreachableResource(BuildingKind),
}

/// State every bot kind shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chassis {
    /// Authoritative grid cell.
    pub pos: GridPos,
    pub supercharged: bool,
    pub hopper_upgrade: bool,
    pub stall: Option<Stall>,
    /// Idle at the garage; not rendered.
    pub parked: bool,
}

impl Chassis {
    pub fn new(pos: GridPos) -> Self {
        Self {
            pos,
            supercharged: false,
            hopper_upgrade: false,
            stall: None,
            parked: false,
        }
    }

    pub fn speed(&self) -> f32 {
        if self.supercharged {
            BOT_SPEED * 2.0
        } else {
            BOT_SPEED
        }
    }

    pub fn scaled(&self, base: Duration) -> Duration {
        scaled_duration(base, self.supercharged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BotRole {
    Water(WaterBot),
    Harvest(HarvestBot),
    Seed(SeedBot),
    Transport(TransportBot),
    Demolish(DemolishBot),
    Hunter(HunterBot),
    Fertilizer(FertilizerBot),
}

impl BotRole {
    /// A freshly bought bot of `kind` with default settings.
    pub fn new(kind: BotKind) -> Self {
        match kind {
            BotKind::Water => BotRole::Water(WaterBot::default()),
            BotKind::Harvest => BotRole::Harvest(HarvestBot::default()),
            BotKind::Seed => BotRole::Seed(SeedBot::default()),
            BotKind::Transport => BotRole::Transport(TransportBot::default()),
            BotKind::Demolish => BotRole::Demolish(DemolishBot::default()),
            BotKind::Hunter => BotRole::Hunter(HunterBot::default()),
            BotKind::Fertilizer => BotRole::Fertilizer(FertilizerBot::default()),
        }
    }

    pub fn kind(&self) -> BotKind {
        match self {
            BotRole::Water(_) => BotKind::Water,
            BotRole::Harvest(_) => BotKind::Harvest,
            BotRole::Seed(_) => BotKind::Seed,
            BotRole::Transport(_) => BotKind::Transport,
            BotRole::Demolish(_) => BotKind::Demolish,
            BotRole::Hunter(_) => BotKind::Hunter,
            BotRole::Fertilizer(_) => BotKind::Fertilizer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub name: String,
    pub chassis: Chassis,
    pub role: BotRole,
}

impl Bot {
    pub fn kind(&self) -> BotKind {
        self.role.kind()
    }

    pub fn is_parked(&self) -> bool {
        self.chassis.parked
    }

    pub fn is_idle(&self) -> bool {
        match &self.role {
            BotRole::Water(b) => b.activity.is_idle(),
            BotRole::Harvest(b) => b.activity.is_idle(),
            BotRole::Seed(b) => b.activity.is_idle(),
            BotRole::Transport(b) => b.activity.is_idle(),
            BotRole::Demolish(b) => b.activity.is_idle(),
            BotRole::Hunter(b) => b.activity.is_idle(),
            BotRole::Fertilizer(b) => b.activity.is_idle(),
        }
    }

    /// Drops any in-flight action. The bot re-discovers on its next step.
    pub(crate) fn reset_activity(&mut self) {
        match &mut self.role {
            BotRole::Water(b) => b.activity = Activity::Idle,
            BotRole::Harvest(b) => b.activity = Activity::Idle,
            BotRole::Seed(b) => b.activity = Activity::Idle,
            BotRole::Transport(b) => b.activity = Activity::Idle,
            BotRole::Demolish(b) => b.activity = Activity::Idle,
            BotRole::Hunter(b) => b.activity = Activity::Idle,
            BotRole::Fertilizer(b) => b.activity = Activity::Idle,
        }
    }

    /// Crop items the bot is carrying, removed from it.
    pub(crate) fn take_cargo(&mut self) -> Vec<CropItem> {
        match &mut self.role {
            BotRole::Harvest(b) => std::mem::take(&mut b.inventory),
            BotRole::Transport(b) => std::mem::take(&mut b.inventory),
            _ => Vec::new(),
        }
    }
}

/// Settings the shop collaborator may apply to a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BotConfig {
    Seed(SeedConfig),
    Transport(TransportConfig),
    Fertilizer(FertilizerConfig),
}

impl BotConfig {
    pub fn kind(&self) -> BotKind {
        match self {
            BotConfig::Seed(_) => BotKind::Seed,
            BotConfig::Transport(_) => BotKind::Transport,
            BotConfig::Fertilizer(_) => BotKind::Fertilizer,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct BuyBotEvent {
    pub kind: BotKind,
    pub zone: ZoneId,
    pub name: Option<String>,
    pub config: Option<BotConfig>,
}

#[derive(Event, Debug, Clone)]
pub struct SellBotEvent {
    pub bot: BotId,
}

#[derive(Event, Debug, Clone)]
pub struct ConfigureBotEvent {
    pub bot: BotId,
    pub config: BotConfig,
}

#[derive(Event, Debug, Clone)]
pub struct RenameBotEvent {
    pub bot: BotId,
    pub name: String,
}

#[derive(Event, Debug, Clone)]
pub struct BotPurchasedEvent {
    pub bot: BotId,
    pub kind: BotKind,
    pub zone: ZoneId,
}

#[derive(Event, Debug, Clone)]
pub struct BotSoldEvent {
    pub bot: BotId,
    pub refund: u64,
}

#[derive(Event, Debug, Clone)]
pub struct BotStalledEvent {
    pub zone: ZoneId,
    pub bot: BotId,
    pub stall: Stall,
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct BotPlugin;

impl Plugin for BotPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<BuyBotEvent>()
            .add_event::<SellBotEvent>()
            .add_event::<ConfigureBotEvent>()
            .add_event::<RenameBotEvent>()
            .add_event::<BotPurchasedEvent>()
            .add_event::<BotSoldEvent>()
            .add_event::<BotStalledEvent>()
            .add_systems(
                Update,
                (
                    handle_buy_bot,
                    handle_configure_bot,
                    handle_rename_bot,
                    handle_sell_bot,
                )
                    .chain()
                    .in_set(SimSet::Requests),
            )
            .add_systems(Update, publish_stalls.in_set(SimSet::Report));
    }
}

fn reject(writer: &mut EventWriter<RequestRejectedEvent>, request: String, error: SchedulerError) {
    info!("[Bots] {} rejected: {}", request, error);
    writer.send(RequestRejectedEvent { request, error });
}

fn handle_buy_bot(
    mut events: EventReader<BuyBotEvent>,
    mut sim: ResMut<Simulation>,
    mut purchased: EventWriter<BotPurchasedEvent>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        match sim.buy_bot(ev.kind, ev.zone, ev.name.clone(), ev.config.clone()) {
            Ok(bot) => {
                purchased.send(BotPurchasedEvent {
                    bot,
                    kind: ev.kind,
                    zone: ev.zone,
                });
            }
            Err(error) => reject(&mut rejected, format!("buy {:?} bot", ev.kind), error),
        }
    }
}

fn handle_sell_bot(
    mut events: EventReader<SellBotEvent>,
    mut sim: ResMut<Simulation>,
    mut sold: EventWriter<BotSoldEvent>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        match sim.sell_bot(ev.bot) {
            Ok(refund) => {
                sold.send(BotSoldEvent {
                    bot: ev.bot,
                    refund,
                });
            }
            Err(error) => reject(&mut rejected, format!("sell {}", ev.bot), error),
        }
    }
}

fn handle_configure_bot(
    mut events: EventReader<ConfigureBotEvent>,
    mut sim: ResMut<Simulation>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        if let Err(error) = sim.configure_bot(ev.bot, ev.config.clone()) {
            reject(&mut rejected, format!("configure {}", ev.bot), error);
        }
    }
}

fn handle_rename_bot(
    mut events: EventReader<RenameBotEvent>,
    mut sim: ResMut<Simulation>,
    mut rejected: EventWriter<RequestRejectedEvent>,
) {
    for ev in events.read() {
        if let Err(error) = sim.rename_bot(ev.bot, ev.name.clone()) {
            reject(&mut rejected, format!("rename {}", ev.bot), error);
        }
    }
}

fn publish_stalls(report: Res<LastTickReport>, mut writer: EventWriter<BotStalledEvent>) {
    if !report.is_changed() {
        return;
    }
    for &(zone, bot, stall) in &report.0.stalls {
        writer.send(BotStalledEvent { zone, bot, stall });
    }
}
