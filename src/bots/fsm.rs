//! The four-state skeleton every bot kind runs, and the two-phase tick that
//! drives a zone's bots.
//!
//! Phase 1: each bot, in (kind, id) order, advances its FSM against a
//! read-only [`ZoneView`] and may produce one [`Intent`].
//! Phase 2: intents are applied to the zone in the same order. A tile changes
//! at most once per tick; a later intent on a touched tile, or one whose
//! precondition no longer holds, is rejected and the bot re-discovers.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::economy::{Ledger, Warehouse};
use crate::grid::{Grid, Motion};
use crate::market::Market;
use crate::shared::*;
use crate::wildlife::Warren;
use crate::world::Zone;

use super::{Bot, Chassis, Stall};

// ═══════════════════════════════════════════════════════════════════════
// ACTIVITY
// ═══════════════════════════════════════════════════════════════════════

/// `Idle → Traveling → Acting → Idle`, with `Returning` taking an idle bot to
/// the garage. `E` is the kind's errand type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Activity<E> {
    Idle,
    Traveling { motion: Motion, errand: E },
    Acting { errand: E, started: Duration, duration: Duration },
    Returning { motion: Motion },
}

impl<E> Default for Activity<E> {
    fn default() -> Self {
        Activity::Idle
    }
}

impl<E> Activity<E> {
    pub fn errand(&self) -> Option<&E> {
        match self {
            Activity::Traveling { errand, .. } | Activity::Acting { errand, .. } => Some(errand),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Activity::Idle)
    }

    /// 0.0..=1.0 while acting.
    pub fn progress(&self, now: Duration) -> Option<f32> {
        match self {
            Activity::Acting { started, duration, .. } => {
                if duration.is_zero() {
                    return Some(1.0);
                }
                let elapsed = now.saturating_sub(*started).as_secs_f32();
                Some((elapsed / duration.as_secs_f32()).min(1.0))
            }
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// INTENTS & OUTCOMES
// ═══════════════════════════════════════════════════════════════════════

/// A world mutation a bot wants once its action is done.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Water(GridPos),
    Fertilize(GridPos),
    Harvest(GridPos),
    Clear(GridPos),
    Plant {
        tile: GridPos,
        crop: CropKind,
        auto_buy: bool,
    },
    Deposit(Vec<CropItem>),
    /// Take up to `max` items; `crops == None` accepts any crop.
    Load {
        max: usize,
        crops: Option<BTreeSet<CropKind>>,
    },
    Sell(Vec<CropItem>),
    Capture {
        rabbit: RabbitId,
        escort_to: GridPos,
    },
}

impl Intent {
    /// The tile this intent mutates, if it mutates one.
    pub fn tile(&self) -> Option<GridPos> {
        match self {
            Intent::Water(t) | Intent::Fertilize(t) | Intent::Harvest(t) | Intent::Clear(t) => {
                Some(*t)
            }
            Intent::Plant { tile, .. } => Some(*tile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    Harvested(CropItem),
    Deposited { leftover: Vec<CropItem> },
    Loaded(Vec<CropItem>),
    Captured { escort_to: GridPos },
    Rejected(String),
}

// ═══════════════════════════════════════════════════════════════════════
// BEHAVIOR
// ═══════════════════════════════════════════════════════════════════════

pub enum Discovery<E> {
    Work { errand: E, at: GridPos },
    Nothing,
    Stalled(Stall),
}

pub enum Arrival {
    /// Start acting for this base duration (halved when supercharged).
    Act(Duration),
    /// Complete on the spot.
    Instant,
    Abandon,
}

/// Where a moving errand's destination is now.
pub enum Tracking {
    Fixed,
    MovedTo(GridPos),
    Lost,
}

/// Something a bot may reserve so no other bot of the zone targets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Claim {
    Tile(GridPos),
    Rabbit(RabbitId),
}

#[derive(Debug, Clone, Default)]
pub struct Claims(BTreeSet<Claim>);

impl Claims {
    pub fn insert(&mut self, claim: Claim) {
        self.0.insert(claim);
    }

    pub fn tile(&self, pos: GridPos) -> bool {
        self.0.contains(&Claim::Tile(pos))
    }

    pub fn rabbit(&self, id: RabbitId) -> bool {
        self.0.contains(&Claim::Rabbit(id))
    }
}

/// Kind-specific half of a bot. The driver in this module owns the state
/// transitions; implementations only answer questions about work.
pub trait Behavior {
    type Errand: Clone + std::fmt::Debug;

    fn activity(&self) -> &Activity<Self::Errand>;
    fn activity_mut(&mut self) -> &mut Activity<Self::Errand>;

    fn discover(&mut self, chassis: &Chassis, view: &ZoneView, claims: &Claims)
        -> Discovery<Self::Errand>;

    fn arrive(&mut self, errand: &Self::Errand, chassis: &Chassis, view: &ZoneView) -> Arrival;

    fn complete(&mut self, errand: &Self::Errand, chassis: &Chassis, view: &ZoneView)
        -> Option<Intent>;

    /// Takes the result of the intent produced by `complete`. May hand back a
    /// follow-up errand to travel to straight away.
    fn resolve(
        &mut self,
        errand: Self::Errand,
        intent: Intent,
        outcome: &Outcome,
        chassis: &Chassis,
    ) -> Option<(Self::Errand, GridPos)>;

    fn claim(errand: &Self::Errand) -> Option<Claim>;

    fn track(&self, _errand: &Self::Errand, _view: &ZoneView) -> Tracking {
        Tracking::Fixed
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ZONE VIEW
// ═══════════════════════════════════════════════════════════════════════

/// Everything a bot may read while deciding. Borrowed for phase 1 only.
pub struct ZoneView<'a> {
    pub zone: ZoneId,
    pub now: Duration,
    pub grid: &'a Grid,
    /// Finished buildings only.
    pub sites: BTreeMap<BuildingKind, GridPos>,
    pub warehouse: &'a Warehouse,
    pub rabbits: &'a Warren,
    pub market: &'a Market,
    /// Money and seed stock, read-only until phase 2.
    pub ledger: &'a Ledger,
}

impl<'a> ZoneView<'a> {
    pub fn new(zone: &'a Zone, market: &'a Market, ledger: &'a Ledger, now: Duration) -> Self {
        Self {
            zone: zone.id,
            now,
            grid: &zone.grid,
            sites: zone.sites(),
            warehouse: &zone.warehouse,
            rabbits: &zone.rabbits,
            market,
            ledger,
        }
    }

    pub fn site(&self, kind: BuildingKind) -> Option<GridPos> {
        self.sites.get(&kind).copied()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// DRIVER
// ═══════════════════════════════════════════════════════════════════════

/// One FSM step for one bot. Returns the intent of an action that just
/// finished; the bot then waits in `Acting` until [`settle`] runs.
pub(crate) fn advance<B: Behavior>(
    behavior: &mut B,
    chassis: &mut Chassis,
    view: &ZoneView,
    claims: &mut Claims,
) -> Option<Intent> {
    let now = view.now;
    let current = std::mem::take(behavior.activity_mut());

    let (next, intent) = match current {
        Activity::Idle => (seek(behavior, chassis, view, claims), None),

        Activity::Returning { motion } => {
            chassis.pos = motion.cell_at(now);
            match behavior.discover(chassis, view, claims) {
                Discovery::Work { errand, at } => (depart(chassis, claims, errand, at, now, B::claim), None),
                Discovery::Stalled(stall) => {
                    mark_stalled(chassis, stall);
                    (Activity::Idle, None)
                }
                Discovery::Nothing if motion.arrived(now) => {
                    chassis.pos = motion.to;
                    chassis.parked = true;
                    debug!("[Bots] Parked at {:?}", motion.to);
                    (Activity::Idle, None)
                }
                Discovery::Nothing => (Activity::Returning { motion }, None),
            }
        }

        Activity::Traveling { mut motion, errand } => {
            chassis.pos = motion.cell_at(now);
            match behavior.track(&errand, view) {
                Tracking::Lost => {
                    debug!("[Bots] Lost track of {:?}", errand);
                    return None;
                }
                Tracking::MovedTo(pos) if pos != motion.to => {
                    motion = Motion::new(chassis.pos, pos, now, chassis.speed());
                }
                _ => {}
            }

            if !motion.arrived(now) {
                (Activity::Traveling { motion, errand }, None)
            } else {
                chassis.pos = motion.to;
                match behavior.arrive(&errand, chassis, view) {
                    Arrival::Act(base) => (
                        Activity::Acting {
                            errand,
                            started: now,
                            duration: chassis.scaled(base),
                        },
                        None,
                    ),
                    Arrival::Instant => finish(behavior, chassis, view, errand, now),
                    Arrival::Abandon => (Activity::Idle, None),
                }
            }
        }

        Activity::Acting {
            errand,
            started,
            duration,
        } => {
            if now >= started + duration {
                finish(behavior, chassis, view, errand, now)
            } else {
                (
                    Activity::Acting {
                        errand,
                        started,
                        duration,
                    },
                    None,
                )
            }
        }
    };

    *behavior.activity_mut() = next;
    intent
}

fn seek<B: Behavior>(
    behavior: &mut B,
    chassis: &mut Chassis,
    view: &ZoneView,
    claims: &mut Claims,
) -> Activity<B::Errand> {
    match behavior.discover(chassis, view, claims) {
        Discovery::Work { errand, at } => depart(chassis, claims, errand, at, view.now, B::claim),
        Discovery::Stalled(stall) => {
            mark_stalled(chassis, stall);
            Activity::Idle
        }
        Discovery::Nothing => match view.site(BuildingKind::Garage) {
            Some(garage) if chassis.pos == garage => {
                chassis.stall = None;
                chassis.parked = true;
                Activity::Idle
            }
            Some(garage) => {
                chassis.stall = None;
                chassis.parked = false;
                Activity::Returning {
                    motion: Motion::new(chassis.pos, garage, view.now, chassis.speed()),
                }
            }
            None => {
                mark_stalled(chassis, Stall::UnreachableResource(BuildingKind::Garage));
                Activity::Idle
            }
        },
    }
}

fn depart<E>(
    chassis: &mut Chassis,
    claims: &mut Claims,
    errand: E,
    at: GridPos,
    now: Duration,
    claim: fn(&E) -> Option<Claim>,
) -> Activity<E> {
    if let Some(c) = claim(&errand) {
        claims.insert(c);
    }
    chassis.stall = None;
    chassis.parked = false;
    Activity::Traveling {
        motion: Motion::new(chassis.pos, at, now, chassis.speed()),
        errand,
    }
}

fn finish<B: Behavior>(
    behavior: &mut B,
    chassis: &mut Chassis,
    view: &ZoneView,
    errand: B::Errand,
    now: Duration,
) -> (Activity<B::Errand>, Option<Intent>) {
    match behavior.complete(&errand, chassis, view) {
        Some(intent) => (
            Activity::Acting {
                errand,
                started: now,
                duration: Duration::ZERO,
            },
            Some(intent),
        ),
        None => (Activity::Idle, None),
    }
}

fn mark_stalled(chassis: &mut Chassis, stall: Stall) {
    if chassis.stall != Some(stall) {
        info!("[Bots] Stalled at {:?}: {:?}", chassis.pos, stall);
    }
    chassis.stall = Some(stall);
    chassis.parked = false;
}

/// Hands the outcome of an intent back to the bot that produced it.
pub(crate) fn settle<B: Behavior>(
    behavior: &mut B,
    chassis: &mut Chassis,
    intent: Intent,
    outcome: &Outcome,
    now: Duration,
) {
    let errand = match std::mem::take(behavior.activity_mut()) {
        Activity::Acting { errand, .. } => errand,
        other => {
            *behavior.activity_mut() = other;
            return;
        }
    };
    if let Outcome::Rejected(reason) = outcome {
        debug!("[Bots] {:?} rejected: {}", errand, reason);
    }
    if let Some((next, at)) = behavior.resolve(errand, intent, outcome, chassis) {
        *behavior.activity_mut() = Activity::Traveling {
            motion: Motion::new(chassis.pos, at, now, chassis.speed()),
            errand: next,
        };
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ZONE STEP
// ═══════════════════════════════════════════════════════════════════════

/// Intent effects need the ledger and market as well as the zone.
pub(crate) struct Effects<'a> {
    pub ledger: &'a mut Ledger,
    pub market: &'a Market,
    pub now: Duration,
    pub sales: &'a mut Vec<SaleRecord>,
}

/// Rejections and newly raised stalls from one zone step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotStepReport {
    pub rejected: Vec<(BotId, String)>,
    pub stalls: Vec<(BotId, Stall)>,
}

/// Runs both phases for every bot in `zone`. `touched` holds tiles already
/// changed this tick (by the farmer).
pub(crate) fn step_zone(
    zone: &mut Zone,
    effects: &mut Effects,
    mut touched: BTreeSet<GridPos>,
) -> BotStepReport {
    let mut bots = std::mem::take(&mut zone.bots);
    let mut report = BotStepReport::default();

    let before: Vec<Option<Stall>> = bots.iter().map(|b| b.chassis.stall).collect();

    let intents: Vec<Option<Intent>> = {
        let view = ZoneView::new(zone, effects.market, &*effects.ledger, effects.now);
        let mut claims = Claims::default();
        for bot in &bots {
            if let Some(c) = bot.claim() {
                claims.insert(c);
            }
        }
        if let Some(task) = &zone.current_task {
            claims.insert(Claim::Tile(task.target));
        }
        bots.iter_mut()
            .map(|bot| bot.advance(&view, &mut claims))
            .collect()
    };

    for (bot, intent) in bots.iter_mut().zip(intents) {
        let Some(intent) = intent else { continue };
        let outcome = apply(zone, effects, &mut touched, &bot.chassis, &intent);
        if let Outcome::Rejected(reason) = &outcome {
            report.rejected.push((bot.id, reason.clone()));
        }
        bot.settle(intent, &outcome, effects.now);
    }

    for (bot, was) in bots.iter().zip(before) {
        if let Some(stall) = bot.chassis.stall {
            if was != Some(stall) {
                report.stalls.push((bot.id, stall));
            }
        }
    }

    zone.bots = bots;
    report
}

fn apply(
    zone: &mut Zone,
    effects: &mut Effects,
    touched: &mut BTreeSet<GridPos>,
    chassis: &Chassis,
    intent: &Intent,
) -> Outcome {
    let reject = |why: &str| Outcome::Rejected(why.to_string());

    if let Some(tile) = intent.tile() {
        if !touched.insert(tile) {
            return reject("tile already changed this tick");
        }
    }

    match intent {
        Intent::Water(tile) => {
            if zone.grid.water(*tile) {
                Outcome::Applied
            } else {
                reject("nothing to water")
            }
        }
        Intent::Fertilize(tile) => {
            if zone.grid.fertilize(*tile) {
                Outcome::Applied
            } else {
                reject("nothing to fertilize")
            }
        }
        Intent::Harvest(tile) => match zone.grid.harvest(*tile) {
            Some(item) => Outcome::Harvested(item),
            None => reject("nothing ripe"),
        },
        Intent::Clear(tile) => {
            if zone.grid.clear_obstacle(*tile) {
                Outcome::Applied
            } else {
                reject("nothing to clear")
            }
        }
        Intent::Plant {
            tile,
            crop,
            auto_buy,
        } => {
            if !zone.grid.get(*tile).is_some_and(|t| t.is_plantable()) {
                return reject("not plantable");
            }
            if *auto_buy {
                let price = effects.market.seed_price(*crop) as u64;
                if let Err(e) = effects.ledger.spend(price, "seeds") {
                    return Outcome::Rejected(e.to_string());
                }
            } else if !effects.ledger.take_seed(*crop) {
                return reject("no seeds in stock");
            }
            zone.grid.plant(*tile, *crop);
            Outcome::Applied
        }
        Intent::Deposit(items) => {
            if zone.site(BuildingKind::Warehouse) != Some(chassis.pos) {
                return reject("not at the warehouse");
            }
            let leftover = zone.warehouse.store(items.iter().copied());
            Outcome::Deposited { leftover }
        }
        Intent::Load { max, crops } => {
            if zone.site(BuildingKind::Warehouse) != Some(chassis.pos) {
                return reject("not at the warehouse");
            }
            let items = zone
                .warehouse
                .take(*max, |c| crops.as_ref().map_or(true, |set| set.contains(&c)));
            if items.is_empty() {
                reject("nothing to load")
            } else {
                Outcome::Loaded(items)
            }
        }
        Intent::Sell(items) => {
            if zone.site(BuildingKind::ExportDock) != Some(chassis.pos) {
                return reject("not at the export dock");
            }
            let records = effects
                .ledger
                .settle_batch(items, effects.market, Some(zone.id), effects.now);
            effects.sales.extend(records);
            Outcome::Applied
        }
        Intent::Capture { rabbit, escort_to } => match zone.rabbits.remove(*rabbit) {
            Some(_) => {
                info!("[Bots] {} captured in zone {:?}", rabbit, zone.id);
                Outcome::Captured {
                    escort_to: *escort_to,
                }
            }
            None => reject("rabbit is gone"),
        },
    }
}

impl Bot {
    fn advance(&mut self, view: &ZoneView, claims: &mut Claims) -> Option<Intent> {
        let chassis = &mut self.chassis;
        match &mut self.role {
            super::BotRole::Water(b) => advance(b, chassis, view, claims),
            super::BotRole::Harvest(b) => advance(b, chassis, view, claims),
            super::BotRole::Seed(b) => advance(b, chassis, view, claims),
            super::BotRole::Transport(b) => advance(b, chassis, view, claims),
            super::BotRole::Demolish(b) => advance(b, chassis, view, claims),
            super::BotRole::Hunter(b) => advance(b, chassis, view, claims),
            super::BotRole::Fertilizer(b) => advance(b, chassis, view, claims),
        }
    }

    fn settle(&mut self, intent: Intent, outcome: &Outcome, now: Duration) {
        let chassis = &mut self.chassis;
        match &mut self.role {
            super::BotRole::Water(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Harvest(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Seed(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Transport(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Demolish(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Hunter(b) => settle(b, chassis, intent, outcome, now),
            super::BotRole::Fertilizer(b) => settle(b, chassis, intent, outcome, now),
        }
    }

    /// What this bot currently has reserved.
    pub fn claim(&self) -> Option<Claim> {
        use super::BotRole::*;
        match &self.role {
            Water(b) => b.activity().errand().and_then(super::water::WaterBot::claim),
            Harvest(b) => b.activity().errand().and_then(super::harvest::HarvestBot::claim),
            Seed(b) => b.activity().errand().and_then(super::seed::SeedBot::claim),
            Transport(b) => b.activity().errand().and_then(super::transport::TransportBot::claim),
            Demolish(b) => b.activity().errand().and_then(super::demolish::DemolishBot::claim),
            Hunter(b) => b.activity().errand().and_then(super::hunter::HunterBot::claim),
            Fertilizer(b) => b.activity().errand().and_then(super::fertilizer::FertilizerBot::claim),
        }
    }
}
