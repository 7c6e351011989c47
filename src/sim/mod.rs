//! Simulation domain — the scheduler state and its tick.
//!
//! Everything the scheduler owns lives in one [`Simulation`] resource:
//! zones, market, ledger, clock and RNG. Collaborators talk to it through
//! request events that the domain plugins turn into method calls, and
//! listen for the events published from each tick's [`TickReport`].
//!
//! Tick order:
//! 1. market cadence steps, day rollover
//! 2. per zone: crop growth and construction, then rabbits
//! 3. per zone: one farmer transition
//! 4. per zone: bots in (kind, id) order

use std::collections::BTreeSet;
use std::time::Duration;

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::bots::fsm::{step_zone, Effects};
use crate::bots::{Bot, Stall};
use crate::data::SimConfig;
use crate::economy::Ledger;
use crate::farming::FarmerOutcome;
use crate::grid::{Grid, Theme};
use crate::market::{Market, MarketEvent, MarketParams};
use crate::shared::*;
use crate::world::Zone;

/// The zone every new game starts with.
pub const HOME_ZONE: ZoneId = (0, 0);

// ═══════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub(crate) config: SimConfig,
    pub(crate) clock: Duration,
    pub day: u32,
    next_day: Duration,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) next_id: u64,
    /// In creation order. Zone order is the order vendor sales draw stock.
    pub zones: Vec<Zone>,
    pub market: Market,
    pub ledger: Ledger,
}

impl FromWorld for Simulation {
    fn from_world(world: &mut World) -> Self {
        let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
        Simulation::new(config)
    }
}

impl Simulation {
    /// A new game: one owned, empty meadow zone and the starting money.
    pub fn new(config: SimConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let market = Market::new(MarketParams::from_config(&config), Duration::ZERO, &mut rng);
        let home = Zone::new(
            HOME_ZONE,
            Grid::new(config.grid_width, config.grid_height),
            Theme::Meadow,
            true,
        );
        info!(
            "[Sim] New game: {}x{} home zone, {}g",
            config.grid_width, config.grid_height, config.starting_money
        );
        Self {
            ledger: Ledger::new(config.starting_money),
            next_day: config.day_length(),
            day: 1,
            clock: Duration::ZERO,
            next_id: 0,
            zones: vec![home],
            market,
            rng,
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.clock
    }

    pub fn home_zone(&self) -> ZoneId {
        HOME_ZONE
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Adds a zone with generated terrain.
    pub fn add_zone(&mut self, id: ZoneId, theme: Theme, owned: bool) -> SchedulerResult<()> {
        if self.zones.iter().any(|z| z.id == id) {
            return Err(SchedulerError::InvalidTarget(format!(
                "zone {:?} already exists",
                id
            )));
        }
        let grid = Grid::generate(
            self.config.grid_width,
            self.config.grid_height,
            theme,
            &mut self.rng,
        );
        self.zones.push(Zone::new(id, grid, theme, owned));
        info!("[Sim] Added {:?} zone {:?} (owned: {})", theme, id, owned);
        Ok(())
    }

    pub fn zone(&self, id: ZoneId) -> SchedulerResult<&Zone> {
        self.zones
            .iter()
            .find(|z| z.id == id)
            .ok_or(SchedulerError::UnknownZone(id))
    }

    pub fn zone_mut(&mut self, id: ZoneId) -> SchedulerResult<&mut Zone> {
        self.zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or(SchedulerError::UnknownZone(id))
    }

    /// Index of `id`, which must exist and be owned.
    pub(crate) fn owned_zone_index(&self, id: ZoneId) -> SchedulerResult<usize> {
        let index = self
            .zones
            .iter()
            .position(|z| z.id == id)
            .ok_or(SchedulerError::UnknownZone(id))?;
        if !self.zones[index].owned {
            return Err(SchedulerError::InvalidTarget(format!(
                "zone {:?} is not owned",
                id
            )));
        }
        Ok(index)
    }

    pub fn bot(&self, id: BotId) -> Option<&Bot> {
        self.zones.iter().find_map(|z| z.bot(id))
    }

    pub fn bot_mut(&mut self, id: BotId) -> Option<&mut Bot> {
        self.zones
            .iter_mut()
            .find_map(|z| z.bots.iter_mut().find(|b| b.id == id))
    }

    pub fn bots(&self) -> impl Iterator<Item = &Bot> {
        self.zones.iter().flat_map(|z| z.bots.iter())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────

    /// Advances everything by `dt`. Unowned zones are frozen.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        self.clock += dt;
        let now = self.clock;
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };

        report.market_events = self.market.advance(now, &mut self.rng);

        while now >= self.next_day {
            self.day += 1;
            self.next_day += self.config.day_length();
            for zone in self.zones.iter_mut().filter(|z| z.owned) {
                zone.grid.start_new_day();
            }
            info!("[Sim] Day {} begins", self.day);
            report.new_day = Some(self.day);
        }

        let spawn_rate = self.config.rabbit_spawn_rate;
        for zone in self.zones.iter_mut().filter(|z| z.owned) {
            let completed = zone.grid.advance(now, dt);
            if !completed.is_empty() {
                for pos in completed {
                    if let Some(kind) = zone.grid.get(pos).and_then(Tile::building) {
                        info!("[World] {:?} finished at {:?} in zone {:?}", kind, pos, zone.id);
                        report.completed_buildings.push((zone.id, kind, pos));
                    }
                }
                zone.refresh_upgrades();
            }
            let eaten = zone
                .rabbits
                .advance(&mut zone.grid, now, dt, spawn_rate, &mut self.rng);
            report.eaten.extend(eaten.into_iter().map(|tile| (zone.id, tile)));
        }

        for zone in self.zones.iter_mut().filter(|z| z.owned) {
            let mut touched = BTreeSet::new();
            if let Some(outcome) = zone.step_farmer(&mut self.ledger, &self.market, now) {
                if let FarmerOutcome::Completed(task) = &outcome {
                    touched.insert(task.target);
                }
                report.farmer.push((zone.id, outcome));
            }

            let mut effects = Effects {
                ledger: &mut self.ledger,
                market: &self.market,
                now,
                sales: &mut report.sales,
            };
            let step = step_zone(zone, &mut effects, touched);
            let id = zone.id;
            report
                .rejected
                .extend(step.rejected.into_iter().map(|(bot, why)| (id, bot, why)));
            report
                .stalls
                .extend(step.stalls.into_iter().map(|(bot, stall)| (id, bot, stall)));
        }

        report
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TICK REPORT
// ═══════════════════════════════════════════════════════════════════════

/// What happened during one tick. Published as events by the plugins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub now: Duration,
    /// Set when a new day began during this tick.
    pub new_day: Option<u32>,
    pub market_events: Vec<MarketEvent>,
    pub completed_buildings: Vec<(ZoneId, BuildingKind, GridPos)>,
    /// Crops eaten by rabbits.
    pub eaten: Vec<(ZoneId, GridPos)>,
    pub farmer: Vec<(ZoneId, FarmerOutcome)>,
    /// Bot intents refused during apply.
    pub rejected: Vec<(ZoneId, BotId, String)>,
    /// Stalls raised this tick. Ongoing stalls are not repeated.
    pub stalls: Vec<(ZoneId, BotId, Stall)>,
    pub sales: Vec<SaleRecord>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct LastTickReport(pub TickReport);

/// How frame time becomes simulation time.
#[derive(Resource, Debug, Clone)]
pub struct SimSpeed {
    pub scale: f32,
    /// Overrides frame time with a constant step.
    pub fixed_step: Option<Duration>,
}

impl Default for SimSpeed {
    fn default() -> Self {
        Self {
            scale: 1.0,
            fixed_step: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS & PLUGIN
// ═══════════════════════════════════════════════════════════════════════

#[derive(Event, Debug, Clone)]
pub struct MarketNewsEvent(pub MarketEvent);

#[derive(Event, Debug, Clone)]
pub struct DayStartedEvent {
    pub day: u32,
}

#[derive(Event, Debug, Clone)]
pub struct CropEatenEvent {
    pub zone: ZoneId,
    pub tile: GridPos,
}

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimConfig>()
            .init_state::<SimState>()
            .configure_sets(
                Update,
                (SimSet::Requests, SimSet::Advance, SimSet::Report).chain(),
            )
            .init_resource::<Simulation>()
            .init_resource::<SimSpeed>()
            .init_resource::<LastTickReport>()
            .add_event::<RequestRejectedEvent>()
            .add_event::<MarketNewsEvent>()
            .add_event::<DayStartedEvent>()
            .add_event::<CropEatenEvent>()
            .add_systems(
                Update,
                advance_simulation
                    .in_set(SimSet::Advance)
                    .run_if(in_state(SimState::Running)),
            )
            .add_systems(Update, publish_tick.in_set(SimSet::Report));
    }
}

fn advance_simulation(
    time: Res<Time>,
    speed: Res<SimSpeed>,
    mut sim: ResMut<Simulation>,
    mut last: ResMut<LastTickReport>,
) {
    let dt = speed
        .fixed_step
        .unwrap_or_else(|| time.delta().mul_f32(speed.scale.max(0.0)));
    if dt.is_zero() {
        return;
    }
    last.0 = sim.tick(dt);
}

fn publish_tick(
    report: Res<LastTickReport>,
    mut news: EventWriter<MarketNewsEvent>,
    mut days: EventWriter<DayStartedEvent>,
    mut eaten: EventWriter<CropEatenEvent>,
) {
    if !report.is_changed() {
        return;
    }
    for event in &report.0.market_events {
        news.send(MarketNewsEvent(event.clone()));
    }
    if let Some(day) = report.0.new_day {
        days.send(DayStartedEvent { day });
    }
    for &(zone, tile) in &report.0.eaten {
        eaten.send(CropEatenEvent { zone, tile });
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::data::building_spec;

    /// No random epics, no rabbits, no demand swings and plenty of money.
    pub(crate) fn quiet_config() -> SimConfig {
        SimConfig {
            starting_money: 100_000,
            epic_chance: 0.0,
            rabbit_spawn_rate: 0.0,
            market_cadence_secs: 3_600.0,
            high_demand_threshold: 100.0,
            low_demand_threshold: -100.0,
            ..SimConfig::default()
        }
    }

    pub(crate) fn quiet_sim() -> Simulation {
        Simulation::new(quiet_config())
    }

    /// Ticks in 250 ms steps for at least `secs`.
    pub(crate) fn run(sim: &mut Simulation, secs: f32) {
        let steps = (secs / 0.25).ceil() as usize;
        for _ in 0..steps {
            sim.tick(Duration::from_millis(250));
        }
    }

    /// Places `kind` in the home zone and runs until it is finished.
    pub(crate) fn build(sim: &mut Simulation, kind: BuildingKind, tile: GridPos) {
        let home = sim.home_zone();
        sim.place_building(kind, home, tile).unwrap();
        run(sim, building_spec(kind).build_time.as_secs_f32() + 0.5);
        assert_eq!(sim.zone(home).unwrap().site(kind), Some(tile));
    }
}
