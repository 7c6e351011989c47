//! Headless integration tests for Fieldhands.
//!
//! The first half drives `Simulation` directly through its public API. The
//! second half builds a Bevy app on `MinimalPlugins` with every crate plugin
//! and checks that request events come back as outcome events.
//!
//! Run with: `cargo test --test headless`

use std::time::Duration;

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use fieldhands::bots::water::WATER_CAPACITY;
use fieldhands::bots::*;
use fieldhands::data::{building_spec, crop_def, DataPlugin, SimConfig};
use fieldhands::economy::{CropSoldEvent, EconomyPlugin, Ledger, VendorSaleEvent};
use fieldhands::farming::*;
use fieldhands::market::{Market, MarketParams, RANDOM_EPIC_MULTIPLIER};
use fieldhands::save::*;
use fieldhands::shared::*;
use fieldhands::sim::*;
use fieldhands::world::{BuildingCompletedEvent, PlaceBuildingEvent, WorldPlugin};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// No random epics, no rabbits, no demand swings and plenty of money.
fn quiet_config() -> SimConfig {
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

fn run(sim: &mut Simulation, secs: f32) {
    let steps = (secs / 0.25).ceil() as usize;
    for _ in 0..steps {
        sim.tick(Duration::from_millis(250));
    }
}

fn build(sim: &mut Simulation, kind: BuildingKind, tile: GridPos) {
    let home = sim.home_zone();
    sim.place_building(kind, home, tile).unwrap();
    run(sim, building_spec(kind).build_time.as_secs_f32() + 0.5);
    assert_eq!(sim.zone(home).unwrap().site(kind), Some(tile));
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_fourth_task_is_rejected_and_queue_unchanged() {
    let mut sim = Simulation::new(quiet_config());
    let home = sim.home_zone();
    for x in 2..6 {
        sim.zone_mut(home).unwrap().grid.plant((x, 2), CropKind::Carrot);
    }
    for x in 3..6 {
        sim.add_task(home, TaskKind::Water, (x, 2)).unwrap();
    }

    assert_eq!(
        sim.add_task(home, TaskKind::Water, (2, 2)),
        Err(SchedulerError::CapacityExceeded(CapacityKind::TaskQueue))
    );
    assert_eq!(sim.zone(home).unwrap().task_count(), MAX_ZONE_TASKS);
}

#[test]
fn test_water_bot_runs_dry_without_well_and_stays_idle() {
    let mut sim = Simulation::new(quiet_config());
    let home = sim.home_zone();
    sim.zone_mut(home).unwrap().grid.plant((10, 8), CropKind::Carrot);
    sim.zone_mut(home).unwrap().grid.plant((14, 8), CropKind::Carrot);
    let id = sim.buy_bot(BotKind::Water, home, None, None).unwrap();
    if let BotRole::Water(w) = &mut sim.bot_mut(id).unwrap().role {
        w.water_level = 1;
    }

    run(&mut sim, 15.0);
    let zone = sim.zone(home).unwrap();
    let watered = [(10, 8), (14, 8)]
        .iter()
        .filter(|&&t| zone.grid.crop(t).unwrap().watered_today)
        .count();
    assert_eq!(watered, 1);

    let bot = sim.bot(id).unwrap();
    let BotRole::Water(water) = &bot.role else {
        unreachable!()
    };
    assert_eq!(water.water_level, 0);
    assert!(water.activity.is_idle(), "dry bot must not keep traveling");
    assert_eq!(bot.chassis.stall, Some(Stall::ResourceExhausted(BuildingKind::Well)));
    assert_eq!(
        sim.under_provisioned(),
        vec![(home, id, Stall::ResourceExhausted(BuildingKind::Well))]
    );
}

#[test]
fn test_epic_crop_sells_at_five_times_its_price() {
    let mut sim = Simulation::new(quiet_config());
    let base = sim.market.pre_epic_price(CropKind::Corn);
    let now = sim.now();
    sim.market.start_epic(CropKind::Corn, now);

    assert_eq!(crop_def(CropKind::Corn).base_price, 10);
    assert_eq!(sim.market.current_prices[&CropKind::Corn], base * RANDOM_EPIC_MULTIPLIER);
    assert_eq!(sim.market.price(CropKind::Corn), base * 5);
    assert_eq!(
        sim.market.price(CropKind::Wheat),
        sim.market.pre_epic_price(CropKind::Wheat)
    );
}

#[test]
fn test_seed_bot_plants_its_job_then_parks() {
    let mut sim = Simulation::new(quiet_config());
    let home = sim.home_zone();
    build(&mut sim, BuildingKind::Garage, (1, 1));
    let tiles: Vec<GridPos> = (2..22).map(|x| (x, 10)).collect();
    let config = SeedConfig {
        jobs: vec![SeedJobSpec {
            crop: CropKind::Carrot,
            tiles: tiles.clone(),
        }],
        auto_buy_seeds: true,
    };
    let id = sim
        .buy_bot(BotKind::Seed, home, None, Some(BotConfig::Seed(config)))
        .unwrap();

    run(&mut sim, 110.0);
    let zone = sim.zone(home).unwrap();
    for &tile in &tiles {
        assert!(zone.grid.crop(tile).is_some(), "{:?} not planted", tile);
    }
    let bot = sim.bot(id).unwrap();
    assert!(bot.is_idle());
    assert!(bot.is_parked());
    assert_eq!(bot.chassis.pos, (1, 1));
    assert_eq!(bot.chassis.stall, None);
}

#[test]
fn test_batch_sale_credits_exact_revenue() {
    let config = quiet_config();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut market = Market::new(MarketParams::from_config(&config), Duration::ZERO, &mut rng);
    market.current_prices.insert(CropKind::Tomato, 8);
    let mut ledger = Ledger::new(100);

    let records = ledger.settle_batch(
        &[CropItem::new(CropKind::Tomato); 5],
        &market,
        Some((0, 0)),
        Duration::from_secs(3),
    );

    assert_eq!(ledger.money(), 140);
    assert_eq!(records.len(), 1);
    let record = &ledger.sales_history()[0];
    assert_eq!(record.crop, CropKind::Tomato);
    assert_eq!(record.quantity, 5);
    assert_eq!(record.price_per_unit, 8);
    assert_eq!(record.total_revenue, 40);
    assert_eq!(ledger.sales_history().len(), 1);
}

#[test]
fn test_harvest_to_export_pipeline() {
    let mut sim = Simulation::new(quiet_config());
    let home = sim.home_zone();
    build(&mut sim, BuildingKind::Warehouse, (4, 4));
    build(&mut sim, BuildingKind::ExportDock, (20, 4));
    for x in 8..12 {
        let grid = &mut sim.zone_mut(home).unwrap().grid;
        grid.plant((x, 6), CropKind::Wheat);
        grid.set_growth((x, 6), 100.0);
    }
    sim.buy_bot(BotKind::Harvest, home, None, None).unwrap();
    sim.buy_bot(BotKind::Transport, home, None, None).unwrap();
    let money = sim.ledger.money();

    run(&mut sim, 90.0);
    let zone = sim.zone(home).unwrap();
    assert!((8..12).all(|x| zone.grid.crop((x, 6)).is_none()));
    let sold: u32 = sim.ledger.sales_history().iter().map(|r| r.quantity).sum();
    assert_eq!(sold, 4);
    let earned: u64 = sim.ledger.sales_history().iter().map(|r| r.total_revenue).sum();
    assert_eq!(sim.ledger.money(), money + earned);
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin flows
// ─────────────────────────────────────────────────────────────────────────────

/// Everything an event carried over the whole test, in order.
#[derive(Resource)]
struct Seen<E: Event>(Vec<E>);

impl<E: Event> Default for Seen<E> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

fn collect<E: Event + Clone>(mut reader: EventReader<E>, mut seen: ResMut<Seen<E>>) {
    seen.0.extend(reader.read().cloned());
}

trait Watch {
    fn watch<E: Event + Clone>(&mut self) -> &mut Self;
}

impl Watch for App {
    fn watch<E: Event + Clone>(&mut self) -> &mut Self {
        self.init_resource::<Seen<E>>()
            .add_systems(Last, collect::<E>)
    }
}

/// The crate's plugins on a windowless app, stepping 250 ms per update.
fn build_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(StatesPlugin)
        .insert_resource(quiet_config())
        .add_plugins((
            DataPlugin,
            SimulationPlugin,
            FarmingPlugin,
            BotPlugin,
            WorldPlugin,
            EconomyPlugin,
            SavePlugin,
        ))
        .insert_resource(SimSpeed {
            scale: 1.0,
            fixed_step: Some(Duration::from_millis(250)),
        });
    app.watch::<TaskQueuedEvent>()
        .watch::<TaskFinishedEvent>()
        .watch::<RequestRejectedEvent>()
        .watch::<BotPurchasedEvent>()
        .watch::<BotSoldEvent>()
        .watch::<BuildingCompletedEvent>()
        .watch::<CropSoldEvent>()
        .watch::<DayStartedEvent>()
        .watch::<SaveCompleteEvent>()
        .watch::<LoadCompleteEvent>();
    app
}

fn seen<E: Event + Clone>(app: &App) -> Vec<E> {
    app.world().resource::<Seen<E>>().0.clone()
}

fn updates(app: &mut App, n: usize) {
    for _ in 0..n {
        app.update();
    }
}

#[test]
fn test_headless_boot_ticks_the_clock() {
    let mut app = build_test_app();
    updates(&mut app, 8);
    let now = app.world().resource::<Simulation>().now();
    assert!(now >= Duration::from_secs(1), "clock at {:?}", now);
    assert_eq!(app.world().resource::<Simulation>().ledger.money(), 100_000);
}

#[test]
fn test_paused_state_freezes_the_tick() {
    let mut app = build_test_app();
    updates(&mut app, 2);
    app.world_mut()
        .resource_mut::<NextState<SimState>>()
        .set(SimState::Paused);
    app.update();
    let frozen = app.world().resource::<Simulation>().now();
    updates(&mut app, 10);
    assert_eq!(app.world().resource::<Simulation>().now(), frozen);
}

#[test]
fn test_task_request_is_queued_and_finished() {
    let mut app = build_test_app();
    let home = app.world().resource::<Simulation>().home_zone();
    app.world_mut()
        .resource_mut::<Simulation>()
        .zone_mut(home)
        .unwrap()
        .grid
        .plant((9, 8), CropKind::Wheat);

    app.world_mut().send_event(TaskRequestEvent {
        zone: home,
        kind: TaskKind::Water,
        tile: (9, 8),
    });
    app.world_mut().send_event(TaskRequestEvent {
        zone: home,
        kind: TaskKind::Harvest,
        tile: (3, 3),
    });
    updates(&mut app, 40);

    assert_eq!(seen::<TaskQueuedEvent>(&app).len(), 1);
    let rejected = seen::<RequestRejectedEvent>(&app);
    assert_eq!(rejected.len(), 1);
    assert!(matches!(rejected[0].error, SchedulerError::InvalidTarget(_)));

    let finished = seen::<TaskFinishedEvent>(&app);
    assert_eq!(finished.len(), 1);
    assert!(matches!(
        &finished[0].outcome,
        FarmerOutcome::Completed(task) if task.target == (9, 8)
    ));
    let sim = app.world().resource::<Simulation>();
    assert!(sim.zone(home).unwrap().grid.crop((9, 8)).unwrap().watered_today);
}

#[test]
fn test_building_and_bot_purchase_events() {
    let mut app = build_test_app();
    let home = app.world().resource::<Simulation>().home_zone();
    app.world_mut().send_event(PlaceBuildingEvent {
        kind: BuildingKind::Garage,
        zone: home,
        tile: (2, 2),
    });
    updates(&mut app, 24);
    let completed = seen::<BuildingCompletedEvent>(&app);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].kind, BuildingKind::Garage);

    app.world_mut().send_event(BuyBotEvent {
        kind: BotKind::Harvest,
        zone: home,
        name: Some("Reaper".into()),
        config: None,
    });
    app.world_mut().send_event(BuyBotEvent {
        kind: BotKind::Transport,
        zone: home,
        name: None,
        config: Some(BotConfig::Seed(SeedConfig {
            jobs: Vec::new(),
            auto_buy_seeds: true,
        })),
    });
    app.update();

    let bought = seen::<BotPurchasedEvent>(&app);
    assert_eq!(bought.len(), 1);
    let sim = app.world().resource::<Simulation>();
    let bot = sim.bot(bought[0].bot).unwrap();
    assert_eq!(bot.name, "Reaper");
    assert_eq!(bot.chassis.pos, (2, 2));
    assert!(seen::<RequestRejectedEvent>(&app)
        .iter()
        .any(|r| matches!(r.error, SchedulerError::InvalidConfig(_))));

    let id = bought[0].bot;
    app.world_mut().send_event(SellBotEvent { bot: id });
    app.update();
    let sold = seen::<BotSoldEvent>(&app);
    assert_eq!(sold.len(), 1);
    assert!(app.world().resource::<Simulation>().bot(id).is_none());
}

#[test]
fn test_vendor_sale_event_publishes_record() {
    let mut app = build_test_app();
    let home = app.world().resource::<Simulation>().home_zone();
    app.world_mut()
        .resource_mut::<Simulation>()
        .zone_mut(home)
        .unwrap()
        .warehouse
        .store(vec![CropItem::new(CropKind::Potato); 3]);

    app.world_mut().send_event(VendorSaleEvent {
        crop: CropKind::Potato,
        quantity: 3,
        unit_price: 11,
    });
    app.world_mut().send_event(VendorSaleEvent {
        crop: CropKind::Potato,
        quantity: 1,
        unit_price: 11,
    });
    app.update();

    let sales = seen::<CropSoldEvent>(&app);
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].record.total_revenue, 33);
    assert!(seen::<RequestRejectedEvent>(&app)
        .iter()
        .any(|r| matches!(r.error, SchedulerError::OutOfStock { .. })));
}

#[test]
fn test_save_then_load_restores_state() {
    let dir = std::env::temp_dir().join(format!("fieldhands-headless-{}", std::process::id()));
    let path = dir.join("slot.json");
    let mut app = build_test_app();
    updates(&mut app, 4);
    let money = app.world().resource::<Simulation>().ledger.money();

    app.world_mut().send_event(SaveRequestEvent { path: path.clone() });
    app.update();
    let saved_at = {
        let saves = seen::<SaveCompleteEvent>(&app);
        assert_eq!(saves.len(), 1);
        assert!(saves[0].success, "{:?}", saves[0].error_message);
        read_save(&path).unwrap().now()
    };

    app.world_mut()
        .resource_mut::<Simulation>()
        .ledger
        .spend(1_000, "test")
        .unwrap();
    app.world_mut()
        .resource_mut::<NextState<SimState>>()
        .set(SimState::Paused);
    app.update();

    app.world_mut().send_event(LoadRequestEvent { path: path.clone() });
    app.update();
    let loads = seen::<LoadCompleteEvent>(&app);
    assert_eq!(loads.len(), 1);
    assert!(loads[0].success);
    let sim = app.world().resource::<Simulation>();
    assert_eq!(sim.ledger.money(), money);
    assert_eq!(sim.now(), saved_at);

    app.world_mut().send_event(LoadRequestEvent {
        path: dir.join("missing.json"),
    });
    app.update();
    let loads = seen::<LoadCompleteEvent>(&app);
    assert_eq!(loads.len(), 2);
    assert!(!loads[1].success);
    assert!(loads[1].error_message.is_some());

    std::fs::remove_dir_all(&dir).ok();
}
