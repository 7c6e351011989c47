use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;

use fieldhands::bots::{BotConfig, BotPlugin, SeedConfig, SeedJobSpec};
use fieldhands::data::{DataPlugin, SimConfig};
use fieldhands::economy::EconomyPlugin;
use fieldhands::farming::FarmingPlugin;
use fieldhands::save::{AutosaveSettings, SavePlugin};
use fieldhands::shared::*;
use fieldhands::sim::{DayStartedEvent, Simulation, SimulationPlugin};
use fieldhands::world::WorldPlugin;

const CONFIG_PATH: &str = "fieldhands.ron";
const AUTOSAVE_PATH: &str = "saves/autosave.json";
const FRAME: Duration = Duration::from_millis(50);

fn main() {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(FRAME)))
        .add_plugins(LogPlugin::default())
        .add_plugins(StatesPlugin)
        // Must exist before SimulationPlugin builds the Simulation from it.
        .insert_resource(SimConfig::load_or_default(CONFIG_PATH))
        .insert_resource(AutosaveSettings {
            path: Some(AUTOSAVE_PATH.into()),
        })
        .add_plugins((
            DataPlugin,
            SimulationPlugin,
            FarmingPlugin,
            BotPlugin,
            WorldPlugin,
            EconomyPlugin,
            SavePlugin,
        ))
        .add_systems(Startup, seed_demo_farm)
        .add_systems(Update, log_daily_summary.in_set(SimSet::Report))
        .run();
}

/// A small working farm so the headless run has something to schedule.
fn seed_demo_farm(mut sim: ResMut<Simulation>) {
    let home = sim.home_zone();
    let center = match sim.zone(home) {
        Ok(zone) => zone.grid.center(),
        Err(e) => {
            warn!("[Demo] No home zone: {}", e);
            return;
        }
    };
    let (cx, cy) = center;

    let buildings = [
        (BuildingKind::Well, (cx - 6, cy - 4)),
        (BuildingKind::Warehouse, (cx + 6, cy - 4)),
        (BuildingKind::Garage, (cx - 6, cy + 4)),
        (BuildingKind::ExportDock, (cx + 6, cy + 4)),
    ];
    for (kind, tile) in buildings {
        if let Err(e) = sim.place_building(kind, home, tile) {
            warn!("[Demo] Could not place {:?}: {}", kind, e);
        }
    }

    let rows: Vec<GridPos> = (cx - 3..=cx + 3)
        .flat_map(|x| [(x, cy - 1), (x, cy + 1)])
        .collect();
    let seed = SeedConfig {
        jobs: vec![SeedJobSpec {
            crop: CropKind::Wheat,
            tiles: rows,
        }],
        auto_buy_seeds: true,
    };

    let fleet = [
        (BotKind::Seed, Some(BotConfig::Seed(seed))),
        (BotKind::Water, None),
        (BotKind::Harvest, None),
        (BotKind::Transport, None),
    ];
    for (kind, config) in fleet {
        if let Err(e) = sim.buy_bot(kind, home, None, config) {
            warn!("[Demo] Could not buy {:?} bot: {}", kind, e);
        }
    }

    for x in cx - 2..=cx + 2 {
        if let Err(e) = sim.add_task(home, TaskKind::Plant(CropKind::Carrot), (x, cy + 3)) {
            debug!("[Demo] Skipped planting at {:?}: {}", (x, cy + 3), e);
        }
    }
    info!(
        "[Demo] Farm ready with {} bots and {}g",
        sim.bots().count(),
        sim.ledger.money()
    );
}

fn log_daily_summary(mut days: EventReader<DayStartedEvent>, sim: Res<Simulation>) {
    for ev in days.read() {
        let stalled = sim.under_provisioned().len();
        info!(
            "[Sim] Day {} | {}g | {} bots ({} stalled) | {} sales on record",
            ev.day,
            sim.ledger.money(),
            sim.bots().count(),
            stalled,
            sim.ledger.sales_history().len()
        );
    }
}
