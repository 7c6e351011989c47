//! Data layer — static game-design tables and the tuning config.
//!
//! Crop, bot, building and seasonal-event tables are hard-coded in the
//! submodules and read directly by the domains. `DataPlugin` only makes
//! sure a `SimConfig` resource exists before the simulation is built.

pub mod catalog;
pub mod config;
pub mod crops;
pub mod events;

use bevy::prelude::*;

pub use catalog::{bot_spec, building_spec, BotSpec, BuildingSpec, SPRINKLER_COST};
pub use config::{ConfigError, SimConfig};
pub use crops::{crop_def, in_season, CropDef};
pub use events::{seasonal_epic_at, SeasonalEpic};

pub struct DataPlugin;

impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimConfig>();
    }
}
