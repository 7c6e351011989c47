//! Tuning values for the scheduler, loadable from a RON file.

use std::path::Path;
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub starting_money: u64,
    pub grid_width: i32,
    pub grid_height: i32,
    pub day_length_secs: f32,
    pub season_length_secs: f32,
    /// Market advances on this cadence regardless of frame rate.
    pub market_cadence_secs: f32,
    pub history_len: usize,
    pub forecast_len: usize,
    /// Chance per market step of a random epic starting (when none is active).
    pub epic_chance: f64,
    pub epic_duration_secs: f32,
    pub high_demand_threshold: f32,
    pub low_demand_threshold: f32,
    /// Expected rabbit spawns per second in a zone with crops.
    pub rabbit_spawn_rate: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_F1E1D,
            starting_money: 2_500,
            grid_width: 24,
            grid_height: 16,
            day_length_secs: 120.0,
            season_length_secs: 600.0,
            market_cadence_secs: 10.0,
            history_len: 24,
            forecast_len: 12,
            epic_chance: 0.03,
            epic_duration_secs: 60.0,
            high_demand_threshold: 0.15,
            low_demand_threshold: -0.15,
            rabbit_spawn_rate: 0.01,
        }
    }
}

impl SimConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Loads `path`, falling back to defaults when the file is missing or broken.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("[Config] Loaded {}", path.display());
                config
            }
            Err(e) => {
                warn!("[Config] {} ({}). Using defaults.", e, path.display());
                Self::default()
            }
        }
    }

    pub fn day_length(&self) -> Duration {
        secs_or_default(self.day_length_secs.max(1.0), Self::default().day_length_secs)
    }

    pub fn season_length(&self) -> Duration {
        secs_or_default(self.season_length_secs.max(1.0), Self::default().season_length_secs)
    }

    pub fn market_cadence(&self) -> Duration {
        secs_or_default(self.market_cadence_secs.max(0.1), Self::default().market_cadence_secs)
    }

    pub fn epic_duration(&self) -> Duration {
        secs_or_default(self.epic_duration_secs.max(0.0), Self::default().epic_duration_secs)
    }
}

/// `secs` as a duration, or `fallback` when it is infinite or too large.
fn secs_or_default(secs: f32, fallback: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or_else(|_| {
        warn!("[Config] {} seconds is out of range. Using {}.", secs, fallback);
        Duration::from_secs_f32(fallback)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = SimConfig::from_ron_str("(starting_money: 99, grid_width: 8)").unwrap();
        assert_eq!(config.starting_money, 99);
        assert_eq!(config.grid_width, 8);
        assert_eq!(config.grid_height, SimConfig::default().grid_height);
    }

    #[test]
    fn test_bad_ron_is_an_error() {
        assert!(SimConfig::from_ron_str("(starting_money: \"lots\")").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = SimConfig::load_or_default("definitely/not/here.ron");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_out_of_range_durations_fall_back_to_defaults() {
        let defaults = SimConfig::default();
        let config = SimConfig {
            day_length_secs: f32::INFINITY,
            season_length_secs: 1e30,
            market_cadence_secs: -5.0,
            ..SimConfig::default()
        };
        assert_eq!(config.day_length(), defaults.day_length());
        assert_eq!(config.season_length(), defaults.season_length());
        assert_eq!(config.market_cadence(), Duration::from_secs_f32(0.1));
    }
}
