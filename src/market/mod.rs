//! Market engine — price history, rolling forecast, seasonal demand and epic
//! price events.
//!
//! The market advances on a fixed cadence of simulation time, independent of
//! how the tick deltas are sliced. Each step:
//!
//! 1. rolls the season over when its time is up
//! 2. expires the random epic and syncs the seasonal epic window
//! 3. appends one walk point to the trailing history
//! 4. may start a random epic (×5 on one crop)
//! 5. recomputes the forecast, current prices and demand sets

pub mod forecast;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{seasonal_epic_at, SimConfig};
use crate::shared::*;

pub use forecast::{season_multiplier, PriceSnapshot};

pub const RANDOM_EPIC_MULTIPLIER: u32 = 5;
pub const SEASONAL_EPIC_MULTIPLIER: u32 = 3;
/// Seed price as a share of the crop's pre-epic market price.
pub const SEED_PRICE_RATIO: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    pub cadence: Duration,
    pub history_len: usize,
    pub forecast_len: usize,
    pub season_length: Duration,
    pub epic_chance: f64,
    pub epic_duration: Duration,
    pub high_demand_threshold: f32,
    pub low_demand_threshold: f32,
}

impl MarketParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            cadence: config.market_cadence(),
            history_len: config.history_len.max(1),
            forecast_len: config.forecast_len.max(1),
            season_length: config.season_length(),
            epic_chance: config.epic_chance.clamp(0.0, 1.0),
            epic_duration: config.epic_duration(),
            high_demand_threshold: config.high_demand_threshold,
            low_demand_threshold: config.low_demand_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSeasonalEpic {
    pub name: String,
    pub crops: Vec<CropKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    SeasonChanged(Season),
    EpicStarted { crop: CropKind, until: Duration },
    EpicEnded(CropKind),
    SeasonalEpicStarted(String),
    SeasonalEpicEnded(String),
}

/// Read-only view handed to the economy/UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub season: Season,
    pub current_prices: BTreeMap<CropKind, u32>,
    pub high_demand_crops: BTreeSet<CropKind>,
    pub low_demand_crops: BTreeSet<CropKind>,
    pub epic_price_crop: Option<CropKind>,
    pub epic_price_end_time: Option<Duration>,
    pub seasonal_epic: Option<ActiveSeasonalEpic>,
    pub price_forecast: Vec<PriceSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub current_prices: BTreeMap<CropKind, u32>,
    /// Raw walk prices, oldest first, bounded by `history_len`.
    pub price_history: VecDeque<PriceSnapshot>,
    /// Expected pre-epic prices for the next `forecast_len` cadence points.
    pub price_forecast: Vec<PriceSnapshot>,
    pub current_season: Season,
    pub high_demand_crops: BTreeSet<CropKind>,
    pub low_demand_crops: BTreeSet<CropKind>,
    pub epic_price_crop: Option<CropKind>,
    pub epic_price_end_time: Option<Duration>,
    pub seasonal_epic: Option<ActiveSeasonalEpic>,
    season_started: Duration,
    next_update: Duration,
    params: MarketParams,
}

impl Market {
    pub fn new(params: MarketParams, now: Duration, rng: &mut impl Rng) -> Self {
        let mut market = Self {
            current_prices: BTreeMap::new(),
            price_history: VecDeque::from([PriceSnapshot::base(now)]),
            price_forecast: Vec::new(),
            current_season: Season::Spring,
            high_demand_crops: BTreeSet::new(),
            low_demand_crops: BTreeSet::new(),
            epic_price_crop: None,
            epic_price_end_time: None,
            seasonal_epic: None,
            season_started: now,
            next_update: now + params.cadence,
            params,
        };
        market.recompute_forecast(rng);
        market.refresh();
        market
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    /// Runs every cadence step that is due by `now`.
    pub fn advance(&mut self, now: Duration, rng: &mut impl Rng) -> Vec<MarketEvent> {
        let mut events = Vec::new();
        while now >= self.next_update {
            let at = self.next_update;
            self.step(at, rng, &mut events);
            self.next_update += self.params.cadence;
        }
        events
    }

    fn step(&mut self, at: Duration, rng: &mut impl Rng, events: &mut Vec<MarketEvent>) {
        while at >= self.season_started + self.params.season_length {
            self.season_started += self.params.season_length;
            self.current_season = self.current_season.next();
            info!("[Market] Season changed to {:?}", self.current_season);
            events.push(MarketEvent::SeasonChanged(self.current_season));
        }

        if let (Some(crop), Some(end)) = (self.epic_price_crop, self.epic_price_end_time) {
            if at >= end {
                self.epic_price_crop = None;
                self.epic_price_end_time = None;
                info!("[Market] Epic price on {} ended", crop);
                events.push(MarketEvent::EpicEnded(crop));
            }
        }

        self.sync_seasonal_epic(at, events);

        let latest = self.latest().clone();
        self.price_history
            .push_back(forecast::walk_snapshot(&latest, at, rng));
        while self.price_history.len() > self.params.history_len {
            self.price_history.pop_front();
        }

        if self.epic_price_crop.is_none() && rng.gen_bool(self.params.epic_chance) {
            let crop = CropKind::ALL[rng.gen_range(0..CropKind::ALL.len())];
            let until = self.start_epic(crop, at);
            events.push(MarketEvent::EpicStarted { crop, until });
        }

        self.recompute_forecast(rng);
        self.refresh();
    }

    fn sync_seasonal_epic(&mut self, at: Duration, events: &mut Vec<MarketEvent>) {
        let progress = at.saturating_sub(self.season_started).as_secs_f32()
            / self.params.season_length.as_secs_f32();
        let active = seasonal_epic_at(self.current_season, progress);
        let current_name = self.seasonal_epic.as_ref().map(|e| e.name.as_str());
        if active.map(|e| e.name) == current_name {
            return;
        }
        if let Some(ended) = self.seasonal_epic.take() {
            info!("[Market] {} is over", ended.name);
            events.push(MarketEvent::SeasonalEpicEnded(ended.name));
        }
        if let Some(epic) = active {
            info!("[Market] {} started: {:?} ×{}", epic.name, epic.crops, SEASONAL_EPIC_MULTIPLIER);
            self.seasonal_epic = Some(ActiveSeasonalEpic {
                name: epic.name.to_string(),
                crops: epic.crops.to_vec(),
            });
            events.push(MarketEvent::SeasonalEpicStarted(epic.name.to_string()));
        }
    }

    /// Starts the random epic on `crop`, replacing any running one.
    /// Returns when it ends.
    pub fn start_epic(&mut self, crop: CropKind, now: Duration) -> Duration {
        let until = now + self.params.epic_duration;
        self.epic_price_crop = Some(crop);
        self.epic_price_end_time = Some(until);
        info!("[Market] EPIC PRICE: {} ×{} until {:?}", crop, RANDOM_EPIC_MULTIPLIER, until);
        self.refresh();
        until
    }

    fn latest(&self) -> &PriceSnapshot {
        // History is never empty: `new` seeds it and `step` pops only past the window.
        &self.price_history[self.price_history.len() - 1]
    }

    fn season_at(&self, t: Duration) -> Season {
        let len = self.params.season_length.as_secs_f64();
        let elapsed = t.saturating_sub(self.season_started).as_secs_f64();
        let mut season = self.current_season;
        for _ in 0..(elapsed / len) as usize % 4 {
            season = season.next();
        }
        season
    }

    fn recompute_forecast(&mut self, rng: &mut impl Rng) {
        let latest = self.latest().clone();
        self.price_forecast = forecast::project(
            &latest,
            self.params.forecast_len,
            self.params.cadence,
            |t| self.season_at(t),
            rng,
        );
    }

    /// Re-derives current prices and demand sets from history, season and epics.
    pub fn refresh(&mut self) {
        self.current_prices = CropKind::ALL
            .iter()
            .map(|&c| (c, self.pre_epic_price(c) * self.epic_multiplier(c)))
            .collect();

        self.high_demand_crops.clear();
        self.low_demand_crops.clear();
        for crop in CropKind::ALL {
            let delta = self.demand_delta(crop);
            if delta > self.params.high_demand_threshold {
                self.high_demand_crops.insert(crop);
            } else if delta < self.params.low_demand_threshold {
                self.low_demand_crops.insert(crop);
            }
        }
    }

    /// Relative gap between the forecast mean and the current pre-epic price.
    pub fn demand_delta(&self, crop: CropKind) -> f32 {
        if self.price_forecast.is_empty() {
            return 0.0;
        }
        let mean = self
            .price_forecast
            .iter()
            .map(|p| p.price(crop))
            .sum::<f32>()
            / self.price_forecast.len() as f32;
        let current = self.pre_epic_price(crop) as f32;
        (mean - current) / current
    }

    /// Latest walk price × seasonal multiplier, rounded. Never below 1.
    pub fn pre_epic_price(&self, crop: CropKind) -> u32 {
        let raw = self.latest().price(crop) * season_multiplier(crop, self.current_season);
        (raw.round() as u32).max(1)
    }

    /// ×5 for the random epic crop, otherwise ×3 when a seasonal epic covers it.
    /// A crop never gets both.
    pub fn epic_multiplier(&self, crop: CropKind) -> u32 {
        if self.epic_price_crop == Some(crop) {
            RANDOM_EPIC_MULTIPLIER
        } else if self
            .seasonal_epic
            .as_ref()
            .is_some_and(|e| e.crops.contains(&crop))
        {
            SEASONAL_EPIC_MULTIPLIER
        } else {
            1
        }
    }

    pub fn is_epic(&self, crop: CropKind) -> bool {
        self.epic_multiplier(crop) > 1
    }

    pub fn is_high_demand(&self, crop: CropKind) -> bool {
        self.high_demand_crops.contains(&crop)
    }

    pub fn price(&self, crop: CropKind) -> u32 {
        self.current_prices
            .get(&crop)
            .copied()
            .unwrap_or_else(|| self.pre_epic_price(crop) * self.epic_multiplier(crop))
    }

    pub fn seed_price(&self, crop: CropKind) -> u32 {
        ((self.pre_epic_price(crop) as f32 * SEED_PRICE_RATIO).ceil() as u32).max(1)
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            season: self.current_season,
            current_prices: self.current_prices.clone(),
            high_demand_crops: self.high_demand_crops.clone(),
            low_demand_crops: self.low_demand_crops.clone(),
            epic_price_crop: self.epic_price_crop,
            epic_price_end_time: self.epic_price_end_time,
            seasonal_epic: self.seasonal_epic.clone(),
            price_forecast: self.price_forecast.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn market_with(config: SimConfig) -> (Market, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let market = Market::new(MarketParams::from_config(&config), Duration::ZERO, &mut rng);
        (market, rng)
    }

    fn quiet_config() -> SimConfig {
        SimConfig {
            epic_chance: 0.0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_random_epic_multiplies_by_five() {
        let (mut market, _) = market_with(quiet_config());
        market.current_season = Season::Summer;
        market.start_epic(CropKind::Corn, Duration::ZERO);
        assert_eq!(market.pre_epic_price(CropKind::Corn), 10);
        assert_eq!(market.current_prices[&CropKind::Corn], 50);
    }

    #[test]
    fn test_random_epic_wins_over_seasonal_epic() {
        let (mut market, _) = market_with(quiet_config());
        market.current_season = Season::Summer;
        market.seasonal_epic = Some(ActiveSeasonalEpic {
            name: "Summer Barbecue".into(),
            crops: vec![CropKind::Corn, CropKind::Tomato],
        });
        market.start_epic(CropKind::Corn, Duration::ZERO);

        assert_eq!(market.epic_multiplier(CropKind::Corn), RANDOM_EPIC_MULTIPLIER);
        assert_eq!(market.epic_multiplier(CropKind::Tomato), SEASONAL_EPIC_MULTIPLIER);
        assert_eq!(market.epic_multiplier(CropKind::Wheat), 1);
    }

    #[test]
    fn test_epic_expires() {
        let config = SimConfig {
            epic_duration_secs: 20.0,
            ..quiet_config()
        };
        let (mut market, mut rng) = market_with(config);
        market.start_epic(CropKind::Melon, Duration::ZERO);
        let events = market.advance(Duration::from_secs(30), &mut rng);
        assert!(events.contains(&MarketEvent::EpicEnded(CropKind::Melon)));
        assert_eq!(market.epic_price_crop, None);
        assert_eq!(market.epic_multiplier(CropKind::Melon), 1);
    }

    #[test]
    fn test_history_window_is_bounded() {
        let (mut market, mut rng) = market_with(quiet_config());
        market.advance(Duration::from_secs(10 * 100), &mut rng);
        assert_eq!(market.price_history.len(), quiet_config().history_len);
        assert_eq!(market.price_forecast.len(), quiet_config().forecast_len);
    }

    #[test]
    fn test_cadence_independent_of_tick_slicing() {
        let (mut coarse, mut rng_a) = market_with(quiet_config());
        let (mut fine, mut rng_b) = market_with(quiet_config());
        coarse.advance(Duration::from_secs(95), &mut rng_a);
        for i in 1..=950 {
            fine.advance(Duration::from_millis(i * 100), &mut rng_b);
        }
        assert_eq!(coarse.price_history, fine.price_history);
        assert_eq!(coarse.current_prices, fine.current_prices);
    }

    #[test]
    fn test_season_rolls_over() {
        let config = SimConfig {
            season_length_secs: 60.0,
            ..quiet_config()
        };
        let (mut market, mut rng) = market_with(config);
        let events = market.advance(Duration::from_secs(60), &mut rng);
        assert_eq!(market.current_season, Season::Summer);
        assert!(events.contains(&MarketEvent::SeasonChanged(Season::Summer)));
    }

    #[test]
    fn test_off_season_crops_forecast_cheaper_before_their_season() {
        // Late in spring, a summer crop is priced off-season now but the
        // forecast runs into summer, so demand drops.
        let config = SimConfig {
            season_length_secs: 100.0,
            ..quiet_config()
        };
        let (mut market, mut rng) = market_with(config);
        market.advance(Duration::from_secs(90), &mut rng);
        assert_eq!(market.current_season, Season::Spring);

        market
            .price_history
            .push_back(PriceSnapshot::base(Duration::from_secs(90)));
        market.recompute_forecast(&mut rng);
        market.refresh();
        assert!(market.demand_delta(CropKind::Melon) < 0.0);
        assert!(!market.is_high_demand(CropKind::Melon));
    }

    #[test]
    fn test_seasonal_epic_window() {
        let config = SimConfig {
            season_length_secs: 100.0,
            ..quiet_config()
        };
        let (mut market, mut rng) = market_with(config);
        market.advance(Duration::from_secs(30), &mut rng);
        let epic = market.seasonal_epic.clone().unwrap();
        assert_eq!(epic.name, "Spring Fair");
        assert_eq!(market.epic_multiplier(CropKind::Strawberry), SEASONAL_EPIC_MULTIPLIER);

        market.advance(Duration::from_secs(60), &mut rng);
        assert!(market.seasonal_epic.is_none());
    }

    #[test]
    fn test_demand_sets_are_disjoint() {
        let (mut market, mut rng) = market_with(SimConfig::default());
        market.advance(Duration::from_secs(3_000), &mut rng);
        assert!(market.high_demand_crops.is_disjoint(&market.low_demand_crops));
    }

    #[test]
    fn test_seed_price_is_a_fraction_of_the_crop() {
        let (market, _) = market_with(quiet_config());
        // Spring corn is off-season: 10 × 1.3 = 13, seeds 40% rounded up.
        assert_eq!(market.pre_epic_price(CropKind::Corn), 13);
        assert_eq!(market.seed_price(CropKind::Corn), 6);
    }
}
