//! Price model: a mean-reverting, bounded random walk per crop.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{crop_def, in_season};
use crate::shared::*;

/// Share of the gap to the base price closed each step.
pub const REVERSION: f32 = 0.2;
/// Noise amplitude per step, as a fraction of the base price.
pub const NOISE: f32 = 0.08;
/// The walk never leaves `[MIN_FACTOR, MAX_FACTOR] × base`.
pub const MIN_FACTOR: f32 = 0.5;
pub const MAX_FACTOR: f32 = 2.0;
/// Price multiplier for crops sold outside their growing season.
pub const OFF_SEASON_MULTIPLIER: f32 = 1.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub at: Duration,
    pub prices: BTreeMap<CropKind, f32>,
}

impl PriceSnapshot {
    /// Every crop at its base price.
    pub fn base(at: Duration) -> Self {
        Self {
            at,
            prices: CropKind::ALL
                .iter()
                .map(|&c| (c, crop_def(c).base_price as f32))
                .collect(),
        }
    }

    pub fn price(&self, crop: CropKind) -> f32 {
        self.prices
            .get(&crop)
            .copied()
            .unwrap_or(crop_def(crop).base_price as f32)
    }
}

pub fn season_multiplier(crop: CropKind, season: Season) -> f32 {
    if in_season(crop, season) {
        1.0
    } else {
        OFF_SEASON_MULTIPLIER
    }
}

/// One step of the walk for a single crop. `noise_scale` shrinks the noise
/// band (forecasts use half the live noise).
pub fn walk(prev: f32, crop: CropKind, noise_scale: f32, rng: &mut impl Rng) -> f32 {
    let base = crop_def(crop).base_price as f32;
    let amplitude = NOISE * noise_scale * base;
    let noise = if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    };
    (prev + REVERSION * (base - prev) + noise).clamp(base * MIN_FACTOR, base * MAX_FACTOR)
}

pub fn walk_snapshot(prev: &PriceSnapshot, at: Duration, rng: &mut impl Rng) -> PriceSnapshot {
    PriceSnapshot {
        at,
        prices: CropKind::ALL
            .iter()
            .map(|&c| (c, walk(prev.price(c), c, 1.0, rng)))
            .collect(),
    }
}

/// Projects `steps` cadence points past `latest`. Each point is the expected
/// pre-epic price, seasonal multiplier of that future moment included.
pub fn project(
    latest: &PriceSnapshot,
    steps: usize,
    cadence: Duration,
    season_at: impl Fn(Duration) -> Season,
    rng: &mut impl Rng,
) -> Vec<PriceSnapshot> {
    let mut forecast = Vec::with_capacity(steps);
    let mut walked = latest.clone();
    for i in 1..=steps {
        let at = latest.at + cadence * i as u32;
        walked = PriceSnapshot {
            at,
            prices: CropKind::ALL
                .iter()
                .map(|&c| (c, walk(walked.price(c), c, 0.5, rng)))
                .collect(),
        };
        let season = season_at(at);
        forecast.push(PriceSnapshot {
            at,
            prices: walked
                .prices
                .iter()
                .map(|(&c, &p)| (c, p * season_multiplier(c, season)))
                .collect(),
        });
    }
    forecast
}
