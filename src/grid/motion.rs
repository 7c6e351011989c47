use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::*;

/// Constant-speed straight-line traversal between two tiles. No pathfinding:
/// agents move through the grid unobstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub from: GridPos,
    pub to: GridPos,
    pub started: Duration,
    pub duration: Duration,
}

impl Motion {
    pub fn new(from: GridPos, to: GridPos, now: Duration, tiles_per_sec: f32) -> Self {
        let secs = distance(from, to) / tiles_per_sec.max(0.01);
        Self {
            from,
            to,
            started: now,
            duration: Duration::from_secs_f32(secs),
        }
    }

    pub fn arrived(&self, now: Duration) -> bool {
        now >= self.started + self.duration
    }

    /// Authoritative grid cell at `now` (nearest cell along the line).
    pub fn cell_at(&self, now: Duration) -> GridPos {
        if self.arrived(now) || self.duration.is_zero() {
            return self.to;
        }
        let t = (now.saturating_sub(self.started).as_secs_f32() / self.duration.as_secs_f32())
            .clamp(0.0, 1.0);
        let x = self.from.0 as f32 + (self.to.0 - self.from.0) as f32 * t;
        let y = self.from.1 as f32 + (self.to.1 - self.from.1) as f32 * t;
        (x.round() as i32, y.round() as i32)
    }
}
